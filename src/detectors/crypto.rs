use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{CallSite, Model, TokenKind};
use crate::source::Span;
use crate::utils::string::normalize_identifier;

const WEAK_ALGORITHMS: &[&str] = &["md5", "md4", "md2", "sha1", "sha"];

/// Calls that take an algorithm name as a string argument.
const ALGORITHM_SELECTORS: &[&str] = &[
    "getInstance",
    "new",
    "createHash",
    "createHmac",
    "Hash",
    "hash",
    "digest",
    "pbkdf2_hmac",
];

/// Calls or modules that are themselves a weak digest.
const WEAK_DIGEST_NAMES: &[&str] = &["md5", "sha1", "md4", "md5hex", "sha1hex", "md5digest"];

const SENSITIVE_PARTS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "hash",
    "secret",
    "token",
    "credential",
    "auth",
    "sign",
    "salt",
];

/// Library names that contain a sensitive word without implying a sensitive use.
const LIBRARY_NAMES: &[&str] = &["hashlib", "createhash", "hashcode", "hashmap", "hashset"];

const CONTEXT_LINES: usize = 3;

pub struct WeakHash;

fn weak_algorithm(call: &CallSite) -> Option<String> {
    if ALGORITHM_SELECTORS.contains(&call.callee.as_str()) {
        let named = call
            .arguments
            .iter()
            .filter_map(|a| a.value.string_value())
            .find(|value| WEAK_ALGORITHMS.contains(&normalize_identifier(value).as_str()));
        if let Some(name) = named {
            return Some(name.to_string());
        }
    }

    let callee = normalize_identifier(&call.callee);
    if WEAK_DIGEST_NAMES.contains(&callee.as_str()) {
        return Some(call.callee.clone());
    }
    let root = call.receiver_root().map(normalize_identifier)?;
    WEAK_DIGEST_NAMES
        .contains(&root.as_str())
        .then(|| root.to_ascii_uppercase())
}

/// Identifiers around the call that suggest the digest protects something.
fn sensitive_context(model: &Model<'_>, span: &Span) -> bool {
    let window = match model.enclosing_function(span) {
        Some(function) => model.tokens_in(&function.span),
        None => {
            let first = span.start_line.saturating_sub(CONTEXT_LINES);
            let last = span.end_line + CONTEXT_LINES;
            let start = model.tokens.partition_point(|t| t.span.start_line < first);
            let end = model.tokens.partition_point(|t| t.span.start_line <= last);
            &model.tokens[start..end.max(start)]
        }
    };
    window.iter().any(|t| {
        t.kind == TokenKind::Identifier && {
            let name = normalize_identifier(&t.text);
            !LIBRARY_NAMES.contains(&name.as_str())
                && SENSITIVE_PARTS.iter().any(|part| name.contains(part))
        }
    })
}

impl Detector for WeakHash {
    fn id(&self) -> &'static str {
        "weak-hash"
    }

    fn category(&self) -> Category {
        Category::Security
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "Deprecated digest algorithm (MD5, SHA-1) used near password or hash handling"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        for (node, call) in model.root.calls() {
            let Some(algorithm) = weak_algorithm(call) else {
                continue;
            };
            if !sensitive_context(model, &node.span) {
                continue;
            }
            let selector = ALGORITHM_SELECTORS.contains(&call.callee.as_str());
            findings.push(
                self.candidate(
                    node.span,
                    format!("Weak hash algorithm {algorithm} used in a security-sensitive context"),
                )
                .with_confidence(cue_confidence(2 + usize::from(selector), 3))
                .with_remediation(
                    "Use SHA-256 or stronger for integrity, and bcrypt, scrypt or Argon2 for passwords",
                ),
            );
        }
        Ok(findings)
    }
}
