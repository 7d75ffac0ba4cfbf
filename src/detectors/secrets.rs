use regex::Regex;
use std::sync::LazyLock;

use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::config::Thresholds;
use crate::error::DetectorError;
use crate::model::{Model, NodeKind, TokenKind};
use crate::source::Span;
use crate::utils::string::{normalize_identifier, shannon_entropy, unquote_string};

const SECRET_NAME_PARTS: &[&str] = &[
    "password",
    "passwd",
    "pwd",
    "secret",
    "token",
    "apikey",
    "privatekey",
    "accesskey",
    "credential",
];

/// Known credential formats and a label for each. Whole-value matches only,
/// apart from PEM blocks which span several lines.
const KEY_SIGNATURES: &[(&str, &str)] = &[
    (r"^sk_live_[0-9A-Za-z]{24,}$", "Stripe secret key"),
    (r"^pk_live_[0-9A-Za-z]{24,}$", "Stripe publishable key"),
    (r"^sk-(?:proj-)?[A-Za-z0-9]{16,}$", "API secret key"),
    (r"^AKIA[0-9A-Z]{16}$", "AWS access key id"),
    (r"^gh[pousr]_[A-Za-z0-9]{36}$", "GitHub token"),
    (r"^github_pat_[A-Za-z0-9_]{22,}$", "GitHub fine-grained token"),
    (r"^xox[abpr]-[0-9A-Za-z-]{10,}$", "Slack token"),
    (r"^AIza[0-9A-Za-z_\-]{35}$", "Google API key"),
    (
        r"-----BEGIN (?:RSA |EC |DSA |OPENSSH |PGP )?PRIVATE KEY(?: BLOCK)?-----",
        "private key",
    ),
];

static KEY_PATTERNS: LazyLock<Vec<(Regex, &'static str)>> = LazyLock::new(|| {
    KEY_SIGNATURES
        .iter()
        .filter_map(|(pattern, label)| Regex::new(pattern).ok().map(|re| (re, *label)))
        .collect()
});

pub struct HardcodedSecret;

pub fn is_secret_name(name: &str) -> bool {
    let normalized = normalize_identifier(name);
    SECRET_NAME_PARTS.iter().any(|part| normalized.contains(part))
        || (normalized.ends_with("key") && normalized.len() > 3)
}

fn known_signature(value: &str) -> Option<&'static str> {
    KEY_PATTERNS
        .iter()
        .find(|(re, _)| re.is_match(value))
        .map(|(_, label)| *label)
}

fn looks_random(value: &str, thresholds: &Thresholds) -> bool {
    value.chars().count() >= thresholds.secret_min_length
        && !value.contains(char::is_whitespace)
        && shannon_entropy(value) >= thresholds.secret_min_entropy
}

impl Detector for HardcodedSecret {
    fn id(&self) -> &'static str {
        "hardcoded-secret"
    }

    fn category(&self) -> Category {
        Category::Security
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "String literal credential assigned to a secret-like name or matching a known key format"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        let mut covered: Vec<Span> = Vec::new();

        for node in model.root.descendants() {
            let NodeKind::Assignment(binding) = &node.kind else {
                continue;
            };
            let Some(value) = binding.value.as_ref() else {
                continue;
            };
            let Some(literal) = value.string_value() else {
                continue;
            };
            let name = binding.target_name();
            if !is_secret_name(name) {
                continue;
            }

            let signature = known_signature(literal);
            let random = looks_random(literal, ctx.thresholds);
            if signature.is_none() && !random {
                continue;
            }

            let matched = 1 + usize::from(signature.is_some()) + usize::from(random);
            covered.push(value.span);
            findings.push(
                self.candidate(
                    node.span,
                    format!("Hardcoded secret assigned to '{name}'"),
                )
                .with_confidence(cue_confidence(matched, 3))
                .with_remediation(
                    "Load the value from an environment variable or a secret manager",
                ),
            );
        }

        for token in &model.tokens {
            if token.kind != TokenKind::StringLiteral
                || covered.iter().any(|span| span.contains(&token.span))
            {
                continue;
            }
            let value = unquote_string(&token.text);
            let Some(label) = known_signature(&value) else {
                continue;
            };
            let random = looks_random(&value, ctx.thresholds);
            findings.push(
                self.candidate(token.span, format!("String literal looks like a {label}"))
                    .with_confidence(cue_confidence(1 + usize::from(random), 3))
                    .with_remediation("Move the credential out of source code and rotate it"),
            );
        }

        Ok(findings)
    }
}
