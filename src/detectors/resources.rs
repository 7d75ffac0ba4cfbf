use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{Binding, CallSite, Model, NodeKind, StructuralNode};
use crate::source::{Language, Span};

const JAVA_CLOSEABLE_TYPES: &[&str] = &[
    "FileReader",
    "FileWriter",
    "FileInputStream",
    "FileOutputStream",
    "BufferedReader",
    "BufferedWriter",
    "BufferedInputStream",
    "BufferedOutputStream",
    "InputStreamReader",
    "OutputStreamWriter",
    "PrintWriter",
    "RandomAccessFile",
    "ObjectInputStream",
    "ObjectOutputStream",
    "DataInputStream",
    "DataOutputStream",
    "Socket",
    "ServerSocket",
    "ZipFile",
    "JarFile",
];

const JAVA_ACQUIRE_CALLS: &[&str] = &[
    "getConnection",
    "newBufferedReader",
    "newBufferedWriter",
    "newInputStream",
    "newOutputStream",
    "openStream",
];

const RELEASE_CALLS: &[&str] = &[
    "close",
    "Close",
    "closeSync",
    "dispose",
    "release",
    "shutdown",
    "disconnect",
    "destroy",
    "end",
    "quit",
];

fn is_acquisition(call: &CallSite, language: Language) -> bool {
    let callee = call.callee.as_str();
    let root = call.receiver_root().unwrap_or("");
    match language {
        Language::Java => {
            (call.constructor && JAVA_CLOSEABLE_TYPES.contains(&callee))
                || (!call.constructor && JAVA_ACQUIRE_CALLS.contains(&callee))
        }
        Language::Python => match callee {
            "open" => matches!(root, "" | "io" | "codecs" | "gzip" | "bz2" | "lzma"),
            "connect" => call.receiver.is_some(),
            "urlopen" => true,
            "socket" => root == "socket",
            _ => false,
        },
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            matches!(callee, "openSync" | "createConnection")
        }
        Language::Go => match root {
            "os" => matches!(callee, "Open" | "Create" | "OpenFile"),
            "sql" => callee == "Open",
            "net" => matches!(callee, "Dial" | "DialTimeout" | "Listen"),
            "http" => matches!(callee, "Get" | "Post"),
            _ => false,
        },
        Language::Rust => false,
    }
}

fn is_release_of(call: &CallSite, handle: &str) -> bool {
    RELEASE_CALLS.contains(&call.callee.as_str())
        && (call.receiver_root() == Some(handle)
            || call
                .first_argument()
                .map(|arg| arg.text == handle)
                .unwrap_or(false))
}

#[derive(Debug, Clone, Copy, Default)]
struct Flags {
    in_cleanup: bool,
    conditional: bool,
}

struct Event<'a> {
    node: &'a StructuralNode,
    flags: Flags,
}

/// Flattens one function body in source order, without entering nested functions.
fn events<'a>(node: &'a StructuralNode, flags: Flags, out: &mut Vec<Event<'a>>) {
    for child in &node.children {
        if matches!(child.kind, NodeKind::Function(_) | NodeKind::Type(_)) {
            continue;
        }
        out.push(Event { node: child, flags });
        let mut inner = flags;
        match child.kind {
            NodeKind::Cleanup { .. } => inner.in_cleanup = true,
            NodeKind::Conditional { .. } | NodeKind::Loop { .. } | NodeKind::Handler(_) => {
                inner.conditional = true
            }
            _ => {}
        }
        events(child, inner, out);
    }
}

/// Go's `f, err := os.Open(p)`: the second target reports the failure.
fn error_target(binding: &Binding, language: Language) -> Option<&str> {
    if language != Language::Go {
        return None;
    }
    binding
        .target
        .split(',')
        .nth(1)
        .map(str::trim)
        .filter(|name| !name.is_empty() && *name != "_")
}

/// Whether `exit` sits under a conditional that tests `err`. The handle is
/// nil on that path, so there is nothing to release.
fn guarded_by_error(flat: &[Event<'_>], exit: &StructuralNode, err: &str) -> bool {
    flat.iter().any(|e| match &e.node.kind {
        NodeKind::Conditional {
            condition: Some(condition),
            ..
        } => e.node.span.contains(&exit.span) && condition.references(err),
        _ => false,
    })
}

fn argument_spans(call: &CallSite) -> impl Iterator<Item = &Span> {
    call.arguments.iter().map(|a| &a.value.span)
}

enum Leak {
    NeverReleased,
    ConditionalRelease,
    EarlyExit { line: usize },
}

pub struct ResourceLeak;

impl ResourceLeak {
    fn check_function(&self, model: &Model<'_>, function: &StructuralNode) -> Vec<Candidate> {
        let language = model.language();
        let mut flat = Vec::new();
        events(function, Flags::default(), &mut flat);

        let scoped: Vec<Span> = flat
            .iter()
            .flat_map(|e| match &e.node.kind {
                NodeKind::ScopedResource { resources } | NodeKind::TryRegion { resources } => {
                    resources.iter().map(|r| r.span).collect()
                }
                _ => Vec::new(),
            })
            .collect();

        let calls: Vec<(&Event<'_>, &CallSite)> = flat
            .iter()
            .filter_map(|e| e.node.as_call().map(|c| (e, c)))
            .collect();

        let mut findings = Vec::new();
        for (event, call) in &calls {
            if !is_acquisition(call, language) {
                continue;
            }
            let span = event.node.span;
            if scoped.iter().any(|s| s.contains(&span)) {
                continue;
            }
            // Handed straight to another call: a wrapper or a consumer owns it now.
            let passed = calls.iter().any(|(other, other_call)| {
                other.node.span != span && argument_spans(other_call).any(|a| a.contains(&span))
            });
            if passed {
                continue;
            }
            let returned = flat.iter().any(|e| {
                matches!(e.node.kind, NodeKind::Return(_)) && e.node.span.contains(&span)
            });
            if returned {
                continue;
            }

            let binding = flat
                .iter()
                .filter_map(|e| e.node.as_binding())
                .filter(|b| b.value.as_ref().map(|v| v.span.contains(&span)).unwrap_or(false))
                .last();
            let Some(binding) = binding else {
                findings.push(self.report(span, call, None, Leak::NeverReleased));
                continue;
            };
            if binding.is_member_target() {
                continue;
            }
            let handle = binding.target_name();
            let err = error_target(binding, language);
            let later = || flat.iter().filter(move |e| e.node.span.start_byte >= span.end_byte);

            let transferred = later().any(|e| match e.node.as_call() {
                Some(c) => {
                    is_acquisition(c, language)
                        && c.arguments.iter().any(|a| a.value.references(handle))
                }
                None => false,
            });
            let escapes = later().any(|e| match &e.node.kind {
                NodeKind::Return(Some(value)) => value.references(handle),
                NodeKind::Assignment(b) => {
                    b.is_member_target()
                        && b.value.as_ref().map(|v| v.references(handle)).unwrap_or(false)
                }
                _ => false,
            });
            if transferred || escapes {
                continue;
            }

            let releases: Vec<&Event<'_>> = later()
                .filter(|e| e.node.as_call().map(|c| is_release_of(c, handle)).unwrap_or(false))
                .collect();
            if releases.iter().any(|e| e.flags.in_cleanup) {
                continue;
            }

            let leak = match releases.iter().find(|e| !e.flags.conditional) {
                None if releases.is_empty() => Some(Leak::NeverReleased),
                None => Some(Leak::ConditionalRelease),
                Some(release) => later()
                    .filter(|e| e.node.span.end_byte <= release.node.span.start_byte)
                    .filter(|e| matches!(e.node.kind, NodeKind::Return(_) | NodeKind::Throw))
                    .find(|e| !err.is_some_and(|err| guarded_by_error(&flat, e.node, err)))
                    .map(|exit| Leak::EarlyExit {
                        line: exit.node.span.start_line,
                    }),
            };
            if let Some(leak) = leak {
                findings.push(self.report(span, call, Some(handle), leak));
            }
        }
        findings
    }

    fn report(&self, span: Span, call: &CallSite, handle: Option<&str>, leak: Leak) -> Candidate {
        let subject = match handle {
            Some(handle) => format!("Resource '{handle}' acquired by '{}'", call.callee),
            None => format!("Resource acquired by '{}'", call.callee),
        };
        let (detail, cues) = match leak {
            Leak::NeverReleased => ("is never released".to_string(), 2 + usize::from(handle.is_some())),
            Leak::ConditionalRelease => ("is released only on some paths".to_string(), 2),
            Leak::EarlyExit { line } => (format!("is not released when leaving at line {line}"), 2),
        };
        self.candidate(span, format!("{subject} {detail}"))
            .with_confidence(cue_confidence(cues, 3))
            .with_remediation(
                "Acquire it with try-with-resources, a with-block or defer so it is always released",
            )
    }
}

impl Detector for ResourceLeak {
    fn id(&self) -> &'static str {
        "resource-leak"
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn severity(&self) -> Severity {
        Severity::High
    }

    fn description(&self) -> &'static str {
        "File or connection handle not released on every exit path of its scope"
    }

    fn languages(&self) -> Option<&'static [Language]> {
        Some(&[
            Language::Java,
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
            Language::Go,
        ])
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        Ok(model
            .functions()
            .flat_map(|function| self.check_function(model, function))
            .collect())
    }
}
