use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{AssignOp, CallSite, Expr, ExprShape, Model, StructuralNode};
use crate::source::{Language, Span};

/// Calls that only ever execute SQL.
const QUERY_CALLS: &[&str] = &[
    "executeQuery",
    "executeUpdate",
    "executeLargeUpdate",
    "addBatch",
    "prepareStatement",
    "prepareCall",
    "createNativeQuery",
    "createQuery",
    "rawQuery",
    "execSQL",
    "executescript",
    "executemany",
    "raw",
];

/// Calls that execute SQL on a database handle but share names with other APIs.
const MAYBE_QUERY_CALLS: &[&str] = &[
    "execute",
    "query",
    "Query",
    "QueryRow",
    "QueryContext",
    "QueryRowContext",
    "Exec",
    "ExecContext",
    "exec",
    "query_as",
];

const SQL_KEYWORDS: &[&str] = &[
    "SELECT", "INSERT", "UPDATE", "DELETE", "DROP", "CREATE", "ALTER", "WHERE", "FROM", "INTO",
];

const PYTHON_SPAWN: &[&str] = &[
    "system",
    "popen",
    "call",
    "run",
    "Popen",
    "check_call",
    "check_output",
    "getoutput",
    "getstatusoutput",
    "spawnl",
    "spawnlp",
];

const NODE_SPAWN: &[&str] = &["exec", "execSync", "spawn", "spawnSync", "execFile", "execFileSync"];

fn has_sql_keyword(parts: &[&str]) -> bool {
    parts.iter().any(|part| {
        part.split(|c: char| !c.is_ascii_alphabetic())
            .any(|word| SQL_KEYWORDS.contains(&word.to_ascii_uppercase().as_str()))
    })
}

/// A call that executes SQL; `weak` callees need a receiver and an SQL keyword.
pub(super) fn query_call_strength(call: &CallSite, language: Language) -> Option<bool> {
    if call.constructor {
        return None;
    }
    if QUERY_CALLS.contains(&call.callee.as_str()) {
        return Some(true);
    }
    let weak = MAYBE_QUERY_CALLS.contains(&call.callee.as_str())
        && call.receiver.is_some()
        && !is_command_call(call, language);
    weak.then_some(false)
}

pub(super) fn is_query_call(call: &CallSite, language: Language) -> bool {
    match query_call_strength(call, language) {
        Some(true) => true,
        Some(false) => call
            .first_argument()
            .map(|arg| arg.is_dynamic_string() || has_sql_keyword(&arg.literal_parts()))
            .unwrap_or(false),
        None => false,
    }
}

fn is_command_call(call: &CallSite, language: Language) -> bool {
    let receiver = call.receiver.as_deref().unwrap_or("");
    let root = call.receiver_root().unwrap_or("");
    match language {
        Language::Java => {
            (call.callee == "exec" && receiver.contains("Runtime"))
                || (call.constructor && call.callee == "ProcessBuilder")
        }
        Language::Python => match root {
            "os" => matches!(call.callee.as_str(), "system" | "popen" | "spawnl" | "spawnlp"),
            "subprocess" | "commands" => PYTHON_SPAWN.contains(&call.callee.as_str()),
            _ => false,
        },
        Language::JavaScript | Language::TypeScript | Language::Tsx => {
            NODE_SPAWN.contains(&call.callee.as_str())
                && (receiver.is_empty()
                    || matches!(root, "child_process" | "childProcess" | "cp"))
        }
        Language::Go => {
            (root == "exec" && matches!(call.callee.as_str(), "Command" | "CommandContext"))
                || (root == "syscall" && call.callee == "Exec")
                || (root == "os" && call.callee == "StartProcess")
        }
        Language::Rust => call.path.ends_with("Command::new"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Taint {
    /// The argument itself is built from non-literal parts.
    Direct,
    /// The argument is a variable assigned such a string earlier in scope.
    Indirect,
}

/// Traces `expr` to a dynamically built string, following one local variable hop.
fn taint(model: &Model<'_>, call_span: &Span, expr: &Expr) -> Option<Taint> {
    if expr.is_dynamic_string() {
        return Some(Taint::Direct);
    }
    if expr.shape != ExprShape::Identifier {
        return None;
    }
    let scope: &StructuralNode = model.enclosing_function(call_span).unwrap_or(&model.root);
    let name = expr.text.as_str();
    let tainted = scope.scope_descendants().filter_map(|n| n.as_binding()).any(|b| {
        b.target_name() == name
            && b.value.as_ref().map(|v| v.span.end_byte <= call_span.start_byte).unwrap_or(false)
            && (b.op == AssignOp::Append
                || b.value.as_ref().map(|v| v.is_dynamic_string()).unwrap_or(false))
    });
    tainted.then_some(Taint::Indirect)
}

fn building_word(expr: &Expr) -> &'static str {
    match expr.shape {
        ExprShape::Interpolation { .. } => "string interpolation",
        _ => "string concatenation",
    }
}

pub struct SqlInjection;

impl Detector for SqlInjection {
    fn id(&self) -> &'static str {
        "sql-injection"
    }

    fn category(&self) -> Category {
        Category::Security
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "Query-execution call whose SQL argument is concatenated or interpolated"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        for (node, call) in model.root.calls() {
            let Some(strong) = query_call_strength(call, model.language()) else {
                continue;
            };
            let Some(arg) = call.first_argument() else {
                continue;
            };
            let Some(taint) = taint(model, &node.span, arg) else {
                continue;
            };
            let keyword = has_sql_keyword(&arg.literal_parts())
                || (taint == Taint::Indirect && strong);
            if !strong && !keyword {
                continue;
            }
            let cues = usize::from(strong) + usize::from(keyword) + usize::from(taint == Taint::Direct);
            let how = match taint {
                Taint::Direct => building_word(arg).to_string(),
                Taint::Indirect => format!("variable '{}' built by concatenation", arg.text),
            };
            findings.push(
                self.candidate(
                    node.span,
                    format!("SQL query passed to '{}' is built with {how}", call.callee),
                )
                .with_confidence(cue_confidence(cues, 3))
                .with_remediation("Use a parameterized query with placeholders and bind the values"),
            );
        }
        Ok(findings)
    }
}

pub struct CommandInjection;

impl Detector for CommandInjection {
    fn id(&self) -> &'static str {
        "command-injection"
    }

    fn category(&self) -> Category {
        Category::Security
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "Process-spawning call with a command built from non-literal input"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        for (node, call) in model.root.calls() {
            if !is_command_call(call, model.language()) {
                continue;
            }
            let tainted = call
                .arguments
                .iter()
                .filter(|a| a.keyword.is_none())
                .find_map(|a| taint(model, &node.span, &a.value));
            let Some(taint) = tainted else {
                continue;
            };
            let shell = call.arguments.iter().any(|a| {
                a.keyword.as_deref() == Some("shell") && a.value.text.eq_ignore_ascii_case("true")
            }) || call.receiver_root() == Some("os")
                || call.receiver.as_deref().unwrap_or("").contains("Runtime");
            let cues = 1 + usize::from(taint == Taint::Direct) + usize::from(shell);
            findings.push(
                self.candidate(
                    node.span,
                    format!("Command passed to '{}' is built from unsanitized input", call.path),
                )
                .with_confidence(cue_confidence(cues, 3))
                .with_remediation(
                    "Pass arguments as a list without a shell and validate them against an allow-list",
                ),
            );
        }
        Ok(findings)
    }
}

pub struct CodeInjection;

impl CodeInjection {
    fn is_eval(call: &CallSite, language: Language) -> bool {
        match language {
            Language::Python => {
                call.receiver.is_none() && matches!(call.callee.as_str(), "eval" | "exec")
            }
            Language::JavaScript | Language::TypeScript | Language::Tsx => {
                (call.receiver.is_none() && call.callee == "eval")
                    || (call.constructor && call.callee == "Function")
            }
            _ => false,
        }
    }
}

impl Detector for CodeInjection {
    fn id(&self) -> &'static str {
        "code-injection"
    }

    fn category(&self) -> Category {
        Category::Security
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "eval/exec or the Function constructor applied to non-literal code"
    }

    fn languages(&self) -> Option<&'static [Language]> {
        Some(&[
            Language::Python,
            Language::JavaScript,
            Language::TypeScript,
            Language::Tsx,
        ])
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        for (node, call) in model.root.calls() {
            if !Self::is_eval(call, model.language()) {
                continue;
            }
            let Some(code) = call.arguments.last().map(|a| &a.value) else {
                continue;
            };
            if code.is_literal() {
                continue;
            }
            let dynamic = code.is_dynamic_string();
            findings.push(
                self.candidate(
                    node.span,
                    format!("'{}' evaluates code built at runtime", call.callee),
                )
                .with_confidence(cue_confidence(1 + usize::from(dynamic), 2))
                .with_remediation("Avoid evaluating code; parse the input into data instead"),
            );
        }
        Ok(findings)
    }
}
