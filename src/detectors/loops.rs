use super::injection::{is_query_call, query_call_strength};
use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{
    AssignOp, Binding, BindingScope, Expr, ExprShape, Model, NodeKind, Param, StructuralNode,
};
use crate::source::{Language, Span};
use crate::utils::string::{extract_last_segment, strip_generics};

/// Innermost loop around a node, stopping at the enclosing function. Nodes in
/// a loop header run once and do not count as the body.
fn enclosing_loop<'a>(
    node: &StructuralNode,
    ancestors: &[&'a StructuralNode],
) -> Option<&'a StructuralNode> {
    for ancestor in ancestors.iter().rev() {
        match &ancestor.kind {
            NodeKind::Loop { header } => {
                let in_header = header
                    .as_ref()
                    .map(|h| h.span.contains(&node.span))
                    .unwrap_or(false);
                if !in_header {
                    return Some(ancestor);
                }
            }
            NodeKind::Function(_) | NodeKind::Type(_) => return None,
            _ => {}
        }
    }
    None
}

fn enclosing_scope<'a>(model: &'a Model<'_>, ancestors: &[&'a StructuralNode]) -> &'a StructuralNode {
    ancestors
        .iter()
        .rev()
        .find(|a| a.is_function())
        .copied()
        .unwrap_or(&model.root)
}

/// Bindings of `name` visible from a function: its own locals, then members
/// and module-level declarations.
fn bindings_of<'a>(
    model: &'a Model<'_>,
    scope: &'a StructuralNode,
    name: &'a str,
) -> impl Iterator<Item = (&'a StructuralNode, &'a Binding)> {
    let local = scope.scope_descendants();
    let outer = model.root.descendants().filter(|n| {
        n.as_binding()
            .map(|b| b.is_member_target() || b.scope == BindingScope::Module)
            .unwrap_or(false)
    });
    local
        .chain(outer)
        .filter_map(|n| n.as_binding().map(|b| (n, b)))
        .filter(move |(_, b)| b.target_name() == name)
}

fn params_of<'a>(scope: &'a StructuralNode, name: &str) -> Option<&'a Param> {
    match &scope.kind {
        NodeKind::Function(signature) => signature.params.iter().find(|p| p.name == name),
        _ => None,
    }
}

pub struct StringConcatInLoop;

fn is_string_type(type_name: &str) -> bool {
    matches!(
        extract_last_segment(strip_generics(type_name)).as_str(),
        "String" | "string" | "str"
    )
}

fn is_string_value(expr: &Expr) -> bool {
    matches!(
        expr.shape,
        ExprShape::StringLiteral { .. }
            | ExprShape::Concatenation { .. }
            | ExprShape::Interpolation { .. }
    )
}

/// `s += x` or `s = s + x`.
fn accumulates(binding: &Binding, name: &str) -> bool {
    match binding.op {
        AssignOp::Append => true,
        AssignOp::Assign => binding
            .value
            .as_ref()
            .map(|v| {
                let compact = v.compact();
                compact.starts_with(&format!("{name}+")) && !compact.starts_with(&format!("{name}++"))
            })
            .unwrap_or(false),
        _ => false,
    }
}

fn builder_hint(language: Language) -> &'static str {
    match language {
        Language::Java => "Accumulate into a StringBuilder and call toString() once",
        Language::Python => "Collect the parts in a list and join them with str.join",
        Language::Go => "Use a strings.Builder",
        _ => "Collect the parts in an array and join them once",
    }
}

impl Detector for StringConcatInLoop {
    fn id(&self) -> &'static str {
        "string-concat-in-loop"
    }

    fn category(&self) -> Category {
        Category::Performance
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn description(&self) -> &'static str {
        "String accumulated with += or reassignment inside a loop body"
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
        let mut findings = Vec::new();
        model.root.walk(&mut |node, ancestors| {
            let Some(binding) = node.as_binding() else {
                return;
            };
            let name = binding.target_name();
            if name.is_empty() || !accumulates(binding, name) {
                return;
            }
            let Some(body) = enclosing_loop(node, ancestors) else {
                return;
            };
            let scope = enclosing_scope(model, ancestors);

            // The declaration the accumulator starts from, outside this loop.
            let declaration = bindings_of(model, scope, name)
                .filter(|(n, b)| {
                    !body.span.contains(&n.span)
                        && matches!(b.op, AssignOp::Bind | AssignOp::Assign)
                })
                .map(|(_, b)| b)
                .next();
            let typed = declaration
                .map(|d| {
                    d.declared_type.as_deref().map(is_string_type).unwrap_or(false)
                        || d.value.as_ref().map(is_string_value).unwrap_or(false)
                })
                .unwrap_or(false)
                || params_of(scope, name)
                    .and_then(|p| p.type_name.as_deref())
                    .map(is_string_type)
                    .unwrap_or(false);
            let appended_string = binding.value.as_ref().map(is_string_value).unwrap_or(false);
            if !typed && !appended_string {
                return;
            }

            let matched = 1 + usize::from(typed) + usize::from(declaration.is_some());
            findings.push(
                self.candidate(
                    node.span,
                    format!("String '{name}' is built by concatenation inside a loop"),
                )
                .with_confidence(cue_confidence(matched, 3))
                .with_remediation(builder_hint(model.language())),
            );
        });
        Ok(findings)
    }
}

pub struct LinearMembership;

const MEMBERSHIP_CALLS: &[&str] = &["contains", "includes", "indexOf", "lastIndexOf", "Contains"];
const LINEAR_TYPES: &[&str] = &[
    "List", "ArrayList", "LinkedList", "Vector", "Vec", "VecDeque", "Array", "list", "tuple",
];
const HASHED_TYPES: &[&str] = &[
    "Set", "HashSet", "TreeSet", "LinkedHashSet", "Map", "HashMap", "TreeMap", "BTreeSet",
    "BTreeMap", "set", "frozenset", "dict",
];

/// `Some(true)` for a list-like container, `Some(false)` for a hashed one.
fn container_type(type_name: &str) -> Option<bool> {
    let trimmed = type_name.trim();
    if trimmed.starts_with("[]") || trimmed.ends_with("[]") {
        return Some(true);
    }
    let base = extract_last_segment(strip_generics(trimmed));
    if LINEAR_TYPES.contains(&base.as_str()) {
        Some(true)
    } else if HASHED_TYPES.contains(&base.as_str()) {
        Some(false)
    } else {
        None
    }
}

fn container_value(expr: &Expr) -> Option<bool> {
    match &expr.shape {
        ExprShape::Collection { kind, .. } => Some(kind.is_linear()),
        ExprShape::Construct { type_name } => container_type(type_name),
        ExprShape::Call { callee, receiver } => match (receiver.as_deref(), callee.as_str()) {
            (Some("Arrays"), "asList") | (Some("List"), "of") | (Some("Collections"), "nCopies") => {
                Some(true)
            }
            (Some("Set" | "Map"), "of") => Some(false),
            (None, "list" | "sorted") => Some(true),
            (None, "set" | "frozenset" | "dict") => Some(false),
            (Some("Array"), "from") => Some(true),
            _ => None,
        },
        _ => None,
    }
}

/// How `name` is known to be list-like: from its value or only from a type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Evidence {
    Value,
    Declared,
}

fn list_evidence(model: &Model<'_>, scope: &StructuralNode, name: &str, before: &Span) -> Option<Evidence> {
    let mut verdict = None;
    if let Some(param) = params_of(scope, name) {
        verdict = param
            .type_name
            .as_deref()
            .and_then(container_type)
            .map(|linear| (linear, Evidence::Declared));
    }
    let mut bindings: Vec<(&StructuralNode, &Binding)> = bindings_of(model, scope, name)
        .filter(|(n, _)| n.span.start_byte < before.start_byte || !scope.span.contains(&n.span))
        .collect();
    bindings.sort_by_key(|(n, _)| n.span.start_byte);
    for (_, binding) in bindings {
        let from_value = binding
            .value
            .as_ref()
            .and_then(container_value)
            .map(|linear| (linear, Evidence::Value));
        let from_type = binding
            .declared_type
            .as_deref()
            .and_then(container_type)
            .map(|linear| (linear, Evidence::Declared));
        if let Some(found) = from_value.or(from_type) {
            verdict = Some(found);
        }
    }
    match verdict {
        Some((true, evidence)) => Some(evidence),
        _ => None,
    }
}

impl Detector for LinearMembership {
    fn id(&self) -> &'static str {
        "o(n)-membership-on-list"
    }

    fn category(&self) -> Category {
        Category::Performance
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "Containment check against a list or array inside a loop"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        model.root.walk(&mut |node, ancestors| {
            let container = match &node.kind {
                NodeKind::Call(call) if MEMBERSHIP_CALLS.contains(&call.callee.as_str()) => {
                    match call.receiver_root() {
                        // `slices.Contains(xs, x)`
                        Some("slices") => call.first_argument().map(|a| a.text.clone()),
                        Some(root) if !root.is_empty() => Some(root.to_string()),
                        _ => None,
                    }
                }
                NodeKind::Membership { container, .. } if container.shape == ExprShape::Identifier => {
                    Some(container.text.clone())
                }
                _ => None,
            };
            let Some(container) = container else {
                return;
            };
            if enclosing_loop(node, ancestors).is_none() {
                return;
            }
            let scope = enclosing_scope(model, ancestors);
            let name = container.trim_start_matches(['&', '*']);
            let name = name.strip_prefix("this.").or(name.strip_prefix("self.")).unwrap_or(name);
            let Some(evidence) = list_evidence(model, scope, name, &node.span) else {
                return;
            };

            findings.push(
                self.candidate(
                    node.span,
                    format!("Membership test on list '{name}' inside a loop is O(n) per iteration"),
                )
                .with_confidence(cue_confidence(1 + usize::from(evidence == Evidence::Value), 2))
                .with_remediation("Build a set or hash map once before the loop and look up in it"),
            );
        });
        Ok(findings)
    }
}

pub struct QueryInLoop;

impl Detector for QueryInLoop {
    fn id(&self) -> &'static str {
        "query-in-loop"
    }

    fn category(&self) -> Category {
        Category::Performance
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "Database query executed once per loop iteration (N+1 queries)"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let language = model.language();
        let mut findings = Vec::new();
        model.root.walk(&mut |node, ancestors| {
            let Some(call) = node.as_call() else {
                return;
            };
            if !is_query_call(call, language) || enclosing_loop(node, ancestors).is_none() {
                return;
            }
            let strong = query_call_strength(call, language).unwrap_or(false);
            findings.push(
                self.candidate(
                    node.span,
                    format!("Query executed through '{}' inside a loop", call.callee),
                )
                .with_confidence(cue_confidence(1 + usize::from(strong), 2))
                .with_remediation("Fetch all rows with one query before the loop, or batch the statements"),
            );
        });
        Ok(findings)
    }
}
