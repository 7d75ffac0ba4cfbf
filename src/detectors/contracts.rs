use std::collections::BTreeSet;

use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{Expr, ExprShape, Model, NodeKind, StructuralNode, TokenKind, TypeKind, TypeShape};
use crate::source::Language;
use crate::utils::string::normalize_identifier;

const IDENTITY_FIELDS: &[&str] = &["id", "name", "key", "uuid", "email", "code"];

/// Calls that store or look up an element in a collection.
const CONTAINER_CALLS: &[&str] = &[
    "add", "append", "push", "put", "insert", "contains", "remove", "indexOf", "extend",
];

/// Annotations and decorators that generate the equality contract.
const GENERATED_EQUALITY: &[&str] = &["dataclass", "equalsandhashcode", "@data", "@value", "attr.s", "define"];

struct Contract {
    equality: &'static str,
    hash: &'static str,
}

fn contract(language: Language) -> Contract {
    match language {
        Language::Python => Contract {
            equality: "__eq__",
            hash: "__hash__",
        },
        Language::Rust => Contract {
            equality: "PartialEq",
            hash: "Hash",
        },
        _ => Contract {
            equality: "equals",
            hash: "hashCode",
        },
    }
}

pub struct MissingEqualityContract;

fn identity_fields(model: &Model<'_>, type_node: &StructuralNode) -> BTreeSet<String> {
    let mut fields: BTreeSet<String> = type_node
        .descendants()
        .filter_map(|n| n.as_binding())
        .filter(|b| b.is_member_target())
        .map(|b| b.target_name())
        .filter(|name| IDENTITY_FIELDS.contains(&normalize_identifier(name).as_str()))
        .map(str::to_string)
        .collect();

    // Rust struct fields are declarations, not bindings.
    if model.language() == Language::Rust {
        let tokens = model.tokens_in(&type_node.span);
        for pair in tokens.windows(2) {
            if pair[0].kind == TokenKind::Identifier
                && pair[1].text == ":"
                && IDENTITY_FIELDS.contains(&pair[0].text.as_str())
            {
                fields.insert(pair[0].text.clone());
            }
        }
    }
    fields
}

/// Rust `impl Trait for Name` blocks anywhere in the unit.
fn implements(model: &Model<'_>, trait_name: &str, type_name: &str) -> bool {
    model.tokens.windows(4).any(|w| {
        w[0].text == "impl"
            && w[1].text.rsplit("::").next() == Some(trait_name)
            && w[2].text == "for"
            && w[3].text == type_name
    })
}

/// Which halves of the contract are present: (equality, hash).
fn defined(model: &Model<'_>, name: &str, shape: &TypeShape, contract: &Contract) -> (bool, bool) {
    let generated = shape.decorators.iter().any(|d| {
        let d = normalize_identifier(d);
        GENERATED_EQUALITY.iter().any(|g| d.contains(g))
    });
    if generated {
        return (true, true);
    }
    let has_method = |method: &str| shape.methods.iter().any(|m| m == method);
    let derives = |trait_name: &str| {
        shape
            .decorators
            .iter()
            .any(|d| d.contains("derive") && d.split(|c: char| !c.is_alphanumeric()).any(|t| t == trait_name))
            || implements(model, trait_name, name)
    };
    match model.language() {
        Language::Rust => (derives(contract.equality), derives(contract.hash)),
        _ => (has_method(contract.equality), has_method(contract.hash)),
    }
}

fn names_type(type_text: &str, name: &str) -> bool {
    let Some(open) = type_text.find(['<', '[']) else {
        return false;
    };
    type_text[open..]
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .any(|part| part == name)
}

fn constructs(expr: &Expr, name: &str) -> bool {
    match &expr.shape {
        ExprShape::Construct { type_name } => type_name == name,
        ExprShape::Call { callee, receiver } => {
            callee == name || receiver.as_deref() == Some(name)
        }
        _ => false,
    }
}

/// The type appears as a collection element type or is stored into one.
fn used_in_container(model: &Model<'_>, name: &str) -> bool {
    model.root.descendants().any(|node| match &node.kind {
        NodeKind::Assignment(binding) => binding
            .declared_type
            .as_deref()
            .map(|t| names_type(t, name))
            .unwrap_or(false),
        NodeKind::Function(signature) => signature.params.iter().any(|p| {
            p.type_name
                .as_deref()
                .map(|t| names_type(t, name))
                .unwrap_or(false)
        }),
        NodeKind::Call(call) if call.constructor => names_type(&call.path, name),
        NodeKind::Call(call) if CONTAINER_CALLS.contains(&call.callee.as_str()) => {
            call.arguments.iter().any(|a| constructs(&a.value, name))
        }
        _ => false,
    })
}

impl Detector for MissingEqualityContract {
    fn id(&self) -> &'static str {
        "missing-equality-contract"
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn description(&self) -> &'static str {
        "Value-like type with identity fields but no equality and hash, stored in a container"
    }

    fn languages(&self) -> Option<&'static [Language]> {
        Some(&[Language::Java, Language::Python, Language::Rust])
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let contract = contract(model.language());
        let mut findings = Vec::new();
        for node in model.root.descendants() {
            let (NodeKind::Type(shape), Some(name)) = (&node.kind, &node.name) else {
                continue;
            };
            if !matches!(shape.kind, TypeKind::Class | TypeKind::Struct) {
                continue;
            }
            let fields = identity_fields(model, node);
            if fields.is_empty() {
                continue;
            }
            let (equality, hash) = defined(model, name, shape, &contract);
            if equality && hash {
                continue;
            }
            if !used_in_container(model, name) {
                continue;
            }

            let missing = match (equality, hash) {
                (false, false) => format!("{} or {}", contract.equality, contract.hash),
                (false, true) => contract.equality.to_string(),
                _ => contract.hash.to_string(),
            };
            let field_list = fields.iter().cloned().collect::<Vec<_>>().join(", ");
            let matched = 1 + usize::from(!equality && !hash) + usize::from(fields.len() > 1);
            findings.push(
                self.candidate(
                    node.span,
                    format!(
                        "Type '{name}' has identity fields ({field_list}) and is stored in a container but does not define {missing}"
                    ),
                )
                .with_confidence(cue_confidence(matched, 3))
                .with_remediation(format!(
                    "Define {} and {} over the identity fields",
                    contract.equality, contract.hash
                )),
            );
        }
        Ok(findings)
    }
}
