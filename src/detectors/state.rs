use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{AssignOp, Binding, BindingScope, Model, StructuralNode, TokenKind};
use crate::source::{Language, Span};

pub struct MutableGlobalState;

/// Written somewhere other than its declaration: `x = ..`, `x += ..`, `x++`.
fn is_mutated(model: &Model<'_>, name: &str) -> bool {
    let assigned = model
        .root
        .descendants()
        .filter_map(|n| n.as_binding())
        .any(|b| b.op != AssignOp::Bind && b.target_name() == name);
    assigned
        || model.tokens.windows(2).any(|w| {
            (w[0].is(TokenKind::Identifier, name) && matches!(w[1].text.as_str(), "++" | "--"))
                || (matches!(w[0].text.as_str(), "++" | "--") && w[1].is(TokenKind::Identifier, name))
        })
}

fn is_field_declaration(binding: &Binding) -> bool {
    binding.op == AssignOp::Bind && binding.scope == BindingScope::Member && !binding.target.contains('.')
}

impl MutableGlobalState {
    fn java_fields(&self, model: &Model<'_>, findings: &mut Vec<Candidate>) {
        for node in model.root.descendants() {
            let Some(binding) = node.as_binding().filter(|b| is_field_declaration(b)) else {
                continue;
            };
            if binding.has_modifier("final") {
                continue;
            }
            let name = binding.target_name();
            let message = if binding.has_modifier("static") {
                format!("Static field '{name}' is mutable state shared by every instance")
            } else if binding.has_modifier("public") {
                format!("Public field '{name}' can be modified by any caller")
            } else {
                continue;
            };
            let mutated = is_mutated(model, name);
            findings.push(
                self.candidate(node.span, message)
                    .with_confidence(cue_confidence(1 + usize::from(mutated), 2))
                    .with_remediation("Make the field private and final, or confine the state to an instance"),
            );
        }
    }

    fn rust_statics(&self, model: &Model<'_>, findings: &mut Vec<Candidate>) {
        for node in model.root.descendants() {
            let Some(binding) = node.as_binding() else {
                continue;
            };
            if binding.has_modifier("static") && binding.has_modifier("mut") {
                findings.push(
                    self.candidate(
                        node.span,
                        format!("'static mut {}' is global mutable state", binding.target_name()),
                    )
                    .with_remediation("Use an atomic, a Mutex inside a OnceLock, or pass the state explicitly"),
                );
            }
        }
    }

    /// `global a, b` inside a function body.
    fn python_globals(&self, model: &Model<'_>, findings: &mut Vec<Candidate>) {
        let tokens = &model.tokens;
        for (i, token) in tokens.iter().enumerate() {
            if !token.is(TokenKind::Keyword, "global") {
                continue;
            }
            let names: Vec<&str> = tokens[i + 1..]
                .iter()
                .take_while(|t| {
                    t.span.start_line == token.span.start_line
                        && (t.kind == TokenKind::Identifier || t.text == ",")
                })
                .filter(|t| t.kind == TokenKind::Identifier)
                .map(|t| t.text.as_str())
                .collect();
            let Some(last) = names.last() else {
                continue;
            };
            let end = tokens[i + 1..]
                .iter()
                .find(|t| t.text == *last)
                .map(|t| t.span)
                .unwrap_or(token.span);
            let span = Span {
                end_byte: end.end_byte,
                end_line: end.end_line,
                end_column: end.end_column,
                ..token.span
            };
            findings.push(
                self.candidate(
                    span,
                    format!("Function rebinds module global {}", quote_list(&names)),
                )
                .with_remediation("Pass the value in and return the new one, or keep it on an object"),
            );
        }
    }

    /// Module-level variables reassigned from inside a function.
    fn module_variables(&self, model: &Model<'_>, findings: &mut Vec<Candidate>) {
        let functions: Vec<&StructuralNode> = model.functions().collect();
        for node in model.root.scope_descendants() {
            let Some(binding) = node.as_binding() else {
                continue;
            };
            if binding.scope != BindingScope::Module
                || binding.op != AssignOp::Bind
                || binding.has_modifier("const")
            {
                continue;
            }
            let name = binding.target_name();
            let writer = functions.iter().find(|function| {
                let locals: Vec<&Binding> = function
                    .scope_descendants()
                    .filter_map(|n| n.as_binding())
                    .filter(|b| b.target_name() == name)
                    .collect();
                !locals.iter().any(|b| b.op == AssignOp::Bind)
                    && locals.iter().any(|b| b.op != AssignOp::Bind)
            });
            let Some(writer) = writer else {
                continue;
            };
            findings.push(
                self.candidate(
                    node.span,
                    format!(
                        "Module variable '{name}' is reassigned inside '{}'",
                        writer.name.as_deref().unwrap_or("<anonymous>")
                    ),
                )
                .with_remediation("Keep the state in an object or pass it explicitly"),
            );
        }
    }
}

fn quote_list(names: &[&str]) -> String {
    names
        .iter()
        .map(|n| format!("'{n}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Detector for MutableGlobalState {
    fn id(&self) -> &'static str {
        "mutable-global-state"
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn description(&self) -> &'static str {
        "Static or module-level state that any code can mutate"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        match model.language() {
            Language::Java => self.java_fields(model, &mut findings),
            Language::Rust => self.rust_statics(model, &mut findings),
            Language::Python => self.python_globals(model, &mut findings),
            Language::JavaScript | Language::TypeScript | Language::Tsx | Language::Go => {
                self.module_variables(model, &mut findings)
            }
        }
        Ok(findings)
    }
}
