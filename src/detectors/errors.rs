use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{ExprShape, HandlerClause, Model, NodeKind, StatementShape, StructuralNode};
use crate::source::Language;

const BROAD_TYPES: &[&str] = &["Exception", "Throwable", "BaseException", "Error", "RuntimeException"];

pub struct SilentFailure;

/// The handler neither recovers, re-raises nor records the error.
fn swallows(clause: &HandlerClause) -> bool {
    clause.body.iter().all(|statement| match statement {
        StatementShape::Empty | StatementShape::Jump => true,
        StatementShape::Return(None) => true,
        StatementShape::Return(Some(value)) => {
            value.is_literal() || value.shape == ExprShape::Identifier
        }
        // Any call, logging included, counts as handling the error.
        StatementShape::Throw | StatementShape::Call(_) | StatementShape::Other => false,
    })
}

fn is_broad(clause: &HandlerClause) -> bool {
    match clause.caught.as_deref() {
        None => true,
        Some(caught) => caught
            .split(['|', ',', '(', ')'])
            .map(|t| t.trim().rsplit('.').next().unwrap_or(""))
            .any(|t| BROAD_TYPES.contains(&t)),
    }
}

/// Whether the guarded body contains something that can actually raise.
fn guarded_can_raise(try_region: &StructuralNode, handler: &StructuralNode) -> (bool, bool) {
    let resources = matches!(&try_region.kind, NodeKind::TryRegion { resources } if !resources.is_empty());
    let guarded = try_region
        .children
        .iter()
        .filter(|child| child.span.end_byte <= handler.span.start_byte)
        .filter(|child| !matches!(child.kind, NodeKind::Handler(_)));
    let mut calls = false;
    let mut throws = false;
    for node in guarded.flat_map(|child| child.descendants()) {
        match node.kind {
            NodeKind::Call(_) => calls = true,
            NodeKind::Throw => throws = true,
            _ => {}
        }
    }
    (calls || resources, throws)
}

impl Detector for SilentFailure {
    fn id(&self) -> &'static str {
        "silent-failure"
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "Exception handler that swallows errors without re-raising or logging"
    }

    fn languages(&self) -> Option<&'static [Language]> {
        Some(&[
            Language::Java,
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
        model.root.walk(&mut |node, ancestors| {
            let NodeKind::Handler(clause) = &node.kind else {
                return;
            };
            let Some(try_region) = ancestors
                .iter()
                .rev()
                .find(|a| matches!(a.kind, NodeKind::TryRegion { .. }))
            else {
                return;
            };
            if !swallows(clause) {
                return;
            }
            let (calls, throws) = guarded_can_raise(try_region, node);
            if !calls && !throws {
                return;
            }

            let broad = is_broad(clause);
            let caught = clause.caught.as_deref().unwrap_or("any exception");
            let outcome = if clause.body.is_empty()
                || clause.body.iter().all(|s| *s == StatementShape::Empty)
            {
                "ignores it"
            } else {
                "returns a fallback value"
            };
            findings.push(
                self.candidate(
                    node.span,
                    format!("Handler for {caught} {outcome} without logging or re-raising"),
                )
                .with_confidence(cue_confidence(1 + usize::from(broad) + usize::from(calls), 3))
                .with_remediation(
                    "Catch the specific exception, log it with context, or let it propagate",
                ),
            );
        });
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::test_support::run;

    #[test]
    fn test_broad_catch_returning_constant() {
        let findings = run(
            &SilentFailure,
            Language::Java,
            r#"class A { String risky() {
                try {
                    int result = 10 / 0;
                    return String.valueOf(result);
                } catch (Exception e) {
                    return "";
                }
            } }"#,
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].confidence, 1.0);
        assert_eq!(
            findings[0].message,
            "Handler for Exception returns a fallback value without logging or re-raising"
        );
    }

    #[test]
    fn test_python_bare_except_pass() {
        let findings = run(
            &SilentFailure,
            Language::Python,
            "def f(path):\n    try:\n        load(path)\n    except:\n        pass\n",
        );
        assert_eq!(findings.len(), 1);
        assert!(findings[0].message.contains("ignores it"));
    }

    #[test]
    fn test_logging_handler_is_clean() {
        let findings = run(
            &SilentFailure,
            Language::Python,
            "def f(path):\n    try:\n        load(path)\n    except ValueError as e:\n        logger.warning(\"bad %s\", e)\n",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_rethrow_is_clean() {
        let findings = run(
            &SilentFailure,
            Language::JavaScript,
            "function f() { try { load(); } catch (e) { throw new Error('wrapped'); } }",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_trivial_guarded_region_is_clean() {
        let findings = run(
            &SilentFailure,
            Language::Python,
            "def f():\n    try:\n        x = 1\n    except Exception:\n        pass\n",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_specific_exception_lowers_confidence() {
        let findings = run(
            &SilentFailure,
            Language::Java,
            "class A { void f() { try { load(); } catch (IOException e) { } } }",
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].confidence, 0.8);
    }
}
