use super::{Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{Model, NodeKind, StructuralNode};

const RECEIVER_PARAMS: &[&str] = &["self", "&self", "&mut self", "mut self", "cls", "this"];

pub struct DeepNesting;

/// Deepest conditional below `node` and the first conditional reaching it.
/// `else if` continuations stay at their parent's depth.
fn max_nesting<'a>(node: &'a StructuralNode, depth: usize) -> (usize, Option<&'a StructuralNode>) {
    let mut best = (depth, None);
    for child in &node.children {
        if matches!(child.kind, NodeKind::Function(_) | NodeKind::Type(_)) {
            continue;
        }
        let (child_depth, marker) = match child.kind {
            NodeKind::Conditional { chained: false, .. } => (depth + 1, Some(child)),
            _ => (depth, None),
        };
        let (deepest, at) = max_nesting(child, child_depth);
        if deepest > best.0 {
            best = (deepest, at.or(marker));
        }
    }
    best
}

fn function_name(function: &StructuralNode) -> &str {
    function.name.as_deref().unwrap_or("<anonymous>")
}

impl Detector for DeepNesting {
    fn id(&self) -> &'static str {
        "deep-nesting"
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn description(&self) -> &'static str {
        "Conditional nesting deeper than the configured limit inside one function"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let limit = ctx.thresholds.max_nesting_depth;
        let mut findings = Vec::new();
        for function in model.functions() {
            let (depth, deepest) = max_nesting(function, 0);
            if depth <= limit {
                continue;
            }
            let span = deepest.map(|n| n.span).unwrap_or(function.span);
            findings.push(
                self.candidate(
                    span,
                    format!(
                        "Function '{}' nests conditionals {depth} levels deep (limit {limit})",
                        function_name(function)
                    ),
                )
                .with_remediation("Return early on failed checks or extract the inner branches into functions"),
            );
        }
        Ok(findings)
    }
}

pub struct LongParameterList;

impl Detector for LongParameterList {
    fn id(&self) -> &'static str {
        "long-parameter-list"
    }

    fn category(&self) -> Category {
        Category::Quality
    }

    fn severity(&self) -> Severity {
        Severity::Low
    }

    fn description(&self) -> &'static str {
        "Function declared with more parameters than the configured limit"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let limit = ctx.thresholds.max_parameters;
        let mut findings = Vec::new();
        for function in model.functions() {
            let NodeKind::Function(signature) = &function.kind else {
                continue;
            };
            let count = signature
                .params
                .iter()
                .filter(|p| !RECEIVER_PARAMS.contains(&p.name.trim()))
                .count();
            if count <= limit {
                continue;
            }
            findings.push(
                self.candidate(
                    function.span,
                    format!(
                        "Function '{}' takes {count} parameters (limit {limit})",
                        function_name(function)
                    ),
                )
                .with_remediation("Group related parameters into a struct, record or options object"),
            );
        }
        Ok(findings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Thresholds;
    use crate::detectors::test_support::{run, run_with};
    use crate::source::Language;

    const NESTED_JAVA: &str = r#"class N { void process(int a, int b, int c, int d, int e) {
        if (a > 0) {
            if (b > 0) {
                if (c > 0) {
                    if (d > 0) {
                        if (e > 0) {
                            System.out.println("deep");
                        }
                    }
                }
            }
        }
    } }"#;

    #[test]
    fn test_nesting_beyond_limit() {
        let findings = run(&DeepNesting, Language::Java, NESTED_JAVA);
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Function 'process' nests conditionals 5 levels deep (limit 4)"
        );
        assert_eq!(findings[0].span.start_line, 6);
    }

    #[test]
    fn test_nesting_limit_is_configurable() {
        let relaxed = Thresholds {
            max_nesting_depth: 5,
            ..Thresholds::default()
        };
        assert!(run_with(&DeepNesting, Language::Java, NESTED_JAVA, &relaxed).is_empty());
    }

    #[test]
    fn test_elif_chain_is_flat() {
        let findings = run(
            &DeepNesting,
            Language::Python,
            "def grade(s):\n    if s > 90:\n        return 'A'\n    elif s > 80:\n        return 'B'\n    elif s > 70:\n        return 'C'\n    elif s > 60:\n        return 'D'\n    elif s > 50:\n        return 'E'\n    else:\n        return 'F'\n",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_else_if_chain_is_flat() {
        let findings = run(
            &DeepNesting,
            Language::JavaScript,
            "function g(s) { if (s > 9) { return 1; } else if (s > 8) { return 2; } else if (s > 7) { return 3; } else if (s > 6) { return 4; } else if (s > 5) { return 5; } return 0; }",
        );
        assert!(findings.is_empty());
    }

    #[test]
    fn test_long_parameter_list() {
        let findings = run(
            &LongParameterList,
            Language::Java,
            "class P { void create(String a, String b, String c, String d, String e, String f, String g) {} }",
        );
        assert_eq!(findings.len(), 1);
        assert_eq!(
            findings[0].message,
            "Function 'create' takes 7 parameters (limit 6)"
        );
    }

    #[test]
    fn test_self_is_not_counted() {
        let findings = run(
            &LongParameterList,
            Language::Python,
            "class P:\n    def f(self, a, b, c, d, e, g):\n        pass\n",
        );
        assert!(findings.is_empty());
    }
}
