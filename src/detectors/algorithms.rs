use std::collections::HashMap;

use super::{cue_confidence, Candidate, Category, Detector, DetectorContext, Severity};
use crate::error::DetectorError;
use crate::model::{AssignOp, Model, NodeKind, Signature, StructuralNode, TokenKind};
use crate::source::Span;
use crate::utils::string::normalize_identifier;

const SWAP_CALLS: &[&str] = &["swap", "Swap"];
const MEMO_DECORATORS: &[&str] = &["cache", "memo"];

pub struct QuadraticSort;

fn index_base(target: &str) -> Option<&str> {
    let (base, _) = target.split_once('[')?;
    let base = base.trim().trim_start_matches('[').trim();
    (!base.is_empty()).then_some(base)
}

/// Element comparison such as `a[j] > a[j + 1]` or `x.compareTo(y) > 0`.
fn compares_elements(node: &StructuralNode) -> bool {
    match &node.kind {
        NodeKind::Conditional {
            condition: Some(condition),
            ..
        } => {
            let text = &condition.text;
            (text.contains('[') || text.contains("compareTo") || text.contains(".get("))
                && (text.contains('<') || text.contains('>'))
        }
        _ => false,
    }
}

/// Collection name whose elements are exchanged inside `body`.
fn swapped_collection(body: &StructuralNode) -> Option<String> {
    let mut writes: HashMap<String, usize> = HashMap::new();
    for node in body.scope_descendants() {
        match &node.kind {
            NodeKind::Assignment(binding) if binding.op == AssignOp::Assign => {
                let target = binding.target.trim();
                let Some(base) = index_base(target) else {
                    continue;
                };
                // `a[i], a[j] = a[j], a[i]` and `[a[i], a[j]] = [a[j], a[i]]`
                if target.contains(',') {
                    return Some(base.to_string());
                }
                *writes.entry(base.to_string()).or_default() += 1;
            }
            NodeKind::Call(call) if SWAP_CALLS.contains(&call.callee.as_str()) => {
                let subject = call
                    .receiver
                    .as_deref()
                    .filter(|r| !matches!(*r, "Collections" | "sort" | "std::mem" | "mem"))
                    .or_else(|| call.first_argument().map(|a| a.text.as_str()));
                return Some(subject.unwrap_or("collection").to_string());
            }
            NodeKind::Call(call) if call.callee == "set" => {
                if let Some(receiver) = call.receiver.as_deref() {
                    *writes.entry(receiver.to_string()).or_default() += 1;
                }
            }
            _ => {}
        }
    }
    writes
        .into_iter()
        .filter(|(_, count)| *count >= 2)
        .map(|(base, _)| base)
        .min()
}

impl Detector for QuadraticSort {
    fn id(&self) -> &'static str {
        "quadratic-sort"
    }

    fn category(&self) -> Category {
        Category::Performance
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "Hand-written nested-loop sort that swaps elements pairwise"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        let mut reported: Vec<Span> = Vec::new();

        for outer in model.root.descendants() {
            if !matches!(outer.kind, NodeKind::Loop { .. })
                || reported.iter().any(|span| span.contains(&outer.span))
            {
                continue;
            }
            let hit = outer
                .scope_descendants()
                .filter(|n| matches!(n.kind, NodeKind::Loop { .. }))
                .find_map(|inner| {
                    let collection = swapped_collection(inner)?;
                    let compared = inner.scope_descendants().any(compares_elements);
                    Some((collection, compared))
                });
            let Some((collection, compared)) = hit else {
                continue;
            };

            reported.push(outer.span);
            findings.push(
                self.candidate(
                    outer.span,
                    format!("Nested loops sort '{collection}' by pairwise swaps, which is O(n^2)"),
                )
                .with_confidence(cue_confidence(2 + usize::from(compared), 3))
                .with_remediation("Use the standard library sort, which runs in O(n log n)"),
            );
        }
        Ok(findings)
    }
}

pub struct NaiveRecursion;

/// `n-1`, `n - 2`, `self.n-1` once whitespace is removed.
fn is_decrement(compact: &str) -> bool {
    let Some((base, step)) = compact.rsplit_once('-') else {
        return false;
    };
    !base.is_empty()
        && base
            .chars()
            .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        && !step.is_empty()
        && step.chars().all(|c| c.is_ascii_digit())
}

fn is_memoized(model: &Model<'_>, function: &StructuralNode, signature: &Signature) -> bool {
    let decorated = signature.decorators.iter().any(|d| {
        let d = normalize_identifier(d);
        MEMO_DECORATORS.iter().any(|m| d.contains(m))
    });
    decorated
        || model.tokens_in(&function.span).iter().any(|t| {
            t.kind == TokenKind::Identifier && {
                let name = normalize_identifier(&t.text);
                MEMO_DECORATORS.iter().any(|m| name.contains(m))
            }
        })
}

impl Detector for NaiveRecursion {
    fn id(&self) -> &'static str {
        "naive-recursion"
    }

    fn category(&self) -> Category {
        Category::Performance
    }

    fn severity(&self) -> Severity {
        Severity::Medium
    }

    fn description(&self) -> &'static str {
        "Unmemoized recursion with two self-calls on shrinking arguments (exponential time)"
    }

    fn detect(
        &self,
        model: &Model<'_>,
        _ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError> {
        let mut findings = Vec::new();
        for function in model.functions() {
            let (NodeKind::Function(signature), Some(name)) = (&function.kind, &function.name)
            else {
                continue;
            };

            let self_calls: Vec<(&StructuralNode, String)> = function
                .scope_descendants()
                .filter_map(|node| node.as_call().map(|call| (node, call)))
                .filter(|(_, call)| {
                    call.callee == *name
                        && matches!(call.receiver.as_deref(), None | Some("this" | "self" | "Self"))
                })
                .filter_map(|(node, call)| {
                    let arg = call.first_argument()?.compact();
                    is_decrement(&arg).then_some((node, arg))
                })
                .collect();

            let mut distinct: Vec<&str> = self_calls.iter().map(|(_, arg)| arg.as_str()).collect();
            distinct.sort_unstable();
            distinct.dedup();
            if distinct.len() < 2 || is_memoized(model, function, signature) {
                continue;
            }

            let combined = function.scope_descendants().any(|node| {
                let value = match &node.kind {
                    NodeKind::Return(Some(value)) => value,
                    NodeKind::Assignment(binding) => match &binding.value {
                        Some(value) => value,
                        None => return false,
                    },
                    _ => return false,
                };
                self_calls
                    .iter()
                    .filter(|(call, _)| value.span.contains(&call.span))
                    .count()
                    >= 2
            });

            findings.push(
                self.candidate(
                    function.span,
                    format!(
                        "Recursive function '{name}' calls itself on {} without memoization",
                        distinct.join(" and ")
                    ),
                )
                .with_confidence(cue_confidence(2 + usize::from(combined), 3))
                .with_remediation("Memoize the results or rewrite the recursion as a loop"),
            );
        }
        Ok(findings)
    }
}
