//! Merges per-unit candidates into the ordered, deduplicated finding set and
//! computes summary counts. Pure: the same inputs always give the same result.

use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashSet;
use std::fmt;

use crate::detectors::{Candidate, Category, Severity};
use crate::source::{Language, Span};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Finding {
    pub detector_id: String,
    pub category: Category,
    pub severity: Severity,
    pub confidence: f64,
    pub file: String,
    pub span: Span,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl Finding {
    pub fn from_candidate(file: &str, candidate: Candidate) -> Self {
        Self {
            detector_id: candidate.detector_id.to_string(),
            category: candidate.category,
            severity: candidate.severity,
            confidence: candidate.confidence,
            file: file.to_string(),
            span: candidate.span,
            message: candidate.message,
            remediation: candidate.remediation,
        }
    }

    pub fn line(&self) -> usize {
        self.span.start_line
    }

    pub fn column(&self) -> usize {
        self.span.start_column
    }

    fn sort_key(&self) -> (Reverse<Severity>, usize, usize, &str, &str, usize, usize) {
        (
            Reverse(self.severity),
            self.span.start_line,
            self.span.start_column,
            &self.detector_id,
            &self.message,
            self.span.start_byte,
            self.span.end_byte,
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityCounts {
    pub fn add(&mut self, severity: Severity) {
        match severity {
            Severity::Critical => self.critical += 1,
            Severity::High => self.high += 1,
            Severity::Medium => self.medium += 1,
            Severity::Low => self.low += 1,
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.critical += other.critical;
        self.high += other.high;
        self.medium += other.medium;
        self.low += other.low;
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CategoryCounts {
    pub security: usize,
    pub performance: usize,
    pub quality: usize,
}

impl CategoryCounts {
    pub fn add(&mut self, category: Category) {
        match category {
            Category::Security => self.security += 1,
            Category::Performance => self.performance += 1,
            Category::Quality => self.quality += 1,
        }
    }

    pub fn merge(&mut self, other: &Self) {
        self.security += other.security;
        self.performance += other.performance;
        self.quality += other.quality;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum DiagnosticKind {
    ReadError,
    UnsupportedLanguage,
    PartialParse,
    DetectorFault,
    UnitTimeout,
}

impl fmt::Display for DiagnosticKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::ReadError => "ReadError",
            Self::UnsupportedLanguage => "UnsupportedLanguage",
            Self::PartialParse => "PartialParse",
            Self::DetectorFault => "DetectorFault",
            Self::UnitTimeout => "UnitTimeout",
        };
        f.write_str(name)
    }
}

/// A non-fatal problem attached to the unit (and detector) it came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub unit: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detector: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, unit: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            unit: unit.into(),
            detector: None,
            message: message.into(),
        }
    }

    pub fn for_detector(mut self, detector: impl Into<String>) -> Self {
        self.detector = Some(detector.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.detector {
            Some(detector) => write!(f, "{} [{}] {}: {}", self.kind, detector, self.unit, self.message),
            None => write!(f, "{} {}: {}", self.kind, self.unit, self.message),
        }
    }
}

/// What the pipeline produced for one unit, before aggregation.
#[derive(Debug, Clone)]
pub struct UnitOutcome {
    pub file: String,
    pub language: Option<Language>,
    pub candidates: Vec<Candidate>,
    pub diagnostics: Vec<Diagnostic>,
    pub partial_parse: bool,
    /// Abandoned on timeout: contributes diagnostics only.
    pub timed_out: bool,
}

impl UnitOutcome {
    pub fn new(file: impl Into<String>, language: Option<Language>) -> Self {
        Self {
            file: file.into(),
            language,
            candidates: Vec::new(),
            diagnostics: Vec::new(),
            partial_parse: false,
            timed_out: false,
        }
    }

    /// Failed before a model could be built.
    pub fn failed(file: impl Into<String>, diagnostic: Diagnostic) -> Self {
        let mut outcome = Self::new(file, None);
        outcome.diagnostics.push(diagnostic);
        outcome
    }

    pub fn is_scanned(&self) -> bool {
        self.language.is_some() && !self.timed_out
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UnitSummary {
    pub file: String,
    pub language: Language,
    pub findings: usize,
    pub by_severity: SeverityCounts,
    pub by_category: CategoryCounts,
    pub partial_parse: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanSummary {
    pub units_scanned: usize,
    pub total_findings: usize,
    pub by_severity: SeverityCounts,
    pub by_category: CategoryCounts,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ScanResult {
    pub findings: Vec<Finding>,
    pub units: Vec<UnitSummary>,
    pub summary: ScanSummary,
    pub diagnostics: Vec<Diagnostic>,
    /// Set when the scan was cancelled before every unit finished.
    pub partial: bool,
}

impl ScanResult {
    pub fn has_findings_at_or_above(&self, severity: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= severity)
    }
}

/// Drops exact duplicates (same detector, span and message) and orders the
/// rest by severity, then position, then detector id and message.
pub fn aggregate_unit(file: &str, candidates: Vec<Candidate>) -> Vec<Finding> {
    let mut seen: HashSet<(&'static str, Span, String)> = HashSet::new();
    let mut findings: Vec<Finding> = candidates
        .into_iter()
        .filter(|c| seen.insert((c.detector_id, c.span, c.message.clone())))
        .map(|c| Finding::from_candidate(file, c))
        .collect();
    findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
    findings
}

/// Joins every unit's outcome into one result. Units are ordered by path so
/// the output does not depend on which worker finished first.
pub fn aggregate(mut outcomes: Vec<UnitOutcome>, partial: bool) -> ScanResult {
    outcomes.sort_by(|a, b| a.file.cmp(&b.file));

    let mut result = ScanResult {
        partial,
        ..ScanResult::default()
    };
    for outcome in outcomes {
        result.diagnostics.extend(outcome.diagnostics);
        let Some(language) = outcome.language.filter(|_| !outcome.timed_out) else {
            continue;
        };

        let findings = aggregate_unit(&outcome.file, outcome.candidates);
        let mut by_severity = SeverityCounts::default();
        let mut by_category = CategoryCounts::default();
        for finding in &findings {
            by_severity.add(finding.severity);
            by_category.add(finding.category);
        }

        result.summary.units_scanned += 1;
        result.summary.total_findings += findings.len();
        result.summary.by_severity.merge(&by_severity);
        result.summary.by_category.merge(&by_category);
        result.units.push(UnitSummary {
            file: outcome.file,
            language,
            findings: findings.len(),
            by_severity,
            by_category,
            partial_parse: outcome.partial_parse,
        });
        result.findings.extend(findings);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn candidate(id: &'static str, severity: Severity, line: usize, message: &str) -> Candidate {
        Candidate {
            detector_id: id,
            category: Category::Quality,
            severity,
            confidence: 1.0,
            span: Span {
                start_byte: line * 10,
                end_byte: line * 10 + 5,
                start_line: line,
                start_column: 1,
                end_line: line,
                end_column: 6,
            },
            message: message.to_string(),
            remediation: None,
        }
    }

    #[test]
    fn test_exact_duplicates_are_merged() {
        let findings = aggregate_unit(
            "a.py",
            vec![
                candidate("deep-nesting", Severity::Low, 3, "too deep"),
                candidate("deep-nesting", Severity::Low, 3, "too deep"),
            ],
        );
        assert_eq!(findings.len(), 1);
    }

    #[test]
    fn test_overlapping_findings_from_different_detectors_are_kept() {
        let findings = aggregate_unit(
            "a.py",
            vec![
                candidate("string-concat-in-loop", Severity::Low, 3, "concat"),
                candidate("sql-injection", Severity::Critical, 3, "query"),
            ],
        );
        let ids: Vec<&str> = findings.iter().map(|f| f.detector_id.as_str()).collect();
        assert_eq!(ids, vec!["sql-injection", "string-concat-in-loop"]);
    }

    #[test]
    fn test_order_is_severity_then_position() {
        let findings = aggregate_unit(
            "a.py",
            vec![
                candidate("b", Severity::Medium, 9, "m"),
                candidate("a", Severity::Medium, 2, "m"),
                candidate("c", Severity::High, 20, "h"),
            ],
        );
        let lines: Vec<usize> = findings.iter().map(Finding::line).collect();
        assert_eq!(lines, vec![20, 2, 9]);
    }

    #[test]
    fn test_units_sorted_and_counted() {
        let mut b = UnitOutcome::new("b.py", Some(Language::Python));
        b.candidates.push(candidate("x", Severity::High, 1, "one"));
        let mut a = UnitOutcome::new("a.py", Some(Language::Python));
        a.candidates.push(candidate("y", Severity::Low, 1, "two"));
        a.candidates.push(candidate("z", Severity::Low, 2, "three"));

        let result = aggregate(vec![b, a], false);
        let files: Vec<&str> = result.units.iter().map(|u| u.file.as_str()).collect();
        assert_eq!(files, vec!["a.py", "b.py"]);
        assert_eq!(result.findings[0].file, "a.py");
        assert_eq!(result.summary.total_findings, 3);
        assert_eq!(result.summary.by_severity.low, 2);
        assert_eq!(result.summary.by_severity.high, 1);
        assert_eq!(result.summary.by_category.quality, 3);
        assert_eq!(result.units[0].by_severity.total(), 2);
    }

    #[test]
    fn test_timed_out_unit_is_excluded_from_counts() {
        let mut slow = UnitOutcome::new("slow.java", Some(Language::Java));
        slow.candidates.push(candidate("x", Severity::High, 1, "one"));
        slow.timed_out = true;
        slow.diagnostics.push(Diagnostic::new(
            DiagnosticKind::UnitTimeout,
            "slow.java",
            "exceeded 10ms",
        ));

        let result = aggregate(vec![slow], false);
        assert!(result.findings.is_empty());
        assert!(result.units.is_empty());
        assert_eq!(result.summary.units_scanned, 0);
        assert_eq!(result.diagnostics.len(), 1);
    }

    #[test]
    fn test_diagnostic_display() {
        let diagnostic = Diagnostic::new(DiagnosticKind::DetectorFault, "a.go", "boom")
            .for_detector("weak-hash");
        assert_eq!(diagnostic.to_string(), "DetectorFault [weak-hash] a.go: boom");
    }
}
