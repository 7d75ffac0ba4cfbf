use serde::Serialize;

use crate::aggregate::{CategoryCounts, Diagnostic, Finding, ScanResult, SeverityCounts};
use crate::detectors::{Category, Severity};

/// External finding record: one per finding, positions 1-based.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FindingRecord {
    pub detector_id: String,
    pub category: Category,
    pub severity: Severity,
    pub confidence: f64,
    pub file: String,
    pub line: usize,
    pub column: usize,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remediation: Option<String>,
}

impl From<&Finding> for FindingRecord {
    fn from(finding: &Finding) -> Self {
        Self {
            detector_id: finding.detector_id.clone(),
            category: finding.category,
            severity: finding.severity,
            confidence: finding.confidence,
            file: finding.file.clone(),
            line: finding.line(),
            column: finding.column(),
            message: finding.message.clone(),
            remediation: finding.remediation.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SummaryRecord {
    pub units_scanned: usize,
    pub total_findings: usize,
    pub by_severity: SeverityCounts,
    pub by_category: CategoryCounts,
    pub diagnostics: Vec<Diagnostic>,
    pub partial: bool,
}

impl From<&ScanResult> for SummaryRecord {
    fn from(result: &ScanResult) -> Self {
        Self {
            units_scanned: result.summary.units_scanned,
            total_findings: result.summary.total_findings,
            by_severity: result.summary.by_severity,
            by_category: result.summary.by_category,
            diagnostics: result.diagnostics.clone(),
            partial: result.partial,
        }
    }
}

/// A review comment anchored to one changed line.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub file: String,
    pub line: usize,
    pub severity: Severity,
    pub message: String,
}

impl From<&Finding> for CommentRecord {
    fn from(finding: &Finding) -> Self {
        let message = match &finding.remediation {
            Some(hint) => format!("[{}] {} {}", finding.detector_id, finding.message, hint),
            None => format!("[{}] {}", finding.detector_id, finding.message),
        };
        Self {
            file: finding.file.clone(),
            line: finding.line(),
            severity: finding.severity,
            message,
        }
    }
}
