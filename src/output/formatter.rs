use serde::Serialize;
use std::fmt::Write as _;
use std::io::Write;

use crate::aggregate::ScanResult;
use crate::cli::OutputFormat;
use crate::error::ReportError;

use super::{CommentRecord, FindingRecord, SummaryRecord};

#[derive(Debug, Serialize)]
pub struct JsonOutput {
    pub findings: Vec<FindingRecord>,
    pub summary: SummaryRecord,
}

#[derive(Debug, Serialize)]
pub struct CommentsOutput {
    pub comments: Vec<CommentRecord>,
    pub summary: String,
}

pub struct OutputFormatter;

impl OutputFormatter {
    pub fn format(result: &ScanResult, format: OutputFormat) -> Result<String, ReportError> {
        match format {
            OutputFormat::Json => Ok(serde_json::to_string_pretty(&Self::build_output(result))?),
            OutputFormat::Comments => Ok(serde_json::to_string_pretty(&Self::build_comments(result))?),
            OutputFormat::Text => Ok(Self::build_text(result)),
        }
    }

    /// Formats and writes to `sink`. `target` names the sink in errors.
    pub fn emit<W: Write>(
        result: &ScanResult,
        format: OutputFormat,
        sink: &mut W,
        target: &str,
    ) -> Result<(), ReportError> {
        let rendered = Self::format(result, format)?;
        let write = |sink: &mut W| -> std::io::Result<()> {
            sink.write_all(rendered.as_bytes())?;
            if !rendered.ends_with('\n') {
                sink.write_all(b"\n")?;
            }
            sink.flush()
        };
        write(sink).map_err(|e| ReportError::write_error(target, e))
    }

    pub fn build_output(result: &ScanResult) -> JsonOutput {
        JsonOutput {
            findings: result.findings.iter().map(FindingRecord::from).collect(),
            summary: SummaryRecord::from(result),
        }
    }

    pub fn build_comments(result: &ScanResult) -> CommentsOutput {
        CommentsOutput {
            comments: result.findings.iter().map(CommentRecord::from).collect(),
            summary: Self::summary_line(result),
        }
    }

    pub fn summary_line(result: &ScanResult) -> String {
        let s = &result.summary;
        let mut line = if s.total_findings == 0 {
            format!("No issues found in {} file(s).", s.units_scanned)
        } else {
            format!(
                "Found {} issue(s) in {} file(s): {} critical, {} high, {} medium, {} low.",
                s.total_findings,
                s.units_scanned,
                s.by_severity.critical,
                s.by_severity.high,
                s.by_severity.medium,
                s.by_severity.low
            )
        };
        if result.partial {
            line.push_str(" Scan was cancelled; results are partial.");
        }
        line
    }

    fn build_text(result: &ScanResult) -> String {
        let mut out = String::new();
        for f in &result.findings {
            let _ = writeln!(
                out,
                "{}:{}:{}: {} [{}] {} (confidence {:.2})",
                f.file,
                f.line(),
                f.column(),
                f.severity,
                f.detector_id,
                f.message,
                f.confidence
            );
            if let Some(hint) = &f.remediation {
                let _ = writeln!(out, "    help: {hint}");
            }
        }
        for d in &result.diagnostics {
            let _ = writeln!(out, "note: {d}");
        }
        out.push_str(&Self::summary_line(result));
        out.push('\n');
        out
    }
}
