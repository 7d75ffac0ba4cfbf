//! Detector trait, finding candidates and the built-in rule set.
//!
//! A detector is a pure function of one unit's [`Model`]: it reads tokens and
//! the structural tree and returns candidates. Detectors hold no mutable
//! state, so the engine may run them in any order or in parallel.

mod algorithms;
mod complexity;
mod contracts;
mod crypto;
mod errors;
mod injection;
mod loops;
mod registry;
mod resources;
mod secrets;
mod state;

pub use registry::DetectorRegistry;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::config::Thresholds;
use crate::error::DetectorError;
use crate::model::{Model, ModelFeature};
use crate::source::{Language, Span};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "high" => Some(Self::High),
            "critical" => Some(Self::Critical),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Performance,
    Quality,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Security => "security",
            Self::Performance => "performance",
            Self::Quality => "quality",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw finding as produced by one detector, before aggregation.
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub detector_id: &'static str,
    pub category: Category,
    pub severity: Severity,
    pub confidence: f64,
    pub span: Span,
    pub message: String,
    pub remediation: Option<String>,
}

impl Candidate {
    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence.clamp(0.0, 1.0);
        self
    }

    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }
}

/// Read-only inputs shared by every detector in a scan.
#[derive(Debug, Clone, Copy)]
pub struct DetectorContext<'a> {
    pub thresholds: &'a Thresholds,
}

pub trait Detector: Send + Sync {
    fn id(&self) -> &'static str;

    fn category(&self) -> Category;

    fn severity(&self) -> Severity;

    fn description(&self) -> &'static str;

    fn required_features(&self) -> &'static [ModelFeature] {
        &[ModelFeature::Tokens, ModelFeature::Structure]
    }

    /// Languages the rule is meaningful for; `None` means all.
    fn languages(&self) -> Option<&'static [Language]> {
        None
    }

    fn detect(
        &self,
        model: &Model<'_>,
        ctx: &DetectorContext<'_>,
    ) -> Result<Vec<Candidate>, DetectorError>;

    fn applies_to(&self, model: &Model<'_>) -> bool {
        let language_ok = self
            .languages()
            .map(|langs| langs.contains(&model.language()))
            .unwrap_or(true);
        language_ok
            && self
                .required_features()
                .iter()
                .all(|feature| model.has_feature(*feature))
    }

    fn candidate(&self, span: Span, message: impl Into<String>) -> Candidate
    where
        Self: Sized,
    {
        Candidate {
            detector_id: self.id(),
            category: self.category(),
            severity: self.severity(),
            confidence: 1.0,
            span,
            message: message.into(),
            remediation: None,
        }
    }
}

/// `0.4 + 0.6 * matched / possible`, rounded to two decimals.
pub fn cue_confidence(matched: usize, possible: usize) -> f64 {
    if possible == 0 {
        return 1.0;
    }
    let ratio = matched.min(possible) as f64 / possible as f64;
    ((0.4 + 0.6 * ratio) * 100.0).round() / 100.0
}
