/// codesift
///
/// A multi-language static defect detector. Source units are parsed with
/// Tree-sitter into a language-neutral model, checked by a registry of
/// independent detectors, and merged into a deterministic, severity-ranked
/// finding set for automated code review.
pub mod aggregate;
pub mod cli;
pub mod config;
pub mod detectors;
pub mod diff;
pub mod engine;
pub mod error;
pub mod logging;
pub mod model;
pub mod output;
pub mod source;
pub mod utils;

pub use aggregate::{Diagnostic, DiagnosticKind, Finding, ScanResult};
pub use config::{EngineConfig, Thresholds};
pub use detectors::{Category, Detector, DetectorRegistry, Severity};
pub use engine::{CancellationToken, Engine, EngineBuilder};
pub use error::{Error, Result};
pub use source::{Language, SourceUnit, Span, UnitInput};
