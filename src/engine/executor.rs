//! One unit, start to finish: load, build the model, run detectors, filter.

use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

use crate::aggregate::{Diagnostic, DiagnosticKind, UnitOutcome};
use crate::config::EngineConfig;
use crate::detectors::{Candidate, Detector, DetectorContext};
use crate::diff::ChangedLines;
use crate::error::{DetectorError, LoadError};
use crate::model::{Model, ModelBuilder};
use crate::source::UnitInput;

pub struct UnitPipeline<'a> {
    pub detectors: &'a [Arc<dyn Detector>],
    pub config: &'a EngineConfig,
    pub changed: Option<&'a ChangedLines>,
}

impl UnitPipeline<'_> {
    pub fn run(&self, input: &UnitInput) -> UnitOutcome {
        let started = Instant::now();
        let budget = self.config.unit_timeout();
        let name = input.name();

        let unit = match input.load() {
            Ok(unit) => unit,
            Err(e) => {
                debug!(unit = %name, error = %e, "unit not loaded");
                return UnitOutcome::failed(&name, load_diagnostic(&name, &e));
            }
        };
        trace!(unit = %name, language = %unit.language(), bytes = unit.text().len(), "unit loaded");

        let mut outcome = UnitOutcome::new(&name, Some(unit.language()));
        let model = match catch_unwind(AssertUnwindSafe(|| ModelBuilder::for_unit(&unit).build(&unit))) {
            Ok(model) => {
                if model.is_partial() {
                    outcome.partial_parse = true;
                    outcome.diagnostics.push(partial_parse_diagnostic(&name, &model));
                }
                model
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                warn!(unit = %name, error = %message, "model build panicked");
                outcome.partial_parse = true;
                outcome.diagnostics.push(Diagnostic::new(
                    DiagnosticKind::PartialParse,
                    &name,
                    format!("model build failed ({message}); unit analysed without structure"),
                ));
                Model::without_structure(&unit)
            }
        };
        debug!(unit = %name, tokens = model.tokens.len(), partial = model.is_partial(), "model built");

        let ctx = DetectorContext {
            thresholds: &self.config.thresholds,
        };
        let mut stage = "model build";
        for detector in self.detectors {
            if started.elapsed() > budget {
                return timed_out(outcome, &name, self.config.unit_timeout_ms, stage);
            }
            if !detector.applies_to(&model) {
                continue;
            }
            match run_detector(detector.as_ref(), &model, &ctx) {
                Ok(candidates) => outcome.candidates.extend(candidates),
                Err(e) => {
                    warn!(unit = %name, detector = e.detector(), error = %e, "detector fault");
                    outcome.diagnostics.push(
                        Diagnostic::new(DiagnosticKind::DetectorFault, &name, e.to_string())
                            .for_detector(e.detector()),
                    );
                }
            }
            stage = detector.id();
        }
        if started.elapsed() > budget {
            return timed_out(outcome, &name, self.config.unit_timeout_ms, stage);
        }

        outcome.candidates = self.filter(&name, outcome.candidates);
        outcome
    }

    /// Applies severity overrides, then the severity floor and the diff.
    fn filter(&self, name: &str, candidates: Vec<Candidate>) -> Vec<Candidate> {
        candidates
            .into_iter()
            .map(|mut c| {
                c.severity = self.config.severity_for(c.detector_id, c.severity);
                c
            })
            .filter(|c| self.config.min_severity.map(|floor| c.severity >= floor).unwrap_or(true))
            .filter(|c| {
                self.changed
                    .map(|changed| changed.contains(name, c.span.start_line))
                    .unwrap_or(true)
            })
            .collect()
    }
}

fn run_detector(
    detector: &dyn Detector,
    model: &Model<'_>,
    ctx: &DetectorContext<'_>,
) -> Result<Vec<Candidate>, DetectorError> {
    catch_unwind(AssertUnwindSafe(|| detector.detect(model, ctx)))
        .unwrap_or_else(|payload| Err(DetectorError::panicked(detector.id(), panic_message(payload.as_ref()))))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn load_diagnostic(name: &str, error: &LoadError) -> Diagnostic {
    let kind = if error.is_unsupported_language() {
        DiagnosticKind::UnsupportedLanguage
    } else {
        DiagnosticKind::ReadError
    };
    Diagnostic::new(kind, name, error.to_string())
}

fn partial_parse_diagnostic(name: &str, model: &Model<'_>) -> Diagnostic {
    let mut parts = Vec::new();
    if model.unparsed {
        parts.push("no syntax tree could be built; unit analysed without structure".to_string());
    }
    if let Some(first) = model.parse_errors.first() {
        parts.push(format!(
            "{} unparseable region(s), first at line {} column {}",
            model.parse_errors.len(),
            first.start_line,
            first.start_column
        ));
    }
    if model.truncated {
        parts.push("nesting past the depth limit was left unmodelled".to_string());
    }
    Diagnostic::new(DiagnosticKind::PartialParse, name, parts.join("; "))
}

fn timed_out(mut outcome: UnitOutcome, name: &str, budget_ms: u64, stage: &str) -> UnitOutcome {
    warn!(unit = %name, budget_ms, stage, "unit timed out");
    outcome.timed_out = true;
    outcome.candidates.clear();
    outcome.diagnostics.push(Diagnostic::new(
        DiagnosticKind::UnitTimeout,
        name,
        format!("exceeded the {budget_ms}ms budget after {stage}"),
    ));
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::{Category, DetectorRegistry, Severity};
    use crate::source::Language;

    struct Panics;

    impl Detector for Panics {
        fn id(&self) -> &'static str {
            "always-panics"
        }
        fn category(&self) -> Category {
            Category::Quality
        }
        fn severity(&self) -> Severity {
            Severity::Low
        }
        fn description(&self) -> &'static str {
            "test detector"
        }
        fn detect(&self, _: &Model<'_>, _: &DetectorContext<'_>) -> Result<Vec<Candidate>, DetectorError> {
            panic!("boom")
        }
    }

    fn pipeline_run(detectors: &[Arc<dyn Detector>], config: &EngineConfig, input: UnitInput) -> UnitOutcome {
        UnitPipeline {
            detectors,
            config,
            changed: None,
        }
        .run(&input)
    }

    #[test]
    fn test_panicking_detector_becomes_fault() {
        let mut registry = DetectorRegistry::new().with_detector(Panics);
        if let Some(secret) = DetectorRegistry::global().get("hardcoded-secret") {
            registry.register_shared(secret);
        }
        let outcome = pipeline_run(
            registry.all(),
            &EngineConfig::default(),
            UnitInput::buffer("a.py", "API_KEY = \"sk-1234567890abcdef\"\n"),
        );
        assert_eq!(outcome.candidates.len(), 1);
        assert_eq!(outcome.diagnostics.len(), 1);
        let diagnostic = &outcome.diagnostics[0];
        assert_eq!(diagnostic.kind, DiagnosticKind::DetectorFault);
        assert_eq!(diagnostic.detector.as_deref(), Some("always-panics"));
        assert!(diagnostic.message.contains("boom"));
    }

    #[test]
    fn test_unsupported_language_diagnostic() {
        let outcome = pipeline_run(&[], &EngineConfig::default(), UnitInput::buffer("util.h", "int x;"));
        assert!(outcome.language.is_none());
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::UnsupportedLanguage);
    }

    #[test]
    fn test_read_error_diagnostic() {
        let outcome = pipeline_run(
            &[],
            &EngineConfig::default(),
            UnitInput::path("/nonexistent/Thing.java"),
        );
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::ReadError);
        assert!(!outcome.is_scanned());
    }

    #[test]
    fn test_depth_limited_model_is_partial_parse() {
        let text = format!("q = \"a\"{}\n", " + b".repeat(50_000));
        let outcome = pipeline_run(&[], &EngineConfig::default(), UnitInput::buffer("deep.py", text));
        assert!(outcome.partial_parse);
        assert!(outcome.is_scanned());
        assert_eq!(outcome.diagnostics.len(), 1);
        assert_eq!(outcome.diagnostics[0].kind, DiagnosticKind::PartialParse);
        assert_eq!(
            outcome.diagnostics[0].message,
            "nesting past the depth limit was left unmodelled"
        );
    }

    #[test]
    fn test_severity_override_and_floor() {
        let detectors = DetectorRegistry::builtin().all().to_vec();
        let mut config = EngineConfig::default();
        config
            .severity_overrides
            .insert("hardcoded-secret".to_string(), Severity::Low);
        config.min_severity = Some(Severity::Medium);
        let outcome = pipeline_run(
            &detectors,
            &config,
            UnitInput::buffer("a.py", "API_KEY = \"sk-1234567890abcdef\"\n").with_language(Language::Python),
        );
        assert!(outcome.candidates.iter().all(|c| c.detector_id != "hardcoded-secret"));
    }
}
