//! Scan pipeline: runs every input unit through load, model build and the
//! active detectors in parallel, then hands the outcomes to the aggregator.

pub mod cancel;
pub mod executor;

pub use cancel::CancellationToken;
pub use executor::UnitPipeline;

use rayon::prelude::*;
use std::sync::Arc;
use tracing::debug;

use crate::aggregate::{aggregate, DiagnosticKind, ScanResult, UnitOutcome};
use crate::config::EngineConfig;
use crate::detectors::{Detector, DetectorRegistry};
use crate::diff::ChangedLines;
use crate::error::{ConfigError, ScanError};
use crate::source::UnitInput;

pub struct Engine {
    registry: DetectorRegistry,
    config: EngineConfig,
    changed: Option<ChangedLines>,
    pool: Option<rayon::ThreadPool>,
}

impl Engine {
    /// Built-in detectors with the default config.
    pub fn new() -> Self {
        Self {
            registry: DetectorRegistry::global().clone(),
            config: EngineConfig::default(),
            changed: None,
            pool: None,
        }
    }

    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    pub fn registry(&self) -> &DetectorRegistry {
        &self.registry
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn scan(&self, inputs: &[UnitInput]) -> Result<ScanResult, ScanError> {
        self.scan_with(inputs, &CancellationToken::new())
    }

    /// Scans `inputs`. A cancelled scan returns what finished, marked partial.
    /// Fails only for empty input or when not one unit could be loaded.
    pub fn scan_with(
        &self,
        inputs: &[UnitInput],
        cancel: &CancellationToken,
    ) -> Result<ScanResult, ScanError> {
        if inputs.is_empty() {
            return Err(ScanError::EmptyInput);
        }

        let detectors = self.registry.enabled(&self.config);
        debug!(units = inputs.len(), detectors = detectors.len(), "scan started");

        let pipeline = UnitPipeline {
            detectors: &detectors,
            config: &self.config,
            changed: self.changed.as_ref(),
        };
        let run = || -> Vec<Option<UnitOutcome>> {
            inputs
                .par_iter()
                .map(|input| {
                    if cancel.is_cancelled() {
                        return None;
                    }
                    Some(pipeline.run(input))
                })
                .collect()
        };
        let outcomes = match &self.pool {
            Some(pool) => pool.install(run),
            None => run(),
        };

        let attempted = outcomes.iter().flatten().count();
        let partial = attempted < inputs.len();
        let outcomes: Vec<UnitOutcome> = outcomes.into_iter().flatten().collect();

        let loaded = outcomes.iter().filter(|o| o.language.is_some()).count();
        if !partial && loaded == 0 {
            let unsupported = outcomes
                .iter()
                .flat_map(|o| &o.diagnostics)
                .filter(|d| d.kind == DiagnosticKind::UnsupportedLanguage)
                .count();
            return Err(ScanError::NoLoadableUnits {
                attempted,
                unsupported,
            });
        }

        let result = aggregate(outcomes, partial);
        debug!(
            units = result.summary.units_scanned,
            findings = result.summary.total_findings,
            diagnostics = result.diagnostics.len(),
            partial,
            "scan complete"
        );
        Ok(result)
    }
}

impl Default for Engine {
    fn default() -> Self {
        Self::new()
    }
}

pub struct EngineBuilder {
    registry: DetectorRegistry,
    config: EngineConfig,
    changed: Option<ChangedLines>,
    include_defaults: bool,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            registry: DetectorRegistry::new(),
            config: EngineConfig::default(),
            changed: None,
            include_defaults: true,
        }
    }

    pub fn with_detector<D: Detector + 'static>(mut self, detector: D) -> Self {
        self.registry.register(detector);
        self
    }

    pub fn with_shared_detector(mut self, detector: Arc<dyn Detector>) -> Self {
        self.registry.register_shared(detector);
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Restricts reported findings to lines a patch adds.
    pub fn with_changed_lines(mut self, changed: ChangedLines) -> Self {
        self.changed = Some(changed);
        self
    }

    pub fn without_defaults(mut self) -> Self {
        self.include_defaults = false;
        self
    }

    /// Validates the config against the final detector set.
    pub fn build(self) -> Result<Engine, ConfigError> {
        let registry = if self.include_defaults {
            let mut all = DetectorRegistry::global().clone();
            for detector in self.registry.all() {
                all.register_shared(Arc::clone(detector));
            }
            all
        } else {
            self.registry
        };
        self.config.validate(&registry.ids())?;

        let pool = match self.config.threads {
            Some(threads) => Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(threads)
                    .build()
                    .map_err(|e| ConfigError::invalid_threshold("threads", e.to_string()))?,
            ),
            None => None,
        };

        Ok(Engine {
            registry,
            config: self.config,
            changed: self.changed,
            pool,
        })
    }
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::Severity;
    use pretty_assertions::assert_eq;

    const LEAKY_JAVA: &str = r#"class Leaky {
    private static final String API_KEY = "sk-1234567890abcdef";
    String find(Connection conn, String id) throws SQLException {
        Statement stmt = conn.createStatement();
        ResultSet rs = stmt.executeQuery("SELECT * FROM users WHERE id = '" + id + "'");
        return rs.getString(1);
    }
}
"#;

    fn java(name: &str, text: &str) -> UnitInput {
        UnitInput::buffer(name, text.as_bytes())
    }

    #[test]
    fn test_empty_input_fails() {
        assert_eq!(Engine::new().scan(&[]).unwrap_err(), ScanError::EmptyInput);
    }

    #[test]
    fn test_all_unsupported_fails() {
        let err = Engine::new()
            .scan(&[UnitInput::buffer("a.h", "int x;"), UnitInput::buffer("b.h", "int y;")])
            .unwrap_err();
        assert_eq!(
            err,
            ScanError::NoLoadableUnits {
                attempted: 2,
                unsupported: 2
            }
        );
    }

    #[test]
    fn test_scan_finds_and_orders() {
        let result = Engine::new().scan(&[java("Leaky.java", LEAKY_JAVA)]).unwrap();
        let ids: Vec<&str> = result.findings.iter().map(|f| f.detector_id.as_str()).collect();
        assert!(ids.contains(&"hardcoded-secret"));
        assert!(ids.contains(&"sql-injection"));
        assert_eq!(result.findings[0].severity, Severity::Critical);
        assert_eq!(result.summary.units_scanned, 1);
        assert!(!result.partial);
    }

    #[test]
    fn test_cancelled_scan_is_partial() {
        let token = CancellationToken::new();
        token.cancel();
        let result = Engine::new()
            .scan_with(&[java("Leaky.java", LEAKY_JAVA)], &token)
            .unwrap();
        assert!(result.partial);
        assert!(result.findings.is_empty());
        assert_eq!(result.summary.units_scanned, 0);
    }

    #[test]
    fn test_builder_rejects_unknown_detector() {
        let config = EngineConfig {
            only_detectors: Some(vec!["no-such-rule".to_string()]),
            ..EngineConfig::default()
        };
        assert!(Engine::builder().with_config(config).build().is_err());
    }

    #[test]
    fn test_only_detectors() {
        let config = EngineConfig {
            only_detectors: Some(vec!["sql-injection".to_string()]),
            threads: Some(2),
            ..EngineConfig::default()
        };
        let engine = Engine::builder().with_config(config).build().unwrap();
        let result = engine.scan(&[java("Leaky.java", LEAKY_JAVA)]).unwrap();
        assert_eq!(result.findings.len(), 1);
        assert_eq!(result.findings[0].detector_id, "sql-injection");
        assert_eq!(result.findings[0].line(), 5);
    }

    #[test]
    fn test_changed_lines_filter() {
        let patch = "+++ b/Leaky.java\n@@ -1,0 +2,1 @@\n+    private static final String API_KEY = \"sk-1234567890abcdef\";\n";
        let engine = Engine::builder()
            .with_changed_lines(ChangedLines::parse(patch))
            .build()
            .unwrap();
        let result = engine.scan(&[java("Leaky.java", LEAKY_JAVA)]).unwrap();
        let ids: Vec<&str> = result.findings.iter().map(|f| f.detector_id.as_str()).collect();
        assert_eq!(ids, vec!["hardcoded-secret"]);
    }

    #[test]
    fn test_partial_parse_does_not_block_sibling() {
        let result = Engine::new()
            .scan(&[
                UnitInput::buffer("broken.py", "def (((:\n    API_KEY = \"sk-1234567890abcdef\"\n"),
                java("Leaky.java", LEAKY_JAVA),
            ])
            .unwrap();
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::PartialParse && d.unit == "broken.py"));
        assert!(result
            .findings
            .iter()
            .any(|f| f.file == "Leaky.java" && f.detector_id == "sql-injection"));
        assert_eq!(result.summary.units_scanned, 2);
    }

    #[test]
    fn test_unit_timeout_excludes_unit() {
        let config = EngineConfig {
            unit_timeout_ms: 1,
            ..EngineConfig::default()
        };
        let engine = Engine::builder()
            .with_config(config)
            .with_detector(Slow)
            .build()
            .unwrap();
        let result = engine.scan(&[java("Leaky.java", LEAKY_JAVA)]).unwrap();
        assert!(result.findings.is_empty());
        assert_eq!(result.summary.units_scanned, 0);
        assert!(result
            .diagnostics
            .iter()
            .any(|d| d.kind == DiagnosticKind::UnitTimeout));
    }

    struct Slow;

    impl Detector for Slow {
        fn id(&self) -> &'static str {
            "slow"
        }
        fn category(&self) -> crate::detectors::Category {
            crate::detectors::Category::Quality
        }
        fn severity(&self) -> Severity {
            Severity::Low
        }
        fn description(&self) -> &'static str {
            "sleeps past the unit budget"
        }
        fn detect(
            &self,
            _: &crate::model::Model<'_>,
            _: &crate::detectors::DetectorContext<'_>,
        ) -> Result<Vec<crate::detectors::Candidate>, crate::error::DetectorError> {
            std::thread::sleep(std::time::Duration::from_millis(20));
            Ok(Vec::new())
        }
    }
}
