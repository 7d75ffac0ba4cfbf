use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::detectors::Severity;
use crate::error::ConfigError;

/// Policy knobs for the built-in detectors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Thresholds {
    pub secret_min_length: usize,
    /// Shannon entropy in bits per character.
    pub secret_min_entropy: f64,
    pub max_nesting_depth: usize,
    pub max_parameters: usize,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            secret_min_length: 8,
            secret_min_entropy: 3.0,
            max_nesting_depth: 4,
            max_parameters: 6,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub thresholds: Thresholds,
    pub disabled_detectors: Vec<String>,
    pub only_detectors: Option<Vec<String>>,
    pub severity_overrides: BTreeMap<String, Severity>,
    pub min_severity: Option<Severity>,
    pub unit_timeout_ms: u64,
    pub threads: Option<usize>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            thresholds: Thresholds::default(),
            disabled_detectors: Vec::new(),
            only_detectors: None,
            severity_overrides: BTreeMap::new(),
            min_severity: None,
            unit_timeout_ms: 10_000,
            threads: None,
        }
    }
}

impl EngineConfig {
    /// Loads a config file, picking the parser from the extension.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        debug!(path = %path.display(), "loading engine config");

        let content = fs::read_to_string(path)
            .map_err(|e| ConfigError::file_read_error(path, e.to_string()))?;

        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        match extension {
            "json" => serde_json::from_str(&content)
                .map_err(|e| ConfigError::parse_error(path, e.to_string())),
            "yaml" | "yml" => serde_yaml::from_str(&content)
                .map_err(|e| ConfigError::parse_error(path, e.to_string())),
            _ => Err(ConfigError::unsupported_format(extension)),
        }
    }

    pub fn unit_timeout(&self) -> Duration {
        Duration::from_millis(self.unit_timeout_ms)
    }

    pub fn is_enabled(&self, id: &str) -> bool {
        if self.disabled_detectors.iter().any(|d| d == id) {
            return false;
        }
        match &self.only_detectors {
            Some(only) => only.iter().any(|d| d == id),
            None => true,
        }
    }

    pub fn severity_for(&self, id: &str, default: Severity) -> Severity {
        self.severity_overrides.get(id).copied().unwrap_or(default)
    }

    /// Rejects ids that no registered detector answers to and zero thresholds.
    pub fn validate(&self, known_ids: &[&str]) -> Result<(), ConfigError> {
        let referenced = self
            .disabled_detectors
            .iter()
            .chain(self.only_detectors.iter().flatten())
            .chain(self.severity_overrides.keys());
        for id in referenced {
            if !known_ids.contains(&id.as_str()) {
                return Err(ConfigError::unknown_detector(id));
            }
        }

        let t = &self.thresholds;
        let zero = [
            ("secret_min_length", t.secret_min_length == 0),
            ("max_nesting_depth", t.max_nesting_depth == 0),
            ("max_parameters", t.max_parameters == 0),
        ];
        if let Some((name, _)) = zero.iter().find(|(_, is_zero)| *is_zero) {
            return Err(ConfigError::invalid_threshold(*name, "must be greater than zero"));
        }
        if !(t.secret_min_entropy.is_finite() && t.secret_min_entropy > 0.0) {
            return Err(ConfigError::invalid_threshold(
                "secret_min_entropy",
                "must be a positive number",
            ));
        }
        if self.unit_timeout_ms == 0 {
            return Err(ConfigError::invalid_threshold(
                "unit_timeout_ms",
                "must be greater than zero",
            ));
        }
        if self.threads == Some(0) {
            return Err(ConfigError::invalid_threshold("threads", "must be greater than zero"));
        }
        Ok(())
    }
}
