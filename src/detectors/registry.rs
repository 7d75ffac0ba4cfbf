use std::sync::{Arc, OnceLock};

use super::algorithms::{NaiveRecursion, QuadraticSort};
use super::complexity::{DeepNesting, LongParameterList};
use super::contracts::MissingEqualityContract;
use super::crypto::WeakHash;
use super::errors::SilentFailure;
use super::injection::{CodeInjection, CommandInjection, SqlInjection};
use super::loops::{LinearMembership, QueryInLoop, StringConcatInLoop};
use super::resources::ResourceLeak;
use super::secrets::HardcodedSecret;
use super::state::MutableGlobalState;
use super::Detector;
use crate::config::EngineConfig;

/// Ordered set of detectors. Registering the same detector twice is allowed;
/// the duplicate candidates it produces are merged by the aggregator.
#[derive(Clone, Default)]
pub struct DetectorRegistry {
    detectors: Vec<Arc<dyn Detector>>,
}

impl DetectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builtin() -> Self {
        Self::new()
            .with_detector(HardcodedSecret)
            .with_detector(SqlInjection)
            .with_detector(CommandInjection)
            .with_detector(CodeInjection)
            .with_detector(WeakHash)
            .with_detector(SilentFailure)
            .with_detector(ResourceLeak)
            .with_detector(QuadraticSort)
            .with_detector(NaiveRecursion)
            .with_detector(StringConcatInLoop)
            .with_detector(LinearMembership)
            .with_detector(QueryInLoop)
            .with_detector(DeepNesting)
            .with_detector(LongParameterList)
            .with_detector(MissingEqualityContract)
            .with_detector(MutableGlobalState)
    }

    /// Process-wide built-in registry, read-only once initialised.
    pub fn global() -> &'static DetectorRegistry {
        static REGISTRY: OnceLock<DetectorRegistry> = OnceLock::new();
        REGISTRY.get_or_init(Self::builtin)
    }

    pub fn register<D: Detector + 'static>(&mut self, detector: D) {
        self.detectors.push(Arc::new(detector));
    }

    pub fn register_shared(&mut self, detector: Arc<dyn Detector>) {
        self.detectors.push(detector);
    }

    pub fn with_detector<D: Detector + 'static>(mut self, detector: D) -> Self {
        self.register(detector);
        self
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Detector>> {
        self.detectors.iter().find(|d| d.id() == id).cloned()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.detectors.iter().any(|d| d.id() == id)
    }

    pub fn all(&self) -> &[Arc<dyn Detector>] {
        &self.detectors
    }

    /// Distinct ids in registration order.
    pub fn ids(&self) -> Vec<&'static str> {
        let mut ids: Vec<&'static str> = Vec::new();
        for detector in &self.detectors {
            if !ids.contains(&detector.id()) {
                ids.push(detector.id());
            }
        }
        ids
    }

    pub fn len(&self) -> usize {
        self.detectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.detectors.is_empty()
    }

    /// Detectors left active by the config's allow/deny lists.
    pub fn enabled(&self, config: &EngineConfig) -> Vec<Arc<dyn Detector>> {
        self.detectors
            .iter()
            .filter(|d| config.is_enabled(d.id()))
            .cloned()
            .collect()
    }
}

impl std::fmt::Debug for DetectorRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DetectorRegistry")
            .field("detectors", &self.ids())
            .finish()
    }
}
