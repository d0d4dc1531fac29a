//! Workload engines
//!
//! Each engine generates one category of synthetic compute. The scheduler
//! only knows the `WorkloadEngine` capability and holds enabled engines in
//! an `EngineSet` keyed by kind.

use std::collections::BTreeMap;

use rand::rngs::SmallRng;
use rand::SeedableRng;
use thiserror::Error;
use tracing::debug;

use crate::config::LoadTestConfig;
use crate::models::{EngineKind, StatsRecorder};

pub mod array_math;
pub mod linalg;
pub mod text;
pub mod vision;

pub use array_math::ArrayMathEngine;
pub use linalg::LinearAlgebraEngine;
pub use text::TextEmbeddingEngine;
pub use vision::ImageAnalysisEngine;

/// Failure of a single unit of work inside an engine
#[derive(Debug, Error)]
pub enum EngineError {
    /// A preallocated buffer is missing or has the wrong shape
    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),
    /// The computation produced NaN or infinity
    #[error("non-finite result in {0}")]
    NonFinite(&'static str),
    /// The unit had nothing to work on
    #[error("empty input: {0}")]
    EmptyInput(String),
}

/// One category of synthetic work.
///
/// Implementations preallocate their buffers at construction, so repeated
/// calls are cheap. A failed unit is reported through
/// `StatsRecorder::record_error` and the call carries on with the next unit.
pub trait WorkloadEngine: Send {
    fn kind(&self) -> EngineKind;

    /// Run `iterations` units of work, counting completed units
    fn run_operations(&mut self, iterations: u32, stats: &mut StatsRecorder<'_>);
}

/// Record a unit failure in the shared error log
pub(crate) fn record_failure(stats: &mut StatsRecorder<'_>, err: &EngineError) {
    let label = stats.kind().label();
    stats.record_error(format!("{} error: {}", label, err));
}

/// Random source for engine input synthesis
pub(crate) fn engine_rng(seed: Option<u64>, kind: EngineKind) -> SmallRng {
    match seed {
        Some(seed) => SmallRng::seed_from_u64(seed ^ (kind as u64 + 1).wrapping_mul(0x9E37_79B9_7F4A_7C15)),
        None => SmallRng::from_entropy(),
    }
}

/// Construct the default engine of a kind
pub fn build_engine(kind: EngineKind, seed: Option<u64>) -> Box<dyn WorkloadEngine> {
    let rng = engine_rng(seed, kind);
    match kind {
        EngineKind::ImageAnalysis => Box::new(ImageAnalysisEngine::new(rng)),
        EngineKind::ArrayMath => Box::new(ArrayMathEngine::new(rng)),
        EngineKind::LinearAlgebra => Box::new(LinearAlgebraEngine::new(rng)),
        EngineKind::TextEmbedding => Box::new(TextEmbeddingEngine::new(rng)),
    }
}

/// Enabled engines keyed by kind, iterated in a fixed order
#[derive(Default)]
pub struct EngineSet {
    engines: BTreeMap<EngineKind, Box<dyn WorkloadEngine>>,
}

impl EngineSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build every engine the configuration enables
    pub fn from_config(config: &LoadTestConfig) -> Self {
        let mut set = Self::new();
        for kind in config.engines.enabled_kinds() {
            debug!(engine = %kind, "initializing engine");
            set.insert(build_engine(kind, config.seed));
        }
        set
    }

    /// Add an engine, replacing any engine of the same kind
    pub fn insert(&mut self, engine: Box<dyn WorkloadEngine>) -> Option<Box<dyn WorkloadEngine>> {
        self.engines.insert(engine.kind(), engine)
    }

    pub fn contains(&self, kind: EngineKind) -> bool {
        self.engines.contains_key(&kind)
    }

    pub fn kinds(&self) -> Vec<EngineKind> {
        self.engines.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.engines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.engines.is_empty()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (EngineKind, &mut Box<dyn WorkloadEngine>)> {
        self.engines.iter_mut().map(|(kind, engine)| (*kind, engine))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_config_respects_flags() {
        let config = LoadTestConfig::new()
            .with_engine(EngineKind::ImageAnalysis, false)
            .with_engine(EngineKind::LinearAlgebra, false);
        let set = EngineSet::from_config(&config);
        assert_eq!(set.kinds(), vec![EngineKind::ArrayMath, EngineKind::TextEmbedding]);
        assert!(!set.contains(EngineKind::ImageAnalysis));
    }

    #[test]
    fn test_all_disabled_is_empty() {
        let mut config = LoadTestConfig::new();
        config.engines = crate::config::EngineSelection::none();
        assert!(EngineSet::from_config(&config).is_empty());
    }

    #[test]
    fn test_engine_rng_is_seeded_per_kind() {
        use rand::Rng;
        let mut a = engine_rng(Some(1), EngineKind::ArrayMath);
        let mut b = engine_rng(Some(1), EngineKind::ArrayMath);
        let mut c = engine_rng(Some(1), EngineKind::TextEmbedding);
        let first: u64 = a.gen();
        assert_eq!(first, b.gen::<u64>());
        assert_ne!(first, c.gen::<u64>());
    }
}
