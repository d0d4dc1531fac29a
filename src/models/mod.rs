//! Data models module
//!
//! Contains the live statistics aggregator shared with workload engines
//! and the serializable end-of-run summary.

pub mod stats;
pub mod summary;

// Re-export commonly used types
pub use stats::{Detection, EngineKind, Statistics, StatsRecorder};
pub use summary::{PhaseRecord, RunSummary};
