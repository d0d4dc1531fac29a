//! End-of-run summary
//!
//! A serializable snapshot of the statistics taken once the run reaches
//! `Done`, plus a record of every phase that was entered.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::bench::phase::PhaseKind;
use crate::config::{Intensity, LoadMode, LoadTestConfig};
use crate::models::stats::{Detection, EngineKind, Statistics};
use crate::{Result, MAX_ERROR_SAMPLES};

/// What happened during one entered phase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhaseRecord {
    pub kind: PhaseKind,
    /// 1-based position within its stage
    pub number: usize,
    pub intensity: Intensity,
    pub planned_seconds: f64,
    pub actual_seconds: f64,
    /// Scheduler iterations completed
    pub iterations: u64,
    /// Operations all engines completed during the phase
    pub operations: u64,
    /// Left early because cancellation was observed
    pub interrupted: bool,
}

/// Complete load test result
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub mode: LoadMode,
    pub intensity: Intensity,
    pub elapsed_seconds: f64,
    pub total_operations: u64,
    pub operations: BTreeMap<EngineKind, u64>,
    pub detections: BTreeMap<Detection, u64>,
    pub average_ops_per_second: f64,
    pub peak_ops_per_second: f64,
    pub error_count: usize,
    /// First errors logged, at most `MAX_ERROR_SAMPLES`
    pub error_samples: Vec<String>,
    /// The run was stopped by the cancellation signal
    pub cancelled: bool,
    pub phases: Vec<PhaseRecord>,
}

impl RunSummary {
    /// Snapshot the statistics at the end of a run
    pub fn collect(
        stats: &Statistics,
        config: &LoadTestConfig,
        started_at: DateTime<Utc>,
        phases: Vec<PhaseRecord>,
        cancelled: bool,
    ) -> Self {
        let operations = EngineKind::ALL
            .into_iter()
            .map(|kind| (kind, stats.operations(kind)))
            .collect();
        let detections = Detection::ALL
            .into_iter()
            .map(|detection| (detection, stats.detections(detection)))
            .collect();

        Self {
            started_at,
            finished_at: Utc::now(),
            mode: config.mode,
            intensity: config.intensity,
            elapsed_seconds: stats.elapsed_seconds(),
            total_operations: stats.total_operations(),
            operations,
            detections,
            average_ops_per_second: stats.operations_per_second(),
            peak_ops_per_second: stats.peak_ops_per_second(),
            error_count: stats.errors().len(),
            error_samples: stats.errors().iter().take(MAX_ERROR_SAMPLES).cloned().collect(),
            cancelled,
            phases,
        }
    }

    /// Operations completed by one engine
    pub fn operations_for(&self, kind: EngineKind) -> u64 {
        self.operations.get(&kind).copied().unwrap_or(0)
    }

    /// Phases belonging to the main sequence
    pub fn main_phases(&self) -> impl Iterator<Item = &PhaseRecord> {
        self.phases.iter().filter(|p| p.kind.is_main())
    }

    /// Render as pretty JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
