//! Live run statistics
//!
//! One `Statistics` instance lives for a whole run. Engines never see it
//! directly; they receive a `StatsRecorder` bound to their own counter.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::bench::clock::Clock;
use crate::config::Intensity;

/// The four categories of synthetic work
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Image synthesis and analysis
    ImageAnalysis,
    /// Tensor activation and normalization math
    ArrayMath,
    /// Dense vector and matrix kernels
    LinearAlgebra,
    /// Word embeddings and sentiment
    TextEmbedding,
}

/// Domain sub-counters, each owned by exactly one engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Detection {
    Classification,
    Face,
    TextRegion,
    Sentiment,
}

impl EngineKind {
    pub const ALL: [EngineKind; 4] = [
        EngineKind::ImageAnalysis,
        EngineKind::ArrayMath,
        EngineKind::LinearAlgebra,
        EngineKind::TextEmbedding,
    ];

    fn index(self) -> usize {
        match self {
            EngineKind::ImageAnalysis => 0,
            EngineKind::ArrayMath => 1,
            EngineKind::LinearAlgebra => 2,
            EngineKind::TextEmbedding => 3,
        }
    }

    /// Short display name used in reports and error messages
    pub fn label(&self) -> &'static str {
        match self {
            EngineKind::ImageAnalysis => "Vision",
            EngineKind::ArrayMath => "CoreML",
            EngineKind::LinearAlgebra => "BNNS",
            EngineKind::TextEmbedding => "NLP",
        }
    }

    /// Single-letter tag for the compact progress line
    pub fn tag(&self) -> char {
        match self {
            EngineKind::ImageAnalysis => 'V',
            EngineKind::ArrayMath => 'C',
            EngineKind::LinearAlgebra => 'B',
            EngineKind::TextEmbedding => 'N',
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl Detection {
    pub const ALL: [Detection; 4] = [
        Detection::Classification,
        Detection::Face,
        Detection::TextRegion,
        Detection::Sentiment,
    ];

    fn index(self) -> usize {
        match self {
            Detection::Classification => 0,
            Detection::Face => 1,
            Detection::TextRegion => 2,
            Detection::Sentiment => 3,
        }
    }

    /// Engine allowed to increment this counter
    pub fn owner(&self) -> EngineKind {
        match self {
            Detection::Classification | Detection::Face | Detection::TextRegion => {
                EngineKind::ImageAnalysis
            }
            Detection::Sentiment => EngineKind::TextEmbedding,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Detection::Classification => "Classifications",
            Detection::Face => "Faces",
            Detection::TextRegion => "Text regions",
            Detection::Sentiment => "Sentiments",
        }
    }
}

/// Counters, timestamps and derived rates for one test run.
///
/// Mutated only from the scheduling thread, so no locking is involved.
pub struct Statistics {
    clock: Arc<dyn Clock>,
    operations: [u64; 4],
    detections: [u64; 4],
    start: Duration,
    phase_start: Duration,
    current_phase: usize,
    current_intensity: Intensity,
    errors: Vec<String>,
    peak_ops_per_second: f64,
    last_ops_per_second: f64,
}

impl Statistics {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        let now = clock.now();
        Self {
            clock,
            operations: [0; 4],
            detections: [0; 4],
            start: now,
            phase_start: now,
            current_phase: 0,
            current_intensity: Intensity::Medium,
            errors: Vec::new(),
            peak_ops_per_second: 0.0,
            last_ops_per_second: 0.0,
        }
    }

    /// Zero every counter and restamp both start times
    pub fn reset(&mut self) {
        let now = self.clock.now();
        self.operations = [0; 4];
        self.detections = [0; 4];
        self.errors.clear();
        self.peak_ops_per_second = 0.0;
        self.last_ops_per_second = 0.0;
        self.start = now;
        self.phase_start = now;
        self.current_phase = 0;
    }

    /// Mark the start of a phase
    pub fn begin_phase(&mut self, phase: usize, intensity: Intensity) {
        self.phase_start = self.clock.now();
        self.current_phase = phase;
        self.current_intensity = intensity;
    }

    pub fn elapsed_seconds(&self) -> f64 {
        self.clock.now().saturating_sub(self.start).as_secs_f64()
    }

    pub fn phase_elapsed_seconds(&self) -> f64 {
        self.clock.now().saturating_sub(self.phase_start).as_secs_f64()
    }

    /// Average rate since start, 0 before any time has elapsed
    pub fn operations_per_second(&self) -> f64 {
        let elapsed = self.elapsed_seconds();
        if elapsed <= 0.0 {
            0.0
        } else {
            self.total_operations() as f64 / elapsed
        }
    }

    /// Recompute the current rate and the running peak
    pub fn update_rates(&mut self) -> f64 {
        let rate = self.operations_per_second();
        if rate > self.peak_ops_per_second {
            self.peak_ops_per_second = rate;
        }
        self.last_ops_per_second = rate;
        rate
    }

    /// Sum of the per-engine counters
    pub fn total_operations(&self) -> u64 {
        self.operations.iter().sum()
    }

    pub fn operations(&self, kind: EngineKind) -> u64 {
        self.operations[kind.index()]
    }

    pub fn detections(&self, detection: Detection) -> u64 {
        self.detections[detection.index()]
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn current_phase(&self) -> usize {
        self.current_phase
    }

    pub fn current_intensity(&self) -> Intensity {
        self.current_intensity
    }

    pub fn peak_ops_per_second(&self) -> f64 {
        self.peak_ops_per_second
    }

    pub fn last_ops_per_second(&self) -> f64 {
        self.last_ops_per_second
    }

    /// Counter handle for one engine
    pub fn recorder(&mut self, kind: EngineKind) -> StatsRecorder<'_> {
        StatsRecorder { stats: self, kind }
    }
}

impl fmt::Debug for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Statistics")
            .field("operations", &self.operations)
            .field("detections", &self.detections)
            .field("current_phase", &self.current_phase)
            .field("current_intensity", &self.current_intensity)
            .field("errors", &self.errors.len())
            .field("peak_ops_per_second", &self.peak_ops_per_second)
            .finish()
    }
}

/// Write-only view of `Statistics` handed to a single engine.
///
/// Can only grow that engine's counter, the detections it owns, and the
/// shared error log.
pub struct StatsRecorder<'a> {
    stats: &'a mut Statistics,
    kind: EngineKind,
}

impl StatsRecorder<'_> {
    pub fn kind(&self) -> EngineKind {
        self.kind
    }

    /// Count completed units of work
    pub fn record_operations(&mut self, count: u64) {
        self.stats.operations[self.kind.index()] += count;
    }

    /// Count detections found by completed work.
    ///
    /// Detections owned by another engine are ignored.
    pub fn record_detections(&mut self, detection: Detection, count: u64) {
        if detection.owner() != self.kind {
            debug!(engine = %self.kind, ?detection, "detection not owned by engine, ignored");
            return;
        }
        self.stats.detections[detection.index()] += count;
    }

    /// Append a non-fatal error to the run's error log
    pub fn record_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        debug!(engine = %self.kind, error = %message, "engine error");
        self.stats.errors.push(message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::clock::ManualClock;

    fn stats_with_clock() -> (Statistics, ManualClock) {
        let clock = ManualClock::new();
        let stats = Statistics::new(Arc::new(clock.clone()));
        (stats, clock)
    }

    #[test]
    fn test_reset_zeroes_everything() {
        let (mut stats, clock) = stats_with_clock();
        stats.recorder(EngineKind::ArrayMath).record_operations(12);
        stats.recorder(EngineKind::TextEmbedding).record_error("boom");
        clock.advance(Duration::from_secs(3));
        stats.update_rates();

        stats.reset();
        assert_eq!(stats.total_operations(), 0);
        assert_eq!(stats.operations_per_second(), 0.0);
        assert_eq!(stats.elapsed_seconds(), 0.0);
        assert!(stats.errors().is_empty());
        assert_eq!(stats.peak_ops_per_second(), 0.0);
    }

    #[test]
    fn test_total_is_sum_of_engines() {
        let (mut stats, _clock) = stats_with_clock();
        stats.recorder(EngineKind::ImageAnalysis).record_operations(5);
        stats.recorder(EngineKind::ArrayMath).record_operations(15);
        stats.recorder(EngineKind::LinearAlgebra).record_operations(30);
        stats.recorder(EngineKind::TextEmbedding).record_operations(6);

        let sum: u64 = EngineKind::ALL.iter().map(|k| stats.operations(*k)).sum();
        assert_eq!(stats.total_operations(), sum);
        assert_eq!(stats.total_operations(), 56);
    }

    #[test]
    fn test_recorder_touches_only_own_counter() {
        let (mut stats, _clock) = stats_with_clock();
        {
            let mut recorder = stats.recorder(EngineKind::ImageAnalysis);
            recorder.record_operations(5);
            recorder.record_detections(Detection::Face, 2);
        }
        assert_eq!(stats.operations(EngineKind::ImageAnalysis), 5);
        assert_eq!(stats.operations(EngineKind::ArrayMath), 0);
        assert_eq!(stats.detections(Detection::Face), 2);
        assert_eq!(stats.detections(Detection::Sentiment), 0);
    }

    #[test]
    fn test_rates_and_peak() {
        let (mut stats, clock) = stats_with_clock();
        stats.reset();

        stats.recorder(EngineKind::ArrayMath).record_operations(100);
        clock.advance(Duration::from_secs(1));
        assert_eq!(stats.update_rates(), 100.0);

        clock.advance(Duration::from_secs(1));
        assert_eq!(stats.update_rates(), 50.0);
        assert_eq!(stats.last_ops_per_second(), 50.0);
        assert_eq!(stats.peak_ops_per_second(), 100.0);
    }

    #[test]
    fn test_phase_elapsed_restarts() {
        let (mut stats, clock) = stats_with_clock();
        stats.reset();
        clock.advance(Duration::from_secs(4));
        stats.begin_phase(2, Intensity::High);
        clock.advance(Duration::from_secs(1));

        assert_eq!(stats.elapsed_seconds(), 5.0);
        assert_eq!(stats.phase_elapsed_seconds(), 1.0);
        assert_eq!(stats.current_phase(), 2);
        assert_eq!(stats.current_intensity(), Intensity::High);
    }

    #[test]
    fn test_detection_owners() {
        assert_eq!(Detection::Classification.owner(), EngineKind::ImageAnalysis);
        assert_eq!(Detection::Sentiment.owner(), EngineKind::TextEmbedding);
    }
}
