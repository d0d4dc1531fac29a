//! Load test orchestrator
//!
//! Sequences warmup, the main phase plan and cooldown on the calling thread,
//! driving every enabled engine once per iteration and rendering progress at
//! the configured cadence. Cancellation is observed between iterations only.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::rngs::SmallRng;
use rand::{RngCore, SeedableRng};
use tracing::{debug, info};

use crate::bench::cancel::CancellationSignal;
use crate::bench::clock::{Clock, MonotonicClock};
use crate::bench::phase::{Phase, PhasePlan};
use crate::config::{Intensity, LoadTestConfig};
use crate::engine::EngineSet;
use crate::models::{PhaseRecord, RunSummary, Statistics};
use crate::report::Reporter;

/// Orchestrator lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Constructed, not yet started
    Idle,
    Warmup,
    Main,
    Cooldown,
    /// Summary produced
    Done,
}

/// A configured load test, ready to run
pub struct LoadTest {
    config: LoadTestConfig,
    stats: Statistics,
    engines: EngineSet,
    cancel: CancellationSignal,
    reporter: Reporter,
    rng: Box<dyn RngCore + Send>,
    clock: Arc<dyn Clock>,
    state: RunState,
    last_report: Duration,
    records: Vec<PhaseRecord>,
}

impl LoadTest {
    /// Build a test with the configured engines, a wall clock and stdout reporting.
    ///
    /// Invalid configuration values are replaced by their defaults.
    pub fn new(config: LoadTestConfig, cancel: CancellationSignal) -> Self {
        let config = config.sanitized();
        let clock: Arc<dyn Clock> = Arc::new(MonotonicClock::new());
        let rng: Box<dyn RngCore + Send> = match config.seed {
            Some(seed) => Box::new(SmallRng::seed_from_u64(seed)),
            None => Box::new(SmallRng::from_entropy()),
        };
        Self {
            engines: EngineSet::from_config(&config),
            stats: Statistics::new(Arc::clone(&clock)),
            config,
            cancel,
            reporter: Reporter::stdout(),
            rng,
            clock,
            state: RunState::Idle,
            last_report: Duration::ZERO,
            records: Vec::new(),
        }
    }

    /// Replace the engine set
    pub fn with_engines(mut self, engines: EngineSet) -> Self {
        self.engines = engines;
        self
    }

    /// Replace the time source
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.stats = Statistics::new(Arc::clone(&clock));
        self.clock = clock;
        self
    }

    /// Replace the random source used for phase planning
    pub fn with_rng<R: RngCore + Send + 'static>(mut self, rng: R) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_reporter(mut self, reporter: Reporter) -> Self {
        self.reporter = reporter;
        self
    }

    pub fn config(&self) -> &LoadTestConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn statistics(&self) -> &Statistics {
        &self.stats
    }

    /// Handle that stops this test when cancelled
    pub fn cancellation(&self) -> CancellationSignal {
        self.cancel.clone()
    }

    /// Run every stage to completion or cancellation and return the summary.
    ///
    /// Cancellation skips whatever is left of warmup and the main sequence;
    /// cooldown always runs in full.
    pub fn run(&mut self) -> RunSummary {
        let started_at = Utc::now();
        info!(
            mode = %self.config.mode,
            intensity = %self.config.intensity,
            duration = self.config.duration_seconds,
            engines = self.engines.len(),
            "starting load test"
        );

        self.records.clear();
        self.reporter.header(&self.config);
        self.stats.reset();
        let plan = PhasePlan::build(&self.config, &mut *self.rng);

        if let Some(warmup) = &plan.warmup {
            self.state = RunState::Warmup;
            self.reporter.stage_banner(warmup);
            self.run_phase(warmup, 0, true);
        }

        if !self.cancel.is_cancelled() {
            self.state = RunState::Main;
            self.reporter.main_banner(&self.config);
            for (index, phase) in plan.main.iter().enumerate() {
                if self.cancel.is_cancelled() {
                    break;
                }
                self.reporter.phase_banner(phase);
                self.run_phase(phase, index + 1, true);
            }
        }

        let cancelled = self.cancel.is_cancelled();
        if cancelled {
            info!(
                elapsed = self.stats.elapsed_seconds(),
                "cancellation observed, skipping remaining phases"
            );
        }

        if let Some(cooldown) = &plan.cooldown {
            self.state = RunState::Cooldown;
            self.reporter.stage_banner(cooldown);
            let current = self.stats.current_phase();
            self.run_phase(cooldown, current, false);
        }

        self.state = RunState::Done;
        let summary = RunSummary::collect(
            &self.stats,
            &self.config,
            started_at,
            std::mem::take(&mut self.records),
            cancelled,
        );
        self.reporter.summary(&summary, self.config.verbose);
        info!(
            total_operations = summary.total_operations,
            errors = summary.error_count,
            cancelled,
            "load test finished"
        );
        summary
    }

    /// Drive one phase until its duration elapses, or until cancellation
    /// when `cancellable`
    fn run_phase(&mut self, phase: &Phase, current_phase: usize, cancellable: bool) {
        debug!(
            phase = %phase,
            intensity = %phase.intensity,
            seconds = phase.duration_seconds,
            "entering phase"
        );
        self.stats.begin_phase(current_phase, phase.intensity);
        self.last_report = self.clock.now();

        let operations_before = self.stats.total_operations();
        let mut iterations = 0u64;
        let mut interrupted = false;

        while self.stats.phase_elapsed_seconds() < phase.duration_seconds {
            if cancellable && self.cancel.is_cancelled() {
                interrupted = true;
                break;
            }
            self.run_iteration(phase.intensity);
            iterations += 1;
            self.report_if_due();
        }

        let actual_seconds = self.stats.phase_elapsed_seconds();
        debug!(phase = %phase, iterations, actual_seconds, interrupted, "leaving phase");
        self.records.push(PhaseRecord {
            kind: phase.kind,
            number: phase.number,
            intensity: phase.intensity,
            planned_seconds: phase.duration_seconds,
            actual_seconds,
            iterations,
            operations: self.stats.total_operations() - operations_before,
            interrupted,
        });
    }

    /// One call into every enabled engine at `intensity`
    fn run_iteration(&mut self, intensity: Intensity) {
        for (kind, engine) in self.engines.iter_mut() {
            let iterations = self.config.scale.iterations(kind, intensity);
            engine.run_operations(iterations, &mut self.stats.recorder(kind));
        }
        self.stats.update_rates();
    }

    fn report_if_due(&mut self) {
        let now = self.clock.now();
        let since = now.saturating_sub(self.last_report).as_secs_f64();
        if since >= self.config.report_interval_seconds {
            self.reporter.progress(&self.stats, &self.config);
            self.last_report = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::clock::ManualClock;
    use crate::bench::phase::PhaseKind;
    use crate::config::LoadMode;
    use crate::engine::WorkloadEngine;
    use crate::models::{EngineKind, StatsRecorder};
    use crate::report::CaptureBuffer;

    /// Advances the shared clock by one second per call
    struct TickEngine {
        clock: ManualClock,
        calls: usize,
        cancel_at: Option<(usize, CancellationSignal)>,
    }

    impl WorkloadEngine for TickEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::ArrayMath
        }

        fn run_operations(&mut self, iterations: u32, stats: &mut StatsRecorder<'_>) {
            self.clock.advance(Duration::from_secs(1));
            stats.record_operations(u64::from(iterations));
            self.calls += 1;
            if let Some((at, signal)) = &self.cancel_at {
                if self.calls == *at {
                    signal.cancel();
                }
            }
        }
    }

    fn tick_test(
        config: LoadTestConfig,
        cancel_at: Option<usize>,
    ) -> (LoadTest, CaptureBuffer) {
        let clock = ManualClock::new();
        let cancel = CancellationSignal::new();
        let mut engines = EngineSet::new();
        engines.insert(Box::new(TickEngine {
            clock: clock.clone(),
            calls: 0,
            cancel_at: cancel_at.map(|at| (at, cancel.clone())),
        }));
        let (reporter, buffer) = Reporter::capture();
        let test = LoadTest::new(config.with_scale(EngineKind::ArrayMath, 1), cancel)
            .with_engines(engines)
            .with_clock(Arc::new(clock))
            .with_rng(SmallRng::seed_from_u64(3))
            .with_reporter(reporter);
        (test, buffer)
    }

    #[test]
    fn test_state_moves_from_idle_to_done() {
        let config = LoadTestConfig::new().with_duration(3.0).with_ramp(1.0, 1.0);
        let (mut test, _) = tick_test(config, None);
        assert_eq!(test.state(), RunState::Idle);
        let summary = test.run();
        assert_eq!(test.state(), RunState::Done);
        let kinds: Vec<PhaseKind> = summary.phases.iter().map(|p| p.kind).collect();
        assert_eq!(
            kinds,
            vec![PhaseKind::Warmup, PhaseKind::Sustained, PhaseKind::Cooldown]
        );
    }

    #[test]
    fn test_progress_every_report_interval() {
        let config = LoadTestConfig::new()
            .with_duration(20.0)
            .with_ramp(0.0, 0.0)
            .with_report_interval(5.0);
        let (mut test, buffer) = tick_test(config, None);
        let summary = test.run();
        assert_eq!(buffer.contents().matches("│ Ops:").count(), 4);
        assert_eq!(summary.phases[0].iterations, 20);
    }

    #[test]
    fn test_report_timer_restarts_each_phase() {
        let config = LoadTestConfig::new()
            .with_mode(LoadMode::Progressive)
            .with_phase_count(4)
            .with_duration(12.0)
            .with_ramp(0.0, 0.0)
            .with_report_interval(4.0);
        let (mut test, buffer) = tick_test(config, None);
        test.run();
        // Each 3s phase ends before a full interval passes
        assert_eq!(buffer.contents().matches("│ Ops:").count(), 0);
    }

    #[test]
    fn test_cancel_during_warmup_skips_main() {
        let config = LoadTestConfig::new()
            .with_duration(30.0)
            .with_ramp(10.0, 2.0)
            .with_intensity(Intensity::Extreme);
        let (mut test, buffer) = tick_test(config, Some(4));
        let summary = test.run();

        assert!(summary.cancelled);
        assert_eq!(summary.main_phases().count(), 0);
        assert_eq!(summary.phases.len(), 2);
        assert!(summary.phases[0].interrupted);
        assert_eq!(summary.phases[1].kind, PhaseKind::Cooldown);
        assert_eq!(summary.phases[1].iterations, 2);
        // Warmup and cooldown both run at low intensity
        assert_eq!(summary.total_operations, 6);
        assert!(!buffer.contents().contains("Main Test"));
    }

    #[test]
    fn test_no_cooldown_when_zero() {
        let config = LoadTestConfig::new().with_duration(2.0).with_ramp(0.0, 0.0);
        let (mut test, buffer) = tick_test(config, None);
        let summary = test.run();
        assert_eq!(summary.phases.len(), 1);
        let output = buffer.contents();
        assert!(!output.contains("Warmup Phase"));
        assert!(!output.contains("Cooldown Phase"));
    }
}
