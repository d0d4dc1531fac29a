//! Phase planning
//!
//! Turns a configuration into the ordered list of phases the scheduler
//! runs: optional warmup, the mode-specific main sequence, optional cooldown.

use std::fmt;

use rand::seq::SliceRandom;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::config::{Intensity, LoadMode, LoadTestConfig, MAX_DURATION_SECONDS};

/// Burst length in burst mode
pub const BURST_SECONDS: f64 = 15.0;
/// Rest length between bursts
pub const REST_SECONDS: f64 = 5.0;
/// Target segment length in random mode
pub const RANDOM_SEGMENT_SECONDS: f64 = 20.0;
/// Intensity order for cyclic mode
pub const CYCLE: [Intensity; 6] = [
    Intensity::Low,
    Intensity::Medium,
    Intensity::High,
    Intensity::Extreme,
    Intensity::High,
    Intensity::Medium,
];
/// Progressive mode steps; later phases stay at the last entry
pub const PROGRESSION: [Intensity; 4] = Intensity::ALL;

/// Top-level run stages, entered once each in this order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Warmup,
    Main,
    Cooldown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PhaseKind {
    Warmup,
    Sustained,
    Burst,
    Rest,
    Cycle,
    Step,
    Segment,
    Cooldown,
}

impl PhaseKind {
    pub fn stage(&self) -> Stage {
        match self {
            PhaseKind::Warmup => Stage::Warmup,
            PhaseKind::Cooldown => Stage::Cooldown,
            _ => Stage::Main,
        }
    }

    pub fn is_main(&self) -> bool {
        self.stage() == Stage::Main
    }

    /// Name of the `number`-th phase of this kind, e.g. "Burst 2"
    pub fn display_name(&self, number: usize) -> String {
        match self {
            PhaseKind::Warmup => "Warmup".to_string(),
            PhaseKind::Cooldown => "Cooldown".to_string(),
            PhaseKind::Sustained => "Sustained".to_string(),
            PhaseKind::Burst => format!("Burst {}", number),
            PhaseKind::Rest => format!("Rest {}", number),
            PhaseKind::Cycle => format!("Cycle {}", number),
            PhaseKind::Step => format!("Phase {}", number),
            PhaseKind::Segment => format!("Segment {}", number),
        }
    }
}

/// A time window with one constant intensity
#[derive(Debug, Clone, PartialEq)]
pub struct Phase {
    pub kind: PhaseKind,
    /// 1-based position among phases of the same kind
    pub number: usize,
    /// Count of phases of the same kind in the plan
    pub of: usize,
    pub duration_seconds: f64,
    pub intensity: Intensity,
}

impl Phase {
    fn new(kind: PhaseKind, number: usize, of: usize, duration_seconds: f64, intensity: Intensity) -> Self {
        Self {
            kind,
            number,
            of,
            duration_seconds,
            intensity,
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind.display_name(self.number))
    }
}

/// Every phase of a run, in execution order
#[derive(Debug, Clone, PartialEq)]
pub struct PhasePlan {
    pub warmup: Option<Phase>,
    pub main: Vec<Phase>,
    pub cooldown: Option<Phase>,
}

impl PhasePlan {
    /// Plan a run. `rng` is only consulted by random mode.
    pub fn build(config: &LoadTestConfig, rng: &mut dyn RngCore) -> Self {
        Self {
            warmup: ramp_phase(PhaseKind::Warmup, config.warmup_seconds),
            main: main_phases(config, rng),
            cooldown: ramp_phase(PhaseKind::Cooldown, config.cooldown_seconds),
        }
    }

    /// Planned seconds across all stages
    pub fn total_seconds(&self) -> f64 {
        self.phases().map(|p| p.duration_seconds).sum()
    }

    pub fn phases(&self) -> impl Iterator<Item = &Phase> {
        self.warmup
            .iter()
            .chain(self.main.iter())
            .chain(self.cooldown.iter())
    }
}

/// Warmup and cooldown run at low intensity; zero length skips them
fn ramp_phase(kind: PhaseKind, seconds: f64) -> Option<Phase> {
    (seconds > 0.0).then(|| Phase::new(kind, 1, 1, seconds, Intensity::Low))
}

/// Main sequence for the configured mode
pub fn main_phases(config: &LoadTestConfig, rng: &mut dyn RngCore) -> Vec<Phase> {
    // Unbounded durations would never finish planning
    let duration = if config.duration_seconds.is_finite() {
        config.duration_seconds.clamp(0.0, MAX_DURATION_SECONDS)
    } else {
        0.0
    };
    match config.mode {
        LoadMode::Sustained => vec![Phase::new(
            PhaseKind::Sustained,
            1,
            1,
            duration,
            config.intensity,
        )],
        LoadMode::Burst => burst_phases(duration),
        LoadMode::Cyclic => cyclic_phases(duration),
        LoadMode::Progressive => progressive_phases(duration, config.phase_count),
        LoadMode::Random => random_phases(duration, rng),
    }
}

fn burst_phases(duration: f64) -> Vec<Phase> {
    let mut phases = Vec::new();
    let mut elapsed = 0.0;
    let mut bursts = 0;

    while elapsed < duration {
        bursts += 1;
        phases.push(Phase::new(
            PhaseKind::Burst,
            bursts,
            0,
            BURST_SECONDS.min(duration - elapsed),
            Intensity::Extreme,
        ));
        elapsed += BURST_SECONDS;

        if elapsed < duration {
            phases.push(Phase::new(
                PhaseKind::Rest,
                bursts,
                0,
                REST_SECONDS.min(duration - elapsed),
                Intensity::Low,
            ));
            elapsed += REST_SECONDS;
        }
    }

    let rests = phases.len() - bursts;
    for phase in &mut phases {
        phase.of = match phase.kind {
            PhaseKind::Burst => bursts,
            _ => rests,
        };
    }
    phases
}

fn cyclic_phases(duration: f64) -> Vec<Phase> {
    let each = duration / CYCLE.len() as f64;
    CYCLE
        .iter()
        .enumerate()
        .map(|(i, intensity)| Phase::new(PhaseKind::Cycle, i + 1, CYCLE.len(), each, *intensity))
        .collect()
}

fn progressive_phases(duration: f64, phase_count: u32) -> Vec<Phase> {
    let count = phase_count.max(1) as usize;
    let each = duration / count as f64;
    (0..count)
        .map(|i| {
            let intensity = PROGRESSION[i.min(PROGRESSION.len() - 1)];
            Phase::new(PhaseKind::Step, i + 1, count, each, intensity)
        })
        .collect()
}

fn random_phases(duration: f64, rng: &mut dyn RngCore) -> Vec<Phase> {
    let count = ((duration / RANDOM_SEGMENT_SECONDS).floor() as usize).max(1);
    let each = duration / count as f64;
    (0..count)
        .map(|i| {
            let intensity = Intensity::ALL
                .choose(rng)
                .copied()
                .unwrap_or(Intensity::Medium);
            Phase::new(PhaseKind::Segment, i + 1, count, each, intensity)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::SmallRng;
    use rand::SeedableRng;

    fn plan(config: &LoadTestConfig) -> PhasePlan {
        let mut rng = SmallRng::seed_from_u64(7);
        PhasePlan::build(config, &mut rng)
    }

    fn shape(phases: &[Phase]) -> Vec<(PhaseKind, f64, Intensity)> {
        phases
            .iter()
            .map(|p| (p.kind, p.duration_seconds, p.intensity))
            .collect()
    }

    #[test]
    fn test_sustained_single_phase() {
        let config = LoadTestConfig::new()
            .with_duration(120.0)
            .with_intensity(Intensity::High);
        let plan = plan(&config);
        assert_eq!(
            shape(&plan.main),
            vec![(PhaseKind::Sustained, 120.0, Intensity::High)]
        );
    }

    #[test]
    fn test_burst_forty_seconds() {
        let config = LoadTestConfig::new()
            .with_mode(LoadMode::Burst)
            .with_duration(40.0);
        let plan = plan(&config);
        assert_eq!(
            shape(&plan.main),
            vec![
                (PhaseKind::Burst, 15.0, Intensity::Extreme),
                (PhaseKind::Rest, 5.0, Intensity::Low),
                (PhaseKind::Burst, 15.0, Intensity::Extreme),
                (PhaseKind::Rest, 5.0, Intensity::Low),
            ]
        );
        let total: f64 = plan.main.iter().map(|p| p.duration_seconds).sum();
        assert_eq!(total, 40.0);
        assert_eq!(plan.main[2].to_string(), "Burst 2");
        assert_eq!(plan.main[0].of, 2);
    }

    #[test]
    fn test_burst_truncates_last_segment() {
        let config = LoadTestConfig::new().with_mode(LoadMode::Burst);

        let plan45 = plan(&config.clone().with_duration(45.0));
        assert_eq!(plan45.main.len(), 5);
        assert_eq!(plan45.main[4].kind, PhaseKind::Burst);
        assert_eq!(plan45.main[4].duration_seconds, 5.0);

        let plan33 = plan(&config.clone().with_duration(33.0));
        assert_eq!(
            shape(&plan33.main),
            vec![
                (PhaseKind::Burst, 15.0, Intensity::Extreme),
                (PhaseKind::Rest, 5.0, Intensity::Low),
                (PhaseKind::Burst, 13.0, Intensity::Extreme),
            ]
        );

        let plan17 = plan(&config.with_duration(17.0));
        assert_eq!(plan17.main[1].duration_seconds, 2.0);
        for phase in plan33.main.iter().chain(plan17.main.iter()) {
            assert!(phase.duration_seconds <= BURST_SECONDS);
        }
    }

    #[test]
    fn test_burst_zero_duration_has_no_phases() {
        let config = LoadTestConfig::new()
            .with_mode(LoadMode::Burst)
            .with_duration(0.0);
        assert!(plan(&config).main.is_empty());
    }

    #[test]
    fn test_unbounded_duration_plans_finitely() {
        let burst = LoadTestConfig::new()
            .with_mode(LoadMode::Burst)
            .with_duration(f64::INFINITY);
        assert!(plan(&burst).main.is_empty());

        let random = LoadTestConfig::new()
            .with_mode(LoadMode::Random)
            .with_duration(1e12);
        let segments = plan(&random).main;
        assert_eq!(segments.len(), (MAX_DURATION_SECONDS / 20.0) as usize);
        assert_eq!(segments[0].duration_seconds, 20.0);
    }

    #[test]
    fn test_cyclic_six_phases() {
        for duration in [0.0, 6.0, 60.0, 301.5] {
            let config = LoadTestConfig::new()
                .with_mode(LoadMode::Cyclic)
                .with_duration(duration);
            let plan = plan(&config);
            assert_eq!(plan.main.len(), 6);
            let intensities: Vec<Intensity> = plan.main.iter().map(|p| p.intensity).collect();
            assert_eq!(intensities, CYCLE.to_vec());
            for phase in &plan.main {
                assert_eq!(phase.duration_seconds, duration / 6.0);
            }
        }
    }

    #[test]
    fn test_progressive_four_phases() {
        let config = LoadTestConfig::new()
            .with_mode(LoadMode::Progressive)
            .with_duration(40.0)
            .with_phase_count(4);
        let plan = plan(&config);
        assert_eq!(
            shape(&plan.main),
            vec![
                (PhaseKind::Step, 10.0, Intensity::Low),
                (PhaseKind::Step, 10.0, Intensity::Medium),
                (PhaseKind::Step, 10.0, Intensity::High),
                (PhaseKind::Step, 10.0, Intensity::Extreme),
            ]
        );
    }

    #[test]
    fn test_progressive_clamps_after_four() {
        let config = LoadTestConfig::new()
            .with_mode(LoadMode::Progressive)
            .with_duration(60.0)
            .with_phase_count(6);
        let plan = plan(&config);
        assert_eq!(plan.main.len(), 6);
        assert_eq!(plan.main[4].intensity, Intensity::Extreme);
        assert_eq!(plan.main[5].intensity, Intensity::Extreme);
        assert_eq!(plan.main[5].to_string(), "Phase 6");
    }

    #[test]
    fn test_random_segment_count() {
        let config = LoadTestConfig::new().with_mode(LoadMode::Random);

        let plan100 = plan(&config.clone().with_duration(100.0));
        assert_eq!(plan100.main.len(), 5);
        assert!(plan100.main.iter().all(|p| p.duration_seconds == 20.0));

        let plan10 = plan(&config.clone().with_duration(10.0));
        assert_eq!(plan10.main.len(), 1);
        assert_eq!(plan10.main[0].duration_seconds, 10.0);

        let plan59 = plan(&config.with_duration(59.0));
        assert_eq!(plan59.main.len(), 2);
        assert_eq!(plan59.main[0].duration_seconds, 29.5);
    }

    #[test]
    fn test_random_is_deterministic_per_seed() {
        let config = LoadTestConfig::new()
            .with_mode(LoadMode::Random)
            .with_duration(2000.0);
        let first = plan(&config);
        let second = plan(&config);
        assert_eq!(first, second);

        for level in Intensity::ALL {
            assert!(first.main.iter().any(|p| p.intensity == level));
        }
    }

    #[test]
    fn test_zero_ramps_are_skipped() {
        let config = LoadTestConfig::new().with_duration(30.0).with_ramp(0.0, 0.0);
        let plan = plan(&config);
        assert!(plan.warmup.is_none());
        assert!(plan.cooldown.is_none());
        assert_eq!(plan.phases().count(), 1);
    }

    #[test]
    fn test_ramps_run_low() {
        let config = LoadTestConfig::new()
            .with_duration(30.0)
            .with_intensity(Intensity::Extreme)
            .with_ramp(10.0, 5.0);
        let plan = plan(&config);
        let warmup = plan.warmup.as_ref().unwrap();
        let cooldown = plan.cooldown.as_ref().unwrap();
        assert_eq!(warmup.intensity, Intensity::Low);
        assert_eq!(cooldown.intensity, Intensity::Low);
        assert_eq!(warmup.kind.stage(), Stage::Warmup);
        assert_eq!(plan.total_seconds(), 45.0);
    }
}
