//! Configuration management module
//!
//! Holds the immutable test parameters: durations, intensity, temporal mode,
//! engine selection and per-engine iteration scale. Invalid values are
//! coerced back to defaults rather than rejected.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::models::EngineKind;
use crate::{LoadError, Result};

/// Longest accepted main-phase duration (7 days).
pub const MAX_DURATION_SECONDS: f64 = 7.0 * 24.0 * 3600.0;
/// Upper bound for progressive phase count.
pub const MAX_PHASE_COUNT: u32 = 1000;

/// Load test configuration structure containing all test parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadTestConfig {
    /// Main-phase length in seconds
    pub duration_seconds: f64,
    /// Configured load level (used by sustained mode and echoed in reports)
    pub intensity: Intensity,
    /// Temporal shaping of the main phase
    pub mode: LoadMode,
    /// Warmup length in seconds, 0 skips warmup
    pub warmup_seconds: f64,
    /// Cooldown length in seconds, 0 skips cooldown
    pub cooldown_seconds: f64,
    /// Seconds between progress lines
    pub report_interval_seconds: f64,
    /// Number of phases in progressive mode
    pub phase_count: u32,
    /// Print detection counters and error samples
    pub verbose: bool,
    /// Seed for random mode and engine input synthesis
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Which workload engines run
    pub engines: EngineSelection,
    /// Per-engine iterations per unit of intensity multiplier
    pub scale: EngineScale,
}

/// Discrete load level multiplying per-iteration work volume
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Intensity {
    Low,
    Medium,
    High,
    Extreme,
}

/// Temporal shaping algorithm for the main test duration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadMode {
    /// One phase at the configured intensity
    Sustained,
    /// 15s extreme bursts separated by 5s low rests
    Burst,
    /// Low, medium, high, extreme, high, medium
    Cyclic,
    /// Equal phases stepping up from low to extreme
    Progressive,
    /// Equal 20s segments at uniformly drawn intensities
    Random,
}

/// Enable flags for the four workload engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineSelection {
    pub vision: bool,
    pub coreml: bool,
    pub bnns: bool,
    pub nlp: bool,
}

/// Iterations each engine runs per unit of intensity multiplier.
///
/// Relative per-call cost tuning; only proportionality to the multiplier matters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineScale {
    pub vision: u32,
    pub coreml: u32,
    pub bnns: u32,
    pub nlp: u32,
}

/// Ready-made configurations, including the single-engine probes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Preset {
    /// Long-running test with every engine
    Full,
    /// Array math only, 30s sustained
    CoreMl,
    /// Image analysis only, 30s sustained
    Vision,
    /// Linear algebra only, 30s sustained
    Bnns,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            duration_seconds: 300.0, // 5 minutes
            intensity: Intensity::Medium,
            mode: LoadMode::Sustained,
            warmup_seconds: 10.0,
            cooldown_seconds: 5.0,
            report_interval_seconds: 5.0,
            phase_count: 5,
            verbose: false,
            seed: None,
            engines: EngineSelection::default(),
            scale: EngineScale::default(),
        }
    }
}

impl Default for EngineSelection {
    fn default() -> Self {
        Self::all()
    }
}

impl Default for EngineScale {
    fn default() -> Self {
        Self {
            vision: 1,
            coreml: 5,
            bnns: 10,
            nlp: 2,
        }
    }
}

impl LoadTestConfig {
    /// Create a new load test configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-engine sustained probe with no warmup or cooldown
    fn probe(kind: EngineKind) -> Self {
        Self {
            duration_seconds: 30.0,
            warmup_seconds: 0.0,
            cooldown_seconds: 0.0,
            engines: EngineSelection::only(kind),
            ..Self::default()
        }
    }

    /// Build the configuration for a preset
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Full => Self::default(),
            Preset::CoreMl => Self::probe(EngineKind::ArrayMath),
            Preset::Vision => Self::probe(EngineKind::ImageAnalysis),
            Preset::Bnns => Self::probe(EngineKind::LinearAlgebra),
        }
    }

    /// Validate the configuration parameters
    pub fn validate(&self) -> Result<()> {
        check_seconds("duration", self.duration_seconds)?;
        if self.duration_seconds > MAX_DURATION_SECONDS {
            return Err(LoadError::ConfigError(format!(
                "Duration too long: {}s (max: {}s)",
                self.duration_seconds, MAX_DURATION_SECONDS
            )));
        }
        check_seconds("warmup", self.warmup_seconds)?;
        check_seconds("cooldown", self.cooldown_seconds)?;

        if !self.report_interval_seconds.is_finite() || self.report_interval_seconds <= 0.0 {
            return Err(LoadError::ConfigError(format!(
                "Report interval must be greater than 0, got {}",
                self.report_interval_seconds
            )));
        }

        if self.phase_count == 0 || self.phase_count > MAX_PHASE_COUNT {
            return Err(LoadError::ConfigError(format!(
                "Phase count must be between 1 and {}, got {}",
                MAX_PHASE_COUNT, self.phase_count
            )));
        }

        for kind in EngineKind::ALL {
            if self.scale.for_kind(kind) == 0 {
                return Err(LoadError::ConfigError(format!(
                    "{} iteration scale must be at least 1",
                    kind.label()
                )));
            }
        }

        Ok(())
    }

    /// Replace every invalid field with its default value
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();

        if check_seconds("duration", self.duration_seconds).is_err()
            || self.duration_seconds > MAX_DURATION_SECONDS
        {
            warn!(value = self.duration_seconds, "invalid duration, using default");
            self.duration_seconds = defaults.duration_seconds;
        }
        if check_seconds("warmup", self.warmup_seconds).is_err() {
            warn!(value = self.warmup_seconds, "invalid warmup, using default");
            self.warmup_seconds = defaults.warmup_seconds;
        }
        if check_seconds("cooldown", self.cooldown_seconds).is_err() {
            warn!(value = self.cooldown_seconds, "invalid cooldown, using default");
            self.cooldown_seconds = defaults.cooldown_seconds;
        }
        if !self.report_interval_seconds.is_finite() || self.report_interval_seconds <= 0.0 {
            warn!(value = self.report_interval_seconds, "invalid report interval, using default");
            self.report_interval_seconds = defaults.report_interval_seconds;
        }
        if self.phase_count == 0 || self.phase_count > MAX_PHASE_COUNT {
            warn!(value = self.phase_count, "invalid phase count, using default");
            self.phase_count = defaults.phase_count;
        }
        for kind in EngineKind::ALL {
            if self.scale.for_kind(kind) == 0 {
                warn!(engine = kind.label(), "zero iteration scale, using default");
                self.scale.set(kind, defaults.scale.for_kind(kind));
            }
        }

        self
    }

    /// Warmup, main and cooldown durations added together
    pub fn total_planned_seconds(&self) -> f64 {
        self.warmup_seconds + self.duration_seconds + self.cooldown_seconds
    }

    /// Render the configuration as TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Set the main-phase duration
    pub fn with_duration(mut self, seconds: f64) -> Self {
        self.duration_seconds = seconds;
        self
    }

    /// Set the intensity
    pub fn with_intensity(mut self, intensity: Intensity) -> Self {
        self.intensity = intensity;
        self
    }

    /// Set the load mode
    pub fn with_mode(mut self, mode: LoadMode) -> Self {
        self.mode = mode;
        self
    }

    /// Set warmup and cooldown durations
    pub fn with_ramp(mut self, warmup_seconds: f64, cooldown_seconds: f64) -> Self {
        self.warmup_seconds = warmup_seconds;
        self.cooldown_seconds = cooldown_seconds;
        self
    }

    /// Set the progress report interval
    pub fn with_report_interval(mut self, seconds: f64) -> Self {
        self.report_interval_seconds = seconds;
        self
    }

    /// Set the progressive phase count
    pub fn with_phase_count(mut self, count: u32) -> Self {
        self.phase_count = count;
        self
    }

    /// Enable or disable one engine
    pub fn with_engine(mut self, kind: EngineKind, enabled: bool) -> Self {
        self.engines.set(kind, enabled);
        self
    }

    /// Set one engine's iteration scale
    pub fn with_scale(mut self, kind: EngineKind, scale: u32) -> Self {
        self.scale.set(kind, scale);
        self
    }

    /// Set the random seed
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set verbose reporting
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }
}

fn check_seconds(name: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(LoadError::ConfigError(format!(
            "{} must be a finite number of seconds >= 0, got {}",
            name, value
        )));
    }
    Ok(())
}

impl Intensity {
    /// All levels from lightest to heaviest
    pub const ALL: [Intensity; 4] = [
        Intensity::Low,
        Intensity::Medium,
        Intensity::High,
        Intensity::Extreme,
    ];

    /// Work volume multiplier applied to every engine's iteration scale
    pub fn multiplier(&self) -> u32 {
        match self {
            Intensity::Low => 1,
            Intensity::Medium => 3,
            Intensity::High => 8,
            Intensity::Extreme => 15,
        }
    }

    /// Lowercase name as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            Intensity::Low => "low",
            Intensity::Medium => "medium",
            Intensity::High => "high",
            Intensity::Extreme => "extreme",
        }
    }

    /// Capitalized name for banners
    pub fn title(&self) -> &'static str {
        match self {
            Intensity::Low => "Low",
            Intensity::Medium => "Medium",
            Intensity::High => "High",
            Intensity::Extreme => "Extreme",
        }
    }

    /// Get a human-readable description of the level
    pub fn description(&self) -> &'static str {
        match self {
            Intensity::Low => "Low (light accelerator usage)",
            Intensity::Medium => "Medium (moderate accelerator usage)",
            Intensity::High => "High (heavy accelerator usage)",
            Intensity::Extreme => "Extreme (maximum accelerator stress)",
        }
    }
}

impl fmt::Display for Intensity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Intensity {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "low" => Ok(Intensity::Low),
            "medium" => Ok(Intensity::Medium),
            "high" => Ok(Intensity::High),
            "extreme" => Ok(Intensity::Extreme),
            _ => Err(LoadError::ConfigError(format!("Unknown intensity: {}", s))),
        }
    }
}

impl LoadMode {
    /// Lowercase name as accepted on the command line
    pub fn name(&self) -> &'static str {
        match self {
            LoadMode::Sustained => "sustained",
            LoadMode::Burst => "burst",
            LoadMode::Cyclic => "cyclic",
            LoadMode::Progressive => "progressive",
            LoadMode::Random => "random",
        }
    }

    /// Get a human-readable description of the mode
    pub fn description(&self) -> &'static str {
        match self {
            LoadMode::Sustained => "Sustained constant load",
            LoadMode::Burst => "High-intensity bursts with rest",
            LoadMode::Cyclic => "Cycling through intensity levels",
            LoadMode::Progressive => "Gradually increasing load",
            LoadMode::Random => "Random load variations",
        }
    }
}

impl fmt::Display for LoadMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for LoadMode {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sustained" => Ok(LoadMode::Sustained),
            "burst" => Ok(LoadMode::Burst),
            "cyclic" => Ok(LoadMode::Cyclic),
            "progressive" => Ok(LoadMode::Progressive),
            "random" => Ok(LoadMode::Random),
            _ => Err(LoadError::ConfigError(format!("Unknown mode: {}", s))),
        }
    }
}

impl FromStr for Preset {
    type Err = LoadError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "full" => Ok(Preset::Full),
            "coreml" => Ok(Preset::CoreMl),
            "vision" => Ok(Preset::Vision),
            "bnns" => Ok(Preset::Bnns),
            _ => Err(LoadError::ConfigError(format!("Unknown preset: {}", s))),
        }
    }
}

impl EngineSelection {
    /// Every engine enabled
    pub fn all() -> Self {
        Self {
            vision: true,
            coreml: true,
            bnns: true,
            nlp: true,
        }
    }

    /// Every engine disabled
    pub fn none() -> Self {
        Self {
            vision: false,
            coreml: false,
            bnns: false,
            nlp: false,
        }
    }

    /// Only the given engine enabled
    pub fn only(kind: EngineKind) -> Self {
        let mut selection = Self::none();
        selection.set(kind, true);
        selection
    }

    pub fn is_enabled(&self, kind: EngineKind) -> bool {
        match kind {
            EngineKind::ImageAnalysis => self.vision,
            EngineKind::ArrayMath => self.coreml,
            EngineKind::LinearAlgebra => self.bnns,
            EngineKind::TextEmbedding => self.nlp,
        }
    }

    pub fn set(&mut self, kind: EngineKind, enabled: bool) {
        match kind {
            EngineKind::ImageAnalysis => self.vision = enabled,
            EngineKind::ArrayMath => self.coreml = enabled,
            EngineKind::LinearAlgebra => self.bnns = enabled,
            EngineKind::TextEmbedding => self.nlp = enabled,
        }
    }

    /// Enabled engines in canonical order
    pub fn enabled_kinds(&self) -> Vec<EngineKind> {
        EngineKind::ALL
            .into_iter()
            .filter(|kind| self.is_enabled(*kind))
            .collect()
    }
}

impl EngineScale {
    pub fn for_kind(&self, kind: EngineKind) -> u32 {
        match kind {
            EngineKind::ImageAnalysis => self.vision,
            EngineKind::ArrayMath => self.coreml,
            EngineKind::LinearAlgebra => self.bnns,
            EngineKind::TextEmbedding => self.nlp,
        }
    }

    pub fn set(&mut self, kind: EngineKind, scale: u32) {
        match kind {
            EngineKind::ImageAnalysis => self.vision = scale,
            EngineKind::ArrayMath => self.coreml = scale,
            EngineKind::LinearAlgebra => self.bnns = scale,
            EngineKind::TextEmbedding => self.nlp = scale,
        }
    }

    /// Iterations an engine runs in one scheduler iteration at `intensity`
    pub fn iterations(&self, kind: EngineKind, intensity: Intensity) -> u32 {
        intensity.multiplier().saturating_mul(self.for_kind(kind))
    }
}
