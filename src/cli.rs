//! Command-line parsing
//!
//! Lenient parsing: a flag consumes its value only when the value parses,
//! unknown arguments are ignored, and a bare number sets the duration. A
//! number outside the flag's range is dropped and the earlier setting kept.
//! Whatever comes out is sanitized, so parsing never fails.

use std::fmt::Debug;

use tracing::{debug, warn};

use crate::config::{
    Intensity, LoadMode, LoadTestConfig, Preset, MAX_DURATION_SECONDS, MAX_PHASE_COUNT,
};
use crate::models::EngineKind;
use crate::APP_NAME;

/// What the binary should do
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Run(CliOptions),
    Help,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CliOptions {
    pub config: LoadTestConfig,
    /// Print the summary as JSON after the console report
    pub json_summary: bool,
    /// Print the effective configuration as TOML and exit
    pub print_config: bool,
}

/// Parse arguments, not including the program name.
///
/// `--preset` picks the starting configuration wherever it appears; every
/// other flag overrides it.
pub fn parse_args<I, S>(args: I) -> Command
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let args: Vec<String> = args.into_iter().map(|a| a.as_ref().to_string()).collect();

    let preset = args
        .windows(2)
        .filter(|pair| pair[0] == "--preset")
        .filter_map(|pair| pair[1].parse::<Preset>().ok())
        .last()
        .unwrap_or(Preset::Full);
    let mut config = LoadTestConfig::from_preset(preset);
    let mut json_summary = false;
    let mut print_config = false;

    let mut i = 0;
    while i < args.len() {
        let arg = args[i].as_str();
        let next = args.get(i + 1).map(String::as_str);

        match arg {
            "--duration" | "-d" => {
                if let Some(v) = next.and_then(parse_seconds) {
                    apply(&mut config.duration_seconds, v, "duration", valid_duration);
                    i += 1;
                }
            }
            "--intensity" | "-i" => {
                if let Some(v) = next.and_then(|s| s.parse::<Intensity>().ok()) {
                    config.intensity = v;
                    i += 1;
                }
            }
            "--mode" | "-m" => {
                if let Some(v) = next.and_then(|s| s.parse::<LoadMode>().ok()) {
                    config.mode = v;
                    i += 1;
                }
            }
            "--warmup" => {
                if let Some(v) = next.and_then(parse_seconds) {
                    apply(&mut config.warmup_seconds, v, "warmup", valid_ramp);
                    i += 1;
                }
            }
            "--cooldown" => {
                if let Some(v) = next.and_then(parse_seconds) {
                    apply(&mut config.cooldown_seconds, v, "cooldown", valid_ramp);
                    i += 1;
                }
            }
            "--report" => {
                if let Some(v) = next.and_then(parse_seconds) {
                    apply(&mut config.report_interval_seconds, v, "report", valid_interval);
                    i += 1;
                }
            }
            "--phases" => {
                if let Some(v) = next.and_then(|s| s.parse::<i64>().ok()) {
                    apply(&mut config.phase_count, v, "phases", valid_phase_count);
                    i += 1;
                }
            }
            "--seed" => {
                if let Some(v) = next.and_then(|s| s.parse::<u64>().ok()) {
                    config.seed = Some(v);
                    i += 1;
                }
            }
            "--preset" => {
                if next.and_then(|s| s.parse::<Preset>().ok()).is_some() {
                    i += 1;
                }
            }
            "--verbose" | "-v" => config.verbose = true,
            "--no-vision" => config.engines.set(EngineKind::ImageAnalysis, false),
            "--no-coreml" => config.engines.set(EngineKind::ArrayMath, false),
            "--no-bnns" => config.engines.set(EngineKind::LinearAlgebra, false),
            "--no-nlp" => config.engines.set(EngineKind::TextEmbedding, false),
            "--json" => json_summary = true,
            "--print-config" => print_config = true,
            "--help" | "-h" => return Command::Help,
            other => match parse_seconds(other) {
                Some(v) => apply(&mut config.duration_seconds, v, "duration", valid_duration),
                None => debug!(argument = other, "ignoring unrecognized argument"),
            },
        }
        i += 1;
    }

    Command::Run(CliOptions {
        config: config.sanitized(),
        json_summary,
        print_config,
    })
}

fn parse_seconds(value: &str) -> Option<f64> {
    value.parse::<f64>().ok()
}

/// Store `value` in `slot` when `valid` accepts it
fn apply<V: Copy + Debug, T>(slot: &mut T, value: V, flag: &str, valid: fn(V) -> Option<T>) {
    match valid(value) {
        Some(v) => *slot = v,
        None => warn!(flag, value = ?value, "value out of range, keeping previous setting"),
    }
}

fn valid_duration(v: f64) -> Option<f64> {
    (v.is_finite() && (0.0..=MAX_DURATION_SECONDS).contains(&v)).then_some(v)
}

/// Warmup or cooldown length
fn valid_ramp(v: f64) -> Option<f64> {
    (v.is_finite() && v >= 0.0).then_some(v)
}

fn valid_interval(v: f64) -> Option<f64> {
    (v.is_finite() && v > 0.0).then_some(v)
}

fn valid_phase_count(v: i64) -> Option<u32> {
    u32::try_from(v)
        .ok()
        .filter(|count| (1..=MAX_PHASE_COUNT).contains(count))
}

/// Help text printed for `--help`
pub fn usage() -> String {
    format!(
        r#"NPU Long-Running Synthetic Load Test

Usage: {app} [options] [duration]

Options:
    --duration, -d <seconds>   Test duration (default: 300 = 5 minutes)
    --intensity, -i <level>    Load intensity: low, medium, high, extreme (default: medium)
    --mode, -m <mode>          Test mode: sustained, burst, cyclic, progressive, random (default: sustained)
    --warmup <seconds>         Warmup duration (default: 10)
    --cooldown <seconds>       Cooldown duration (default: 5)
    --report <seconds>         Progress report interval (default: 5)
    --phases <count>           Number of phases for progressive mode (default: 5)
    --seed <number>            Seed random mode and workload inputs
    --preset <name>            Starting configuration: full, coreml, vision, bnns (default: full)
    --verbose, -v              Show detection counters and error samples
    --json                     Print the run summary as JSON after the report
    --print-config             Print the effective configuration as TOML and exit
    --no-vision                Disable the image analysis engine
    --no-coreml                Disable the array math engine
    --no-bnns                  Disable the linear algebra engine
    --no-nlp                   Disable the text embedding engine
    --help, -h                 Show this help

Intensity Levels:
    low      - Light accelerator usage, minimal system impact
    medium   - Moderate accelerator usage, balanced workload
    high     - Heavy accelerator usage, significant load
    extreme  - Maximum accelerator stress, full utilization

Test Modes:
    sustained   - Constant load at specified intensity
    burst       - 15s extreme bursts with 5s rest
    cyclic      - Cycles through all intensity levels
    progressive - Gradually increases from low to extreme
    random      - Random intensity every ~20s

Examples:
    {app}                              # 5 minute medium test
    {app} -d 3600 -i high              # 1 hour high intensity
    {app} -d 600 -m burst              # 10 minute burst mode
    {app} -d 1800 -m progressive -v    # 30 min progressive, verbose
    {app} -d 900 --no-nlp --no-bnns    # 15 min image analysis + array math only
    {app} --preset vision              # 30s image analysis probe

Press Ctrl+C to stop the test gracefully at any time.
"#,
        app = APP_NAME
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_config(args: &[&str]) -> LoadTestConfig {
        match parse_args(args) {
            Command::Run(options) => options.config,
            Command::Help => panic!("unexpected help for {:?}", args),
        }
    }

    #[test]
    fn test_no_args_gives_defaults() {
        assert_eq!(run_config(&[]), LoadTestConfig::default());
    }

    #[test]
    fn test_malformed_value_is_reexamined() {
        // "abc" is not a number, so -d consumes nothing and "abc" is ignored
        let config = run_config(&["-d", "abc", "-i", "high"]);
        assert_eq!(config.duration_seconds, 300.0);
        assert_eq!(config.intensity, Intensity::High);

        // "--verbose" is not a valid intensity and is applied as a flag
        let config = run_config(&["-i", "--verbose"]);
        assert_eq!(config.intensity, Intensity::Medium);
        assert!(config.verbose);
    }

    #[test]
    fn test_bare_number_sets_duration() {
        assert_eq!(run_config(&["90"]).duration_seconds, 90.0);
        assert_eq!(run_config(&["--unknown", "45.5"]).duration_seconds, 45.5);
    }

    #[test]
    fn test_help_stops_parsing() {
        assert_eq!(parse_args(["-d", "10", "--help", "-d", "x"]), Command::Help);
        assert_eq!(parse_args(["-h"]), Command::Help);
    }

    #[test]
    fn test_invalid_values_fall_back_to_defaults() {
        let config = run_config(&["-d", "-5", "--report", "0", "--phases", "-3", "--warmup", "nan"]);
        assert_eq!(config.duration_seconds, 300.0);
        assert_eq!(config.report_interval_seconds, 5.0);
        assert_eq!(config.phase_count, 5);
        assert_eq!(config.warmup_seconds, 10.0);
    }

    #[test]
    fn test_rejected_values_keep_earlier_setting() {
        let config = run_config(&["-d", "10", "-d", "-5"]);
        assert_eq!(config.duration_seconds, 10.0);

        let config = run_config(&["--phases", "4", "--phases", "0", "--report", "2", "--report", "-1"]);
        assert_eq!(config.phase_count, 4);
        assert_eq!(config.report_interval_seconds, 2.0);

        let config = run_config(&["--cooldown", "1", "--cooldown", "inf", "-d", "60", "1e12"]);
        assert_eq!(config.cooldown_seconds, 1.0);
        assert_eq!(config.duration_seconds, 60.0);
    }

    #[test]
    fn test_engine_switches_and_extras() {
        let args = ["--no-vision", "--no-nlp", "--seed", "42", "--json", "-m", "BURST"];
        let Command::Run(options) = parse_args(args) else {
            panic!("expected run");
        };
        assert!(options.json_summary);
        assert!(!options.print_config);
        assert_eq!(options.config.seed, Some(42));
        assert_eq!(options.config.mode, LoadMode::Burst);
        assert_eq!(
            options.config.engines.enabled_kinds(),
            vec![EngineKind::ArrayMath, EngineKind::LinearAlgebra]
        );
    }

    #[test]
    fn test_preset_applies_before_other_flags() {
        let config = run_config(&["-d", "60", "--preset", "vision"]);
        assert_eq!(config.duration_seconds, 60.0);
        assert_eq!(config.warmup_seconds, 0.0);
        assert_eq!(config.engines.enabled_kinds(), vec![EngineKind::ImageAnalysis]);

        let config = run_config(&["--preset", "nonsense"]);
        assert_eq!(config, LoadTestConfig::default());
    }

    #[test]
    fn test_usage_mentions_every_flag() {
        let text = usage();
        for flag in ["--duration", "--no-bnns", "--phases", "--report", "--seed", "--print-config"] {
            assert!(text.contains(flag), "missing {}", flag);
        }
    }
}
