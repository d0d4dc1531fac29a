//! Console reporting
//!
//! Renders the configuration header, stage banners, the periodic progress
//! line and the final summary. Rendering is pure (`render_*` functions return
//! strings); `Reporter` only owns the output stream.

use std::io::{self, Write};
use std::sync::{Arc, Mutex};

use tracing::warn;

use crate::bench::phase::{Phase, PhaseKind};
use crate::config::LoadTestConfig;
use crate::models::{Detection, EngineKind, RunSummary, Statistics};
use crate::util::units::{format_count, format_duration, format_rate, progress_bar, BAR_WIDTH};

/// Width of the header and summary frames
const FRAME_WIDTH: usize = 70;
/// Width of the stage banner rules
const RULE_WIDTH: usize = 60;

/// Writes rendered reports to an output stream.
///
/// Write failures are logged and otherwise ignored; a broken stdout must not
/// stop the load.
pub struct Reporter {
    out: Box<dyn Write + Send>,
}

/// In-memory sink shared between a `Reporter` and the code inspecting it
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    /// Everything written so far, lossily decoded
    pub fn contents(&self) -> String {
        let bytes = self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        String::from_utf8_lossy(&bytes).into_owned()
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut bytes = self.bytes.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        bytes.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Reporter {
    pub fn stdout() -> Self {
        Self::to_writer(io::stdout())
    }

    pub fn to_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            out: Box::new(writer),
        }
    }

    /// Reporter writing into a buffer the caller can read back
    pub fn capture() -> (Self, CaptureBuffer) {
        let buffer = CaptureBuffer::default();
        (Self::to_writer(buffer.clone()), buffer)
    }

    fn emit(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|_| self.out.flush());
        if let Err(err) = result {
            warn!(error = %err, "failed to write report output");
        }
    }

    pub fn header(&mut self, config: &LoadTestConfig) {
        self.emit(&render_header(config));
    }

    /// Banner for warmup or cooldown
    pub fn stage_banner(&mut self, phase: &Phase) {
        self.emit(&render_stage_banner(phase));
    }

    pub fn main_banner(&mut self, config: &LoadTestConfig) {
        self.emit(&render_main_banner(config));
    }

    /// Banner for a main sub-phase, if its kind has one
    pub fn phase_banner(&mut self, phase: &Phase) {
        if let Some(banner) = render_phase_banner(phase) {
            self.emit(&banner);
        }
    }

    pub fn progress(&mut self, stats: &Statistics, config: &LoadTestConfig) {
        self.emit(&render_progress(stats, config));
    }

    pub fn summary(&mut self, summary: &RunSummary, verbose: bool) {
        self.emit(&render_summary(summary, verbose));
    }
}

impl Default for Reporter {
    fn default() -> Self {
        Self::stdout()
    }
}

fn framed_title(out: &mut String, title: &str) {
    let rule = "═".repeat(FRAME_WIDTH);
    out.push('\n');
    out.push_str(&rule);
    out.push('\n');
    out.push_str(&format!("║{:<width$}║\n", title, width = FRAME_WIDTH - 2));
    out.push_str(&rule);
    out.push_str("\n\n");
}

fn item(out: &mut String, label: &str, value: impl std::fmt::Display) {
    out.push_str(&format!("  • {:<15}{}\n", format!("{}:", label), value));
}

/// Configuration echo printed once before warmup
pub fn render_header(config: &LoadTestConfig) -> String {
    let mut out = String::new();
    framed_title(&mut out, " NPU Long-Running Synthetic Load Test ");

    out.push_str("Configuration:\n");
    item(
        &mut out,
        "Duration",
        format!(
            "{} seconds ({})",
            config.duration_seconds as u64,
            format_duration(config.duration_seconds)
        ),
    );
    item(&mut out, "Intensity", config.intensity.description());
    item(&mut out, "Mode", config.mode.description());
    item(&mut out, "Warmup", format!("{} seconds", config.warmup_seconds as u64));
    item(&mut out, "Cooldown", format!("{} seconds", config.cooldown_seconds as u64));
    item(
        &mut out,
        "Report every",
        format!("{} seconds", config.report_interval_seconds),
    );
    if let Some(seed) = config.seed {
        item(&mut out, "Seed", seed);
    }
    out.push('\n');

    out.push_str("Engines enabled:\n");
    for kind in EngineKind::ALL {
        let mark = if config.engines.is_enabled(kind) { "✅" } else { "❌" };
        item(&mut out, kind.label(), mark);
    }
    out.push('\n');
    out.push_str("💡 Watch the accelerator panel of your system monitor while this runs\n");
    out.push_str(&"-".repeat(FRAME_WIDTH));
    out.push('\n');
    out
}

pub fn render_stage_banner(phase: &Phase) -> String {
    let icon = match phase.kind {
        PhaseKind::Cooldown => "❄️",
        _ => "🔥",
    };
    format!(
        "\n{} {} Phase ({} seconds)\n{}\n",
        icon,
        phase,
        phase.duration_seconds as u64,
        "-".repeat(RULE_WIDTH)
    )
}

pub fn render_main_banner(config: &LoadTestConfig) -> String {
    format!(
        "\n🚀 Main Test ({} seconds, {})\n{}\n",
        config.duration_seconds as u64,
        config.mode.description(),
        "=".repeat(RULE_WIDTH)
    )
}

/// Sub-phase banner; sustained runs and the ramps have none
pub fn render_phase_banner(phase: &Phase) -> Option<String> {
    let title = phase.intensity.title();
    let line = match phase.kind {
        PhaseKind::Burst => format!("⚡ {}", phase),
        PhaseKind::Rest => "😴 Rest period".to_string(),
        PhaseKind::Cycle => format!("🔄 Cycle {}/{} - {}", phase.number, phase.of, title),
        PhaseKind::Step => format!("📈 Phase {}/{} - {}", phase.number, phase.of, title),
        PhaseKind::Segment => format!("🎲 Segment {}/{} - {}", phase.number, phase.of, title),
        PhaseKind::Sustained | PhaseKind::Warmup | PhaseKind::Cooldown => return None,
    };
    Some(format!("\n{}\n", line))
}

/// One progress line, plus detection counters when verbose
pub fn render_progress(stats: &Statistics, config: &LoadTestConfig) -> String {
    let elapsed = stats.elapsed_seconds();
    let bar = progress_bar(elapsed, config.total_planned_seconds(), BAR_WIDTH);
    let mut out = format!(
        "{} │ {:>5.0}s │ Ops: {:>9} │ Rate: {:>7.0}/s │ Peak: {:>7.0}/s │ V:{:>5} C:{:>5} B:{:>5} N:{:>4}\n",
        bar,
        elapsed,
        stats.total_operations(),
        stats.last_ops_per_second(),
        stats.peak_ops_per_second(),
        stats.operations(EngineKind::ImageAnalysis),
        stats.operations(EngineKind::ArrayMath),
        stats.operations(EngineKind::LinearAlgebra),
        stats.operations(EngineKind::TextEmbedding),
    );
    if config.verbose {
        let counters: Vec<String> = Detection::ALL
            .iter()
            .map(|d| format!("{}: {}", d.label(), stats.detections(*d)))
            .collect();
        out.push_str(&format!("{:>14}│ {}\n", "", counters.join(" │ ")));
    }
    out
}

/// Final report
pub fn render_summary(summary: &RunSummary, verbose: bool) -> String {
    let mut out = String::new();
    framed_title(&mut out, " TEST SUMMARY ");

    out.push_str("Duration:\n");
    item(&mut out, "Total time", format_duration(summary.elapsed_seconds));
    item(&mut out, "Mode", summary.mode.description());
    item(&mut out, "Intensity", summary.intensity.description());
    if summary.cancelled {
        item(&mut out, "Stopped", "interrupted, cooldown completed");
    }
    out.push('\n');

    out.push_str("Operations:\n");
    item(&mut out, "Total", format_count(summary.total_operations));
    for kind in EngineKind::ALL {
        item(&mut out, kind.label(), format_count(summary.operations_for(kind)));
    }
    out.push('\n');

    out.push_str("Performance:\n");
    item(&mut out, "Average rate", format_rate(summary.average_ops_per_second));
    item(&mut out, "Peak rate", format_rate(summary.peak_ops_per_second));
    out.push('\n');

    out.push_str("Detections:\n");
    for detection in Detection::ALL {
        let count = summary.detections.get(&detection).copied().unwrap_or(0);
        out.push_str(&format!(
            "  • {:<17}{}\n",
            format!("{}:", detection.label()),
            format_count(count)
        ));
    }
    out.push('\n');

    if verbose && summary.phases.len() > 1 {
        out.push_str("Phases:\n");
        for record in &summary.phases {
            out.push_str(&format!(
                "  • {:<15}{:<8} {:>6.1}s  {} ops{}\n",
                record.kind.display_name(record.number),
                record.intensity.title(),
                record.actual_seconds,
                format_count(record.operations),
                if record.interrupted { " (interrupted)" } else { "" }
            ));
        }
        out.push('\n');
    }

    if summary.error_count > 0 {
        out.push_str(&format!("⚠️  Errors encountered: {}\n", summary.error_count));
        if verbose {
            for error in &summary.error_samples {
                out.push_str(&format!("    • {}\n", error));
            }
            if summary.error_count > summary.error_samples.len() {
                out.push_str(&format!(
                    "    ... and {} more\n",
                    summary.error_count - summary.error_samples.len()
                ));
            }
        }
        out.push('\n');
    }

    out.push_str(&"═".repeat(FRAME_WIDTH));
    out.push_str("\n\n✅ Test completed! Check your monitor to verify accelerator activity was recorded.\n\n");
    out
}
