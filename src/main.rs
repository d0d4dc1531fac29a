use std::process::ExitCode;

use npuload::bench::{forward_interrupts, relay_interrupts, CancellationSignal, LoadTest, OsSignals};
use npuload::cli::{self, Command};
use npuload::error::user_friendly_message;
use npuload::LoadError;
use tokio::sync::mpsc;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().skip(1).collect();
    init_logging(args.iter().any(|a| a == "--verbose" || a == "-v"));

    let options = match cli::parse_args(&args) {
        Command::Help => {
            print!("{}", cli::usage());
            return ExitCode::SUCCESS;
        }
        Command::Run(options) => options,
    };

    if options.print_config {
        return match options.config.to_toml() {
            Ok(toml) => {
                print!("{}", toml);
                ExitCode::SUCCESS
            }
            Err(err) => fail(&err),
        };
    }

    let cancel = CancellationSignal::new();
    let (interrupt_tx, interrupt_rx) = mpsc::channel(4);
    let listener = tokio::spawn(relay_interrupts(OsSignals::new(), interrupt_tx));
    let forwarder = tokio::spawn(forward_interrupts(cancel.clone(), interrupt_rx));

    // The scheduler is synchronous; keep it off the signal-handling threads
    let config = options.config;
    let outcome = tokio::task::spawn_blocking(move || LoadTest::new(config, cancel).run()).await;
    listener.abort();
    forwarder.abort();

    let summary = match outcome {
        Ok(summary) => summary,
        Err(err) => return fail(&LoadError::RuntimeError(err.to_string())),
    };

    if options.json_summary {
        match summary.to_json() {
            Ok(json) => println!("{}", json),
            Err(err) => return fail(&err),
        }
    }
    ExitCode::SUCCESS
}

/// Logs go to stderr; stdout carries the reports
fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn fail(err: &LoadError) -> ExitCode {
    eprintln!("Error: {}", user_friendly_message(err));
    ExitCode::FAILURE
}
