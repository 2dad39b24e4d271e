mod cli;
mod engine;
mod error;
mod images;
mod logging;
mod metrics;
mod model;
mod orchestrator;
mod text_summary;
#[cfg(feature = "tui")]
mod tui;

use anyhow::Result;
use clap::Parser;
use logging::LogTarget;

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Cli::parse();

    let log_target = match (&args.log_file, args.is_interactive()) {
        (Some(path), _) => LogTarget::File(path.clone()),
        (None, true) => LogTarget::Disabled,
        (None, false) => LogTarget::Stderr,
    };
    // A log file gets lifecycle detail; stderr only warnings and errors.
    let default_level = match log_target {
        LogTarget::File(_) => "info",
        _ => "warn",
    };
    if let Err(e) = logging::init(log_target, default_level) {
        eprintln!("logging disabled: {e}");
    }

    match cli::run(args).await {
        Ok(()) => Ok(()),
        Err(e) => {
            eprintln!("Error: {e:#}");
            std::process::exit(1);
        }
    }
}
