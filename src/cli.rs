use crate::engine::HttpClassifier;
use crate::model::{
    DatasetFile, SubmissionEvent, SubmissionStatus, SubmitConfig, DEFAULT_ENDPOINT, FAILURE_NOTICE,
};
use crate::orchestrator::{process_result, SubmissionController};
use anyhow::{Context, Result};
use clap::Parser;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Output line routing for stdout/stderr writer.
enum OutputLine {
    Stdout(String),
    Stderr(String),
}

/// Spawn a blocking writer for stdout/stderr to avoid blocking async tasks.
fn spawn_output_writer() -> (
    mpsc::UnboundedSender<OutputLine>,
    tokio::task::JoinHandle<()>,
) {
    let (tx, mut rx) = mpsc::unbounded_channel::<OutputLine>();
    let handle = tokio::task::spawn_blocking(move || {
        let stdout = std::io::stdout();
        let stderr = std::io::stderr();
        let mut out = std::io::LineWriter::new(stdout.lock());
        let mut err = std::io::LineWriter::new(stderr.lock());

        while let Some(line) = rx.blocking_recv() {
            match line {
                OutputLine::Stdout(msg) => {
                    let _ = writeln!(out, "{}", msg);
                }
                OutputLine::Stderr(msg) => {
                    let _ = writeln!(err, "{}", msg);
                }
            }
        }

        let _ = out.flush();
        let _ = err.flush();
    });
    (tx, handle)
}

#[derive(Debug, Parser, Clone)]
#[command(
    name = "dataset-classify",
    version,
    about = "Upload a dataset to the classification service and show the model report"
)]
pub struct Cli {
    /// Dataset file to upload (CSV)
    #[arg(long, short = 'f')]
    pub file: Option<PathBuf>,

    /// Name of the column the service should predict
    #[arg(long, short = 't')]
    pub target_column: Option<String>,

    /// Upload endpoint of the classification service
    #[arg(long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,

    /// Request timeout (training can take a while)
    #[arg(long, default_value = "120s")]
    pub timeout: humantime::Duration,

    /// Print the result as JSON and exit (no TUI)
    #[arg(long)]
    pub json: bool,

    /// Print a text summary and exit (no TUI)
    #[arg(long)]
    pub text: bool,

    /// Write the decoded report images into this directory
    #[arg(long)]
    pub image_dir: Option<PathBuf>,

    /// Write logs to this file (the TUI is silent otherwise)
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn is_interactive(&self) -> bool {
        cfg!(feature = "tui") && !self.json && !self.text
    }
}

pub async fn run(args: Cli) -> Result<()> {
    if args.json && args.text {
        return Err(anyhow::anyhow!("--json and --text are mutually exclusive"));
    }

    if args.is_interactive() {
        #[cfg(feature = "tui")]
        {
            return crate::tui::run(args).await;
        }
    }

    run_once(args).await
}

/// Build a `SubmitConfig` from CLI arguments.
pub fn build_config(args: &Cli) -> SubmitConfig {
    SubmitConfig {
        endpoint: args.endpoint.clone(),
        timeout: Duration::from(args.timeout),
        ..SubmitConfig::default()
    }
}

/// Load the dataset named on the command line, if any.
pub fn load_dataset(args: &Cli) -> Result<Option<DatasetFile>> {
    args.file
        .as_deref()
        .map(DatasetFile::from_path)
        .transpose()
}

/// Progress line for stderr in one-shot mode. A failure is left to the
/// returned error so it is printed once.
fn stderr_notice(ev: &SubmissionEvent) -> Option<String> {
    match ev {
        SubmissionEvent::Failed { .. } => None,
        other => Some(other.to_message()),
    }
}

/// Submit once with the flags given and print the outcome (text or JSON).
async fn run_once(args: Cli) -> Result<()> {
    let service = HttpClassifier::new(&build_config(&args))?;
    debug!(endpoint = service.endpoint(), "running one-shot submission");
    let (out_tx, out_handle) = spawn_output_writer();
    let (evt_tx, mut evt_rx) = mpsc::unbounded_channel::<SubmissionEvent>();

    let mut controller = SubmissionController::new(Some(evt_tx));
    controller.set_file(load_dataset(&args)?);
    controller.set_target_column(args.target_column.clone().unwrap_or_default());

    // Forward notifications to stderr while the request is outstanding.
    let notify_tx = out_tx.clone();
    let notifier = tokio::spawn(async move {
        while let Some(ev) = evt_rx.recv().await {
            if let Some(msg) = stderr_notice(&ev) {
                let _ = notify_tx.send(OutputLine::Stderr(msg));
            }
        }
    });

    let submitted = controller.submit(&service).await.map(|s| s.clone());
    // Dropping the controller closes the event channel and ends the notifier.
    drop(controller);
    let _ = notifier.await;

    let outcome = match submitted {
        Ok(SubmissionStatus::Succeeded(result)) => {
            let processed = process_result(args.image_dir.as_deref(), &result);
            debug!(saved = processed.saved_images.len(), "result processed");
            if args.json {
                let out = serde_json::to_string_pretty(&result).context("serialize result")?;
                let _ = out_tx.send(OutputLine::Stdout(out));
            } else {
                for line in processed.lines {
                    let _ = out_tx.send(OutputLine::Stdout(line));
                }
            }
            for msg in processed.export_messages {
                let _ = out_tx.send(OutputLine::Stderr(msg));
            }
            Ok(())
        }
        Ok(SubmissionStatus::Failed(reason)) => Err(anyhow::anyhow!("{FAILURE_NOTICE} {reason}")),
        Ok(other) => Err(anyhow::anyhow!("submission ended in unexpected state {other:?}")),
        Err(e) if e.is_rejection() => Err(anyhow::Error::new(e).context("submission rejected")),
        Err(e) => Err(anyhow::Error::new(e).context("submission failed")),
    };

    drop(out_tx);
    let _ = out_handle.await;
    outcome
}
