//! Ferry command-line entry point

mod cli;

use anyhow::Context;
use clap::Parser;
use std::io::Write;
use std::process::ExitCode;

use ferry_core::{Config, Engine, ProgressSample, TransferEvent, TransferHandle, TransferOutcome};

use crate::cli::Cli;

/// Progress redraw spacing when the config does not set one
const DEFAULT_PROGRESS_INTERVAL_MS: u64 = 100;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    ferry_core::init_logging();

    let mut config = Config::load_or_default(cli.config.as_deref())
        .with_context(|| "failed to load configuration")?;
    if let Some(dir) = &cli.dir {
        if cli.video {
            config.video_dir = dir.clone();
        } else {
            config.download_dir = dir.clone();
        }
    }
    config
        .progress_interval_ms
        .get_or_insert(DEFAULT_PROGRESS_INTERVAL_MS);

    let engine = Engine::new(config).context("failed to initialize engine")?;
    let handle = if cli.video {
        engine.download_video(&cli.url).await?
    } else {
        engine
            .download(&cli.url, cli.name.as_deref(), cli.length)
            .await?
    };

    let outcome = drive(handle).await?;
    report(&outcome, cli.json)?;

    Ok(ExitCode::from(exit_code(&outcome)))
}

/// Render progress until the run finishes. The first Ctrl-C cancels the run;
/// the run still reports its own outcome.
async fn drive(mut handle: TransferHandle) -> anyhow::Result<TransferOutcome> {
    let mut canceling = false;

    loop {
        tokio::select! {
            event = handle.next_event() => match event {
                Some(TransferEvent::Started { id }) => {
                    tracing::debug!(transfer_id = %id, "Transfer started");
                }
                Some(TransferEvent::Progress(sample)) => render_progress(sample),
                Some(TransferEvent::Finished(outcome)) => {
                    eprintln!();
                    return Ok(outcome);
                }
                None => anyhow::bail!("transfer ended without an outcome"),
            },
            signal = tokio::signal::ctrl_c(), if !canceling => {
                signal.context("failed to listen for Ctrl-C")?;
                eprintln!("\ncanceling...");
                handle.cancel();
                canceling = true;
            }
        }
    }
}

fn render_progress(sample: ProgressSample) {
    let line = match sample.total_bytes {
        Some(total) => format!(
            "\r{:>6.1}%  {} / {} bytes",
            sample.percent(),
            sample.bytes_transferred,
            total
        ),
        None => format!("\r{} bytes", sample.bytes_transferred),
    };
    let mut stderr = std::io::stderr().lock();
    let _ = stderr.write_all(line.as_bytes());
    let _ = stderr.flush();
}

fn report(outcome: &TransferOutcome, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
        return Ok(());
    }

    match outcome {
        TransferOutcome::Success {
            file, total_bytes, ..
        } => println!("saved {} ({} bytes)", file.display(), total_bytes),
        TransferOutcome::Canceled {
            bytes_transferred, ..
        } => println!("canceled after {} bytes, rerun to resume", bytes_transferred),
        TransferOutcome::Interrupted {
            bytes_transferred, ..
        } => println!(
            "connection lost after {} bytes, rerun to resume",
            bytes_transferred
        ),
        TransferOutcome::SizeMismatch {
            bytes_transferred,
            total_bytes,
        } => println!(
            "size mismatch: {} bytes on disk, expected {}",
            bytes_transferred,
            total_bytes.map_or_else(|| "unknown".to_string(), |t| t.to_string())
        ),
        TransferOutcome::TransportError { message, .. } => println!("failed: {}", message),
    }
    Ok(())
}

fn exit_code(outcome: &TransferOutcome) -> u8 {
    match outcome {
        TransferOutcome::Success { .. } => 0,
        TransferOutcome::Canceled { .. } => 130,
        _ => 1,
    }
}
