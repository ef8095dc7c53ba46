//! `journal-cli` - offline inspection and replay for a journal device.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Inspect and replay a crash-safe metadata journal device.
#[derive(Parser, Debug)]
#[command(name = "journal-cli")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the header and replay every occupied slot, in
    /// `(timestamp_ms, tx_id)` order.
    Replay {
        /// Path to the raw device or backing file.
        #[arg(short, long, env = "JOURNAL_DEVICE_PATH")]
        device: PathBuf,

        /// Emit events as newline-delimited JSON instead of a summary.
        #[arg(long)]
        json: bool,
    },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    match args.command {
        Command::Replay { device, json } => replay(&device, json),
    }
}

fn replay(device: &PathBuf, json: bool) -> anyhow::Result<()> {
    tracing::info!(path = %device.display(), "replaying journal device");
    let report = journal_core::replay(device)?;

    for warning in &report.warnings {
        tracing::warn!("{warning}");
    }

    if json {
        for event in &report.events {
            println!("{}", serde_json::to_string(event)?);
        }
    } else {
        println!(
            "{} event(s) recovered, {} warning(s)",
            report.events.len(),
            report.warnings.len()
        );
        for event in &report.events {
            println!(
                "tx_id={} ts={} action={} ino={} name={:?}",
                event.tx_id, event.timestamp_ms, event.action, event.ino, event.name
            );
        }
    }

    Ok(())
}
