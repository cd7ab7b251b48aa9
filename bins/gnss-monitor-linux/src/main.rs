mod args;

use std::time::Duration;

use clap::Parser;
use gnss_nmea::{SharedAccumulator, Snapshot};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::sync::{mpsc, watch};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::args::Args;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logs go to stderr so stdout stays pure JSON.
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,gnss_nmea=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let args = Args::parse();
    let config = args.accumulator_config()?;
    tracing::info!(
        "GNSS monitor starting (stale threshold {} ms, visible retention {:?})",
        config.stale_threshold_ms,
        config.visible_retention
    );

    let accumulator = SharedAccumulator::new(config);
    let (line_tx, line_rx) = mpsc::channel::<String>(1024);

    let input: Box<dyn AsyncRead + Unpin + Send> = match &args.input {
        Some(path) => {
            tracing::info!("Reading sentences from {}", path.display());
            Box::new(tokio::fs::File::open(path).await?)
        }
        None => {
            tracing::info!("Reading sentences from stdin");
            Box::new(tokio::io::stdin())
        }
    };

    // Line reader: the transport. Feeds already-delimited lines.
    let reader_handle = tokio::spawn(read_lines(input, line_tx));

    // Single writer: every line goes through one processor task.
    let processor_handle = tokio::spawn(process_lines(accumulator.clone(), line_rx));

    if args.once {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
            }
            result = processor_handle => {
                if let Err(e) = result {
                    tracing::error!("Processor task failed: {}", e);
                }
            }
        }
        print_snapshot(&accumulator.snapshot(), args.pretty)?;
    } else {
        let publisher_handle = tokio::spawn(publish_snapshots(
            accumulator.subscribe(),
            Duration::from_millis(args.interval_ms),
            args.pretty,
        ));

        let input_ended = tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl+C, shutting down...");
                false
            }
            _ = processor_handle => {
                tracing::info!("Input ended");
                true
            }
            _ = publisher_handle => {
                tracing::warn!("Snapshot publisher stopped");
                false
            }
        };

        if input_ended {
            print_snapshot(&accumulator.snapshot(), args.pretty)?;
        }
    }

    reader_handle.abort();

    let stats = accumulator.stats();
    tracing::info!(
        "Processed {} sentences ({} decode errors, {} sequences completed, {} resyncs)",
        stats.sentences,
        stats.decode_errors,
        stats.sequences_completed,
        stats.resyncs
    );
    tracing::info!("Shutdown complete");
    Ok(())
}

/// Read lines from the input and forward the non-empty ones.
async fn read_lines(input: Box<dyn AsyncRead + Unpin + Send>, tx: mpsc::Sender<String>) {
    let mut lines = BufReader::new(input).lines();
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                if tx.send(line.to_string()).await.is_err() {
                    tracing::error!("Failed to forward line - processor may have stopped");
                    break;
                }
            }
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Input read error: {}", e);
                break;
            }
        }
    }
}

/// Apply every received line to the accumulator.
async fn process_lines(accumulator: SharedAccumulator, mut rx: mpsc::Receiver<String>) {
    while let Some(line) = rx.recv().await {
        // Events are already logged by the accumulator.
        let _ = accumulator.process(&line);
    }
}

/// Print every published snapshot, at most once per `min_period`.
async fn publish_snapshots(
    mut updates: watch::Receiver<Snapshot>,
    min_period: Duration,
    pretty: bool,
) {
    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        if let Err(e) = print_snapshot(&snapshot, pretty) {
            tracing::error!("Failed to write snapshot: {}", e);
            break;
        }
        // Updates arriving meanwhile collapse into the next print.
        tokio::time::sleep(min_period).await;
    }
}

fn print_snapshot(snapshot: &Snapshot, pretty: bool) -> anyhow::Result<()> {
    let json = if pretty {
        serde_json::to_string_pretty(snapshot)?
    } else {
        serde_json::to_string(snapshot)?
    };
    println!("{}", json);
    Ok(())
}
