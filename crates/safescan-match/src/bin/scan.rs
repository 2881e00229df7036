//! safescan-scan: decode a scan payload and optionally match it against a
//! registry fixture, printing the outcome as JSON.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use safescan_core::{DecodeResult, MatchResult};
use safescan_match::{match_identifier, MemoryRegistry};

#[derive(Parser)]
#[command(name = "safescan-scan")]
#[command(author, version, about = "Decode a product scan and check it against a recall registry")]
struct Cli {
    /// Raw scan payload (barcode text, element string, JSON, URL, or label text)
    #[arg(short, long, conflicts_with = "file", required_unless_present = "file")]
    payload: Option<String>,

    /// Read the payload from a file instead
    #[arg(short, long)]
    file: Option<PathBuf>,

    /// Symbology reported by the scanner (e.g. "ean-13", "qr")
    #[arg(long)]
    hint: Option<String>,

    /// Registry JSON file to match the decoded identifier against
    #[arg(short, long)]
    registry: Option<PathBuf>,
}

#[derive(Serialize)]
struct ScanOutput {
    decode: DecodeResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    r#match: Option<MatchResult>,
}

/// Tracing goes to stderr (or `LOG_FILE`) so stdout carries only the JSON.
fn init_logging() -> Option<tracing_appender::non_blocking::WorkerGuard> {
    //   LOG_FORMAT  - "json" or "text" (default: "text")
    //   LOG_FILE    - path to log file (optional, enables file logging)
    //   RUST_LOG    - standard env filter (default: "warn")
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let log_file = std::env::var("LOG_FILE").ok();

    let env_filter =
        tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into());
    let registry = tracing_subscriber::registry().with(env_filter);

    if let Some(ref path) = log_file {
        let path = std::path::Path::new(path);
        let file_dir = path.parent().unwrap_or(std::path::Path::new("."));
        let file_name = path
            .file_name()
            .and_then(|f| f.to_str())
            .unwrap_or("safescan-scan.log");
        let file_appender = tracing_appender::rolling::daily(file_dir, file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        if log_format == "json" {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .json()
                        .with_writer(non_blocking),
                )
                .init();
        } else {
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_writer(non_blocking)
                        .with_ansi(false),
                )
                .init();
        }
        Some(guard)
    } else {
        if log_format == "json" {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        } else {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
        None
    }
}

fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let _log_guard = init_logging();
    let cli = Cli::parse();

    let payload = match (cli.payload, cli.file) {
        (Some(payload), _) => payload.into_bytes(),
        (None, Some(path)) => std::fs::read(&path)
            .with_context(|| format!("failed to read payload file {}", path.display()))?,
        (None, None) => anyhow::bail!("either --payload or --file is required"),
    };

    let decode = safescan_decode::decode(&payload, cli.hint.as_deref());
    info!(
        subsystem = "match",
        component = "scan_cli",
        success = decode.success,
        confidence = decode.confidence,
        "Payload decoded"
    );

    let r#match = match cli.registry {
        Some(path) => {
            let registry = MemoryRegistry::from_path(&path)
                .with_context(|| format!("failed to load registry {}", path.display()))?;
            Some(match_identifier(&decode.identifier, &registry))
        }
        None => None,
    };

    let output = ScanOutput { decode, r#match };
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
