use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use chronodeck_calendars::service::prepare_segments;
use chronodeck_calendars::{build, validate_chain, EditorDefaults, SegmentDescriptor};
use chronodeck_core::config::ChronodeckConfig;
use clap::{Parser, Subcommand};
use tracing::{info, warn};

/// Inspect calendar chains offline.
#[derive(Debug, Parser)]
#[command(name = "chronodeck", version)]
struct Cli {
    /// Config file (defaults to $CHRONODECK_CONFIG, then ~/.chronodeck/chronodeck.toml).
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Validate a JSON array of segments and print the result.
    Validate { file: PathBuf },
    /// Build a chain from a JSON array of segments and evaluate it.
    Check {
        file: PathBuf,
        /// RFC 3339 instants to test, e.g. 2024-12-25T09:00:00Z.
        #[arg(long = "at", required = true)]
        at: Vec<DateTime<Utc>>,
    },
    /// Print a blank chain using the configured editor defaults.
    Template,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let loaded = ChronodeckConfig::load(cli.config.as_deref());
    let filter = loaded
        .as_ref()
        .map(|c| c.log.filter.clone())
        .unwrap_or_else(|_| chronodeck_core::config::DEFAULT_LOG_FILTER.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = loaded.unwrap_or_else(|e| {
        warn!(code = e.code(), "Config load failed ({}), using defaults", e);
        ChronodeckConfig::default()
    });

    match cli.command {
        Command::Validate { file } => {
            let segments = read_segments(&file)?;
            let result = validate_chain(&segments);
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success() {
                bail!("{} validation error(s)", result.errors.len());
            }
        }
        Command::Check { file, at } => {
            let segments = read_segments(&file)?;
            let result = validate_chain(&segments);
            if !result.success() {
                for e in &result.errors {
                    eprintln!("segment {}: {}: {}", e.segment_index, e.field, e.reason);
                }
                bail!("{} validation error(s)", result.errors.len());
            }
            // Nothing is stored offline, so custom segments cannot be resolved.
            let Some(chain) = build(&segments, None) else {
                bail!("cannot build calendar (custom segments need a stored chain)");
            };
            info!(depth = chain.depth(), "chain built");
            for instant in at {
                let verdict = if chain.is_time_included(instant) {
                    "included"
                } else {
                    "excluded"
                };
                println!("{} {}", instant.to_rfc3339(), verdict);
            }
        }
        Command::Template => {
            let defaults = EditorDefaults::from_config(&config.editor)?;
            println!("{}", serde_json::to_string_pretty(&defaults.new_chain())?);
        }
    }

    Ok(())
}

/// Read segments and apply the same form cleanup as a save.
fn read_segments(path: &Path) -> anyhow::Result<Vec<SegmentDescriptor>> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    let mut segments: Vec<SegmentDescriptor> =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    prepare_segments(&mut segments);
    Ok(segments)
}
