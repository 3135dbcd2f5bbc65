use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use proctor_application::ProctorConfig;
use proctor_storage::JsonLedger;
use proctor_violations::{ViolationRecord, ViolationRepository, ViolationStats};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage:
  proctor stats <output-dir | violations.json>
  proctor check-config <config.yaml>";

#[derive(Debug, PartialEq)]
enum Command {
    Stats(PathBuf),
    CheckConfig(PathBuf),
}

fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    match args {
        [cmd, path] if cmd == "stats" => Ok(Command::Stats(PathBuf::from(path))),
        [cmd, path] if cmd == "check-config" => Ok(Command::CheckConfig(PathBuf::from(path))),
        _ => bail!("{USAGE}"),
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,proctor=debug")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    match parse_args(&args)? {
        Command::Stats(path) => {
            let stats = ledger_stats(&path)?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
        Command::CheckConfig(path) => {
            let config = ProctorConfig::load(&path)
                .with_context(|| format!("checking {}", path.display()))?;
            tracing::info!(
                output = %config.global.output_path.display(),
                audio = config.detection.audio_monitoring.enabled,
                screen = config.screen.recording,
                "Configuration is valid"
            );
        }
    }
    Ok(())
}

/// Accepts the session output directory or a ledger file.
fn ledger_stats(path: &Path) -> anyhow::Result<ViolationStats> {
    let records: Vec<ViolationRecord> = if path.is_dir() {
        let ledger = JsonLedger::open(path)
            .with_context(|| format!("opening violation ledger in {}", path.display()))?;
        ledger.all()?
    } else {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?
    };
    tracing::debug!(path = %path.display(), records = records.len(), "Loaded violations");
    Ok(ViolationStats::from_records(&records))
}
