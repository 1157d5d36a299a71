use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use fraud_engine::{analyze, build_report, load_transactions, write_json, EngineConfig};

/// Scan a transaction CSV for fraud typologies and write a JSON report.
#[derive(Debug, Parser)]
#[command(name = "fraudscan", version, about)]
struct Cli {
    /// Input CSV with tx_id, sender_id, receiver_id, amount, timestamp columns.
    input: PathBuf,

    /// Where to write the JSON report.
    #[arg(short, long, default_value = "report.json")]
    output: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    let transactions = load_transactions(&cli.input)
        .with_context(|| format!("failed to load transactions from {}", cli.input.display()))?;
    info!(count = transactions.len(), "transactions loaded");

    let analysis = analyze(&transactions, &EngineConfig::default());
    let report = build_report(&analysis.accounts, &analysis.networks);
    write_json(&report, &cli.output)
        .with_context(|| format!("failed to write report to {}", cli.output.display()))?;

    info!(
        flagged_accounts = report.accounts.len(),
        networks = report.networks.len(),
        output = %cli.output.display(),
        "scan complete"
    );
    Ok(())
}
