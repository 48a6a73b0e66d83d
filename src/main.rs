//! Replay an archived chain from genesis to a target state hash.
//!
//! Reads the input record (target state hash, proof, genesis ledger) and an
//! archive dump, applies every archived command to an in-memory ledger, and
//! writes the target ledger. The output file is only written when the whole
//! replay succeeds.
use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info};

use ledger_replay::logging::{self, LogConfig, LogFormat};
use ledger_replay::serialization::{read_archive, read_input, write_output};
use ledger_replay::{InMemoryLedger, ReplayConfig, ReplayEngine};

#[derive(Debug, Parser)]
#[command(author, version, about)]
struct Args {
    /// Input record: target state hash, target proof and genesis ledger.
    #[arg(long, value_name = "PATH")]
    input: PathBuf,

    /// Archive dump to replay from.
    #[arg(long, value_name = "PATH")]
    archive: PathBuf,

    /// Where to write the target ledger.
    #[arg(long, value_name = "PATH")]
    output: PathBuf,

    /// Fetch rows and keys on the calling thread only.
    #[arg(long)]
    sequential: bool,

    /// Cap on threads used for parallel fetches.
    #[arg(long, value_name = "N", conflicts_with = "sequential")]
    fetch_threads: Option<usize>,

    /// Log output format (text or json).
    #[arg(long, default_value_t = LogFormat::Text)]
    log_format: LogFormat,
}

impl Args {
    fn replay_config(&self) -> ReplayConfig {
        let config = if self.sequential {
            ReplayConfig::sequential()
        } else {
            ReplayConfig::default()
        };
        match self.fetch_threads {
            Some(threads) => config.with_fetch_threads(threads),
            None => config,
        }
    }
}

fn run(args: &Args) -> Result<()> {
    let input = read_input(&args.input)
        .with_context(|| format!("reading input record {}", args.input.display()))?;
    let archive = read_archive(&args.archive)
        .with_context(|| format!("reading archive dump {}", args.archive.display()))?;

    info!(
        target_state_hash = %input.target_state_hash,
        genesis_accounts = input.genesis_ledger.len(),
        "starting replay"
    );

    let mut engine = ReplayEngine::<InMemoryLedger>::builder()
        .with_genesis(input.genesis_ledger.clone())
        .with_config(args.replay_config())
        .build()
        .map_err(anyhow::Error::msg)
        .context("configuring replay engine")?;

    let outcome = engine
        .replay(&archive, &input.target_state_hash)
        .with_context(|| format!("replaying to {}", input.target_state_hash))?;

    write_output(&args.output, &outcome.to_output(&input))
        .with_context(|| format!("writing output {}", args.output.display()))?;

    info!(
        output = %args.output.display(),
        accounts = outcome.target_ledger.len(),
        transactions = outcome.report.transactions_applied(),
        ledger_hash = %outcome.report.ledger_hash,
        duration_ms = outcome.report.performance_metrics.total_duration_ms,
        "replay complete"
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();

    let log_config = LogConfig::default().with_format(args.log_format);
    if let Err(e) = logging::init(&log_config) {
        eprintln!("{}", e);
        return ExitCode::FAILURE;
    }

    match run(&args) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("replay failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
