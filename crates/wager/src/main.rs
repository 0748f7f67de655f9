//! Lottery agency agent.
//!
//! Loads the agency's bets, sends them to the lottery service, and waits
//! for the winners. Exits 0 on completion or on SIGTERM, 1 on any error.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{
    EnvFilter, layer::SubscriberExt, util::SubscriberInitExt,
};
use wager::prelude::*;

#[derive(Parser, Debug)]
#[command(name = "wager-agent")]
#[command(about = "Sends an agency's bets to the lottery service", long_about = None)]
#[command(version)]
struct Args {
    /// JSON config file. Flags and environment override its values.
    #[arg(short, long, env = "CLI_CONFIG")]
    config: Option<PathBuf>,

    /// Agency id (0-255)
    #[arg(long, env = "CLI_ID")]
    id: Option<String>,

    /// Lottery service address, host:port
    #[arg(long, env = "CLI_SERVER_ADDRESS")]
    server_address: Option<String>,

    /// Maximum bets per batch (1-255)
    #[arg(long, env = "CLI_BATCH_MAXAMOUNT")]
    batch_max_amount: Option<u32>,

    /// Pause between batches in milliseconds
    #[arg(long, env = "CLI_LOOP_PERIOD_MS")]
    loop_period_ms: Option<u64>,

    /// Connection strategy: persistent or per_batch
    #[arg(long, env = "CLI_STRATEGY")]
    strategy: Option<ConnectionStrategy>,

    /// CSV file with the agency's bets
    #[arg(long, env = "CLI_BETS_PATH")]
    bets_path: Option<PathBuf>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, env = "CLI_LOG_LEVEL")]
    log_level: Option<String>,
}

impl Args {
    fn into_parts(self) -> (Option<PathBuf>, ConfigOverrides) {
        let overrides = ConfigOverrides {
            id: self.id,
            server_address: self.server_address,
            batch_max_amount: self.batch_max_amount,
            loop_period_ms: self.loop_period_ms,
            strategy: self.strategy,
            bets_path: self.bets_path,
            log_level: self.log_level,
        };
        (self.config, overrides)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let (file, overrides) = Args::parse().into_parts();

    let config = match AgentConfig::load(file.as_deref(), overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("wager-agent: {e}");
            return ExitCode::FAILURE;
        }
    };

    init_tracing(&config.log_level);
    info!(
        action = "config", result = "success",
        client_id = %config.id,
        server_address = %config.server_address,
        batch_max_amount = config.batch_max_amount,
        loop_period_ms = ?config.loop_period_ms,
        strategy = %config.strategy,
        log_level = %config.log_level,
        "configuration loaded"
    );

    let result = run(&config).await;
    match &result {
        Ok(SessionOutcome::Completed { cursor, winners, .. }) => info!(
            action = "exit", result = "success",
            bets_sent = cursor, winners = winners.count()
        ),
        Ok(SessionOutcome::Cancelled { cursor, during, .. }) => info!(
            action = "exit", result = "cancelled",
            bets_sent = cursor, during = %during
        ),
        Err(e) => error!(action = "exit", result = "fail", error = %e),
    }
    exit_code(&result)
}

async fn run(config: &AgentConfig) -> Result<SessionOutcome, WagerError> {
    let agency = Agency::from_config(config)?;

    let cancel = CancellationToken::new();
    let listener = spawn_signal_listener(cancel.clone());
    let result = agency.run(cancel).await;
    listener.abort();
    result
}

/// Installs the global subscriber. `RUST_LOG` wins over `level`.
fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();
}
