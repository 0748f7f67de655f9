//! Agent configuration: defaults, an optional JSON file, then overrides
//! from the environment and the command line.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wager_protocol::ClientId;
use wager_session::{ConnectionStrategy, SessionConfig};

use crate::WagerError;

/// Everything the agent reads at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    /// Agency id, decimal `0..=255`.
    pub id: String,

    /// `host:port` of the lottery service.
    pub server_address: String,

    /// Bets per batch, `1..=255`.
    pub batch_max_amount: u32,

    /// Pause between batches, in milliseconds.
    pub loop_period_ms: Option<u64>,

    pub strategy: ConnectionStrategy,

    /// CSV file with the agency's bets.
    pub bets_path: PathBuf,

    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            server_address: String::new(),
            batch_max_amount: u32::from(SessionConfig::DEFAULT_BATCH_MAX),
            loop_period_ms: None,
            strategy: ConnectionStrategy::default(),
            bets_path: PathBuf::from("agency.csv"),
            log_level: "info".to_string(),
        }
    }
}

/// Values that take precedence over the file. `None` leaves the field
/// alone.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub id: Option<String>,
    pub server_address: Option<String>,
    pub batch_max_amount: Option<u32>,
    pub loop_period_ms: Option<u64>,
    pub strategy: Option<ConnectionStrategy>,
    pub bets_path: Option<PathBuf>,
    pub log_level: Option<String>,
}

impl AgentConfig {
    /// Reads a JSON config file. Missing fields keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, WagerError> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            WagerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            WagerError::Config(format!("{}: {e}", path.display()))
        })
    }

    /// Builds the config from its three sources, lowest precedence first:
    /// defaults, the file (if any), the overrides.
    pub fn load(
        file: Option<&Path>,
        overrides: ConfigOverrides,
    ) -> Result<Self, WagerError> {
        let mut config = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply(overrides);
        Ok(config)
    }

    pub fn apply(&mut self, overrides: ConfigOverrides) {
        let ConfigOverrides {
            id,
            server_address,
            batch_max_amount,
            loop_period_ms,
            strategy,
            bets_path,
            log_level,
        } = overrides;

        if let Some(id) = id {
            self.id = id;
        }
        if let Some(addr) = server_address {
            self.server_address = addr;
        }
        if let Some(amount) = batch_max_amount {
            self.batch_max_amount = amount;
        }
        if loop_period_ms.is_some() {
            self.loop_period_ms = loop_period_ms;
        }
        if let Some(strategy) = strategy {
            self.strategy = strategy;
        }
        if let Some(path) = bets_path {
            self.bets_path = path;
        }
        if let Some(level) = log_level {
            self.log_level = level;
        }
    }

    /// Checks ranges and produces the session's view of the config.
    pub fn validate(&self) -> Result<SessionConfig, WagerError> {
        let client_id: ClientId = self
            .id
            .parse()
            .map_err(|e| WagerError::Config(format!("id: {e}")))?;

        let batch_max = u8::try_from(self.batch_max_amount)
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| {
                WagerError::Config(format!(
                    "batch_max_amount must be between 1 and 255, got {}",
                    self.batch_max_amount
                ))
            })?;

        SessionConfig {
            client_id,
            server_address: self.server_address.clone(),
            batch_max,
            inter_batch_delay: self.loop_period_ms.map(Duration::from_millis),
            strategy: self.strategy,
        }
        .validated()
        .map_err(|e| WagerError::Config(e.to_string()))
    }
}
