//! Session configuration.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use wager_protocol::ClientId;

use crate::SessionError;

/// How the session manages its TCP connection.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStrategy {
    /// One connection for the whole run, batches and winners alike.
    #[default]
    Persistent,

    /// A fresh connection per batch, closed after its confirmation.
    /// Losing a connection costs only the batch it carried. The winners
    /// step gets one more connection of its own.
    PerBatch,
}

impl fmt::Display for ConnectionStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Persistent => f.write_str("persistent"),
            Self::PerBatch => f.write_str("per_batch"),
        }
    }
}

impl FromStr for ConnectionStrategy {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "persistent" => Ok(Self::Persistent),
            "per_batch" | "per-batch" => Ok(Self::PerBatch),
            other => Err(SessionError::InvalidConfig(format!(
                "unknown connection strategy {other:?}"
            ))),
        }
    }
}

/// Everything the session loop needs besides the bets themselves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Agency identifier sent in every batch header.
    pub client_id: ClientId,

    /// `host:port` of the aggregation service.
    pub server_address: String,

    /// Upper bound on bets per batch. A `u8`, so the one-byte count on
    /// the wire can never overflow.
    pub batch_max: u8,

    /// Pause between consecutive batches. `None` sends back to back.
    pub inter_batch_delay: Option<Duration>,

    /// Connection lifetime policy.
    pub strategy: ConnectionStrategy,
}

impl SessionConfig {
    /// Default bets per batch.
    pub const DEFAULT_BATCH_MAX: u8 = 100;

    /// Creates a persistent-connection config with default batching.
    pub fn new(client_id: ClientId, server_address: impl Into<String>) -> Self {
        Self {
            client_id,
            server_address: server_address.into(),
            batch_max: Self::DEFAULT_BATCH_MAX,
            inter_batch_delay: None,
            strategy: ConnectionStrategy::default(),
        }
    }

    /// Rejects configs the loop cannot make progress with.
    pub fn validated(self) -> Result<Self, SessionError> {
        if self.batch_max == 0 {
            return Err(SessionError::InvalidConfig(
                "batch_max must be at least 1".into(),
            ));
        }
        if self.server_address.trim().is_empty() {
            return Err(SessionError::InvalidConfig(
                "server_address must not be empty".into(),
            ));
        }
        Ok(self)
    }
}
