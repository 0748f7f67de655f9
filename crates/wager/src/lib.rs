//! # Wager
//!
//! Client for a national lottery's bet aggregation service.
//!
//! An agency loads its bets from a CSV file, sends them to the service in
//! bounded batches over TCP, waits for a one-byte confirmation after each,
//! then reads the list of winners and acknowledges it. A termination
//! signal stops the run at the next suspension point and closes the
//! connection.
//!
//! The work is layered, lowest first:
//!
//! - `wager-transport` — TCP channel with full-read and full-write
//! - `wager-protocol` — bets, batches, and the binary wire format
//! - `wager-session` — the batch-and-confirm loop with cancellation
//! - `wager` — configuration, the bets file, signals, the binary
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wager::prelude::*;
//!
//! # async fn run() -> Result<(), WagerError> {
//! let config = AgentConfig {
//!     id: "1".into(),
//!     server_address: "server:12345".into(),
//!     ..AgentConfig::default()
//! };
//! let agency = Agency::from_config(&config)?;
//!
//! let cancel = CancellationToken::new();
//! spawn_signal_listener(cancel.clone());
//! let outcome = agency.run(cancel).await?;
//! # Ok(())
//! # }
//! ```

mod agent;
mod config;
mod error;
mod records;

pub use agent::{Agency, exit_code, exit_status, spawn_signal_listener};
pub use config::{AgentConfig, ConfigOverrides};
pub use error::WagerError;
pub use records::{load_bets, parse_bets};

pub mod prelude {
    pub use crate::{
        Agency, AgentConfig, ConfigOverrides, WagerError, exit_code,
        load_bets, spawn_signal_listener,
    };
    pub use tokio_util::sync::CancellationToken;
    pub use wager_protocol::{Bet, ClientId, WinnersAnnouncement};
    pub use wager_session::{
        Action, BatchStats, ConnectionStrategy, EventSink, SessionConfig,
        SessionEvent, SessionOutcome, TracingSink,
    };
}
