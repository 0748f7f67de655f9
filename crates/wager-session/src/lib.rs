//! Client session loop for the wager agent.
//!
//! A [`Session`] takes an agency's bets, sends them to the aggregation
//! service in bounded batches, waits for a one-byte confirmation after
//! each, then reads the winners announcement and acknowledges it.
//!
//! # Key types
//!
//! - [`Session`] — drives one run over a fixed list of bets
//! - [`SessionConfig`] — client id, server address, batching, strategy
//! - [`SessionOutcome`] — completed with the winners, or cancelled
//! - [`EventSink`] — where the session reports what it does
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use tokio_util::sync::CancellationToken;
//! use wager_protocol::{Bet, ClientId};
//! use wager_session::{Session, SessionConfig, TracingSink};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let bets = vec![Bet::new("Ana", "Paz", 30904465, "1999-03-17", 7574)?];
//! let config = SessionConfig::new(ClientId(1), "server:12345");
//! let sink = Arc::new(TracingSink::new(config.client_id));
//!
//! let session = Session::new(config, &bets, CancellationToken::new(), sink)?;
//! let outcome = session.run().await?;
//! println!("{outcome:?}");
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod events;
mod session;

pub use config::{ConnectionStrategy, SessionConfig};
pub use error::SessionError;
pub use events::{Action, EventSink, SessionEvent, TracingSink};
pub use session::{BatchStats, Session, SessionOutcome, SessionState};
