//! Unified error type for the wager agent.

use std::path::PathBuf;

use wager_protocol::{FormatError, ProtocolError};
use wager_session::SessionError;
use wager_transport::TransportError;

/// Top-level error that wraps every layer's error.
///
/// The binary deals with this one type. Each `#[from]` variant lets `?`
/// lift a layer error without a manual conversion.
#[derive(Debug, thiserror::Error)]
pub enum WagerError {
    /// A connection-level failure.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// A record that cannot be framed.
    #[error(transparent)]
    Format(#[from] FormatError),

    /// The peer broke the protocol.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The session loop failed.
    #[error(transparent)]
    Session(#[from] SessionError),

    /// Missing, malformed or out-of-range configuration.
    #[error("invalid config: {0}")]
    Config(String),

    /// The bets file could not be read.
    #[error("cannot read bets from {}: {source}", path.display())]
    Records {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}
