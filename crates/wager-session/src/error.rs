//! Error types for the session layer.

use wager_protocol::{FormatError, ProtocolError};
use wager_transport::TransportError;

/// Errors that end a session.
///
/// Cancellation is deliberately absent: a shutdown request is a normal
/// outcome ([`SessionOutcome::Cancelled`](crate::SessionOutcome::Cancelled)),
/// not a failure.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// Opening the connection failed.
    #[error("connect failed: {0}")]
    Connect(#[source] TransportError),

    /// Writing a batch or the final ack failed.
    #[error("write failed: {0}")]
    Write(#[source] TransportError),

    /// Reading a confirmation byte failed.
    #[error("read failed: {0}")]
    Read(#[source] TransportError),

    /// The peer broke the protocol, or the stream broke during the
    /// winners announcement.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// A frame the session builds itself could not be encoded.
    #[error("encode failed: {0}")]
    Format(#[from] FormatError),

    /// The session was configured with values it cannot run with.
    #[error("invalid session config: {0}")]
    InvalidConfig(String),
}

impl SessionError {
    /// Returns `true` if the peer closed the connection under us.
    pub fn is_peer_closed(&self) -> bool {
        match self {
            Self::Connect(e) | Self::Write(e) | Self::Read(e) => {
                e.is_end_of_stream()
            }
            Self::Protocol(ProtocolError::Transport(e)) => e.is_end_of_stream(),
            _ => false,
        }
    }
}
