//! Structured session events and the sink they are reported to.
//!
//! The session never logs on its own. It hands every notable step to an
//! [`EventSink`] passed in by the caller: [`TracingSink`] in the binary,
//! a recording sink in tests.

use std::fmt;
use std::net::SocketAddr;

use wager_protocol::ClientId;
use wager_transport::ChannelId;

/// The step the session was performing, used as the `action` of a log
/// line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Connect,
    WriteBatch,
    ReceiveConfirmation,
    DecodeConfirmation,
    InterBatchDelay,
    ReceiveWinners,
    WriteFinalAck,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Connect => "connect",
            Self::WriteBatch => "write_batch",
            Self::ReceiveConfirmation => "receive_confirmation",
            Self::DecodeConfirmation => "decode_confirmation",
            Self::InterBatchDelay => "inter_batch_delay",
            Self::ReceiveWinners => "receive_winners",
            Self::WriteFinalAck => "write_final_ack",
        };
        f.write_str(name)
    }
}

/// Something the session did or observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A connection was opened.
    Connected { channel: ChannelId, peer: SocketAddr },

    /// A batch was acknowledged. `cursor` is the record index just past it.
    BatchSent {
        size: usize,
        cursor: usize,
        is_last: bool,
    },

    /// The peer answered `ERR`; the batch is dropped and the run goes on.
    BatchRejected { size: usize, cursor: usize },

    /// The batch could not be encoded and was never sent.
    BatchSkipped { size: usize, reason: String },

    /// Every record has been through a batch attempt.
    AllBetsSent { total: usize },

    /// One winning id from the announcement.
    WinnerId { id: u32 },

    /// The announcement was read in full.
    WinnersReceived { count: usize },

    /// The final `ACK` reached the peer.
    FinalAckSent,

    /// A step failed. `peer_closed` is set when the peer hung up.
    Failed {
        action: Action,
        error: String,
        peer_closed: bool,
    },

    /// The cancellation signal was observed during `during`.
    Cancelled { during: Action },

    /// A connection was closed.
    ConnectionClosed { channel: ChannelId },
}

/// Receives session events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &SessionEvent);
}

/// An [`EventSink`] that writes every event to `tracing`.
#[derive(Debug, Clone, Copy)]
pub struct TracingSink {
    client_id: ClientId,
}

impl TracingSink {
    pub fn new(client_id: ClientId) -> Self {
        Self { client_id }
    }
}

impl EventSink for TracingSink {
    fn record(&self, event: &SessionEvent) {
        let client_id = self.client_id.0;
        match event {
            SessionEvent::Connected { channel, peer } => tracing::info!(
                client_id, action = "connect", result = "success",
                %channel, %peer, "connected"
            ),
            SessionEvent::BatchSent {
                size,
                cursor,
                is_last,
            } => tracing::info!(
                client_id, action = "batch_sent", result = "success",
                batch_size = size, cursor, is_last, "batch acknowledged"
            ),
            SessionEvent::BatchRejected { size, cursor } => tracing::warn!(
                client_id, action = "batch_sent", result = "rejected",
                batch_size = size, cursor, "batch rejected by server"
            ),
            SessionEvent::BatchSkipped { size, reason } => tracing::error!(
                client_id, action = "encode_batch", result = "fail",
                batch_size = size, error = %reason, "batch skipped"
            ),
            SessionEvent::AllBetsSent { total } => tracing::info!(
                client_id, action = "send_bets", result = "success",
                total, "all bets sent"
            ),
            SessionEvent::WinnerId { id } => tracing::debug!(
                client_id, action = "winner", winner_id = id, "winner received"
            ),
            SessionEvent::WinnersReceived { count } => tracing::info!(
                client_id, action = "receive_winners", result = "success",
                winners = count, "winners received"
            ),
            SessionEvent::FinalAckSent => tracing::info!(
                client_id, action = "write_final_ack", result = "success",
                "final ack sent"
            ),
            SessionEvent::Failed {
                action,
                peer_closed: true,
                ..
            } => tracing::warn!(
                client_id, action = %action, result = "fail",
                error = "connection closed by server", "step failed"
            ),
            SessionEvent::Failed { action, error, .. } => tracing::error!(
                client_id, action = %action, result = "fail",
                error = %error, "step failed"
            ),
            SessionEvent::Cancelled { during } => tracing::info!(
                client_id, action = "shutdown", result = "success",
                during = %during, "termination requested"
            ),
            SessionEvent::ConnectionClosed { channel } => tracing::info!(
                client_id, action = "close_connection", result = "success",
                %channel, "connection closed"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_names() {
        assert_eq!(Action::Connect.to_string(), "connect");
        assert_eq!(Action::ReceiveWinners.to_string(), "receive_winners");
        assert_eq!(Action::WriteFinalAck.to_string(), "write_final_ack");
    }

    #[test]
    fn test_tracing_sink_accepts_every_event() {
        // No subscriber installed: this only checks nothing panics.
        let sink = TracingSink::new(ClientId(1));
        let channel = ChannelId::new(1);
        for event in [
            SessionEvent::Connected {
                channel,
                peer: "127.0.0.1:1".parse().unwrap(),
            },
            SessionEvent::BatchSent { size: 2, cursor: 2, is_last: false },
            SessionEvent::BatchRejected { size: 2, cursor: 4 },
            SessionEvent::BatchSkipped { size: 1, reason: "bad".into() },
            SessionEvent::AllBetsSent { total: 5 },
            SessionEvent::WinnerId { id: 7 },
            SessionEvent::WinnersReceived { count: 1 },
            SessionEvent::FinalAckSent,
            SessionEvent::Failed {
                action: Action::ReceiveWinners,
                error: "eof".into(),
                peer_closed: true,
            },
            SessionEvent::Cancelled { during: Action::Connect },
            SessionEvent::ConnectionClosed { channel },
        ] {
            sink.record(&event);
        }
    }
}
