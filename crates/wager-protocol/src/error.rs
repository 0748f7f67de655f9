//! Error types for the protocol layer.
//!
//! Two enums, split by who is at fault:
//!
//! - [`FormatError`] — our own data has the wrong shape (a date that is not
//!   ten characters, a batch of 300 bets). Local and never retried.
//! - [`ProtocolError`] — the peer sent something outside the expected set,
//!   the stream broke underneath us, or the read was cancelled.

use wager_transport::TransportError;

/// Invalid input data: the record or frame cannot be encoded or decoded.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FormatError {
    /// The client identifier is not a number in `0..=255`.
    #[error("invalid client id {0:?}: must be a number in 0..=255")]
    InvalidClientId(String),

    /// A length-prefixed text field does not fit its one-byte length.
    #[error("{field} is {len} bytes long, limit is 255")]
    FieldTooLong { field: &'static str, len: usize },

    /// The birth date is not exactly ten bytes.
    #[error("birth date must be exactly 10 bytes, got {len}")]
    InvalidBirthDate { len: usize },

    /// More bets than the one-byte count can describe.
    #[error("batch holds {0} bets, limit is 255")]
    BatchTooLarge(usize),

    /// A numeric text field did not parse into its fixed width.
    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    /// The frame ended before a field was complete.
    #[error("frame truncated: needed {needed} bytes, {remaining} left")]
    Truncated { needed: usize, remaining: usize },

    /// A text field held bytes that are not UTF-8.
    #[error("{field} is not valid UTF-8")]
    InvalidUtf8 { field: &'static str },

    /// The frame did not start with the expected message id.
    #[error("unexpected message id {actual:#04x}, expected {expected:#04x}")]
    UnexpectedMessageId { expected: u8, actual: u8 },

    /// Bytes were left over after the last bet.
    #[error("{0} trailing bytes after last bet")]
    TrailingBytes(usize),
}

/// Failures while talking to the peer.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    /// The confirmation byte was neither `ACK` nor `ERR`.
    #[error("unexpected confirmation byte {0:#04x}")]
    UnexpectedConfirmation(u8),

    /// A message started with the wrong id.
    #[error("unexpected message id {actual:#04x}, expected {expected:#04x}")]
    UnexpectedMessageId { expected: u8, actual: u8 },

    /// The stream failed underneath the protocol.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The cancellation token fired before the read completed.
    #[error("operation cancelled")]
    Cancelled,
}
