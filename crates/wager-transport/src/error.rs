/// Errors that can occur in the transport layer.
///
/// Partial progress is always reported: a failed write says how many
/// bytes made it out, a failed read says how many arrived.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Establishing the TCP connection failed.
    #[error("connect to {addr} failed: {source}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// Sending data failed after `written` bytes were accepted.
    #[error("write failed after {written} bytes: {source}")]
    Write {
        written: usize,
        #[source]
        source: std::io::Error,
    },

    /// Receiving data failed after `read` bytes arrived.
    #[error("read failed after {read} bytes: {source}")]
    Read {
        read: usize,
        #[source]
        source: std::io::Error,
    },

    /// The peer closed the stream before the buffer was filled.
    #[error("connection closed by peer after {read} of {expected} bytes")]
    EndOfStream { read: usize, expected: usize },

    /// The channel was already closed locally.
    #[error("channel is closed")]
    Closed,
}

impl TransportError {
    /// Returns `true` if the peer closed the stream.
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, Self::EndOfStream { .. })
    }
}
