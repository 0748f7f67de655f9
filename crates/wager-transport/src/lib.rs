//! Transport layer for the wager agent.
//!
//! Provides the reliable byte channel the session talks through:
//!
//! - [`read_full`] / [`write_full`] — loop partial reads/writes on any
//!   tokio stream until the whole buffer is satisfied.
//! - [`TcpChannel`] — a connected TCP socket with idempotent close and a
//!   read half that can be lent to another task.
//!
//! No retries happen here. A failure is reported once, with the number of
//! bytes that did make it, and the caller decides what to do next.

mod error;
mod tcp;

pub use error::TransportError;
pub use tcp::{ChannelReader, TcpChannel};

use std::fmt;
use std::io::ErrorKind;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

/// Opaque identifier for a channel, used to tell connections apart in logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChannelId(u64);

impl ChannelId {
    /// Creates a new `ChannelId` from a raw `u64`.
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Reads until `buf` is completely filled.
///
/// A zero-length read means the peer closed the stream and is reported as
/// [`TransportError::EndOfStream`], separately from other I/O failures.
pub async fn read_full<R>(
    reader: &mut R,
    buf: &mut [u8],
) -> Result<usize, TransportError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let expected = buf.len();
    let mut read = 0;
    while read < expected {
        match reader.read(&mut buf[read..]).await {
            Ok(0) => {
                return Err(TransportError::EndOfStream { read, expected });
            }
            Ok(n) => read += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => return Err(TransportError::Read { read, source }),
        }
    }
    Ok(read)
}

/// Writes until every byte of `data` has been accepted by the stream.
pub async fn write_full<W>(
    writer: &mut W,
    data: &[u8],
) -> Result<usize, TransportError>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0;
    while written < data.len() {
        match writer.write(&data[written..]).await {
            Ok(0) => {
                return Err(TransportError::Write {
                    written,
                    source: ErrorKind::WriteZero.into(),
                });
            }
            Ok(n) => written += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(source) => {
                return Err(TransportError::Write { written, source });
            }
        }
    }
    writer
        .flush()
        .await
        .map_err(|source| TransportError::Write { written, source })?;
    Ok(written)
}
