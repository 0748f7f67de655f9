//! TCP implementation of the reliable byte channel.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};

use crate::{ChannelId, TransportError, read_full, write_full};

/// Counter for generating unique channel IDs.
static NEXT_CHANNEL_ID: AtomicU64 = AtomicU64::new(1);

/// The read half of a [`TcpChannel`], lent out while a blocking read runs
/// on another task.
pub type ChannelReader = OwnedReadHalf;

/// A connected TCP stream with full-length reads and writes.
///
/// The socket is split so the read half can be moved into a background
/// task ([`take_reader`](Self::take_reader)) while the owner keeps the
/// write half. The descriptor is released once both halves are dropped.
pub struct TcpChannel {
    id: ChannelId,
    peer: SocketAddr,
    reader: Option<OwnedReadHalf>,
    writer: Option<OwnedWriteHalf>,
    closed: bool,
}

impl TcpChannel {
    /// Connects to `addr`. No retries.
    pub async fn open(addr: &str) -> Result<Self, TransportError> {
        let stream = TcpStream::connect(addr).await.map_err(|source| {
            TransportError::Connect {
                addr: addr.to_string(),
                source,
            }
        })?;
        let peer = stream.peer_addr().map_err(|source| {
            TransportError::Connect {
                addr: addr.to_string(),
                source,
            }
        })?;
        let id = ChannelId::new(NEXT_CHANNEL_ID.fetch_add(1, Ordering::Relaxed));
        // Small request/response frames; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            tracing::debug!(%id, error = %e, "set_nodelay failed");
        }
        tracing::debug!(%id, %peer, "channel opened");

        let (reader, writer) = stream.into_split();
        Ok(Self {
            id,
            peer,
            reader: Some(reader),
            writer: Some(writer),
            closed: false,
        })
    }

    /// Returns the unique identifier for this channel.
    pub fn id(&self) -> ChannelId {
        self.id
    }

    /// Returns the address of the remote peer.
    pub fn peer_addr(&self) -> SocketAddr {
        self.peer
    }

    /// Returns `true` once [`close`](Self::close) has run.
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Writes all of `data`, returning the number of bytes written.
    pub async fn write_full(
        &mut self,
        data: &[u8],
    ) -> Result<usize, TransportError> {
        let writer = self.writer.as_mut().ok_or(TransportError::Closed)?;
        write_full(writer, data).await
    }

    /// Fills `buf` completely from the socket.
    ///
    /// Fails with [`TransportError::Closed`] if the channel is closed or its
    /// read half is currently lent out.
    pub async fn read_full(
        &mut self,
        buf: &mut [u8],
    ) -> Result<usize, TransportError> {
        let reader = self.reader.as_mut().ok_or(TransportError::Closed)?;
        read_full(reader, buf).await
    }

    /// Lends the read half out. Returns `None` if it is already lent or
    /// the channel is closed.
    pub fn take_reader(&mut self) -> Option<ChannelReader> {
        self.reader.take()
    }

    /// Gives a previously lent read half back. Dropped if the channel has
    /// been closed in the meantime.
    pub fn restore_reader(&mut self, reader: ChannelReader) {
        if !self.closed {
            self.reader = Some(reader);
        }
    }

    /// Shuts the socket down and releases both halves.
    ///
    /// Idempotent: returns `true` only for the call that actually closed it.
    pub async fn close(&mut self) -> bool {
        if self.closed {
            return false;
        }
        self.closed = true;
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.shutdown().await {
                tracing::debug!(id = %self.id, error = %e, "shutdown failed");
            }
        }
        self.reader = None;
        tracing::debug!(id = %self.id, "channel closed");
        true
    }
}
