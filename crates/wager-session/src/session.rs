//! The session loop: connect, send batches, await confirmations, then poll
//! for the winners announcement.
//!
//! ```text
//! Disconnected → Connected → Sending(cursor) → AwaitingAck ─┐
//!                               ↑                           │
//!                               └──────── more bets ────────┤
//!                                                           ▼
//!                 Closed ← Acknowledged ← PollingWinners ← Finished
//! ```
//!
//! Any state goes to `Closed` on cancellation or on an unrecoverable I/O
//! failure. The exchange is strictly request/response: the confirmation
//! for batch N is read before batch N+1 is written.
//!
//! # Cancellation
//!
//! The token is checked before every suspension point and raced against
//! it while suspended. Blocking reads run on a spawned task that owns the
//! socket's read half and replies on a oneshot channel; on cancellation
//! the task is aborted and whatever it would have produced is discarded.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio_util::sync::CancellationToken;
use wager_protocol::{
    Batch, Bet, Confirmation, ProtocolError, WinnersAnnouncement,
    decode_confirmation, decode_winners_announcement, encode_final_ack,
};
use wager_transport::{ChannelReader, TcpChannel, TransportError, read_full};

use crate::{
    Action, ConnectionStrategy, EventSink, SessionConfig, SessionError,
    SessionEvent,
};

// ---------------------------------------------------------------------------
// Public types
// ---------------------------------------------------------------------------

/// Where the loop is in its state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connected,
    Sending { cursor: usize },
    AwaitingAck,
    Finished,
    PollingWinners,
    Acknowledged,
    Closed,
}

/// Per-run batch counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchStats {
    /// Batches written to the peer.
    pub sent: usize,
    /// Batches the peer answered with `ACK`.
    pub acked: usize,
    /// Batches the peer answered with `ERR`.
    pub rejected: usize,
    /// Batches that failed to encode and were never sent.
    pub skipped: usize,
    /// Batches lost to a connection failure (per-batch strategy only).
    pub failed: usize,
}

/// How a run ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// Every batch was attempted, the winners were read and acknowledged.
    Completed {
        cursor: usize,
        stats: BatchStats,
        winners: WinnersAnnouncement,
    },

    /// The cancellation signal stopped the run during `during`.
    Cancelled {
        cursor: usize,
        stats: BatchStats,
        during: Action,
    },
}

// ---------------------------------------------------------------------------
// Internal control flow
// ---------------------------------------------------------------------------

/// Why a step stopped the loop.
enum Halt {
    Cancelled(Action),
    Failed { action: Action, error: SessionError },
}

impl Halt {
    fn failed(action: Action, error: impl Into<SessionError>) -> Self {
        Self::Failed {
            action,
            error: error.into(),
        }
    }
}

/// The slice of records the next batch covers.
#[derive(Debug, Clone, Copy)]
struct BatchRange {
    start: usize,
    end: usize,
    is_last: bool,
}

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// One client run over a fixed list of bets.
///
/// The session exclusively owns its connection and closes it on every exit
/// path. Batches borrow from `bets`; the cursor into it only moves forward.
pub struct Session<'a> {
    config: SessionConfig,
    bets: &'a [Bet],
    cancel: CancellationToken,
    sink: Arc<dyn EventSink>,
    channel: Option<TcpChannel>,
    cursor: usize,
    batches_started: usize,
    /// Set once a frame with `is_last` has been written.
    last_batch_sent: bool,
    state: SessionState,
    stats: BatchStats,
}

impl<'a> Session<'a> {
    /// Creates a session. Nothing touches the network until
    /// [`run`](Self::run).
    pub fn new(
        config: SessionConfig,
        bets: &'a [Bet],
        cancel: CancellationToken,
        sink: Arc<dyn EventSink>,
    ) -> Result<Self, SessionError> {
        Ok(Self {
            config: config.validated()?,
            bets,
            cancel,
            sink,
            channel: None,
            cursor: 0,
            batches_started: 0,
            last_batch_sent: false,
            state: SessionState::Disconnected,
            stats: BatchStats::default(),
        })
    }

    /// Index of the first record not yet taken into a batch.
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Runs the session to completion, cancellation, or failure.
    ///
    /// Cancellation is reported as `Ok(SessionOutcome::Cancelled { .. })`.
    /// Either way the connection is closed before this returns.
    pub async fn run(mut self) -> Result<SessionOutcome, SessionError> {
        tracing::debug!(
            client_id = self.config.client_id.0,
            strategy = %self.config.strategy,
            bets = self.bets.len(),
            batch_max = self.config.batch_max,
            "session starting"
        );

        let result = match self.config.strategy {
            ConnectionStrategy::Persistent => self.run_persistent().await,
            ConnectionStrategy::PerBatch => self.run_per_batch().await,
        };

        match &result {
            Err(Halt::Failed { action, error }) => {
                self.report_failure(*action, error);
            }
            Err(Halt::Cancelled(during)) => {
                self.sink.record(&SessionEvent::Cancelled { during: *during });
            }
            Ok(_) => {}
        }

        self.close_channel().await;
        self.set_state(SessionState::Closed);

        match result {
            Ok(winners) => Ok(SessionOutcome::Completed {
                cursor: self.cursor,
                stats: self.stats,
                winners,
            }),
            Err(Halt::Cancelled(during)) => Ok(SessionOutcome::Cancelled {
                cursor: self.cursor,
                stats: self.stats,
                during,
            }),
            Err(Halt::Failed { error, .. }) => Err(error),
        }
    }

    /// One connection for everything. Any transport or protocol failure
    /// ends the run.
    async fn run_persistent(&mut self) -> Result<WinnersAnnouncement, Halt> {
        self.connect().await?;
        while let Some(range) = self.next_batch() {
            self.pause_between_batches().await?;
            self.exchange(range).await?;
        }
        self.mark_last_batch().await?;
        self.poll_winners().await
    }

    /// A fresh connection per batch. A failure costs only the batch in
    /// flight; the winners step gets its own connection, and losing that
    /// one ends the run.
    async fn run_per_batch(&mut self) -> Result<WinnersAnnouncement, Halt> {
        while let Some(range) = self.next_batch() {
            self.pause_between_batches().await?;

            match self.connect().await {
                Ok(()) => {}
                Err(Halt::Failed { action, error }) => {
                    self.abandon(range);
                    self.report_failure(action, &error);
                    continue;
                }
                Err(halt) => return Err(halt),
            }

            match self.exchange(range).await {
                Ok(()) => {}
                Err(Halt::Failed { action, error }) => {
                    self.stats.failed += 1;
                    self.report_failure(action, &error);
                }
                Err(halt) => return Err(halt),
            }
            self.close_channel().await;
        }

        self.connect().await?;
        self.mark_last_batch().await?;
        self.poll_winners().await
    }

    // -----------------------------------------------------------------------
    // Steps
    // -----------------------------------------------------------------------

    /// The next `min(batch_max, remaining)` records. An empty record list
    /// still yields one empty final batch so the peer can switch modes.
    fn next_batch(&self) -> Option<BatchRange> {
        let total = self.bets.len();
        let first_of_empty_run = total == 0 && self.batches_started == 0;
        if self.cursor >= total && !first_of_empty_run {
            return None;
        }
        let end = (self.cursor + self.config.batch_max as usize).min(total);
        Some(BatchRange {
            start: self.cursor,
            end,
            is_last: end >= total,
        })
    }

    /// Gives up on a batch that never reached the wire.
    fn abandon(&mut self, range: BatchRange) {
        self.batches_started += 1;
        self.cursor = range.end;
        self.stats.failed += 1;
    }

    async fn connect(&mut self) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled(Action::Connect));
        }
        let addr = self.config.server_address.as_str();
        let channel = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                return Err(Halt::Cancelled(Action::Connect));
            }
            result = TcpChannel::open(addr) => result
                .map_err(|e| Halt::failed(Action::Connect, SessionError::Connect(e)))?,
        };

        self.sink.record(&SessionEvent::Connected {
            channel: channel.id(),
            peer: channel.peer_addr(),
        });
        self.channel = Some(channel);
        self.set_state(SessionState::Connected);
        Ok(())
    }

    async fn pause_between_batches(&mut self) -> Result<(), Halt> {
        let Some(delay) = self.config.inter_batch_delay else {
            return Ok(());
        };
        if self.batches_started == 0 {
            return Ok(());
        }
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                Err(Halt::Cancelled(Action::InterBatchDelay))
            }
            _ = tokio::time::sleep(delay) => Ok(()),
        }
    }

    /// Encodes, writes and confirms one batch.
    ///
    /// The cursor moves past the batch at encode time, so a batch that
    /// fails to encode or is rejected by the peer is not retried. A
    /// cancellation seen before that point leaves the cursor alone.
    async fn exchange(&mut self, range: BatchRange) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled(Action::WriteBatch));
        }
        let bets: &'a [Bet] = self.bets;
        let batch = Batch::new(
            self.config.client_id,
            &bets[range.start..range.end],
            range.is_last,
        );
        let size = range.end - range.start;

        self.batches_started += 1;
        self.set_state(SessionState::Sending {
            cursor: range.start,
        });
        let encoded = batch.encode();
        self.cursor = range.end;

        let encoded = match encoded {
            Ok(data) => data,
            Err(e) => {
                self.stats.skipped += 1;
                self.sink.record(&SessionEvent::BatchSkipped {
                    size,
                    reason: e.to_string(),
                });
                return Ok(());
            }
        };

        self.deliver(&encoded, size, range.is_last).await
    }

    /// Sends an empty final batch if the real one never reached the wire,
    /// so the peer still switches to announcing winners.
    async fn mark_last_batch(&mut self) -> Result<(), Halt> {
        if self.last_batch_sent {
            return Ok(());
        }
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled(Action::WriteBatch));
        }
        tracing::debug!(
            client_id = self.config.client_id.0,
            cursor = self.cursor,
            "final batch was not delivered, sending an empty one"
        );
        let encoded = Batch::new(self.config.client_id, &[], true)
            .encode()
            .map_err(|e| Halt::failed(Action::WriteBatch, e))?;
        self.deliver(&encoded, 0, true).await
    }

    /// Writes an encoded batch and waits for its confirmation.
    async fn deliver(
        &mut self,
        encoded: &[u8],
        size: usize,
        is_last: bool,
    ) -> Result<(), Halt> {
        self.write(Action::WriteBatch, encoded).await?;
        self.stats.sent += 1;
        self.last_batch_sent |= is_last;
        self.set_state(SessionState::AwaitingAck);

        let read = self
            .read_interruptible(
                Action::ReceiveConfirmation,
                |mut reader| async move {
                    let mut byte = [0u8; 1];
                    let result =
                        read_full(&mut reader, &mut byte).await.map(|_| byte[0]);
                    (reader, result)
                },
            )
            .await?;
        let byte = read.map_err(|e| {
            Halt::failed(Action::ReceiveConfirmation, SessionError::Read(e))
        })?;

        match decode_confirmation(byte) {
            Ok(Confirmation::Ack) => {
                self.stats.acked += 1;
                self.sink.record(&SessionEvent::BatchSent {
                    size,
                    cursor: self.cursor,
                    is_last,
                });
                Ok(())
            }
            Ok(Confirmation::Rejected) => {
                self.stats.rejected += 1;
                self.sink.record(&SessionEvent::BatchRejected {
                    size,
                    cursor: self.cursor,
                });
                Ok(())
            }
            Err(e) => Err(Halt::failed(Action::DecodeConfirmation, e)),
        }
    }

    /// Reads the winners announcement over the open channel and answers it
    /// with a single `ACK`.
    async fn poll_winners(&mut self) -> Result<WinnersAnnouncement, Halt> {
        self.set_state(SessionState::Finished);
        self.sink.record(&SessionEvent::AllBetsSent {
            total: self.bets.len(),
        });
        self.set_state(SessionState::PollingWinners);

        let cancel = self.cancel.clone();
        let decoded = self
            .read_interruptible(Action::ReceiveWinners, move |mut reader| {
                async move {
                    let result =
                        decode_winners_announcement(&mut reader, &cancel).await;
                    (reader, result)
                }
            })
            .await?;

        let winners = match decoded {
            Ok(winners) => winners,
            Err(ProtocolError::Cancelled) => {
                return Err(Halt::Cancelled(Action::ReceiveWinners));
            }
            Err(e) => return Err(Halt::failed(Action::ReceiveWinners, e)),
        };

        for &id in &winners.ids {
            self.sink.record(&SessionEvent::WinnerId { id });
        }
        self.sink.record(&SessionEvent::WinnersReceived {
            count: winners.count(),
        });

        self.write(Action::WriteFinalAck, &encode_final_ack()).await?;
        self.set_state(SessionState::Acknowledged);
        self.sink.record(&SessionEvent::FinalAckSent);
        Ok(winners)
    }

    // -----------------------------------------------------------------------
    // Suspension points
    // -----------------------------------------------------------------------

    async fn write(&mut self, action: Action, data: &[u8]) -> Result<(), Halt> {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled(action));
        }
        let channel = self.channel.as_mut().ok_or_else(|| {
            Halt::failed(action, SessionError::Write(TransportError::Closed))
        })?;

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(Halt::Cancelled(action)),
            result = channel.write_full(data) => result
                .map(|_| ())
                .map_err(|e| Halt::failed(action, SessionError::Write(e))),
        }
    }

    /// Runs a blocking read on its own task and waits for either its reply
    /// or the cancellation signal.
    ///
    /// The task borrows the channel's read half and hands it back with its
    /// result. If cancellation wins, the task is aborted and the read half
    /// goes down with it.
    async fn read_interruptible<T, F, Fut>(
        &mut self,
        action: Action,
        op: F,
    ) -> Result<T, Halt>
    where
        F: FnOnce(ChannelReader) -> Fut,
        Fut: Future<Output = (ChannelReader, T)> + Send + 'static,
        T: Send + 'static,
    {
        if self.cancel.is_cancelled() {
            return Err(Halt::Cancelled(action));
        }
        let channel = self.channel.as_mut().ok_or_else(|| {
            Halt::failed(action, SessionError::Read(TransportError::Closed))
        })?;
        let reader = channel.take_reader().ok_or_else(|| {
            Halt::failed(action, SessionError::Read(TransportError::Closed))
        })?;

        let (reply_tx, reply_rx) = oneshot::channel();
        let read = op(reader);
        let task = tokio::spawn(async move {
            let _ = reply_tx.send(read.await);
        });

        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => {
                task.abort();
                Err(Halt::Cancelled(action))
            }
            reply = reply_rx => match reply {
                Ok((reader, value)) => {
                    channel.restore_reader(reader);
                    Ok(value)
                }
                // The read task died without replying.
                Err(_) => Err(Halt::failed(
                    action,
                    SessionError::Read(TransportError::Closed),
                )),
            },
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    async fn close_channel(&mut self) {
        if let Some(mut channel) = self.channel.take() {
            if channel.close().await {
                self.sink.record(&SessionEvent::ConnectionClosed {
                    channel: channel.id(),
                });
            }
        }
    }

    fn report_failure(&self, action: Action, error: &SessionError) {
        self.sink.record(&SessionEvent::Failed {
            action,
            error: error.to_string(),
            peer_closed: error.is_peer_closed(),
        });
    }

    fn set_state(&mut self, next: SessionState) {
        tracing::trace!(from = ?self.state, to = ?next, "session state");
        self.state = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TracingSink;
    use wager_protocol::ClientId;

    fn bets(n: usize) -> Vec<Bet> {
        (0..n)
            .map(|i| {
                Bet::new("Ana", "Paz", i as u32, "1999-03-17", i as u16).unwrap()
            })
            .collect()
    }

    fn session(bets: &[Bet], batch_max: u8) -> Session<'_> {
        let config = SessionConfig {
            batch_max,
            ..SessionConfig::new(ClientId(1), "127.0.0.1:1")
        };
        Session::new(
            config,
            bets,
            CancellationToken::new(),
            Arc::new(TracingSink::new(ClientId(1))),
        )
        .unwrap()
    }

    #[test]
    fn test_next_batch_splits_by_batch_max() {
        let bets = bets(5);
        let mut s = session(&bets, 2);
        let mut sizes = Vec::new();
        let mut last_flags = Vec::new();

        while let Some(range) = s.next_batch() {
            sizes.push(range.end - range.start);
            last_flags.push(range.is_last);
            // Simulate the cursor advance that exchange performs.
            s.batches_started += 1;
            s.cursor = range.end;
        }

        assert_eq!(sizes, vec![2, 2, 1]);
        assert_eq!(last_flags, vec![false, false, true]);
        assert_eq!(s.cursor(), 5);
    }

    #[test]
    fn test_next_batch_exact_multiple_marks_last() {
        let bets = bets(4);
        let mut s = session(&bets, 2);
        let mut flags = Vec::new();
        while let Some(range) = s.next_batch() {
            flags.push(range.is_last);
            s.batches_started += 1;
            s.cursor = range.end;
        }
        assert_eq!(flags, vec![false, true]);
    }

    #[test]
    fn test_next_batch_empty_list_yields_one_empty_last_batch() {
        let mut s = session(&[], 10);

        let range = s.next_batch().expect("one batch for an empty run");
        assert_eq!((range.start, range.end, range.is_last), (0, 0, true));

        s.batches_started += 1;
        assert!(s.next_batch().is_none());
    }

    #[test]
    fn test_abandon_advances_cursor() {
        let bets = bets(3);
        let mut s = session(&bets, 2);
        let range = s.next_batch().unwrap();
        s.abandon(range);
        assert_eq!(s.cursor(), 2);
        assert_eq!(s.stats.failed, 1);
        assert_eq!(s.next_batch().unwrap().start, 2);
    }

    #[test]
    fn test_new_rejects_zero_batch_max() {
        let config = SessionConfig {
            batch_max: 0,
            ..SessionConfig::new(ClientId(1), "127.0.0.1:1")
        };
        let result = Session::new(
            config,
            &[],
            CancellationToken::new(),
            Arc::new(TracingSink::new(ClientId(1))),
        );
        assert!(matches!(result, Err(SessionError::InvalidConfig(_))));
    }

    #[test]
    fn test_initial_state() {
        let s = session(&[], 1);
        assert_eq!(s.state(), SessionState::Disconnected);
        assert_eq!(s.cursor(), 0);
    }
}
