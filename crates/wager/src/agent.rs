//! The agency: its bets, its session, and the signal that stops it.

use std::process::ExitCode;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use wager_protocol::Bet;
use wager_session::{
    EventSink, Session, SessionConfig, SessionOutcome, TracingSink,
};

use crate::{AgentConfig, WagerError, load_bets};

/// One lottery agency: the bets it holds and how it reaches the service.
pub struct Agency {
    config: SessionConfig,
    bets: Vec<Bet>,
    sink: Arc<dyn EventSink>,
}

impl Agency {
    /// Creates an agency that reports to `tracing`.
    pub fn new(config: SessionConfig, bets: Vec<Bet>) -> Self {
        let sink: Arc<dyn EventSink> =
            Arc::new(TracingSink::new(config.client_id));
        Self { config, bets, sink }
    }

    /// Validates `config` and loads the bets file it names.
    pub fn from_config(config: &AgentConfig) -> Result<Self, WagerError> {
        let session_config = config.validate()?;
        let bets = load_bets(&config.bets_path)?;
        Ok(Self::new(session_config, bets))
    }

    /// Replaces the event sink.
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn bets(&self) -> &[Bet] {
        &self.bets
    }

    /// Runs one session over all of the agency's bets.
    pub async fn run(
        &self,
        cancel: CancellationToken,
    ) -> Result<SessionOutcome, WagerError> {
        let session = Session::new(
            self.config.clone(),
            &self.bets,
            cancel,
            Arc::clone(&self.sink),
        )?;
        Ok(session.run().await?)
    }
}

// ---------------------------------------------------------------------------
// Termination signal
// ---------------------------------------------------------------------------

/// Spawns a task that cancels `cancel` on SIGTERM or Ctrl-C.
///
/// The task also ends, without doing anything, if `cancel` is cancelled
/// from elsewhere first.
pub fn spawn_signal_listener(cancel: CancellationToken) -> JoinHandle<()> {
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {}
            signal = wait_for_termination() => match signal {
                Ok(name) => {
                    tracing::info!(
                        action = "shutdown", result = "in_progress",
                        signal = name, "termination signal received"
                    );
                    cancel.cancel();
                }
                Err(e) => tracing::warn!(
                    error = %e, "cannot listen for termination signals"
                ),
            },
        }
    })
}

#[cfg(unix)]
async fn wait_for_termination() -> std::io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut term = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = term.recv() => Ok("SIGTERM"),
        result = tokio::signal::ctrl_c() => result.map(|()| "SIGINT"),
    }
}

#[cfg(not(unix))]
async fn wait_for_termination() -> std::io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "ctrl_c")
}

// ---------------------------------------------------------------------------
// Exit status
// ---------------------------------------------------------------------------

/// `0` for a completed or cancelled run, `1` for any error.
pub fn exit_status(result: &Result<SessionOutcome, WagerError>) -> u8 {
    match result {
        Ok(SessionOutcome::Completed { .. }) => 0,
        Ok(SessionOutcome::Cancelled { .. }) => 0,
        Err(_) => 1,
    }
}

/// [`exit_status`] as a process exit code.
pub fn exit_code(result: &Result<SessionOutcome, WagerError>) -> ExitCode {
    ExitCode::from(exit_status(result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wager_protocol::{ClientId, WinnersAnnouncement};
    use wager_session::{Action, BatchStats};

    #[test]
    fn test_exit_status() {
        let completed = Ok(SessionOutcome::Completed {
            cursor: 3,
            stats: BatchStats::default(),
            winners: WinnersAnnouncement { ids: vec![] },
        });
        let cancelled = Ok(SessionOutcome::Cancelled {
            cursor: 0,
            stats: BatchStats::default(),
            during: Action::Connect,
        });
        let failed = Err(WagerError::Config("id".into()));

        assert_eq!(exit_status(&completed), 0);
        assert_eq!(exit_status(&cancelled), 0);
        assert_eq!(exit_status(&failed), 1);
    }

    #[test]
    fn test_from_config_rejects_invalid_config_before_reading_bets() {
        let config = AgentConfig {
            id: "x".into(),
            server_address: "server:1".into(),
            bets_path: "/does/not/exist.csv".into(),
            ..AgentConfig::default()
        };
        let err = Agency::from_config(&config).err().unwrap();
        assert!(matches!(err, WagerError::Config(_)));
    }

    #[tokio::test]
    async fn test_signal_listener_stops_with_token() {
        let cancel = CancellationToken::new();
        let handle = spawn_signal_listener(cancel.clone());
        cancel.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[tokio::test]
    async fn test_run_cancelled_before_connect() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let agency =
            Agency::new(SessionConfig::new(ClientId(1), "127.0.0.1:1"), vec![]);

        let outcome = agency.run(cancel).await.unwrap();
        assert!(matches!(
            outcome,
            SessionOutcome::Cancelled {
                during: Action::Connect,
                ..
            }
        ));
    }
}
