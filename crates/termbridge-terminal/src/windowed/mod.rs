/// Windowed (iTerm2) backend: a connection-based session API
///
/// Unlike the scripted backend there is a real handle to hold on to here, so
/// the backend is an explicit state machine over an owned session triple
/// (connection, application, active session). The triple is created lazily on
/// the first command, survives across calls, and is nulled on any failure or
/// cleanup so the next call restarts from Disconnected.
mod api;

pub use api::{ItermApi, WindowedApi, WindowedApp, WindowedConnection, WindowedSessionHandle};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use super::backend::{CommandRequest, ExecutionResult, TerminalBackend};
use super::error::GatewayError;
use super::extract::output_after_command;
use super::poll::{poll_until_settled, PollOutcome, PollStatus};
use super::retry::retry_with_delay;
use super::{
    CLOSE_TIMEOUT, CONNECT_MAX_ATTEMPTS, CONNECT_RETRY_DELAY, CONNECT_SETTLE_DELAY,
    OUTPUT_NOT_CAPTURED, WINDOWED_POLL_INTERVAL, WINDOWED_QUIET_PERIOD, WINDOWED_SETTLE_DELAY,
};

/// Where the backend is in its connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No session triple; the next command connects first.
    Disconnected,
    /// Mid-acquisition. Transient; never observed between calls.
    Connecting,
    /// Session triple held; commands go straight to the session.
    SessionReady,
    /// Acquisition failed; handles are cleared and the next command retries
    /// from scratch.
    Degraded,
}

/// Timing knobs, defaulted from the crate constants. Tests shrink these.
#[derive(Debug, Clone)]
pub struct WindowedTuning {
    pub connect_settle_delay: Duration,
    pub connect_max_attempts: usize,
    pub connect_retry_delay: Duration,
    pub submit_settle_delay: Duration,
    pub poll_interval: Duration,
    pub quiet_period: Duration,
    pub close_timeout: Duration,
}

impl Default for WindowedTuning {
    fn default() -> Self {
        Self {
            connect_settle_delay: CONNECT_SETTLE_DELAY,
            connect_max_attempts: CONNECT_MAX_ATTEMPTS,
            connect_retry_delay: CONNECT_RETRY_DELAY,
            submit_settle_delay: WINDOWED_SETTLE_DELAY,
            poll_interval: WINDOWED_POLL_INTERVAL,
            quiet_period: WINDOWED_QUIET_PERIOD,
            close_timeout: CLOSE_TIMEOUT,
        }
    }
}

pub struct WindowedTerminalBackend {
    api: Box<dyn WindowedApi>,
    tuning: WindowedTuning,
    state: ConnectionState,
    connection: Option<Box<dyn WindowedConnection>>,
    app: Option<Box<dyn WindowedApp>>,
    session: Option<Box<dyn WindowedSessionHandle>>,
}

impl WindowedTerminalBackend {
    /// Production backend driving iTerm2.
    pub fn new() -> Self {
        Self::with_api(Box::new(ItermApi::new()))
    }

    pub fn with_api(api: Box<dyn WindowedApi>) -> Self {
        Self::with_tuning(api, WindowedTuning::default())
    }

    pub fn with_tuning(api: Box<dyn WindowedApi>, tuning: WindowedTuning) -> Self {
        Self {
            api,
            tuning,
            state: ConnectionState::Disconnected,
            connection: None,
            app: None,
            session: None,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Drop the session triple. The next command restarts at Connecting.
    fn invalidate(&mut self, state: ConnectionState) {
        self.connection = None;
        self.app = None;
        self.session = None;
        self.state = state;
    }

    /// Disconnected/Degraded → Connecting → SessionReady, or an error with
    /// nothing held.
    async fn ensure_session(&mut self) -> Result<()> {
        if self.state == ConnectionState::SessionReady && self.session.is_some() {
            return Ok(());
        }

        self.state = ConnectionState::Connecting;

        // The bootstrap script only puts the app in a connectable state; its
        // failure is not yet fatal.
        if let Err(e) = self.api.bootstrap().await {
            warn!("Windowed app bootstrap script failed: {e:#}");
        }
        tokio::time::sleep(self.tuning.connect_settle_delay).await;

        let api = &self.api;
        let connection = retry_with_delay(
            "windowed connection",
            self.tuning.connect_max_attempts,
            self.tuning.connect_retry_delay,
            || api.connect(),
        )
        .await?;

        let app = connection.app().await?;

        let windows = app.window_ids().await?;
        let Some(window_id) = windows.first().cloned() else {
            bail!("no windows found even after initialization");
        };
        debug!(count = windows.len(), "Enumerated windows");

        let tabs = app.tab_ids(&window_id).await?;
        let Some(tab_id) = tabs.first().cloned() else {
            bail!("no tabs found even after initialization");
        };

        let session = app.active_session(&window_id, &tab_id).await?;

        self.connection = Some(connection);
        self.app = Some(app);
        self.session = Some(session);
        self.state = ConnectionState::SessionReady;
        Ok(())
    }

    /// Submit the command to the held session and infer completion from the
    /// screen's line count going quiet.
    async fn run_in_session(&self, request: &CommandRequest) -> Result<ExecutionResult> {
        let session = self
            .session
            .as_ref()
            .ok_or_else(|| anyhow!("no active session"))?;

        session.send_text(&format!("{}\n", request.command)).await?;

        if !request.wait_for_output {
            return Ok(ExecutionResult::ok(OUTPUT_NOT_CAPTURED));
        }

        tokio::time::sleep(self.tuning.submit_settle_delay).await;

        let mut last_count: Option<usize> = None;
        let outcome = poll_until_settled(
            || session.screen_lines(),
            |lines: &Vec<String>| {
                let count = lines.len();
                if last_count != Some(count) {
                    last_count = Some(count);
                    PollStatus::Changed
                } else {
                    PollStatus::Unchanged
                }
            },
            request.timeout,
            Some(self.tuning.quiet_period),
            self.tuning.poll_interval,
        )
        .await?;

        let deadline_hit = matches!(outcome, PollOutcome::DeadlineElapsed(_));
        let lines = session.screen_lines().await?;
        let text = lines.join("\n");
        let output = output_after_command(&text, &request.command).unwrap_or(text);

        Ok(if deadline_hit {
            ExecutionResult::may_still_be_running(output, request.timeout)
        } else {
            ExecutionResult::ok(output)
        })
    }
}

impl Default for WindowedTerminalBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TerminalBackend for WindowedTerminalBackend {
    async fn run(&mut self, request: &CommandRequest) -> ExecutionResult {
        if let Err(e) = self.ensure_session().await {
            warn!("Failed to acquire windowed session: {e:#}");
            self.invalidate(ConnectionState::Degraded);
            return GatewayError::SessionUnavailable.into_result();
        }

        match self.run_in_session(request).await {
            Ok(result) => result,
            Err(e) => {
                // The session handle can no longer be trusted.
                self.invalidate(ConnectionState::Degraded);
                GatewayError::Spawn(e.to_string()).into_result()
            }
        }
    }

    fn identity(&self) -> &str {
        "windowed"
    }

    async fn cleanup(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            match tokio::time::timeout(self.tuning.close_timeout, connection.close()).await {
                Ok(Ok(())) => debug!("Windowed connection closed"),
                Ok(Err(e)) => warn!("Error closing windowed connection: {e:#}"),
                Err(_) => warn!("Windowed connection close timed out"),
            }
        }
        // References are cleared even when close fails.
        self.invalidate(ConnectionState::Disconnected);
    }
}
