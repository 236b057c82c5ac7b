/// AppleScript-driven macOS Terminal backend
///
/// The automation bridge is fire-and-forget: `do script` delivers the command
/// to a visible window and gives back nothing. Completion is inferred by
/// polling the window's visible text until the shell has echoed the command
/// and produced further content, so the deadline here is soft — past it the
/// command may well still be running.
use async_trait::async_trait;
use tracing::debug;

use super::backend::{CommandRequest, ExecutionResult, TerminalBackend};
use super::error::GatewayError;
use super::extract::{command_echo_detected, output_after_command};
use super::osascript::{escape_applescript, run_osascript};
use super::poll::{poll_until_settled, PollOutcome, PollStatus};
use super::{OUTPUT_NOT_CAPTURED, SCRIPTED_POLL_INTERVAL};

#[derive(Debug, Default)]
pub struct ScriptedTerminalBackend;

impl ScriptedTerminalBackend {
    pub fn new() -> Self {
        Self
    }

    /// Submit the command to the frontmost Terminal window, creating one if
    /// none exists.
    async fn submit(&self, command: &str) -> anyhow::Result<()> {
        let escaped = escape_applescript(command);
        let script = format!(
            r#"tell application "Terminal"
    activate
    if not (exists window 1) then
        do script ""
    else
        do script "" in window 1
    end if
    do script "{escaped}" in window 1
end tell"#
        );
        run_osascript(&script).await?;
        Ok(())
    }

    async fn window_contents(&self) -> anyhow::Result<String> {
        run_osascript(
            r#"tell application "Terminal"
    contents of window 1
end tell"#,
        )
        .await
    }

    async fn wait_for_output(&self, request: &CommandRequest) -> anyhow::Result<ExecutionResult> {
        let command = request.command.clone();
        let mut longest_seen = 0usize;

        let outcome = poll_until_settled(
            || self.window_contents(),
            |snapshot: &String| {
                if command_echo_detected(snapshot, &command) {
                    return PollStatus::Done;
                }
                if snapshot.len() > longest_seen {
                    longest_seen = snapshot.len();
                    PollStatus::Changed
                } else {
                    PollStatus::Unchanged
                }
            },
            request.timeout,
            None,
            SCRIPTED_POLL_INTERVAL,
        )
        .await?;

        Ok(match outcome {
            PollOutcome::Completed(text) | PollOutcome::Quiet(text) => {
                let output = output_after_command(&text, &request.command).unwrap_or(text);
                ExecutionResult::ok(output)
            }
            PollOutcome::DeadlineElapsed(last) => {
                debug!(
                    timeout_secs = request.timeout.as_secs(),
                    "Terminal window never echoed the command before the deadline"
                );
                ExecutionResult::may_still_be_running(last.unwrap_or_default(), request.timeout)
            }
        })
    }
}

#[async_trait]
impl TerminalBackend for ScriptedTerminalBackend {
    async fn run(&mut self, request: &CommandRequest) -> ExecutionResult {
        if let Err(e) = self.submit(&request.command).await {
            return GatewayError::Spawn(e.to_string()).into_result();
        }

        if !request.wait_for_output {
            return ExecutionResult::ok(OUTPUT_NOT_CAPTURED);
        }

        match self.wait_for_output(request).await {
            Ok(result) => result,
            Err(e) => GatewayError::Spawn(e.to_string()).into_result(),
        }
    }

    fn identity(&self) -> &str {
        "scripted"
    }

    async fn cleanup(&mut self) {
        // The Terminal window belongs to the user; nothing to release.
    }
}
