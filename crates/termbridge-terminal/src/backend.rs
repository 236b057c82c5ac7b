/// Backend abstraction over the three command-execution strategies
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::DEFAULT_COMMAND_TIMEOUT;

/// One command to execute. Built per call and discarded with the result.
#[derive(Debug, Clone)]
pub struct CommandRequest {
    /// Untrusted command text; the filter has the only say on whether it runs.
    pub command: String,
    /// When false, the backend submits the command and returns immediately.
    pub wait_for_output: bool,
    pub timeout: Duration,
}

impl CommandRequest {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            wait_for_output: true,
            timeout: DEFAULT_COMMAND_TIMEOUT,
        }
    }

    pub fn wait_for_output(mut self, wait: bool) -> Self {
        self.wait_for_output = wait;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Uniform result every backend produces.
///
/// `success == false` always carries a non-empty `error`, except that a soft
/// timeout (automation-driven backends, which cannot kill what they started)
/// reports `success == true` plus a `warning` instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

impl ExecutionResult {
    /// Successful completion with captured output.
    pub fn ok(output: impl Into<String>) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            exit_code: None,
            warning: None,
        }
    }

    /// Hard failure with an explanation. Never carries a warning.
    pub fn failed(error: impl Into<String>) -> Self {
        Self {
            success: false,
            output: None,
            error: Some(error.into()),
            exit_code: None,
            warning: None,
        }
    }

    /// Process finished: success mirrors the exit code, both streams reported.
    pub fn exited(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            success: exit_code == 0,
            output: Some(stdout.into()),
            error: Some(stderr.into()),
            exit_code: Some(exit_code),
            warning: None,
        }
    }

    /// Soft timeout: best-effort output plus a warning, never a failure.
    pub fn may_still_be_running(output: impl Into<String>, timeout: Duration) -> Self {
        Self {
            success: true,
            output: Some(output.into()),
            error: None,
            exit_code: None,
            warning: Some(format!(
                "Command may still be running after {} seconds",
                timeout.as_secs()
            )),
        }
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warning = Some(warning.into());
        self
    }
}

/// Terminal backend trait - abstraction over the three execution strategies.
/// All operations must look identical from the caller's perspective.
#[async_trait]
pub trait TerminalBackend: Send + Sync {
    /// Execute one command.
    ///
    /// Never returns an error: every internal failure is converted into an
    /// `ExecutionResult` with `success == false`.
    async fn run(&mut self, request: &CommandRequest) -> ExecutionResult;

    /// Static identity string for this backend.
    fn identity(&self) -> &str;

    /// Release any held resources. Idempotent; never fails.
    async fn cleanup(&mut self);
}

impl std::fmt::Debug for dyn TerminalBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalBackend")
            .field("identity", &self.identity())
            .finish()
    }
}

/// Which backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Direct process spawn; works on all platforms.
    Process,
    /// AppleScript-driven macOS Terminal window.
    Scripted,
    /// iTerm2 session API.
    Windowed,
}

impl std::str::FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s.to_lowercase().as_str() {
            "process" | "subprocess" => Ok(Self::Process),
            "scripted" | "applescript" | "terminal" => Ok(Self::Scripted),
            "windowed" | "iterm" | "iterm2" => Ok(Self::Windowed),
            _ => Err(anyhow::anyhow!(
                "Invalid backend: '{}'. Valid options: 'process', 'scripted', 'windowed'",
                s
            )),
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Process => write!(f, "process"),
            Self::Scripted => write!(f, "scripted"),
            Self::Windowed => write!(f, "windowed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn backend_kind_round_trips_through_strings() {
        for kind in [
            BackendKind::Process,
            BackendKind::Scripted,
            BackendKind::Windowed,
        ] {
            assert_eq!(BackendKind::from_str(&kind.to_string()).unwrap(), kind);
        }
        assert_eq!(
            BackendKind::from_str("iterm2").unwrap(),
            BackendKind::Windowed
        );
        assert!(BackendKind::from_str("screen").is_err());
    }

    #[test]
    fn soft_timeout_is_success_with_warning() {
        let result = ExecutionResult::may_still_be_running("partial", Duration::from_secs(10));
        assert!(result.success);
        assert!(result.error.is_none());
        assert!(result.warning.unwrap().contains("10 seconds"));
    }

    #[test]
    fn exited_mirrors_exit_code() {
        assert!(ExecutionResult::exited(0, "out", "").success);
        assert!(!ExecutionResult::exited(2, "", "boom").success);
    }
}
