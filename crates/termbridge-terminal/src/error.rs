/// Error taxonomy for the gateway.
///
/// These never cross a backend's public contract as errors: each boundary
/// converts them into an [`ExecutionResult`](crate::ExecutionResult).
use std::time::Duration;
use thiserror::Error;

use crate::backend::{BackendKind, ExecutionResult};

#[derive(Debug, Error)]
pub enum GatewayError {
    /// The command filter rejected the command; no backend was invoked.
    #[error("Command not allowed: {0}")]
    Denied(String),

    /// The backend failed to start the command at all.
    #[error("Error executing command: {0}")]
    Spawn(String),

    /// Hard deadline: the process was killed and reports failure.
    #[error("Command timed out after {} seconds", .0.as_secs())]
    HardTimeout(Duration),

    /// The windowed backend exhausted its connection retries.
    #[error("Failed to get iTerm2 session")]
    SessionUnavailable,

    /// An explicitly requested backend is not available on this platform.
    #[error("Backend '{kind}' is not supported on {platform}")]
    Unsupported { kind: BackendKind, platform: String },
}

impl GatewayError {
    /// Collapse into the uniform result shape: always `success == false`
    /// with the error text, never a panic or a propagated error.
    pub fn into_result(self) -> ExecutionResult {
        ExecutionResult::failed(self.to_string())
    }
}

impl From<GatewayError> for ExecutionResult {
    fn from(err: GatewayError) -> Self {
        err.into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hard_timeout_names_the_duration() {
        let result = GatewayError::HardTimeout(Duration::from_secs(7)).into_result();
        assert!(!result.success);
        assert!(result.error.unwrap().contains("7 seconds"));
        assert!(result.exit_code.is_none());
    }

    #[test]
    fn denial_carries_the_reason() {
        let result: ExecutionResult = GatewayError::Denied("Command blacklisted: rm".into()).into();
        assert_eq!(
            result.error.as_deref(),
            Some("Command not allowed: Command blacklisted: rm")
        );
    }
}
