/// Gateway facade: admission control in front of one selected backend
use std::time::Duration;
use tracing::{debug, info};

use termbridge_policy::{CommandFilter, FilterConfig};

use super::backend::{BackendKind, CommandRequest, ExecutionResult, TerminalBackend};
use super::error::GatewayError;
use super::selector::select_backend;

/// Everything the surrounding server layer configures: which backend to use
/// (None means auto-detect) and the command-filter policy.
#[derive(Debug, Clone, Default)]
pub struct GatewayConfig {
    pub backend: Option<BackendKind>,
    pub filter: FilterConfig,
}

/// The two entry points the outer layer calls: execute a command, query the
/// backend identity. Owns the filter and exactly one backend instance.
///
/// Session state inside the windowed backend is single-writer; a gateway
/// shared across concurrent callers must be externally serialized.
pub struct TerminalGateway {
    filter: CommandFilter,
    backend: Box<dyn TerminalBackend>,
}

impl TerminalGateway {
    /// Build a gateway for the current platform.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let backend = select_backend(config.backend, std::env::consts::OS)?;
        info!(backend = backend.identity(), "Initialized terminal gateway");
        Ok(Self {
            filter: config.filter.build(),
            backend,
        })
    }

    /// Build a gateway around an already-constructed backend. Used by the
    /// outer layer when it applies its own downgrade policy, and by tests.
    pub fn with_backend(filter: CommandFilter, backend: Box<dyn TerminalBackend>) -> Self {
        Self { filter, backend }
    }

    /// Filter, then delegate. A denied command never reaches the backend.
    pub async fn execute(&mut self, request: &CommandRequest) -> ExecutionResult {
        let decision = self.filter.decide(&request.command);
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "denied by policy".to_string());
            debug!(command = %request.command, %reason, "Command denied");
            return GatewayError::Denied(reason).into_result();
        }

        self.backend.run(request).await
    }

    /// Convenience wrapper matching the external interface shape.
    pub async fn execute_command(
        &mut self,
        command: &str,
        wait_for_output: bool,
        timeout: Duration,
    ) -> ExecutionResult {
        let request = CommandRequest::new(command)
            .wait_for_output(wait_for_output)
            .timeout(timeout);
        self.execute(&request).await
    }

    /// Static identity string for the active backend.
    pub fn backend_identity(&self) -> &str {
        self.backend.identity()
    }

    /// Release backend resources. Idempotent; never fails.
    pub async fn cleanup(&mut self) {
        self.backend.cleanup().await;
    }
}

impl std::fmt::Debug for TerminalGateway {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TerminalGateway")
            .field("backend", &self.backend.identity())
            .finish()
    }
}
