// Terminal-command execution gateway
//
// This crate multiplexes three strategies for running a shell command — a
// direct process spawn, AppleScript control of the macOS Terminal window, and
// a connection-based iTerm2 session API — behind one backend trait, with the
// termbridge-policy command filter applied before any backend runs.

mod extract;
mod gateway;
mod osascript;
mod process_backend;
mod scripted_backend;
mod selector;
mod windowed;

pub mod backend;
pub mod error;
pub mod poll;
pub mod retry;

// Re-export public API
pub use backend::{BackendKind, CommandRequest, ExecutionResult, TerminalBackend};
pub use error::GatewayError;
pub use gateway::{GatewayConfig, TerminalGateway};
pub use process_backend::ProcessBackend;
pub use scripted_backend::ScriptedTerminalBackend;
pub use selector::{detect_backend, select_backend, windowed_app_running};
pub use windowed::{
    ConnectionState, ItermApi, WindowedApi, WindowedApp, WindowedConnection,
    WindowedSessionHandle, WindowedTerminalBackend, WindowedTuning,
};

use std::time::Duration;

// Constants
pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(10);

/// Placeholder returned when the caller does not wait for output.
pub const OUTPUT_NOT_CAPTURED: &str = "Command sent (output not captured)";

/// Interval between window-contents snapshots in the scripted backend.
pub(crate) const SCRIPTED_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Interval between screen-line-count snapshots in the windowed backend.
pub(crate) const WINDOWED_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// No output change for this long means the command is probably done.
pub(crate) const WINDOWED_QUIET_PERIOD: Duration = Duration::from_millis(1000);

/// Delay after submitting a command before polling begins.
pub(crate) const WINDOWED_SETTLE_DELAY: Duration = Duration::from_millis(500);

/// Delay after the bootstrap script before the first connection attempt.
pub(crate) const CONNECT_SETTLE_DELAY: Duration = Duration::from_secs(3);

pub(crate) const CONNECT_MAX_ATTEMPTS: usize = 5;
pub(crate) const CONNECT_RETRY_DELAY: Duration = Duration::from_secs(2);

/// Bound on waiting for the windowed connection to close during cleanup.
pub(crate) const CLOSE_TIMEOUT: Duration = Duration::from_secs(2);
