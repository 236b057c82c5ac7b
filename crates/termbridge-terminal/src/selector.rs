/// Backend selection: explicit choice or per-platform auto-detection
use tracing::info;

use super::backend::{BackendKind, TerminalBackend};
use super::error::GatewayError;
use super::process_backend::ProcessBackend;
use super::scripted_backend::ScriptedTerminalBackend;
use super::windowed::WindowedTerminalBackend;

/// Probe whether the windowed terminal application (iTerm2) is currently
/// running. Evaluated once at startup by callers; not re-checked per command.
pub fn windowed_app_running() -> bool {
    std::process::Command::new("pgrep")
        .args(["-x", "iTerm2"])
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

/// Auto-detection rules: on macOS prefer the windowed API when its app is
/// already running, otherwise drive the stock Terminal; everywhere else the
/// only option is a direct process spawn.
pub fn detect_backend(platform: &str, windowed_app_running: bool) -> BackendKind {
    if platform == "macos" {
        if windowed_app_running {
            BackendKind::Windowed
        } else {
            BackendKind::Scripted
        }
    } else {
        BackendKind::Process
    }
}

/// Resolve a backend for `platform`.
///
/// An explicit request for a backend the platform cannot support is an error;
/// the selector never substitutes silently. Any downgrade policy belongs to
/// the caller, before this point.
pub fn select_backend(
    requested: Option<BackendKind>,
    platform: &str,
) -> Result<Box<dyn TerminalBackend>, GatewayError> {
    let kind = match requested {
        Some(kind) => {
            let macos_only = matches!(kind, BackendKind::Scripted | BackendKind::Windowed);
            if macos_only && platform != "macos" {
                return Err(GatewayError::Unsupported {
                    kind,
                    platform: platform.to_string(),
                });
            }
            kind
        }
        None => detect_backend(platform, windowed_app_running()),
    };

    info!(backend = %kind, "Selected terminal backend");
    Ok(backend_for_kind(kind))
}

/// The one place a `BackendKind` becomes a concrete backend.
fn backend_for_kind(kind: BackendKind) -> Box<dyn TerminalBackend> {
    match kind {
        BackendKind::Process => Box::new(ProcessBackend::new()),
        BackendKind::Scripted => Box::new(ScriptedTerminalBackend::new()),
        BackendKind::Windowed => Box::new(WindowedTerminalBackend::new()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_macos_always_detects_process() {
        assert_eq!(detect_backend("linux", false), BackendKind::Process);
        assert_eq!(detect_backend("linux", true), BackendKind::Process);
        assert_eq!(detect_backend("windows", true), BackendKind::Process);
    }

    #[test]
    fn macos_prefers_windowed_when_app_is_running() {
        assert_eq!(detect_backend("macos", true), BackendKind::Windowed);
        assert_eq!(detect_backend("macos", false), BackendKind::Scripted);
    }

    #[test]
    fn explicit_unsupported_combination_is_an_error() {
        for kind in [BackendKind::Scripted, BackendKind::Windowed] {
            let err = select_backend(Some(kind), "linux").unwrap_err();
            let message = err.to_string();
            assert!(message.contains("not supported on linux"), "{message}");
        }
    }

    #[test]
    fn explicit_process_works_everywhere() {
        for platform in ["linux", "macos", "windows"] {
            let backend = select_backend(Some(BackendKind::Process), platform).unwrap();
            assert_eq!(backend.identity(), "process");
        }
    }

    #[test]
    fn auto_detection_on_linux_yields_process() {
        let backend = select_backend(None, "linux").unwrap();
        assert_eq!(backend.identity(), "process");
    }
}
