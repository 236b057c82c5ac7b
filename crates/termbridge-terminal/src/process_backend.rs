/// Direct process-spawn backend; works on every platform
use async_trait::async_trait;
use std::process::Stdio;
use tokio::io::AsyncReadExt;
use tokio::process::Command;
use tracing::debug;

use super::backend::{CommandRequest, ExecutionResult, TerminalBackend};
use super::error::GatewayError;
use super::OUTPUT_NOT_CAPTURED;

/// Backend that spawns the command through a shell and captures both streams.
///
/// This is the only backend with a real completion signal, so it is also the
/// only one that enforces a hard timeout: past the deadline the process is
/// killed and the result is a failure.
#[derive(Debug, Default)]
pub struct ProcessBackend;

impl ProcessBackend {
    pub fn new() -> Self {
        Self
    }

    fn shell_command(command: &str) -> Command {
        #[cfg(windows)]
        {
            let mut cmd = Command::new("cmd");
            cmd.args(["/C", command]);
            cmd
        }
        #[cfg(not(windows))]
        {
            let mut cmd = Command::new("sh");
            cmd.args(["-c", command]);
            cmd
        }
    }
}

#[async_trait]
impl TerminalBackend for ProcessBackend {
    async fn run(&mut self, request: &CommandRequest) -> ExecutionResult {
        let mut cmd = Self::shell_command(&request.command);
        cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return GatewayError::Spawn(e.to_string()).into_result(),
        };

        if !request.wait_for_output {
            // Leave the process detached; the caller asked not to wait.
            return ExecutionResult::ok(OUTPUT_NOT_CAPTURED);
        }

        let stdout_pipe = child.stdout.take();
        let stderr_pipe = child.stderr.take();

        let collect = async {
            let stdout_task = async {
                let mut buf = Vec::new();
                if let Some(mut pipe) = stdout_pipe {
                    pipe.read_to_end(&mut buf).await?;
                }
                std::io::Result::Ok(buf)
            };
            let stderr_task = async {
                let mut buf = Vec::new();
                if let Some(mut pipe) = stderr_pipe {
                    pipe.read_to_end(&mut buf).await?;
                }
                std::io::Result::Ok(buf)
            };
            let (status, stdout, stderr) = tokio::try_join!(child.wait(), stdout_task, stderr_task)?;
            std::io::Result::Ok((status, stdout, stderr))
        };

        match tokio::time::timeout(request.timeout, collect).await {
            Ok(Ok((status, stdout, stderr))) => ExecutionResult::exited(
                status.code().unwrap_or(-1),
                String::from_utf8_lossy(&stdout),
                String::from_utf8_lossy(&stderr),
            ),
            Ok(Err(e)) => GatewayError::Spawn(e.to_string()).into_result(),
            Err(_) => {
                // The process may have exited between the deadline and the
                // kill; that race is fine.
                if let Err(e) = child.start_kill() {
                    debug!("Process already gone when killing after timeout: {e}");
                }
                let _ = child.wait().await;
                GatewayError::HardTimeout(request.timeout).into_result()
            }
        }
    }

    fn identity(&self) -> &str {
        "process"
    }

    async fn cleanup(&mut self) {
        // No held resources.
    }
}
