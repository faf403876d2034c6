//! # Command Executor
//!
//! Runs one command over an open session and reports it with the numeric
//! status the app shows to the user: [`STATUS_OK`] when the command ran to
//! completion, [`STATUS_FAILED`] when the transport failed or timed out.

use std::time::Duration;

use doorlink_common::Error;
use tokio::time::timeout;
use tracing::{debug, warn};

use crate::remote::{ExecOutput, ShellSession};

pub const STATUS_OK: i32 = 200;
pub const STATUS_FAILED: i32 = -1;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    /// [`STATUS_OK`] or [`STATUS_FAILED`].
    pub status: i32,
    /// Stdout of the command, or the failure reason.
    pub output: String,
    pub stderr: String,
    /// Exit code reported by the remote shell, when it sent one.
    pub exit_status: Option<u32>,
}

impl CommandResult {
    fn completed(output: ExecOutput) -> Self {
        Self {
            status: STATUS_OK,
            output: output.stdout,
            stderr: output.stderr,
            exit_status: output.exit_status,
        }
    }

    fn failed(error: &Error) -> Self {
        Self {
            status: STATUS_FAILED,
            output: error.to_string(),
            stderr: String::new(),
            exit_status: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == STATUS_OK
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandExecutor {
    timeout: Duration,
}

impl CommandExecutor {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    pub async fn exec(&self, command: &str, session: &dyn ShellSession) -> CommandResult {
        self.exec_with_timeout(command, session, self.timeout).await
    }

    /// A non-zero exit code still yields [`STATUS_OK`]; it is reported in
    /// [`CommandResult::exit_status`].
    pub async fn exec_with_timeout(
        &self,
        command: &str,
        session: &dyn ShellSession,
        limit: Duration,
    ) -> CommandResult {
        let host = session.host();
        debug!(%host, command = command.trim(), "running remote command");

        let outcome = match timeout(limit, session.exec(command)).await {
            Ok(outcome) => outcome,
            Err(_) => Err(Error::CommandTimeout(limit)),
        };

        match outcome {
            Ok(output) => {
                if !output.stderr.is_empty() {
                    debug!(%host, stderr = output.stderr.trim(), "remote command wrote to stderr");
                }
                CommandResult::completed(output)
            }
            Err(e) => {
                warn!(%host, "remote command failed: {e}");
                CommandResult::failed(&e)
            }
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
