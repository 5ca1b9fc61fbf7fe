use async_trait::async_trait;
use std::io;
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExecError {
    #[error("failed to spawn {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("{program} exited with {status}: {stderr}")]
    Failed {
        program: String,
        status: String,
        stdout: String,
        stderr: String,
    },
    #[error("{program} cancelled")]
    Cancelled { program: String },
    #[error("{program} timed out after {}ms", .limit.as_millis())]
    TimedOut { program: String, limit: Duration },
}

impl ExecError {
    /// Standard output captured before a non-zero exit, if the process ran.
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ExecError::Failed { stdout, .. } => Some(stdout),
            _ => None,
        }
    }
}

/// Runs one external program to completion. Implementations must honor
/// `cancel`: a cancelled token aborts an in-flight invocation and prevents
/// new ones from starting.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError>;
}

/// Spawns real processes through `tokio::process`.
#[derive(Debug, Clone, Default)]
pub struct SystemRunner {
    timeout: Option<Duration>,
}

impl SystemRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            timeout: Some(timeout),
        }
    }
}

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        program: &str,
        args: &[String],
        cwd: &Path,
        cancel: &CancellationToken,
    ) -> Result<CommandOutput, ExecError> {
        if cancel.is_cancelled() {
            return Err(ExecError::Cancelled {
                program: program.to_string(),
            });
        }

        let started = Instant::now();
        let mut command = Command::new(program);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::null())
            .kill_on_drop(true);

        let pending = command.output();
        let finished: Option<Result<io::Result<Output>, ExecError>> = match self.timeout {
            Some(limit) => tokio::select! {
                _ = cancel.cancelled() => None,
                result = tokio::time::timeout(limit, pending) => Some(result.map_err(|_| {
                    ExecError::TimedOut {
                        program: program.to_string(),
                        limit,
                    }
                })),
            },
            None => tokio::select! {
                _ = cancel.cancelled() => None,
                result = pending => Some(Ok(result)),
            },
        };

        let output = match finished {
            None => {
                return Err(ExecError::Cancelled {
                    program: program.to_string(),
                })
            }
            Some(Err(err)) => return Err(err),
            Some(Ok(Err(err))) => {
                return Err(ExecError::Spawn {
                    program: program.to_string(),
                    message: err.to_string(),
                })
            }
            Some(Ok(Ok(output))) => output,
        };

        debug!(
            program,
            args = ?args,
            elapsed_ms = started.elapsed().as_millis() as u64,
            status = %output.status,
            "command finished"
        );

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        if !output.status.success() {
            return Err(ExecError::Failed {
                program: program.to_string(),
                status: output.status.to_string(),
                stdout,
                stderr,
            });
        }
        Ok(CommandOutput { stdout, stderr })
    }
}

pub fn command_line(program: &str, args: &[String]) -> String {
    if args.is_empty() {
        return program.to_string();
    }
    format!("{program} {}", args.join(" "))
}
