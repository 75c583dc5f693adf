//! External tool execution.
//!
//! Runs conversion tools as child processes with a hard timeout. Children
//! are spawned with `kill_on_drop` so an abandoned future never leaves an
//! orphaned process behind.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::error::ConversionError;

/// Maximum number of stderr characters kept in errors.
const STDERR_LIMIT: usize = 2000;

/// Captured output of a successful tool run.
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// Standard output (empty when capture is disabled).
    pub stdout: String,
    /// Standard error (empty when capture is disabled).
    pub stderr: String,
    /// Wall-clock duration.
    pub duration_ms: u64,
}

/// Executor for external conversion tools.
#[derive(Debug, Clone)]
pub struct ToolExecutor {
    /// Hard limit for one invocation.
    timeout: Duration,
    /// Whether stdout/stderr are piped and collected.
    capture_output: bool,
}

impl ToolExecutor {
    /// Create a new executor.
    pub fn new(timeout: Duration, capture_output: bool) -> Self {
        Self {
            timeout,
            capture_output,
        }
    }

    /// The per-invocation timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `program` with `args`, waiting at most the configured timeout.
    pub async fn run(
        &self,
        program: &Path,
        args: &[String],
        working_dir: Option<&Path>,
    ) -> Result<ToolOutput, ConversionError> {
        // A bare program name is resolved through PATH by spawn.
        if program.components().count() > 1 && !program.exists() {
            return Err(ConversionError::ToolNotFound {
                path: program.to_path_buf(),
            });
        }

        let (stdout_cfg, stderr_cfg) = if self.capture_output {
            (Stdio::piped(), Stdio::piped())
        } else {
            (Stdio::null(), Stdio::null())
        };

        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(stdout_cfg)
            .stderr(stderr_cfg)
            .kill_on_drop(true);

        if let Some(dir) = working_dir {
            cmd.current_dir(dir);
        }

        debug!(
            program = %program.display(),
            args = ?args,
            timeout_s = self.timeout.as_secs(),
            "Spawning conversion tool"
        );

        let start = Instant::now();
        let mut child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConversionError::ToolNotFound {
                    path: program.to_path_buf(),
                }
            } else {
                ConversionError::Io(e)
            }
        })?;

        // Drain pipes concurrently so a chatty tool cannot block on a full pipe.
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        tokio::select! {
            result = child.wait() => {
                let status = result?;
                let duration_ms = start.elapsed().as_millis() as u64;
                let stdout = collect(stdout).await;
                let stderr = collect(stderr).await;

                if !stderr.is_empty() {
                    debug!(stderr = %stderr, "Conversion tool stderr output");
                }

                if status.success() {
                    info!(program = %program.display(), elapsed_ms = duration_ms, "Conversion tool completed");
                    return Ok(ToolOutput { stdout, stderr, duration_ms });
                }

                match status.code() {
                    Some(code) => {
                        error!(
                            program = %program.display(),
                            code,
                            elapsed_ms = duration_ms,
                            stderr = %stderr,
                            "Conversion tool failed"
                        );
                        Err(ConversionError::ToolFailed {
                            code,
                            stderr: stderr.chars().take(STDERR_LIMIT).collect(),
                        })
                    }
                    None => {
                        error!(program = %program.display(), "Conversion tool terminated by signal");
                        Err(ConversionError::ToolKilled)
                    }
                }
            }
            _ = tokio::time::sleep(self.timeout) => {
                error!(
                    program = %program.display(),
                    timeout_s = self.timeout.as_secs(),
                    "Conversion tool timed out, killing"
                );
                let _ = child.kill().await;
                Err(ConversionError::ToolTimeout {
                    timeout_seconds: self.timeout.as_secs(),
                })
            }
        }
    }
}

fn drain<R>(mut reader: R) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = reader.read_to_end(&mut buf).await;
        String::from_utf8_lossy(&buf).into_owned()
    })
}

async fn collect(handle: Option<JoinHandle<String>>) -> String {
    match handle {
        Some(handle) => handle.await.unwrap_or_default(),
        None => String::new(),
    }
}

/// Convert a path to `&str` for embedding in tool scripts.
pub fn path_str(path: &Path) -> Result<&str, ConversionError> {
    path.to_str().ok_or_else(|| ConversionError::InvalidUtf8Path {
        path: PathBuf::from(path),
    })
}
