//! External tool execution.

use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::process::Command;
use tracing::debug;

use crate::error::{MediaError, MediaResult};

/// One external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    /// Human-readable tool name.
    pub name: String,

    /// Command to execute (first element is executable).
    pub command: Vec<String>,

    /// Timeout in seconds (0 = none).
    pub timeout_secs: u64,
}

impl ToolCommand {
    pub fn new(name: &str, command: Vec<String>) -> Self {
        Self {
            name: name.to_string(),
            command,
            timeout_secs: 0,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Result of a tool execution.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub tool: String,

    /// Exit code (0 = success).
    pub exit_code: i32,

    pub stdout: String,

    pub stderr: String,

    pub duration_ms: u64,

    pub success: bool,
}

impl ToolOutput {
    /// Whether the tool exited cleanly.
    pub fn passed(&self) -> bool {
        self.success && self.exit_code == 0
    }
}

/// Runs external tools with captured output.
pub struct ToolRunner;

impl ToolRunner {
    /// Execute a tool and return its output, whatever the exit status.
    pub async fn execute(tool: &ToolCommand) -> MediaResult<ToolOutput> {
        let start = Instant::now();

        let Some((exe, args)) = tool.command.split_first() else {
            return Err(MediaError::EmptyCommand(tool.name.clone()));
        };
        debug!(tool = %tool.name, command = ?tool.command, "running tool");

        let child = Command::new(exe)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| MediaError::Spawn {
                tool: tool.name.clone(),
                source,
            })?;

        let waited = if tool.timeout_secs > 0 {
            tokio::time::timeout(
                Duration::from_secs(tool.timeout_secs),
                child.wait_with_output(),
            )
            .await
            .map_err(|_| MediaError::Timeout {
                tool: tool.name.clone(),
                secs: tool.timeout_secs,
            })?
        } else {
            child.wait_with_output().await
        };
        let output = waited.map_err(|source| MediaError::Spawn {
            tool: tool.name.clone(),
            source,
        })?;

        Ok(ToolOutput {
            tool: tool.name.clone(),
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            duration_ms: start.elapsed().as_millis() as u64,
            success: output.status.success(),
        })
    }

    /// Execute a tool and fail unless it exits cleanly.
    pub async fn run_checked(tool: &ToolCommand) -> MediaResult<ToolOutput> {
        let output = Self::execute(tool).await?;
        if !output.passed() {
            return Err(MediaError::ToolFailed {
                tool: output.tool,
                code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }
}
