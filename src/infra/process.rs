//! External command execution
//!
//! The Koji and Copr clients shell out to their command-line tools. Every
//! invocation goes through a [`CommandRunner`] so the clients can be
//! exercised without the tools installed.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::error::{RebuildError, SubmissionError};

/// Captured output of a successful command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Standard output
    pub stdout: String,
    /// Standard error
    pub stderr: String,
}

/// Runs a program to completion and captures its output
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args`
    ///
    /// # Errors
    ///
    /// Returns `SubmissionError` if the program cannot be started or exits
    /// with a non-zero status.
    async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput, SubmissionError>;
}

/// Runs commands as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, program: &Path, args: &[String]) -> Result<CommandOutput, SubmissionError> {
        let command = command_line(program, args);
        tracing::debug!("Running: {}", command.join(" "));

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| SubmissionError::new(command.clone(), e.to_string()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr).into_owned();

        if !output.status.success() {
            return Err(SubmissionError::new(command, output.status.to_string())
                .with_output(stdout, stderr));
        }

        Ok(CommandOutput { stdout, stderr })
    }
}

/// Program and arguments as a flat list, for error reports
pub fn command_line(program: &Path, args: &[String]) -> Vec<String> {
    std::iter::once(program.display().to_string())
        .chain(args.iter().cloned())
        .collect()
}

/// Check that a tool can be found before starting a run
pub fn require_tool(program: &Path) -> Result<PathBuf, RebuildError> {
    which::which(program).map_err(|_| RebuildError::ToolNotFound {
        tool: program.display().to_string(),
    })
}
