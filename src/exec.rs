//! Host command execution.
//!
//! Every package-manager, service-manager, and docker invocation goes through
//! the [`CommandRunner`] trait so the pipeline can be exercised against a
//! scripted fake in tests.

use async_trait::async_trait;
use std::process::Command;

/// Captured output of a finished host command.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    /// Last stderr line, for compact error messages.
    pub fn last_stderr_line(&self) -> &str {
        self.stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .map(str::trim)
            .unwrap_or("no output available")
    }
}

/// Build an argv vector from string literals.
pub fn argv(parts: &[&str]) -> Vec<String> {
    parts.iter().map(|p| p.to_string()).collect()
}

/// Executes argv-style commands on behalf of the pipeline stages.
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `argv` to completion and capture its output.
    async fn run(&self, argv: &[String]) -> std::io::Result<CommandOutput>;
}

/// Runs commands directly on the host.
pub struct HostRunner;

#[async_trait]
impl CommandRunner for HostRunner {
    async fn run(&self, argv: &[String]) -> std::io::Result<CommandOutput> {
        let (program, args) = argv.split_first().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "empty command")
        })?;

        tracing::debug!("[Exec] {}", argv.join(" "));

        let output = Command::new(program).args(args).output()?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(-1),
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}
