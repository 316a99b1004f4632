//! Bounded external command execution.
//!
//! Every interaction with the device bridge and capture tools goes through
//! [`run`], which launches one process, waits up to the spec's timeout, and
//! folds every failure mode (non-zero exit, launch error, timeout) into the
//! returned [`CommandResult`]. Nothing escapes this boundary as an error.

use std::time::Duration;

use tokio::process::Command;

use crate::{nlog_trace, nlog_warn};

/// Default wall-clock budget for interactive queries.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// One external command: program plus arguments, and a wall-clock budget.
/// Immutable once built; constructed per invocation and discarded.
#[derive(Debug, Clone)]
pub struct CommandSpec {
    tokens: Vec<String>,
    timeout: Duration,
}

impl CommandSpec {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    /// Override the default budget. Long transfers (backups, photo pulls,
    /// installs) pass minute-to-hour-scale values here.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

/// Outcome of one external command. `succeeded` is true iff the process
/// exited zero within the budget; `output` is trimmed stdout+stderr either
/// way, or a diagnostic for timeouts and launch failures.
#[derive(Debug, Clone)]
pub struct CommandResult {
    pub succeeded: bool,
    pub output: String,
}

impl CommandResult {
    fn failure(output: impl Into<String>) -> Self {
        Self {
            succeeded: false,
            output: output.into(),
        }
    }
}

/// Run one command to completion or to timeout.
///
/// A timed-out process is killed rather than left running; `kill_on_drop`
/// covers the case where the timeout fires while the child is mid-write.
pub async fn run(spec: &CommandSpec) -> CommandResult {
    let Some((program, args)) = spec.tokens().split_first() else {
        return CommandResult::failure("Empty command");
    };

    nlog_trace!("runner::run {:?} timeout={:?}", spec.tokens(), spec.timeout());

    let output = tokio::time::timeout(
        spec.timeout(),
        Command::new(program)
            .args(args)
            .kill_on_drop(true)
            .output(),
    )
    .await;

    match output {
        Err(_) => {
            nlog_warn!("Command '{}' timed out after {:?}", program, spec.timeout());
            CommandResult::failure(format!(
                "Command timed out after {:?}",
                spec.timeout()
            ))
        }
        Ok(Err(e)) => {
            nlog_warn!("Failed to launch '{}': {}", program, e);
            CommandResult::failure(format!("Failed to launch '{}': {}", program, e))
        }
        Ok(Ok(output)) => {
            let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
            text.push_str(&String::from_utf8_lossy(&output.stderr));
            let trimmed = text.trim().to_string();
            nlog_trace!(
                "runner::run '{}' exit={:?} bytes={}",
                program,
                output.status.code(),
                trimmed.len()
            );
            CommandResult {
                succeeded: output.status.success(),
                output: trimmed,
            }
        }
    }
}
