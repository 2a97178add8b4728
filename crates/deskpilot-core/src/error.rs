//! Error taxonomy for command handling.
//!
//! Every variant is rendered into exactly one operator-visible reply by the
//! dispatcher; none of them escapes into the transport loop.

use crate::config::DIAGNOSTIC_MESSAGE_BUDGET;
use crate::process::ProcessError;
use crate::utils::truncate_diagnostic;
use thiserror::Error;

/// Errors produced while handling one invocation.
#[derive(Error, Debug)]
pub enum CommandError {
    /// Sender is not the configured operator.
    #[error("Unauthorized.")]
    Unauthorized,
    /// Cooldown for this key is still active.
    #[error("Cooldown: wait {remaining_secs}s.")]
    Throttled {
        /// Whole seconds until the key may be used again.
        remaining_secs: u64,
    },
    /// Malformed arguments; the message is a usage hint.
    #[error("{0}")]
    InvalidArgument(String),
    /// The external executable is not installed.
    #[error("Error: {tool} not found. {hint}")]
    ExternalToolMissing {
        /// Tool name as shown to the operator.
        tool: String,
        /// Installation hint.
        hint: String,
    },
    /// The external process exceeded its budget and was killed.
    #[error("{tool} timed out ({budget_secs}s limit).")]
    ExternalTimeout {
        /// Tool name as shown to the operator.
        tool: String,
        /// Timeout budget in seconds.
        budget_secs: u64,
    },
    /// The external tool ran and reported failure.
    #[error("{tool} failed (code {exit_code})\n{}", truncate_diagnostic(.output, DIAGNOSTIC_MESSAGE_BUDGET))]
    ExternalNonZeroExit {
        /// Tool name as shown to the operator.
        tool: String,
        /// Process exit code (-1 when killed by a signal).
        exit_code: i32,
        /// Combined output of the failed run.
        output: String,
    },
    /// Session state rejected the new value; the old value is kept.
    #[error("{0}")]
    StateValidationFailed(String),
    /// A desktop collaborator (capture, window, input) failed.
    #[error("Desktop operation failed: {0}")]
    Collaborator(#[source] anyhow::Error),
    /// The reply could not be delivered.
    #[error("Transport error: {0}")]
    Transport(#[source] anyhow::Error),
}

impl CommandError {
    /// Map a process runner failure for `tool` into a command error.
    ///
    /// `hint` is shown when the executable is missing.
    #[must_use]
    pub fn from_process(tool: &str, hint: &str, err: ProcessError) -> Self {
        match err {
            ProcessError::NotFound { .. } => Self::ExternalToolMissing {
                tool: tool.to_string(),
                hint: hint.to_string(),
            },
            ProcessError::TimedOut { budget, .. } => Self::ExternalTimeout {
                tool: tool.to_string(),
                budget_secs: budget.as_secs(),
            },
            ProcessError::ExecutionFailed { exit_code, output } => Self::ExternalNonZeroExit {
                tool: tool.to_string(),
                exit_code,
                output,
            },
            ProcessError::Spawn(e) => Self::Collaborator(anyhow::anyhow!("{tool}: {e}")),
        }
    }

    /// Whether this error is an operator mistake rather than a system fault.
    #[must_use]
    pub const fn is_user_error(&self) -> bool {
        matches!(
            self,
            Self::Unauthorized
                | Self::Throttled { .. }
                | Self::InvalidArgument(_)
                | Self::StateValidationFailed(_)
        )
    }
}
