//! Structured results of a dispatch.
//!
//! The core only produces reason codes and raw message lines; turning a code into
//! localized text is the job of the embedding server. [`Outcome::message_key`] gives the
//! lookup key, and the `Display` impls give an English fallback.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use super::ledger::CancelTrigger;
use crate::storage::StoreError;

/// What a command body reports back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandResult {
    Success,
    /// The body ran but achieved nothing (target missing, name taken...). Treated as a
    /// failure by the ledger: cost is refunded and no cooldown starts.
    Empty,
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("{0}")]
    Failed(String),

    /// Arguments parsed but make no sense together (negative duration, unknown jail...).
    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    #[error("command panicked: {0}")]
    Panicked(String),
}

/// Non-fatal problem noticed while the body ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A save failed; the in-memory edit stands and a later save may retry.
    PersistenceFailed(String),
}

/// Messages and warnings produced by the body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Report {
    pub messages: Vec<String>,
    pub warnings: Vec<Warning>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum DenyReason {
    UnknownCommand(String),
    ModuleDisabled(String),
    InvalidArguments { message: String, usage: String },
    NoPermission,
    PlayerOnly,
    OnCooldown { remaining: Duration },
    InsufficientFunds { cost: f64 },
    AlreadyPending,
}

impl fmt::Display for DenyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenyReason::UnknownCommand(name) => write!(f, "Unknown command '{}'", name),
            DenyReason::ModuleDisabled(module) => write!(f, "The {} module is disabled", module),
            DenyReason::InvalidArguments { message, usage } => write!(f, "{}. Usage: {}", message, usage),
            DenyReason::NoPermission => write!(f, "You do not have permission to use this command"),
            DenyReason::PlayerOnly => write!(f, "Only players can use this command"),
            DenyReason::OnCooldown { remaining } => {
                write!(f, "You must wait {} seconds before using this command again", remaining.as_secs().max(1))
            }
            DenyReason::InsufficientFunds { cost } => write!(f, "You need {:.2} to use this command", cost),
            DenyReason::AlreadyPending => write!(f, "This command is already pending"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum FailureCause {
    Empty,
    ExecutionFailed(String),
    WarmupCancelled(CancelTrigger),
}

impl fmt::Display for FailureCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureCause::Empty => write!(f, "The command did not complete"),
            FailureCause::ExecutionFailed(cause) => write!(f, "The command failed: {}", cause),
            FailureCause::WarmupCancelled(trigger) => write!(f, "Warmup cancelled ({})", trigger),
        }
    }
}

/// Flat result code covering every outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    Success,
    WarmupStarted,
    UnknownCommand,
    ModuleDisabled,
    InvalidArguments,
    NoPermission,
    PlayerOnly,
    OnCooldown,
    InsufficientFunds,
    AlreadyPending,
    Empty,
    ExecutionFailed,
    WarmupCancelled,
    PersistenceFailed,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::Success => "success",
            ErrorCode::WarmupStarted => "warmup_started",
            ErrorCode::UnknownCommand => "unknown_command",
            ErrorCode::ModuleDisabled => "module_disabled",
            ErrorCode::InvalidArguments => "invalid_arguments",
            ErrorCode::NoPermission => "no_permission",
            ErrorCode::PlayerOnly => "player_only",
            ErrorCode::OnCooldown => "on_cooldown",
            ErrorCode::InsufficientFunds => "insufficient_funds",
            ErrorCode::AlreadyPending => "already_pending",
            ErrorCode::Empty => "empty",
            ErrorCode::ExecutionFailed => "execution_failed",
            ErrorCode::WarmupCancelled => "warmup_cancelled",
            ErrorCode::PersistenceFailed => "persistence_failed",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Success(Report),
    Failure { cause: FailureCause, report: Report },
    Denied(DenyReason),
    /// Admission passed and a warmup timer is running; the real outcome arrives later
    /// through the dispatcher's deferred channel.
    WarmupStarted { warmup: Duration },
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Success(_))
    }

    pub fn denial(&self) -> Option<&DenyReason> {
        match self {
            Outcome::Denied(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn report(&self) -> Option<&Report> {
        match self {
            Outcome::Success(report) | Outcome::Failure { report, .. } => Some(report),
            _ => None,
        }
    }

    pub fn messages(&self) -> &[String] {
        self.report().map(|r| r.messages.as_slice()).unwrap_or(&[])
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            Outcome::Success(_) => ErrorCode::Success,
            Outcome::WarmupStarted { .. } => ErrorCode::WarmupStarted,
            Outcome::Failure { cause, .. } => match cause {
                FailureCause::Empty => ErrorCode::Empty,
                FailureCause::ExecutionFailed(_) => ErrorCode::ExecutionFailed,
                FailureCause::WarmupCancelled(_) => ErrorCode::WarmupCancelled,
            },
            Outcome::Denied(reason) => match reason {
                DenyReason::UnknownCommand(_) => ErrorCode::UnknownCommand,
                DenyReason::ModuleDisabled(_) => ErrorCode::ModuleDisabled,
                DenyReason::InvalidArguments { .. } => ErrorCode::InvalidArguments,
                DenyReason::NoPermission => ErrorCode::NoPermission,
                DenyReason::PlayerOnly => ErrorCode::PlayerOnly,
                DenyReason::OnCooldown { .. } => ErrorCode::OnCooldown,
                DenyReason::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
                DenyReason::AlreadyPending => ErrorCode::AlreadyPending,
            },
        }
    }

    /// Localization key for the outcome, e.g. `command.denied.on_cooldown`.
    pub fn message_key(&self) -> String {
        let group = match self {
            Outcome::Success(_) | Outcome::WarmupStarted { .. } => "ok",
            Outcome::Failure { .. } => "failed",
            Outcome::Denied(_) => "denied",
        };
        format!("command.{}.{}", group, self.code().as_str())
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success(report) => write!(f, "{}", report.messages.join("\n")),
            Outcome::Failure { cause, report } if report.messages.is_empty() => write!(f, "{}", cause),
            Outcome::Failure { report, .. } => write!(f, "{}", report.messages.join("\n")),
            Outcome::Denied(reason) => write!(f, "{}", reason),
            Outcome::WarmupStarted { warmup } => {
                write!(f, "Command will run in {} seconds, do not move", warmup.as_secs().max(1))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_and_keys_follow_the_variant() {
        let denied = Outcome::Denied(DenyReason::OnCooldown {
            remaining: Duration::from_secs(30),
        });
        assert_eq!(denied.code(), ErrorCode::OnCooldown);
        assert_eq!(denied.message_key(), "command.denied.on_cooldown");
        assert_eq!(
            denied.to_string(),
            "You must wait 30 seconds before using this command again"
        );

        let failed = Outcome::Failure {
            cause: FailureCause::ExecutionFailed("boom".into()),
            report: Report::default(),
        };
        assert_eq!(failed.message_key(), "command.failed.execution_failed");
        assert_eq!(failed.to_string(), "The command failed: boom");
    }
}
