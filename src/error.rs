use std::time::Duration;

use thiserror::Error;

/// Synchronous misuse of the command API, raised before any network I/O.
///
/// Anything that happens after a runner has been handed to the worker is
/// reported through the result's state instead, never through an error.
#[derive(Debug, Error)]
pub enum CommandError {
    #[error("command `{command}` cannot be executed over the {interface} interface")]
    IllegalCommand {
        command: &'static str,
        interface: &'static str,
    },

    #[error("command `{command}` is missing required parameter `{parameter}`")]
    MissingParameter {
        command: &'static str,
        parameter: &'static str,
    },

    #[error("unknown admin interface `{0}` (expected `rest` or `http`)")]
    UnknownAdminInterface(String),

    #[error("failed to initialise runner for `{command}`: {reason}")]
    RunnerInit {
        command: &'static str,
        reason: String,
    },
}

/// Failure of the wait on a pending result, as opposed to failure of the
/// command itself.
#[derive(Debug, Error)]
pub enum WaitError {
    #[error("timed out after {0:?} waiting for command result")]
    Timeout(Duration),

    #[error("admin worker shut down before delivering a result")]
    Cancelled,
}

/// Combined error for the fluent call builder.
#[derive(Debug, Error)]
pub enum AdminError {
    #[error(transparent)]
    Command(#[from] CommandError),

    #[error(transparent)]
    Wait(#[from] WaitError),
}
