//! Launcher error types.

use std::time::Duration;

use thiserror::Error;

/// Errors surfaced by the launcher itself.
///
/// Attempt failures (`Limiter`, `Serialize`, `Provision`) never reach the
/// caller of `inbound()`; they are logged and counted inside the attempt.
#[derive(Debug, Error)]
pub enum LaunchError {
    #[error("no tokio runtime available to run provisioning attempts")]
    NoRuntime,

    #[error("rate limiter error: {0}")]
    Limiter(#[from] LimiterError),

    #[error("payload serialization error: {0}")]
    Serialize(#[from] serde_json::Error),

    #[error("provisioning error: {0}")]
    Provision(#[from] ProvisionError),
}

pub type LaunchResult<T> = Result<T, LaunchError>;

/// Why a rate limiter refused to let an attempt proceed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LimiterError {
    #[error("wait cancelled by shutdown")]
    Cancelled,

    #[error("rate limit can never admit a request (burst {burst})")]
    Exhausted { burst: u32 },
}

/// Errors returned by a `Provisioner` backend.
#[derive(Debug, Error)]
pub enum ProvisionError {
    #[error("connection to {endpoint} failed: {reason}")]
    Connect { endpoint: String, reason: String },

    #[error("invoke timed out after {0:?}")]
    Timeout(Duration),

    #[error("invoke returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("function error ({kind}): {body}")]
    Function { kind: String, body: String },

    #[error("invoke failed: {0}")]
    Other(String),
}
