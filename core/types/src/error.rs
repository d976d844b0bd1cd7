//! Concrete error type shared by every layer of the control plane

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Wire-level error code carried in the response envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    UsageError,
    ValidationError,
    ResolutionError,
    Conflict,
    ExecutionError,
    RateLimited,
    PayloadTooLarge,
    NotFound,
    Timeout,
    Internal,
}

/// Error taxonomy for the whole control plane.
///
/// Validation, resolution and conflict errors are surfaced synchronously at
/// submission; execution errors are recorded against the operation and
/// observed through the ops endpoints.
#[derive(Debug, Error, Clone)]
pub enum HubError {
    #[error("usage error: {0}")]
    Usage(String),

    #[error("validation failed at change {change_index} ({op}): {cause}")]
    Validation {
        change_index: usize,
        op: String,
        cause: String,
    },

    #[error("unresolved reference: {0}")]
    Resolution(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("execution failed: {0}")]
    Execution(String),

    #[error("rate limited, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("payload too large: {0}")]
    PayloadTooLarge(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("timed out: {0}")]
    Timeout(String),

    #[error("internal error: {0}")]
    Fatal(String),
}

impl HubError {
    /// Convenience constructor for validation failures
    pub fn validation(change_index: usize, op: impl Into<String>, cause: impl Into<String>) -> Self {
        HubError::Validation {
            change_index,
            op: op.into(),
            cause: cause.into(),
        }
    }

    pub fn code(&self) -> ErrorCode {
        match self {
            HubError::Usage(_) => ErrorCode::UsageError,
            HubError::Validation { .. } => ErrorCode::ValidationError,
            HubError::Resolution(_) => ErrorCode::ResolutionError,
            HubError::Conflict(_) => ErrorCode::Conflict,
            HubError::Execution(_) => ErrorCode::ExecutionError,
            HubError::RateLimited { .. } => ErrorCode::RateLimited,
            HubError::PayloadTooLarge(_) => ErrorCode::PayloadTooLarge,
            HubError::NotFound(_) => ErrorCode::NotFound,
            HubError::Timeout(_) => ErrorCode::Timeout,
            HubError::Fatal(_) => ErrorCode::Internal,
        }
    }

    /// HTTP status the error maps to on the wire
    pub fn http_status(&self) -> u16 {
        match self {
            HubError::Usage(_)
            | HubError::Validation { .. }
            | HubError::Resolution(_) => 400,
            HubError::NotFound(_) => 404,
            HubError::Conflict(_) => 409,
            HubError::PayloadTooLarge(_) => 413,
            HubError::RateLimited { .. } => 429,
            HubError::Execution(_) | HubError::Fatal(_) => 500,
            HubError::Timeout(_) => 504,
        }
    }

    /// Structured details for batch errors (change index + tempId context)
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            HubError::Validation { change_index, op, cause } => Some(serde_json::json!({
                "changeIndex": change_index,
                "op": op,
                "cause": cause,
            })),
            HubError::RateLimited { retry_after_secs } => Some(serde_json::json!({
                "retryAfterSecs": retry_after_secs,
            })),
            _ => None,
        }
    }
}

impl From<std::io::Error> for HubError {
    fn from(err: std::io::Error) -> Self {
        HubError::Fatal(format!("io: {err}"))
    }
}

impl From<serde_json::Error> for HubError {
    fn from(err: serde_json::Error) -> Self {
        HubError::Usage(format!("json: {err}"))
    }
}

impl From<tokio::time::error::Elapsed> for HubError {
    fn from(err: tokio::time::error::Elapsed) -> Self {
        HubError::Timeout(err.to_string())
    }
}

/// Result type using HubError
pub type HubResult<T> = Result<T, HubError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_mapping_matches_taxonomy() {
        assert_eq!(HubError::Usage("x".into()).http_status(), 400);
        assert_eq!(HubError::NotFound("x".into()).http_status(), 404);
        assert_eq!(HubError::Conflict("x".into()).http_status(), 409);
        assert_eq!(HubError::PayloadTooLarge("x".into()).http_status(), 413);
        assert_eq!(
            HubError::RateLimited { retry_after_secs: 3 }.http_status(),
            429
        );
        assert_eq!(HubError::Timeout("x".into()).http_status(), 504);
    }

    #[test]
    fn validation_details_carry_change_index() {
        let err = HubError::validation(7, "createElement", "unknown type");
        let details = err.details().unwrap();
        assert_eq!(details["changeIndex"], 7);
        assert_eq!(details["op"], "createElement");
    }
}
