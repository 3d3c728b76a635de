//! # Errors
//!
//! Unified error type for dispatch, sessions and backends.
//!
//! Backend errors travel through the dispatcher unchanged: a caller sees the
//! same variant the backend raised.

use thiserror::Error;

/// Result type used across the crate
pub type Result<T> = std::result::Result<T, Error>;

/// Dispatch, session and backend errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    // ==================
    // Dispatch Errors
    // ==================
    /// Permission evaluation returned deny
    #[error("Unauthorised")]
    Unauthorised,

    /// Access, backend handler or target record absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Input or output failed to parse against its schema
    #[error("Validation error: {0}")]
    Validation(String),

    // ==================
    // Job Queue Errors
    // ==================
    /// Create against an id that already resolves
    #[error("Already exists: {0}")]
    AlreadyExists(String),

    /// Delete against a job that is running or finished
    #[error("Job already completed: {0}")]
    AlreadyCompleted(String),

    /// Abort request did not take effect at commit time
    #[error("Abort failed for job: {0}")]
    AbortFailure(String),

    /// Queue service transport failure
    #[error("Queue error: {0}")]
    Queue(String),

    // ==================
    // Backend Errors
    // ==================
    /// Failure raised by a backend's own store
    #[error("Backend error: {0}")]
    Backend(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Create a not found error
    pub fn not_found(what: impl Into<String>) -> Self {
        Self::NotFound(what.into())
    }

    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create a backend error
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create an internal error
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Job id carried by an abort failure
    pub fn aborted_job(&self) -> Option<&str> {
        match self {
            Self::AbortFailure(job_id) => Some(job_id),
            _ => None,
        }
    }

    /// Get error code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Self::Unauthorised => "UNAUTHORISED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::AlreadyExists(_) => "ALREADY_EXISTS",
            Self::AlreadyCompleted(_) => "ALREADY_COMPLETED",
            Self::AbortFailure(_) => "ABORT_FAILURE",
            Self::Queue(_) => "QUEUE_ERROR",
            Self::Backend(_) => "BACKEND_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Get HTTP status code
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Unauthorised => 403,
            Self::NotFound(_) => 404,
            Self::Validation(_) => 400,
            Self::AlreadyExists(_) => 409,
            Self::AlreadyCompleted(_) => 409,
            Self::AbortFailure(_) => 409,
            Self::Queue(_) => 502,
            Self::Backend(_) => 500,
            Self::Internal(_) => 500,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Validation(e.to_string())
    }
}
