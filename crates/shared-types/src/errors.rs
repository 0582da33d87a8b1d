//! # Error Types
//!
//! A single tagged error type shared across the engagement crates.
//!
//! Callers branch on [`ErrorKind`] rather than on error identity. Each
//! boundary (HTTP, push webhook) owns the mapping from kind to status code.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Discriminates the failure classes of the engagement domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or incomplete element or request.
    Validation,
    /// Element absent for a single-entity operation.
    NotFound,
    /// Duplicate unique key (e.g. a pending nudge title).
    Conflict,
    /// Transition not permitted in the element's current shape.
    InvalidOperation,
    /// Element store or message bus failure, including timeouts.
    Upstream,
    /// Failed token verification.
    Auth,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "Validation",
            ErrorKind::NotFound => "NotFound",
            ErrorKind::Conflict => "Conflict",
            ErrorKind::InvalidOperation => "InvalidOperation",
            ErrorKind::Upstream => "Upstream",
            ErrorKind::Auth => "Auth",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The error returned by every engagement operation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct EngagementError {
    pub kind: ErrorKind,
    pub message: String,
}

impl EngagementError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    pub fn invalid_operation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidOperation, message)
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Upstream, message)
    }

    pub fn auth(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Auth, message)
    }

    /// An elapsed deadline on an upstream call.
    pub fn timed_out(operation: impl fmt::Display) -> Self {
        Self::upstream(format!("{operation} timed out"))
    }

    pub fn is_not_found(&self) -> bool {
        self.kind == ErrorKind::NotFound
    }

    pub fn is_conflict(&self) -> bool {
        self.kind == ErrorKind::Conflict
    }
}

impl From<serde_json::Error> for EngagementError {
    fn from(err: serde_json::Error) -> Self {
        Self::validation(format!("malformed json: {err}"))
    }
}

/// Result alias used throughout the engagement crates.
pub type Result<T, E = EngagementError> = std::result::Result<T, E>;
