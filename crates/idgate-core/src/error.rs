//! Unified application error types for Idgate.
//!
//! All crates map their internal errors into [`AppError`] for consistent
//! propagation through the ? operator.

use std::fmt;
use thiserror::Error;

/// Top-level error kind categorization used across the entire application.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// The requested resource was not found.
    NotFound,
    /// Authentication failed (bad credentials or inactive identity).
    Authentication,
    /// The caller does not have permission to perform the action.
    Authorization,
    /// A session exists but no longer authorizes requests.
    Session,
    /// A superseded refresh token was presented again.
    Replay,
    /// A conflict occurred (concurrent modification lost the race).
    Conflict,
    /// The token signing key is unavailable or signing failed.
    Signing,
    /// A database error occurred.
    Database,
    /// A cache error occurred.
    Cache,
    /// A configuration error occurred.
    Configuration,
    /// A serialization/deserialization error occurred.
    Serialization,
    /// An internal server error occurred.
    Internal,
    /// The service is temporarily unavailable.
    ServiceUnavailable,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "NOT_FOUND"),
            Self::Authentication => write!(f, "AUTHENTICATION"),
            Self::Authorization => write!(f, "AUTHORIZATION"),
            Self::Session => write!(f, "SESSION"),
            Self::Replay => write!(f, "REPLAY"),
            Self::Conflict => write!(f, "CONFLICT"),
            Self::Signing => write!(f, "SIGNING"),
            Self::Database => write!(f, "DATABASE"),
            Self::Cache => write!(f, "CACHE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
        }
    }
}

/// The outcome surfaced to an end user.
///
/// Internal reason codes stay in logs and audit records; callers outside
/// the trust boundary only ever learn one of these three.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserOutcome {
    /// The caller must authenticate again.
    Reauthenticate,
    /// The operation was transient; the caller may retry.
    Retry,
    /// The service cannot currently handle the request.
    ServiceUnavailable,
}

/// The unified application error used throughout Idgate.
///
/// All crate-specific errors are mapped into `AppError` using `From`
/// impls or explicit `.map_err()` calls.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// Create a new application error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new application error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a not-found error.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authentication, message)
    }

    /// Create an authorization error.
    pub fn authorization(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Authorization, message)
    }

    /// Create a session error.
    pub fn session(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Session, message)
    }

    /// Create a replay error.
    pub fn replay(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Replay, message)
    }

    /// Create a conflict error.
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Conflict, message)
    }

    /// Create a signing error.
    pub fn signing(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Signing, message)
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Database, message)
    }

    /// Create a cache error.
    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    /// Create a service-unavailable error.
    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ServiceUnavailable, message)
    }

    /// Map the internal error kind to the caller-facing outcome.
    pub fn user_outcome(&self) -> UserOutcome {
        match self.kind {
            ErrorKind::NotFound
            | ErrorKind::Authentication
            | ErrorKind::Authorization
            | ErrorKind::Session
            | ErrorKind::Replay => UserOutcome::Reauthenticate,
            ErrorKind::Conflict => UserOutcome::Retry,
            ErrorKind::Signing
            | ErrorKind::Database
            | ErrorKind::Cache
            | ErrorKind::Configuration
            | ErrorKind::Serialization
            | ErrorKind::Internal
            | ErrorKind::ServiceUnavailable => UserOutcome::ServiceUnavailable,
        }
    }
}

impl Clone for AppError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON serialization error: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_errors_collapse_to_reauthenticate() {
        for err in [
            AppError::authentication("bad credentials"),
            AppError::session("session expired"),
            AppError::replay("refresh token reuse detected"),
            AppError::not_found("no such session"),
        ] {
            assert_eq!(err.user_outcome(), UserOutcome::Reauthenticate);
        }
    }

    #[test]
    fn conflict_is_retryable() {
        assert_eq!(
            AppError::conflict("rotation lost the race").user_outcome(),
            UserOutcome::Retry
        );
    }

    #[test]
    fn signing_is_service_unavailable() {
        assert_eq!(
            AppError::signing("signing key unavailable").user_outcome(),
            UserOutcome::ServiceUnavailable
        );
    }
}
