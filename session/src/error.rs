//! Error types for session and authentication operations.

use crate::state::SessionOperation;
use streckenheld_runtime::StoreError;
use thiserror::Error;

/// Result type alias for session operations.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Configuration errors.
///
/// Raised while the session subsystem is being initialized. All of them are
/// fatal: a manager is never constructed from an invalid configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A required environment variable is not set.
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    /// A configuration value could not be used.
    #[error("Invalid configuration value for {field}: {reason}")]
    Invalid {
        /// Name of the offending field or variable
        field: &'static str,
        /// Why the value was rejected
        reason: String,
    },

    /// The issuer's discovery document could not be fetched or parsed.
    #[error("Provider discovery failed: {0}")]
    Discovery(String),
}

/// Session error taxonomy.
///
/// Flow failures are reported to the user through the notifier using the
/// `Display` text, so messages are written to be read by end users.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SessionError {
    // ═══════════════════════════════════════════════════════════
    // Authorization Flow Errors
    // ═══════════════════════════════════════════════════════════

    /// The user cancelled or dismissed the interactive session.
    #[error("no token returned")]
    Cancelled,

    /// The provider redirected back with an `error` parameter.
    #[error("provider returned error: {0}")]
    Provider(String),

    /// The callback `state` did not match the request (CSRF protection).
    #[error("authorization state mismatch")]
    StateMismatch,

    /// The callback carried no authorization code.
    #[error("no authorization code returned")]
    MissingAuthorizationCode,

    /// The token endpoint rejected the exchange or returned no usable tokens.
    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    // ═══════════════════════════════════════════════════════════
    // Token Errors
    // ═══════════════════════════════════════════════════════════

    /// A token failed signature or claim validation.
    #[error("invalid token: {0}")]
    InvalidToken(String),

    /// A token's payload could not be decoded.
    #[error("malformed token: {0}")]
    MalformedToken(String),

    // ═══════════════════════════════════════════════════════════
    // Infrastructure Errors
    // ═══════════════════════════════════════════════════════════

    /// Secure or local storage failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A network request failed.
    #[error("network error: {0}")]
    Network(String),

    // ═══════════════════════════════════════════════════════════
    // Session Manager Errors
    // ═══════════════════════════════════════════════════════════

    /// Another session operation is still running.
    #[error("{active} already in progress")]
    OperationInProgress {
        /// The operation that owns the session
        active: SessionOperation,
    },

    /// The operation result did not arrive in time.
    #[error("operation timed out")]
    Timeout,

    /// The task running the operation died before reporting a result.
    #[error("operation ended unexpectedly")]
    Aborted,

    /// The store runtime rejected the request.
    #[error("session store unavailable: {0}")]
    Store(StoreError),

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl SessionError {
    /// Whether the user ended the interactive session themselves.
    #[must_use]
    pub const fn is_user_cancellation(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// Tokens were granted and stored but do not identify a user.
    #[must_use]
    pub fn missing_user() -> Self {
        Self::InvalidToken("stored tokens do not describe a user".to_string())
    }
}

impl From<StoreError> for SessionError {
    fn from(error: StoreError) -> Self {
        match error {
            StoreError::Timeout => Self::Timeout,
            other => Self::Store(other),
        }
    }
}

impl From<reqwest::Error> for SessionError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancellation_reads_like_the_login_notice() {
        assert_eq!(SessionError::Cancelled.to_string(), "no token returned");
        assert!(SessionError::Cancelled.is_user_cancellation());
        assert!(!SessionError::StateMismatch.is_user_cancellation());
    }

    #[test]
    fn store_timeout_maps_to_session_timeout() {
        assert_eq!(SessionError::from(StoreError::Timeout), SessionError::Timeout);
        assert_eq!(
            SessionError::from(StoreError::ShutdownInProgress),
            SessionError::Store(StoreError::ShutdownInProgress)
        );
    }

    #[test]
    fn operation_in_progress_names_the_active_operation() {
        let error = SessionError::OperationInProgress {
            active: SessionOperation::Logout,
        };
        assert_eq!(error.to_string(), "logout already in progress");
    }
}
