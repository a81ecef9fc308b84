//! Session actions.
//!
//! Commands are requests from the application (`CheckAuthentication`,
//! `Authenticate`, `Logout`, `SetDarkMode`, `LoadPreferences`). Everything
//! else is an event, either produced by effects or used directly to move
//! the busy flag.

use crate::error::SessionError;
use crate::state::{DarkMode, Prompt, SessionOperation, UserProfile};
use uuid::Uuid;

/// Session actions (commands and events).
#[derive(Debug, Clone, PartialEq)]
pub enum SessionAction {
    // ═══════════════════════════════════════════════════════════
    // Commands
    // ═══════════════════════════════════════════════════════════

    /// Read stored credentials and rebuild the session from them.
    CheckAuthentication {
        /// Correlates the command with its `LoggedIn` result
        correlation_id: Uuid,
    },

    /// Start the interactive authorization flow.
    Authenticate {
        /// Correlates the command with its terminal event
        correlation_id: Uuid,
        /// Which provider screen to open
        prompt: Prompt,
    },

    /// End the session locally and at the provider.
    Logout {
        /// Correlates the command with its `LoggedOut` result
        correlation_id: Uuid,
    },

    /// Change and persist the theme preference (`None` means system).
    SetDarkMode {
        /// New preference
        mode: Option<DarkMode>,
    },

    /// Load persisted preferences into the session.
    LoadPreferences,

    // ═══════════════════════════════════════════════════════════
    // Events
    // ═══════════════════════════════════════════════════════════

    /// Busy flag changed.
    LoggingIn {
        /// New value of `is_logging_in`
        logging_in: bool,
    },

    /// Authentication check finished (user `None` means unauthenticated).
    LoggedIn {
        /// Correlation id of the command that caused the check
        correlation_id: Uuid,
        /// Profile from the id token
        user: Option<UserProfile>,
        /// Stored id token
        id_token: Option<String>,
        /// Stored access token
        access_token: Option<String>,
    },

    /// Tokens were exchanged, validated, and persisted.
    AuthorizationGranted {
        /// Correlation id of the `Authenticate` command
        correlation_id: Uuid,
        /// Prompt the flow was started with
        prompt: Prompt,
    },

    /// The authorization flow ended without tokens.
    AuthenticationFailed {
        /// Correlation id of the `Authenticate` command
        correlation_id: Uuid,
        /// Prompt the flow was started with
        prompt: Prompt,
        /// Why the flow failed
        error: SessionError,
    },

    /// Remote end-session and slot clearing finished.
    LoggedOut {
        /// Correlation id of the `Logout` command
        correlation_id: Uuid,
    },

    /// Persisted preferences were read.
    PreferencesLoaded {
        /// Stored theme preference, if any
        dark_mode: Option<DarkMode>,
    },

    /// A command was refused because another operation owns the session.
    OperationRejected {
        /// Correlation id of the refused command
        correlation_id: Uuid,
        /// What the refused command asked for
        requested: SessionOperation,
        /// The operation that owns the session
        active: SessionOperation,
    },
}

impl SessionAction {
    /// Start a login flow with a fresh correlation id.
    #[must_use]
    pub fn login() -> Self {
        Self::Authenticate {
            correlation_id: Uuid::new_v4(),
            prompt: Prompt::Login,
        }
    }

    /// Start a registration flow with a fresh correlation id.
    #[must_use]
    pub fn register() -> Self {
        Self::Authenticate {
            correlation_id: Uuid::new_v4(),
            prompt: Prompt::Signup,
        }
    }

    /// Correlation id carried by this action, if any.
    #[must_use]
    pub const fn correlation_id(&self) -> Option<Uuid> {
        match self {
            Self::CheckAuthentication { correlation_id }
            | Self::Authenticate { correlation_id, .. }
            | Self::Logout { correlation_id }
            | Self::LoggedIn { correlation_id, .. }
            | Self::AuthorizationGranted { correlation_id, .. }
            | Self::AuthenticationFailed { correlation_id, .. }
            | Self::LoggedOut { correlation_id }
            | Self::OperationRejected { correlation_id, .. } => Some(*correlation_id),
            Self::SetDarkMode { .. }
            | Self::LoadPreferences
            | Self::LoggingIn { .. }
            | Self::PreferencesLoaded { .. } => None,
        }
    }

    /// Whether this event ends the operation identified by `correlation_id`.
    ///
    /// `AuthorizationGranted` is not terminal: the authentication check it
    /// triggers finishes with `LoggedIn`.
    #[must_use]
    pub fn terminates(&self, correlation_id: Uuid) -> bool {
        matches!(
            self,
            Self::LoggedIn { .. }
                | Self::AuthenticationFailed { .. }
                | Self::LoggedOut { .. }
                | Self::OperationRejected { .. }
        ) && self.correlation_id() == Some(correlation_id)
    }
}
