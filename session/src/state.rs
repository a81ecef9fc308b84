//! Session state types.
//!
//! [`Session`] is the reducer state. It is only ever mutated by
//! [`crate::reducers::SessionReducer`]; everything else observes snapshots.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The authenticated session as seen by the application shell.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Session {
    /// True while an authorization, token exchange, or authentication check
    /// is in flight.
    pub is_logging_in: bool,

    /// True iff `user` is present.
    pub is_logged_in: bool,

    /// Profile projected from the id token.
    pub user: Option<UserProfile>,

    /// Raw id token of the current session.
    pub id_token: Option<String>,

    /// Raw access token of the current session.
    pub access_token: Option<String>,

    /// Theme preference.
    pub dark_mode: DarkMode,

    /// The operation currently owning the session.
    ///
    /// Set by commands, cleared by their terminal event.
    pub pending: Option<SessionOperation>,
}

impl Session {
    /// Replace user and tokens with the outcome of an authentication check.
    ///
    /// Tokens are only kept alongside a user, so there is never a partially
    /// authenticated session.
    pub fn apply_authentication(
        &mut self,
        user: Option<UserProfile>,
        id_token: Option<String>,
        access_token: Option<String>,
    ) {
        if user.is_some() {
            self.id_token = id_token;
            self.access_token = access_token;
        } else {
            self.id_token = None;
            self.access_token = None;
        }
        self.is_logged_in = user.is_some();
        self.user = user;
    }

    /// Drop user and tokens.
    pub fn clear_authentication(&mut self) {
        self.apply_authentication(None, None, None);
    }
}

/// User profile projected from id-token claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    /// Subject (`sub` claim).
    pub id: String,
    /// `given_name` claim.
    pub given_name: Option<String>,
    /// `family_name` claim.
    pub family_name: Option<String>,
    /// `email` claim.
    pub email: Option<String>,
    /// `picture` claim.
    pub picture: Option<String>,
}

impl UserProfile {
    /// Name shown in greetings: the given name, else the local part of the
    /// email address, else `"guest"`.
    #[must_use]
    pub fn display_name(&self) -> &str {
        if let Some(name) = self.given_name.as_deref().filter(|n| !n.is_empty()) {
            return name;
        }
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("guest")
    }
}

/// Theme preference, persisted under `darkMode`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DarkMode {
    /// Follow the system color scheme.
    #[default]
    System,
    /// Always light.
    Light,
    /// Always dark.
    Dark,
}

impl DarkMode {
    /// The wire name (`"system"`, `"light"`, `"dark"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::System => "system",
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    /// The color scheme to render with, given the system's current scheme.
    #[must_use]
    pub const fn resolve(self, system: ColorScheme) -> ColorScheme {
        match self {
            Self::System => system,
            Self::Light => ColorScheme::Light,
            Self::Dark => ColorScheme::Dark,
        }
    }
}

impl fmt::Display for DarkMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DarkMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [Self::System, Self::Light, Self::Dark]
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown dark mode `{s}` (expected system, light or dark)"))
    }
}

/// A concrete color scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ColorScheme {
    /// Light appearance.
    Light,
    /// Dark appearance.
    Dark,
}

/// Which screen the provider should open on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Prompt {
    /// Sign-in screen (`prompt=login`).
    Login,
    /// Registration screen (`prompt=signup`).
    Signup,
}

impl Prompt {
    /// Value of the `prompt` authorization parameter.
    #[must_use]
    pub const fn as_param(self) -> &'static str {
        match self {
            Self::Login => "login",
            Self::Signup => "signup",
        }
    }

    /// The session operation this prompt starts.
    #[must_use]
    pub const fn operation(self) -> SessionOperation {
        match self {
            Self::Login => SessionOperation::Login,
            Self::Signup => SessionOperation::Register,
        }
    }

    /// Prefix of the user-visible failure notice.
    #[must_use]
    pub const fn failure_label(self) -> &'static str {
        match self {
            Self::Login => "Login failed",
            Self::Signup => "Register failed",
        }
    }
}

impl fmt::Display for Prompt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_param())
    }
}

/// Operations that take exclusive ownership of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionOperation {
    /// Reading stored credentials into the session.
    CheckAuthentication,
    /// Interactive sign-in.
    Login,
    /// Interactive registration.
    Register,
    /// Ending the session.
    Logout,
}

impl fmt::Display for SessionOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::CheckAuthentication => "authentication check",
            Self::Login => "login",
            Self::Register => "registration",
            Self::Logout => "logout",
        })
    }
}

/// Which credential slot to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenKind {
    /// The `accessToken` slot.
    Access,
    /// The `idToken` slot.
    Id,
}
