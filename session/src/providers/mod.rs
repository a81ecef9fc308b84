//! Provider traits for external dependencies.
//!
//! These traits abstract the identity provider, the interactive browser
//! session, credential and preference storage, user notifications, and
//! token validation so the session reducer can be tested without any of
//! them.
//!
//! Production implementations live in the submodules; test doubles live in
//! [`crate::mocks`].

pub mod file_store;
pub mod hosted;
pub mod keyring_store;
pub mod loopback;
pub mod notifier;
pub mod validator;

pub use file_store::FileLocalStore;
pub use hosted::HostedIdentityProvider;
pub use keyring_store::KeyringSecureStore;
pub use loopback::LoopbackBrowser;
pub use notifier::LogNotifier;
pub use validator::JwksTokenValidator;

use crate::error::Result;
use crate::flow::AuthorizationRequest;
use std::future::Future;

/// Tokens returned by the token endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Access token.
    pub access_token: String,
    /// Id token.
    pub id_token: String,
}

/// Authorization code exchange request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CodeExchange {
    /// Authorization code from the callback.
    pub code: String,
    /// PKCE verifier matching the challenge sent with the request.
    pub code_verifier: String,
    /// Redirect URI used for the authorization request.
    pub redirect_uri: String,
}

/// Hosted OIDC identity provider.
pub trait IdentityProvider: Send + Sync {
    /// URL that starts an authorization with `request`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be built.
    fn authorization_url(&self, request: &AuthorizationRequest) -> Result<String>;

    /// Exchange an authorization code for tokens.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Network request fails
    /// - Provider rejects the code
    /// - Response is malformed or lacks a token
    fn exchange_code(
        &self,
        exchange: &CodeExchange,
    ) -> impl Future<Output = Result<TokenSet>> + Send;

    /// URL that ends the provider session and returns to `redirect_uri`.
    ///
    /// # Errors
    ///
    /// Returns error if the URL cannot be built.
    fn end_session_url(&self, redirect_uri: &str) -> Result<String>;
}

/// Outcome of an interactive browser session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserOutcome {
    /// The provider redirected back to the redirect URI.
    Success {
        /// Full callback URL including the query string
        callback_url: String,
    },
    /// The user cancelled.
    Cancelled,
    /// The session was closed without reaching the redirect URI.
    Dismissed,
}

/// System browser session that ends at a redirect URI.
pub trait AuthSessionBrowser: Send + Sync {
    /// Open `url` and wait until the browser reaches `redirect_uri`.
    ///
    /// # Errors
    ///
    /// Returns error if the browser cannot be opened.
    fn open_auth_session(
        &self,
        url: &str,
        redirect_uri: &str,
    ) -> impl Future<Output = Result<BrowserOutcome>> + Send;
}

/// Encrypted key/value storage for credentials.
pub trait SecureStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;

    /// Remove a value. Removing a missing key succeeds.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn delete(&self, key: &str) -> impl Future<Output = Result<()>> + Send;
}

/// Unsecured key/value storage for preferences.
pub trait LocalStore: Send + Sync {
    /// Read a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<String>>> + Send;

    /// Write a value.
    ///
    /// # Errors
    ///
    /// Returns error if the backend fails.
    fn set(&self, key: &str, value: &str) -> impl Future<Output = Result<()>> + Send;
}

/// User-visible notifications (snackbars).
pub trait Notifier: Send + Sync {
    /// Show `message` to the user.
    fn show_snackbar(&self, message: &str);
}

/// Result of validating a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenValidation {
    /// Whether the token passed every check.
    pub valid: bool,
    /// Why it failed, or a short confirmation.
    pub message: String,
}

impl TokenValidation {
    /// A passing validation.
    #[must_use]
    pub fn valid() -> Self {
        Self {
            valid: true,
            message: "token is valid".to_string(),
        }
    }

    /// A failing validation.
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            valid: false,
            message: message.into(),
        }
    }
}

/// Token signature and claim validation.
pub trait TokenValidator: Send + Sync {
    /// Validate `token` as issued by `issuer`.
    ///
    /// Problems with the token itself yield an invalid [`TokenValidation`].
    ///
    /// # Errors
    ///
    /// Returns error only if validation could not run (e.g. JWKS unreachable).
    fn validate(
        &self,
        token: &str,
        issuer: &str,
    ) -> impl Future<Output = Result<TokenValidation>> + Send;
}
