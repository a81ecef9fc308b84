//! Authorization code flow with PKCE.
//!
//! ```text
//! AuthorizationRequest ──► browser ──► callback ──► code exchange
//!                                                       │
//!                      persist slots ◄── validate ◄─────┘
//! ```
//!
//! The flow never touches session state. It ends either with both
//! credential slots written or with an error and nothing written.

use crate::constants::{ACCESS_TOKEN_KEY, HAS_SUCCESS_PAGE, ID_TOKEN_KEY, SCOPES};
use crate::environment::SessionEnvironment;
use crate::error::{ConfigError, Result, SessionError};
use crate::providers::{
    AuthSessionBrowser, BrowserOutcome, CodeExchange, IdentityProvider, LocalStore, Notifier,
    SecureStore, TokenSet, TokenValidator,
};
use crate::state::{Prompt, TokenKind};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use rand::RngCore;
use sha2::{Digest, Sha256};
use streckenheld_core::environment::Clock;
use url::Url;

/// PKCE verifier and its S256 challenge.
#[derive(Clone, PartialEq, Eq)]
pub struct Pkce {
    /// Secret sent with the code exchange.
    pub verifier: String,
    /// `BASE64URL(SHA256(verifier))`, sent with the authorization request.
    pub challenge: String,
}

impl std::fmt::Debug for Pkce {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pkce")
            .field("challenge", &self.challenge)
            .finish_non_exhaustive()
    }
}

impl Pkce {
    /// Generate a fresh verifier from 32 random bytes.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self::from_verifier(URL_SAFE_NO_PAD.encode(bytes))
    }

    /// Derive the challenge for a known verifier.
    #[must_use]
    pub fn from_verifier(verifier: String) -> Self {
        let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
        Self {
            verifier,
            challenge,
        }
    }
}

fn random_state() -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// One authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationRequest {
    /// Client id.
    pub client_id: String,
    /// Redirect URI the provider returns to.
    pub redirect_uri: String,
    /// CSRF token echoed back in the callback.
    pub state: String,
    /// PKCE pair.
    pub pkce: Pkce,
    /// Provider screen to open.
    pub prompt: Prompt,
}

impl AuthorizationRequest {
    /// Create a request with fresh state and PKCE values.
    #[must_use]
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>, prompt: Prompt) -> Self {
        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            state: random_state(),
            pkce: Pkce::generate(),
            prompt,
        }
    }

    /// Query parameters of the authorization URL.
    #[must_use]
    pub fn params(&self) -> Vec<(&str, String)> {
        vec![
            ("client_id", self.client_id.clone()),
            ("redirect_uri", self.redirect_uri.clone()),
            ("response_type", "code".to_string()),
            ("scope", SCOPES.join(" ")),
            ("state", self.state.clone()),
            ("code_challenge", self.pkce.challenge.clone()),
            ("code_challenge_method", "S256".to_string()),
            (HAS_SUCCESS_PAGE.0, HAS_SUCCESS_PAGE.1.to_string()),
            ("prompt", self.prompt.as_param().to_string()),
        ]
    }

    /// Full authorization URL for `authorization_endpoint`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the endpoint is not a URL.
    pub fn url(&self, authorization_endpoint: &str) -> Result<String> {
        let mut url = Url::parse(authorization_endpoint).map_err(|e| ConfigError::Invalid {
            field: "authorization_endpoint",
            reason: e.to_string(),
        })?;
        url.query_pairs_mut().extend_pairs(self.params());
        Ok(url.into())
    }
}

/// Extract the authorization code from a callback URL.
///
/// # Errors
///
/// - [`SessionError::Provider`] if the callback carries `error`
/// - [`SessionError::StateMismatch`] if `state` is missing or different
/// - [`SessionError::MissingAuthorizationCode`] if `code` is missing
pub fn parse_callback(callback_url: &str, expected_state: &str) -> Result<String> {
    let url = Url::parse(callback_url)
        .map_err(|e| SessionError::Provider(format!("malformed callback URL: {e}")))?;

    let mut code = None;
    let mut state = None;
    let mut error = None;
    let mut description = None;

    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => error = Some(value.into_owned()),
            "error_description" => description = Some(value.into_owned()),
            _ => {},
        }
    }

    if let Some(error) = error {
        return Err(SessionError::Provider(match description {
            Some(description) => format!("{error}: {description}"),
            None => error,
        }));
    }

    let state_matches = state.is_some_and(|state| {
        constant_time_eq::constant_time_eq(state.as_bytes(), expected_state.as_bytes())
    });
    if !state_matches {
        return Err(SessionError::StateMismatch);
    }

    code.filter(|code| !code.is_empty())
        .ok_or(SessionError::MissingAuthorizationCode)
}

/// Run the interactive flow and persist the resulting tokens.
///
/// # Errors
///
/// Returns [`SessionError::Cancelled`] if the user leaves the browser
/// session, and the corresponding error for every other failure. Nothing
/// is persisted on error.
pub async fn authenticate<P, B, S, L, N, V, C>(
    env: &SessionEnvironment<P, B, S, L, N, V, C>,
    prompt: Prompt,
) -> Result<()>
where
    P: IdentityProvider + Clone,
    B: AuthSessionBrowser + Clone,
    S: SecureStore + Clone,
    L: LocalStore + Clone,
    N: Notifier + Clone,
    V: TokenValidator + Clone,
    C: Clock + Clone,
{
    let request =
        AuthorizationRequest::new(&env.config.client_id, &env.config.redirect_uri, prompt);
    let url = env.provider.authorization_url(&request)?;

    tracing::debug!(prompt = %prompt, "Opening authorization session");
    let callback_url = match env
        .browser
        .open_auth_session(&url, &request.redirect_uri)
        .await?
    {
        BrowserOutcome::Success { callback_url } => callback_url,
        BrowserOutcome::Cancelled | BrowserOutcome::Dismissed => {
            return Err(SessionError::Cancelled);
        },
    };

    let code = parse_callback(&callback_url, &request.state)?;
    tracing::debug!("Authorization code received, exchanging");

    let tokens = env
        .provider
        .exchange_code(&CodeExchange {
            code,
            code_verifier: request.pkce.verifier.clone(),
            redirect_uri: request.redirect_uri.clone(),
        })
        .await?;

    validate_tokens(env, &tokens).await?;
    persist_tokens(&env.secure_store, &tokens).await?;

    tracing::info!(prompt = %prompt, "Authorization granted");
    Ok(())
}

async fn validate_tokens<P, B, S, L, N, V, C>(
    env: &SessionEnvironment<P, B, S, L, N, V, C>,
    tokens: &TokenSet,
) -> Result<()>
where
    P: IdentityProvider + Clone,
    B: AuthSessionBrowser + Clone,
    S: SecureStore + Clone,
    L: LocalStore + Clone,
    N: Notifier + Clone,
    V: TokenValidator + Clone,
    C: Clock + Clone,
{
    let issuer = &env.config.endpoints.issuer;
    for (kind, token) in [
        (TokenKind::Id, &tokens.id_token),
        (TokenKind::Access, &tokens.access_token),
    ] {
        let validation = env.validator.validate(token, issuer).await?;
        if !validation.valid {
            let label = match kind {
                TokenKind::Id => "id",
                TokenKind::Access => "access",
            };
            tracing::error!(token = label, reason = %validation.message, "Token validation failed");
            return Err(SessionError::InvalidToken(format!(
                "{label} token: {}",
                validation.message
            )));
        }
    }
    Ok(())
}

/// Write both credential slots, rolling back on failure.
async fn persist_tokens<S: SecureStore>(store: &S, tokens: &TokenSet) -> Result<()> {
    let written = async {
        store.set(ID_TOKEN_KEY, &tokens.id_token).await?;
        store.set(ACCESS_TOKEN_KEY, &tokens.access_token).await
    }
    .await;

    if let Err(error) = written {
        tracing::warn!(%error, "Persisting tokens failed, clearing credential slots");
        clear_slots(store).await;
        return Err(error);
    }
    Ok(())
}

/// Remove both credential slots, logging failures.
pub async fn clear_slots<S: SecureStore>(store: &S) {
    for key in [ACCESS_TOKEN_KEY, ID_TOKEN_KEY] {
        if let Err(error) = store.delete(key).await {
            tracing::warn!(%error, key, "Failed to clear credential slot");
        }
    }
}

/// End the provider session and clear the credential slots.
///
/// Remote failures are logged, never returned: local sign-out always
/// completes.
pub async fn end_session<P, B, S, L, N, V, C>(env: &SessionEnvironment<P, B, S, L, N, V, C>)
where
    P: IdentityProvider + Clone,
    B: AuthSessionBrowser + Clone,
    S: SecureStore + Clone,
    L: LocalStore + Clone,
    N: Notifier + Clone,
    V: TokenValidator + Clone,
    C: Clock + Clone,
{
    let redirect_uri = &env.config.redirect_uri;
    let remote = async {
        let url = env.provider.end_session_url(redirect_uri)?;
        env.browser.open_auth_session(&url, redirect_uri).await
    }
    .await;

    match remote {
        Ok(outcome) => tracing::debug!(?outcome, "Provider session ended"),
        Err(error) => tracing::warn!(%error, "Ending provider session failed"),
    }

    clear_slots(&env.secure_store).await;
}
