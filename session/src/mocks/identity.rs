//! Scripted identity provider.

use super::{TEST_ISSUER, fake_jwt, lock};
use crate::error::{Result, SessionError};
use crate::flow::AuthorizationRequest;
use crate::providers::{CodeExchange, IdentityProvider, TokenSet};
use std::sync::{Arc, Mutex};

/// Mock [`IdentityProvider`].
///
/// Exchanges return the configured token set (by default a user `kp_test`
/// named Ada) and are recorded for inspection.
#[derive(Debug, Clone)]
pub struct MockIdentityProvider {
    response: Arc<Mutex<Result<TokenSet>>>,
    exchanges: Arc<Mutex<Vec<CodeExchange>>>,
}

impl MockIdentityProvider {
    /// Provider that issues [`Self::default_tokens`].
    #[must_use]
    pub fn new() -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(Self::default_tokens()))),
            exchanges: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Tokens for a signed-in test user.
    #[must_use]
    pub fn default_tokens() -> TokenSet {
        TokenSet {
            id_token: fake_jwt(&serde_json::json!({
                "iss": TEST_ISSUER,
                "sub": "kp_test",
                "given_name": "Ada",
                "family_name": "Lovelace",
                "email": "ada@example.com",
            })),
            access_token: fake_jwt(&serde_json::json!({
                "iss": TEST_ISSUER,
                "sub": "kp_test",
            })),
        }
    }

    /// Issue `tokens` from now on.
    pub fn issue(&self, tokens: TokenSet) {
        *lock(&self.response) = Ok(tokens);
    }

    /// Reject exchanges with `error` from now on.
    pub fn reject(&self, error: SessionError) {
        *lock(&self.response) = Err(error);
    }

    /// Exchanges requested so far.
    #[must_use]
    pub fn exchanges(&self) -> Vec<CodeExchange> {
        lock(&self.exchanges).clone()
    }
}

impl Default for MockIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl IdentityProvider for MockIdentityProvider {
    fn authorization_url(&self, request: &AuthorizationRequest) -> Result<String> {
        request.url(&format!("{TEST_ISSUER}/oauth2/auth"))
    }

    async fn exchange_code(&self, exchange: &CodeExchange) -> Result<TokenSet> {
        lock(&self.exchanges).push(exchange.clone());
        lock(&self.response).clone()
    }

    fn end_session_url(&self, redirect_uri: &str) -> Result<String> {
        let query = serde_urlencoded::to_string([("redirect", redirect_uri)])
            .map_err(|e| SessionError::Provider(e.to_string()))?;
        Ok(format!("{TEST_ISSUER}/logout?{query}"))
    }
}
