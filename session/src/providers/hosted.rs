//! Hosted OIDC identity provider (public client, authorization code + PKCE).

use crate::config::ProviderConfig;
use crate::error::{Result, SessionError};
use crate::flow::AuthorizationRequest;
use crate::providers::{CodeExchange, IdentityProvider, TokenSet};
use crate::redirect::ProviderEndpoints;
use reqwest::Client;
use serde::Deserialize;

/// Identity provider backed by the issuer's OAuth endpoints.
///
/// The client is public: no secret is sent, the PKCE verifier proves
/// possession of the authorization request.
///
/// # Example
///
/// ```no_run
/// # use streckenheld_session::config::SessionConfig;
/// # use streckenheld_session::providers::HostedIdentityProvider;
/// # fn build() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SessionConfig::new("https://streckenheld.kinde.com", "client-id");
/// let provider = HostedIdentityProvider::new(config.http_client()?, &config.resolve_static()?);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct HostedIdentityProvider {
    /// HTTP client for the token endpoint.
    http_client: Client,

    /// Public client id.
    client_id: String,

    /// Issuer endpoints.
    endpoints: ProviderEndpoints,
}

/// Token endpoint success body.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    id_token: Option<String>,
}

/// Token endpoint error body (RFC 6749 section 5.2).
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

impl HostedIdentityProvider {
    /// Create a provider for the resolved configuration.
    #[must_use]
    pub fn new(http_client: Client, config: &ProviderConfig) -> Self {
        Self {
            http_client,
            client_id: config.client_id.clone(),
            endpoints: config.endpoints.clone(),
        }
    }

    /// Endpoints this provider talks to.
    #[must_use]
    pub const fn endpoints(&self) -> &ProviderEndpoints {
        &self.endpoints
    }
}

impl IdentityProvider for HostedIdentityProvider {
    fn authorization_url(&self, request: &AuthorizationRequest) -> Result<String> {
        request.url(&self.endpoints.authorization_endpoint)
    }

    async fn exchange_code(&self, exchange: &CodeExchange) -> Result<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id.as_str()),
            ("code", exchange.code.as_str()),
            ("code_verifier", exchange.code_verifier.as_str()),
            ("redirect_uri", exchange.redirect_uri.as_str()),
        ];

        let response = self
            .http_client
            .post(&self.endpoints.token_endpoint)
            .form(&params)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = match serde_json::from_str::<TokenErrorResponse>(&body) {
                Ok(TokenErrorResponse {
                    error,
                    error_description: Some(description),
                }) => format!("{error}: {description}"),
                Ok(TokenErrorResponse { error, .. }) => error,
                Err(_) => format!("token endpoint returned {status}"),
            };
            tracing::error!(%status, %reason, "Token exchange rejected");
            return Err(SessionError::TokenExchange(reason));
        }

        let tokens: TokenResponse = response
            .json()
            .await
            .map_err(|e| SessionError::TokenExchange(format!("malformed token response: {e}")))?;

        let Some(id_token) = tokens.id_token.filter(|token| !token.is_empty()) else {
            return Err(SessionError::TokenExchange("no id token returned".to_string()));
        };
        if tokens.access_token.is_empty() {
            return Err(SessionError::TokenExchange("no access token returned".to_string()));
        }

        tracing::debug!("Token exchange succeeded");
        Ok(TokenSet {
            access_token: tokens.access_token,
            id_token,
        })
    }

    fn end_session_url(&self, redirect_uri: &str) -> Result<String> {
        let query = serde_urlencoded::to_string([("redirect", redirect_uri)])
            .map_err(|e| SessionError::Provider(format!("failed to build logout URL: {e}")))?;
        Ok(format!("{}?{query}", self.endpoints.end_session_endpoint))
    }
}
