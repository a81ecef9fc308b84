//! Redirect URI and provider endpoint resolution.
//!
//! The redirect URI depends on where the client runs: a native build
//! registers a custom scheme, a web build redirects to its own origin, and
//! desktop tooling listens on a loopback port. Provider endpoints follow the
//! hosted issuer's URL conventions unless discovery is requested.

use crate::error::ConfigError;
use serde::Deserialize;
use url::Url;

/// Where the client runs, which determines the redirect URI shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// Native app with a registered custom URL scheme.
    Native {
        /// Scheme without `://`, e.g. `streckenheld`
        scheme: String,
    },
    /// Web build served from an origin.
    Web {
        /// Origin such as `https://app.streckenheld.com`
        origin: String,
    },
    /// Local listener on `127.0.0.1`.
    Loopback {
        /// Port the callback listener binds to
        port: u16,
    },
}

/// Build the redirect URI for `platform` and `path`.
///
/// Leading slashes in `path` are ignored, so `"/login"` and `"login"` give
/// the same URI.
///
/// # Errors
///
/// Returns [`ConfigError::Invalid`] if the scheme or origin is unusable or
/// the result is not a valid URL.
pub fn make_redirect_uri(platform: &Platform, path: &str) -> Result<String, ConfigError> {
    let path = path.trim_start_matches('/');

    let uri = match platform {
        Platform::Native { scheme } => {
            let valid = scheme
                .chars()
                .next()
                .is_some_and(|c| c.is_ascii_alphabetic())
                && scheme
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
            if !valid {
                return Err(ConfigError::Invalid {
                    field: "redirect_scheme",
                    reason: format!("'{scheme}' is not a URL scheme"),
                });
            }
            format!("{scheme}://{path}")
        },
        Platform::Web { origin } => {
            let origin = Url::parse(origin).map_err(|e| ConfigError::Invalid {
                field: "redirect_origin",
                reason: e.to_string(),
            })?;
            format!("{}/{path}", origin.as_str().trim_end_matches('/'))
        },
        Platform::Loopback { port } => format!("http://127.0.0.1:{port}/{path}"),
    };

    Url::parse(&uri).map_err(|e| ConfigError::Invalid {
        field: "redirect_uri",
        reason: e.to_string(),
    })?;

    Ok(uri)
}

/// Endpoints of the hosted identity provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    /// Issuer URL, as it appears in the `iss` claim.
    pub issuer: String,
    /// Authorization endpoint.
    pub authorization_endpoint: String,
    /// Token endpoint.
    pub token_endpoint: String,
    /// End-session (logout) endpoint.
    pub end_session_endpoint: String,
    /// JSON Web Key Set used to verify token signatures.
    pub jwks_uri: String,
}

#[derive(Debug, Deserialize)]
struct DiscoveryDocument {
    issuer: String,
    authorization_endpoint: String,
    token_endpoint: String,
    end_session_endpoint: Option<String>,
    jwks_uri: String,
}

impl ProviderEndpoints {
    /// Derive endpoints from the issuer using the hosted provider's layout.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `issuer` is not an http(s) URL.
    pub fn from_issuer(issuer: &str) -> Result<Self, ConfigError> {
        let issuer = normalize_issuer(issuer)?;
        Ok(Self {
            authorization_endpoint: format!("{issuer}/oauth2/auth"),
            token_endpoint: format!("{issuer}/oauth2/token"),
            end_session_endpoint: format!("{issuer}/logout"),
            jwks_uri: format!("{issuer}/.well-known/jwks.json"),
            issuer,
        })
    }

    /// Fetch endpoints from the issuer's OpenID discovery document.
    ///
    /// A document without `end_session_endpoint` falls back to the
    /// conventional logout URL.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Discovery`] if the document cannot be fetched
    /// or parsed, and [`ConfigError::Invalid`] for an unusable issuer.
    pub async fn discover(http: &reqwest::Client, issuer: &str) -> Result<Self, ConfigError> {
        let fallback = Self::from_issuer(issuer)?;
        let url = format!("{}/.well-known/openid-configuration", fallback.issuer);

        tracing::debug!(url = %url, "Fetching discovery document");

        let response = http
            .get(&url)
            .send()
            .await
            .map_err(|e| ConfigError::Discovery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConfigError::Discovery(format!(
                "discovery document returned {}",
                response.status()
            )));
        }

        let document: DiscoveryDocument = response
            .json()
            .await
            .map_err(|e| ConfigError::Discovery(e.to_string()))?;

        Ok(Self {
            issuer: document.issuer.trim_end_matches('/').to_string(),
            authorization_endpoint: document.authorization_endpoint,
            token_endpoint: document.token_endpoint,
            end_session_endpoint: document
                .end_session_endpoint
                .unwrap_or(fallback.end_session_endpoint),
            jwks_uri: document.jwks_uri,
        })
    }
}

fn normalize_issuer(issuer: &str) -> Result<String, ConfigError> {
    let trimmed = issuer.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(ConfigError::Missing("issuer_url"));
    }

    let parsed = Url::parse(trimmed).map_err(|e| ConfigError::Invalid {
        field: "issuer_url",
        reason: e.to_string(),
    })?;
    if !matches!(parsed.scheme(), "https" | "http") {
        return Err(ConfigError::Invalid {
            field: "issuer_url",
            reason: format!("unsupported scheme '{}'", parsed.scheme()),
        });
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;

    #[test]
    fn native_redirect_uses_custom_scheme() {
        let platform = Platform::Native {
            scheme: "streckenheld".to_string(),
        };
        assert_eq!(
            make_redirect_uri(&platform, "/login").ok().as_deref(),
            Some("streckenheld://login")
        );
    }

    #[test]
    fn web_redirect_joins_origin_and_path() {
        let platform = Platform::Web {
            origin: "https://app.streckenheld.com/".to_string(),
        };
        assert_eq!(
            make_redirect_uri(&platform, "login").ok().as_deref(),
            Some("https://app.streckenheld.com/login")
        );
    }

    #[test]
    fn loopback_redirect_uses_port() {
        let platform = Platform::Loopback { port: 8976 };
        assert_eq!(
            make_redirect_uri(&platform, "login").ok().as_deref(),
            Some("http://127.0.0.1:8976/login")
        );
    }

    #[test]
    fn invalid_scheme_is_rejected() {
        let platform = Platform::Native {
            scheme: "9 lives".to_string(),
        };
        assert!(matches!(
            make_redirect_uri(&platform, "login"),
            Err(ConfigError::Invalid { field: "redirect_scheme", .. })
        ));
    }

    #[test]
    fn endpoints_follow_issuer_conventions() {
        let endpoints = ProviderEndpoints::from_issuer("https://streckenheld.kinde.com/").unwrap();

        assert_eq!(endpoints.issuer, "https://streckenheld.kinde.com");
        assert_eq!(
            endpoints.authorization_endpoint,
            "https://streckenheld.kinde.com/oauth2/auth"
        );
        assert_eq!(endpoints.token_endpoint, "https://streckenheld.kinde.com/oauth2/token");
        assert_eq!(endpoints.end_session_endpoint, "https://streckenheld.kinde.com/logout");
        assert_eq!(
            endpoints.jwks_uri,
            "https://streckenheld.kinde.com/.well-known/jwks.json"
        );
    }

    #[test]
    fn empty_or_non_http_issuer_is_rejected() {
        assert_eq!(
            ProviderEndpoints::from_issuer("  "),
            Err(ConfigError::Missing("issuer_url"))
        );
        assert!(matches!(
            ProviderEndpoints::from_issuer("ftp://issuer.example"),
            Err(ConfigError::Invalid { field: "issuer_url", .. })
        ));
    }
}
