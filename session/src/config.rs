//! Session configuration.
//!
//! [`SessionConfig`] holds what the operator configures. Resolving it
//! against the provider yields a [`ProviderConfig`]: the concrete endpoints,
//! client id, and redirect URI the flow runs with.

use crate::constants::{
    DEFAULT_API_BASE_URL, DEFAULT_HTTP_TIMEOUT, DEFAULT_LOOPBACK_PORT,
    DEFAULT_OPERATION_TIMEOUT, DEFAULT_REDIRECT_PATH,
};
use crate::error::ConfigError;
use crate::redirect::{Platform, ProviderEndpoints, make_redirect_uri};
use std::time::Duration;

/// Environment variable holding the issuer URL (required).
pub const ENV_ISSUER_URL: &str = "STRECKENHELD_ISSUER_URL";
/// Environment variable holding the OAuth client id (required).
pub const ENV_CLIENT_ID: &str = "STRECKENHELD_CLIENT_ID";
/// Environment variable overriding the API base URL.
pub const ENV_API_BASE_URL: &str = "STRECKENHELD_API_BASE_URL";
/// Environment variable selecting a native redirect scheme.
pub const ENV_REDIRECT_SCHEME: &str = "STRECKENHELD_REDIRECT_SCHEME";
/// Environment variable selecting the loopback redirect port.
pub const ENV_REDIRECT_PORT: &str = "STRECKENHELD_REDIRECT_PORT";
/// Environment variable enabling OpenID discovery (`true`).
pub const ENV_DISCOVERY: &str = "STRECKENHELD_DISCOVERY";

/// Session subsystem configuration.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use streckenheld_session::config::SessionConfig;
/// use streckenheld_session::redirect::Platform;
///
/// let config = SessionConfig::new("https://streckenheld.kinde.com", "client-123")
///     .with_platform(Platform::Native { scheme: "streckenheld".into() })
///     .with_operation_timeout(Duration::from_secs(120));
///
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Issuer URL of the hosted identity provider.
    pub issuer_url: String,

    /// OAuth client id.
    pub client_id: String,

    /// Base URL of the Streckenheld API (account deletion).
    pub api_base_url: String,

    /// Where the client runs.
    ///
    /// Default: loopback on port 8976
    pub platform: Platform,

    /// Path component of the redirect URI.
    ///
    /// Default: `login`
    pub redirect_path: String,

    /// Fetch endpoints from the discovery document instead of deriving them.
    ///
    /// Default: false
    pub use_discovery: bool,

    /// Timeout for each HTTP request.
    pub http_timeout: Duration,

    /// How long a manager call waits for its operation to finish.
    pub operation_timeout: Duration,
}

impl SessionConfig {
    /// Create a configuration with defaults for everything but the provider.
    #[must_use]
    pub fn new(issuer_url: impl Into<String>, client_id: impl Into<String>) -> Self {
        Self {
            issuer_url: issuer_url.into(),
            client_id: client_id.into(),
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            platform: Platform::Loopback {
                port: DEFAULT_LOOPBACK_PORT,
            },
            redirect_path: DEFAULT_REDIRECT_PATH.to_string(),
            use_discovery: false,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Read configuration from `STRECKENHELD_*` environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Missing`] if the issuer or client id is unset,
    /// and [`ConfigError::Invalid`] for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Same as [`SessionConfig::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let issuer_url = get(ENV_ISSUER_URL).ok_or(ConfigError::Missing(ENV_ISSUER_URL))?;
        let client_id = get(ENV_CLIENT_ID).ok_or(ConfigError::Missing(ENV_CLIENT_ID))?;

        let mut config = Self::new(issuer_url, client_id);

        if let Some(api_base_url) = get(ENV_API_BASE_URL) {
            config = config.with_api_base_url(api_base_url);
        }

        if let Some(scheme) = get(ENV_REDIRECT_SCHEME) {
            config = config.with_platform(Platform::Native { scheme });
        } else if let Some(port) = get(ENV_REDIRECT_PORT) {
            let port = port.trim().parse::<u16>().map_err(|e| ConfigError::Invalid {
                field: ENV_REDIRECT_PORT,
                reason: e.to_string(),
            })?;
            config = config.with_platform(Platform::Loopback { port });
        }

        if let Some(discovery) = get(ENV_DISCOVERY) {
            let enabled = match discovery.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => true,
                "false" | "0" | "no" => false,
                other => {
                    return Err(ConfigError::Invalid {
                        field: ENV_DISCOVERY,
                        reason: format!("expected true or false, got '{other}'"),
                    });
                },
            };
            config = config.with_discovery(enabled);
        }

        Ok(config)
    }

    /// Set the API base URL.
    #[must_use]
    pub fn with_api_base_url(mut self, url: impl Into<String>) -> Self {
        self.api_base_url = url.into();
        self
    }

    /// Set the platform.
    #[must_use]
    pub fn with_platform(mut self, platform: Platform) -> Self {
        self.platform = platform;
        self
    }

    /// Set the redirect path.
    #[must_use]
    pub fn with_redirect_path(mut self, path: impl Into<String>) -> Self {
        self.redirect_path = path.into();
        self
    }

    /// Enable or disable OpenID discovery.
    #[must_use]
    pub const fn with_discovery(mut self, enabled: bool) -> Self {
        self.use_discovery = enabled;
        self
    }

    /// Set the HTTP request timeout.
    #[must_use]
    pub const fn with_http_timeout(mut self, timeout: Duration) -> Self {
        self.http_timeout = timeout;
        self
    }

    /// Set the operation timeout.
    #[must_use]
    pub const fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    /// Check the configuration without touching the network.
    ///
    /// # Errors
    ///
    /// Returns the first problem found.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.client_id.trim().is_empty() {
            return Err(ConfigError::Missing("client_id"));
        }
        ProviderEndpoints::from_issuer(&self.issuer_url)?;
        make_redirect_uri(&self.platform, &self.redirect_path)?;
        url::Url::parse(&self.api_base_url).map_err(|e| ConfigError::Invalid {
            field: "api_base_url",
            reason: e.to_string(),
        })?;
        if self.operation_timeout.is_zero() {
            return Err(ConfigError::Invalid {
                field: "operation_timeout",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    /// Resolve provider endpoints and the redirect URI.
    ///
    /// Uses discovery when enabled, otherwise issuer conventions.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if validation or discovery fails.
    pub async fn resolve(&self, http: &reqwest::Client) -> Result<ProviderConfig, ConfigError> {
        self.validate()?;

        let endpoints = if self.use_discovery {
            ProviderEndpoints::discover(http, &self.issuer_url).await?
        } else {
            ProviderEndpoints::from_issuer(&self.issuer_url)?
        };

        Ok(ProviderConfig {
            client_id: self.client_id.clone(),
            redirect_uri: make_redirect_uri(&self.platform, &self.redirect_path)?,
            endpoints,
        })
    }

    /// Resolve without discovery.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if validation fails.
    pub fn resolve_static(&self) -> Result<ProviderConfig, ConfigError> {
        self.validate()?;
        Ok(ProviderConfig {
            client_id: self.client_id.clone(),
            redirect_uri: make_redirect_uri(&self.platform, &self.redirect_path)?,
            endpoints: ProviderEndpoints::from_issuer(&self.issuer_url)?,
        })
    }

    /// Build the HTTP client shared by the production providers.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if the TLS backend cannot start.
    pub fn http_client(&self) -> Result<reqwest::Client, ConfigError> {
        reqwest::Client::builder()
            .timeout(self.http_timeout)
            .build()
            .map_err(|e| ConfigError::Invalid {
                field: "http_timeout",
                reason: e.to_string(),
            })
    }
}

/// Resolved provider settings the authorization flow runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// OAuth client id.
    pub client_id: String,
    /// Redirect URI registered with the provider.
    pub redirect_uri: String,
    /// Provider endpoints.
    pub endpoints: ProviderEndpoints,
}
