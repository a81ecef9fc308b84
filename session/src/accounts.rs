//! Account management API.
//!
//! The backend answers `DELETE {api_base_url}/accounts` with
//! `{"ok": true}` or `{"ok": false, "error": "..."}`. The request is
//! authorized with the id token.

use crate::error::{Result, SessionError};
use serde::Deserialize;
use std::future::Future;

/// Body of an account deletion response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DeleteAccountResponse {
    /// Whether the request was accepted.
    #[serde(default)]
    pub ok: bool,
    /// Reason for a refusal.
    #[serde(default)]
    pub error: Option<String>,
}

impl DeleteAccountResponse {
    /// An accepted request.
    #[must_use]
    pub const fn accepted() -> Self {
        Self {
            ok: true,
            error: None,
        }
    }

    /// A refused request.
    #[must_use]
    pub fn refused(error: impl Into<String>) -> Self {
        Self {
            ok: false,
            error: Some(error.into()),
        }
    }
}

/// Backend account operations.
pub trait AccountsApi: Send + Sync {
    /// Ask the backend to delete the account the id token belongs to.
    ///
    /// # Errors
    ///
    /// Returns error if the request cannot be sent or the body is not JSON.
    /// A refusal by the backend is a successful response with `ok == false`.
    fn delete_account(
        &self,
        id_token: &str,
    ) -> impl Future<Output = Result<DeleteAccountResponse>> + Send;
}

/// [`AccountsApi`] over HTTP.
#[derive(Debug, Clone)]
pub struct HttpAccountsApi {
    http: reqwest::Client,
    base_url: String,
}

impl HttpAccountsApi {
    /// Create a client for the API at `base_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

impl AccountsApi for HttpAccountsApi {
    async fn delete_account(&self, id_token: &str) -> Result<DeleteAccountResponse> {
        let url = format!("{}/accounts", self.base_url);
        tracing::debug!(%url, "Requesting account deletion");

        let response = self
            .http
            .delete(&url)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .bearer_auth(id_token)
            .send()
            .await?;

        let status = response.status();
        let body: DeleteAccountResponse = response.json().await.map_err(|e| {
            SessionError::Network(format!("unexpected account API response ({status}): {e}"))
        })?;

        if !body.ok {
            tracing::debug!(%status, error = ?body.error, "Account deletion refused");
        }
        Ok(body)
    }
}
