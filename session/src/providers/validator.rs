//! JWKS-based token validation (RS256).

use crate::constants::EXPIRY_LEEWAY_SECONDS;
use crate::error::{Result, SessionError};
use crate::providers::{TokenValidation, TokenValidator};
use crate::tokens::{decode_claims, is_expired};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Client;
use ring::signature::{RSA_PKCS1_2048_8192_SHA256, RsaPublicKeyComponents};
use serde::Deserialize;
use std::sync::Arc;
use streckenheld_core::environment::{Clock, SystemClock};
use tokio::sync::RwLock;

/// One key of a JWK set.
#[derive(Debug, Clone, Deserialize)]
struct Jwk {
    kty: String,
    #[serde(default)]
    kid: Option<String>,
    #[serde(default)]
    n: Option<String>,
    #[serde(default)]
    e: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Debug, Deserialize)]
struct Header {
    alg: String,
    #[serde(default)]
    kid: Option<String>,
}

/// Validates tokens against the issuer's published signing keys.
///
/// Keys are fetched on first use and refetched once when a token names a
/// key id that is not cached (key rotation).
#[derive(Clone, Debug)]
pub struct JwksTokenValidator<C = SystemClock> {
    http_client: Client,
    jwks_uri: String,
    keys: Arc<RwLock<Vec<Jwk>>>,
    clock: C,
}

impl JwksTokenValidator<SystemClock> {
    /// Create a validator for the key set at `jwks_uri`.
    #[must_use]
    pub fn new(http_client: Client, jwks_uri: impl Into<String>) -> Self {
        Self::with_clock(http_client, jwks_uri, SystemClock)
    }
}

impl<C: Clock + Clone> JwksTokenValidator<C> {
    /// Create a validator that checks expiry against `clock`.
    #[must_use]
    pub fn with_clock(http_client: Client, jwks_uri: impl Into<String>, clock: C) -> Self {
        Self {
            http_client,
            jwks_uri: jwks_uri.into(),
            keys: Arc::new(RwLock::new(Vec::new())),
            clock,
        }
    }

    async fn fetch_keys(&self) -> Result<Vec<Jwk>> {
        tracing::debug!(url = %self.jwks_uri, "Fetching signing keys");
        let response = self.http_client.get(&self.jwks_uri).send().await?;
        if !response.status().is_success() {
            return Err(SessionError::Network(format!(
                "JWKS endpoint returned {}",
                response.status()
            )));
        }
        let set: JwkSet = response
            .json()
            .await
            .map_err(|e| SessionError::Network(format!("malformed JWKS: {e}")))?;

        let mut cached = self.keys.write().await;
        cached.clone_from(&set.keys);
        Ok(set.keys)
    }

    async fn find_key(&self, kid: Option<&str>) -> Result<Option<Jwk>> {
        let matches = |key: &Jwk| key.kty == "RSA" && (kid.is_none() || key.kid.as_deref() == kid);

        if let Some(key) = self.keys.read().await.iter().find(|key| matches(key)) {
            return Ok(Some(key.clone()));
        }
        Ok(self.fetch_keys().await?.into_iter().find(|key| matches(key)))
    }
}

fn decode_segment(segment: &str) -> Option<Vec<u8>> {
    URL_SAFE_NO_PAD.decode(segment.trim_end_matches('=')).ok()
}

fn verify_signature(key: &Jwk, signing_input: &str, signature: &[u8]) -> bool {
    let (Some(n), Some(e)) = (
        key.n.as_deref().and_then(decode_segment),
        key.e.as_deref().and_then(decode_segment),
    ) else {
        return false;
    };
    RsaPublicKeyComponents { n: &n, e: &e }
        .verify(&RSA_PKCS1_2048_8192_SHA256, signing_input.as_bytes(), signature)
        .is_ok()
}

impl<C: Clock + Clone> TokenValidator for JwksTokenValidator<C> {
    async fn validate(&self, token: &str, issuer: &str) -> Result<TokenValidation> {
        let parts: Vec<&str> = token.split('.').collect();
        let [header, _, signature] = parts.as_slice() else {
            return Ok(TokenValidation::invalid("token is not a JWT"));
        };

        let Some(header) = decode_segment(header)
            .and_then(|bytes| serde_json::from_slice::<Header>(&bytes).ok())
        else {
            return Ok(TokenValidation::invalid("unreadable token header"));
        };
        if header.alg != "RS256" {
            return Ok(TokenValidation::invalid(format!(
                "unsupported algorithm {}",
                header.alg
            )));
        }

        let claims = match decode_claims(token) {
            Ok(claims) => claims,
            Err(error) => return Ok(TokenValidation::invalid(error.to_string())),
        };

        let expected_issuer = issuer.trim_end_matches('/');
        let token_issuer = claims
            .get("iss")
            .and_then(serde_json::Value::as_str)
            .map(|iss| iss.trim_end_matches('/'));
        if token_issuer != Some(expected_issuer) {
            return Ok(TokenValidation::invalid(format!(
                "issuer mismatch (expected {expected_issuer})"
            )));
        }

        if is_expired(&claims, self.clock.now()) {
            return Ok(TokenValidation::invalid(format!(
                "token expired (leeway {EXPIRY_LEEWAY_SECONDS}s)"
            )));
        }

        let Some(signature) = decode_segment(signature) else {
            return Ok(TokenValidation::invalid("unreadable signature"));
        };
        let Some(key) = self.find_key(header.kid.as_deref()).await? else {
            return Ok(TokenValidation::invalid("no matching signing key"));
        };

        let signing_input_len = token.len() - parts[2].len() - 1;
        if !verify_signature(&key, &token[..signing_input_len], &signature) {
            return Ok(TokenValidation::invalid("signature verification failed"));
        }

        Ok(TokenValidation::valid())
    }
}
