//! Scripted token validator.

use super::lock;
use crate::error::{Result, SessionError};
use crate::providers::{TokenValidation, TokenValidator};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Default)]
enum Verdict {
    #[default]
    Accept,
    Reject(String),
    Fail(SessionError),
}

/// Mock [`TokenValidator`]. Accepts everything unless told otherwise.
#[derive(Debug, Clone, Default)]
pub struct MockTokenValidator {
    verdict: Arc<Mutex<Verdict>>,
    checked: Arc<Mutex<Vec<(String, String)>>>,
}

impl MockTokenValidator {
    /// Report every token as invalid with `message`.
    pub fn reject_with(&self, message: impl Into<String>) {
        *lock(&self.verdict) = Verdict::Reject(message.into());
    }

    /// Fail every validation with `error`.
    pub fn fail_with(&self, error: SessionError) {
        *lock(&self.verdict) = Verdict::Fail(error);
    }

    /// `(token, issuer)` pairs validated so far.
    #[must_use]
    pub fn checked(&self) -> Vec<(String, String)> {
        lock(&self.checked).clone()
    }
}

impl TokenValidator for MockTokenValidator {
    async fn validate(&self, token: &str, issuer: &str) -> Result<TokenValidation> {
        lock(&self.checked).push((token.to_string(), issuer.to_string()));
        match lock(&self.verdict).clone() {
            Verdict::Accept => Ok(TokenValidation::valid()),
            Verdict::Reject(message) => Ok(TokenValidation::invalid(message)),
            Verdict::Fail(error) => Err(error),
        }
    }
}
