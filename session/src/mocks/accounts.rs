//! Mock accounts API.

use super::lock;
use crate::accounts::{AccountsApi, DeleteAccountResponse};
use crate::error::Result;
use std::sync::{Arc, Mutex};

/// Mock [`AccountsApi`]. Accepts deletions unless told otherwise.
#[derive(Debug, Clone)]
pub struct MockAccountsApi {
    response: Arc<Mutex<Result<DeleteAccountResponse>>>,
    requests: Arc<Mutex<Vec<String>>>,
}

impl MockAccountsApi {
    /// API that accepts every deletion.
    #[must_use]
    pub fn new() -> Self {
        Self {
            response: Arc::new(Mutex::new(Ok(DeleteAccountResponse::accepted()))),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Answer with `response` from now on.
    pub fn respond(&self, response: Result<DeleteAccountResponse>) {
        *lock(&self.response) = response;
    }

    /// Id tokens deletion was requested with.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        lock(&self.requests).clone()
    }
}

impl Default for MockAccountsApi {
    fn default() -> Self {
        Self::new()
    }
}

impl AccountsApi for MockAccountsApi {
    async fn delete_account(&self, id_token: &str) -> Result<DeleteAccountResponse> {
        lock(&self.requests).push(id_token.to_string());
        lock(&self.response).clone()
    }
}
