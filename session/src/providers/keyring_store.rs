//! Credential slots in the operating system keychain.

use crate::constants::KEYRING_SERVICE;
use crate::error::{Result, SessionError};
use crate::providers::SecureStore;

/// [`SecureStore`] backed by the platform keychain (Keychain, Credential
/// Manager, Secret Service).
///
/// Keychain calls block, so each one runs on the blocking thread pool.
#[derive(Debug, Clone)]
pub struct KeyringSecureStore {
    service: String,
}

impl KeyringSecureStore {
    /// Store entries under the default service name.
    #[must_use]
    pub fn new() -> Self {
        Self::with_service(KEYRING_SERVICE)
    }

    /// Store entries under `service`.
    #[must_use]
    pub fn with_service(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    async fn run<T, F>(&self, key: &str, op: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(keyring::Entry) -> keyring::Result<T> + Send + 'static,
    {
        let service = self.service.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || {
            let entry = keyring::Entry::new(&service, &key).map_err(storage_error)?;
            op(entry).map_err(storage_error)
        })
        .await
        .map_err(|e| SessionError::Storage(format!("keychain task failed: {e}")))?
    }
}

impl Default for KeyringSecureStore {
    fn default() -> Self {
        Self::new()
    }
}

#[allow(clippy::needless_pass_by_value)]
fn storage_error(error: keyring::Error) -> SessionError {
    SessionError::Storage(error.to_string())
}

impl SecureStore for KeyringSecureStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.run(key, |entry| match entry.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(error) => Err(error),
        })
        .await
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let value = value.to_string();
        self.run(key, move |entry| entry.set_password(&value)).await
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.run(key, |entry| match entry.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(error) => Err(error),
        })
        .await
    }
}
