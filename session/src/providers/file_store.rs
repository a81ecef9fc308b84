//! Preferences in a JSON file under the user config directory.

use crate::error::{Result, SessionError};
use crate::providers::LocalStore;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

const APP_DIR: &str = "streckenheld";
const FILE_NAME: &str = "preferences.json";

/// [`LocalStore`] that keeps every key in a single JSON object on disk.
///
/// Writes are serialized through a lock and replace the file atomically
/// (write to a temporary file, then rename).
#[derive(Debug, Clone)]
pub struct FileLocalStore {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl FileLocalStore {
    /// Store at `<config dir>/streckenheld/preferences.json`.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the platform has no config
    /// directory.
    pub fn new() -> Result<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| SessionError::Storage("no user config directory".to_string()))?;
        Ok(Self::at(dir.join(APP_DIR).join(FILE_NAME)))
    }

    /// Store at an explicit path.
    #[must_use]
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
        }
    }

    /// File this store reads and writes.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn read_all(&self) -> Result<BTreeMap<String, String>> {
        match tokio::fs::read(&self.path).await {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                SessionError::Storage(format!("{} is corrupt: {e}", self.path.display()))
            }),
            Err(error) if error.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(error) => Err(io_error(&self.path, &error)),
        }
    }
}

fn io_error(path: &Path, error: &std::io::Error) -> SessionError {
    SessionError::Storage(format!("{}: {error}", path.display()))
}

impl LocalStore for FileLocalStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let _guard = self.lock.lock().await;
        Ok(self.read_all().await?.remove(key))
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read_all().await?;
        entries.insert(key.to_string(), value.to_string());

        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| io_error(parent, &e))?;
        }

        let contents = serde_json::to_vec_pretty(&entries)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, contents)
            .await
            .map_err(|e| io_error(&tmp, &e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| io_error(&self.path, &e))?;

        tracing::debug!(key, path = %self.path.display(), "Preference saved");
        Ok(())
    }
}
