//! Recording notifier.

use super::lock;
use crate::providers::Notifier;
use std::sync::{Arc, Mutex};

/// Mock [`Notifier`] that keeps every message.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    /// Messages shown so far.
    #[must_use]
    pub fn messages(&self) -> Vec<String> {
        lock(&self.messages).clone()
    }
}

impl Notifier for RecordingNotifier {
    fn show_snackbar(&self, message: &str) {
        lock(&self.messages).push(message.to_string());
    }
}
