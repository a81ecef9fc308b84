//! Notifications for headless hosts.

use crate::providers::Notifier;

/// [`Notifier`] that reports messages as `tracing` events and, optionally,
/// on standard error.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier {
    echo: bool,
}

impl LogNotifier {
    /// Log only.
    #[must_use]
    pub const fn new() -> Self {
        Self { echo: false }
    }

    /// Log and print to standard error (terminal hosts).
    #[must_use]
    pub const fn terminal() -> Self {
        Self { echo: true }
    }
}

impl Notifier for LogNotifier {
    fn show_snackbar(&self, message: &str) {
        tracing::info!(target: "streckenheld_session::snackbar", %message, "Notification");
        if self.echo {
            eprintln!("{message}");
        }
    }
}
