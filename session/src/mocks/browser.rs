//! Scripted browser session.

use super::lock;
use crate::error::{Result, SessionError};
use crate::providers::{AuthSessionBrowser, BrowserOutcome};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// Code returned by [`BrowserStep::Approve`].
pub const MOCK_AUTHORIZATION_CODE: &str = "mock-authorization-code";

/// What the next browser session does.
#[derive(Debug, Clone, PartialEq)]
pub enum BrowserStep {
    /// Redirect back with [`MOCK_AUTHORIZATION_CODE`] and the request's
    /// `state`, as a provider would after the user signs in.
    Approve,
    /// Finish with this outcome.
    Respond(BrowserOutcome),
    /// Wait, then approve (a user who takes their time).
    Delay(Duration),
    /// Fail to open.
    Fail(SessionError),
    /// Panic inside the browser call.
    Crash,
}

/// Mock [`AuthSessionBrowser`].
///
/// Steps are consumed in order; once the script is empty every session
/// approves.
#[derive(Debug, Clone, Default)]
pub struct MockBrowser {
    script: Arc<Mutex<VecDeque<BrowserStep>>>,
    opened: Arc<Mutex<Vec<String>>>,
}

impl MockBrowser {
    /// A browser that approves every session.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue an outcome.
    pub fn push(&self, outcome: BrowserOutcome) {
        self.push_step(BrowserStep::Respond(outcome));
    }

    /// Queue a step.
    pub fn push_step(&self, step: BrowserStep) {
        lock(&self.script).push_back(step);
    }

    /// URLs opened so far.
    #[must_use]
    pub fn opened(&self) -> Vec<String> {
        lock(&self.opened).clone()
    }

    fn approve(url: &str, redirect_uri: &str) -> BrowserOutcome {
        let state = Url::parse(url).ok().and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "state")
                .map(|(_, value)| value.into_owned())
        });

        let mut callback_url = match Url::parse(redirect_uri) {
            Ok(url) => url,
            Err(_) => {
                return BrowserOutcome::Success {
                    callback_url: redirect_uri.to_string(),
                };
            },
        };
        if let Some(state) = state {
            callback_url
                .query_pairs_mut()
                .append_pair("code", MOCK_AUTHORIZATION_CODE)
                .append_pair("state", &state);
        }
        BrowserOutcome::Success {
            callback_url: callback_url.into(),
        }
    }
}

impl AuthSessionBrowser for MockBrowser {
    async fn open_auth_session(&self, url: &str, redirect_uri: &str) -> Result<BrowserOutcome> {
        lock(&self.opened).push(url.to_string());
        let step = lock(&self.script).pop_front().unwrap_or(BrowserStep::Approve);

        match step {
            BrowserStep::Approve => Ok(Self::approve(url, redirect_uri)),
            BrowserStep::Delay(delay) => {
                tokio::time::sleep(delay).await;
                Ok(Self::approve(url, redirect_uri))
            },
            BrowserStep::Respond(outcome) => Ok(outcome),
            BrowserStep::Fail(error) => Err(error),
            #[allow(clippy::panic)]
            BrowserStep::Crash => panic!("browser session crashed"),
        }
    }
}
