//! Mock provider implementations for testing.
//!
//! In-memory, scriptable implementations of every provider trait. Clones
//! share their state, so a test keeps a handle to a mock after moving a
//! clone into the environment and can inspect what the session did.

pub mod accounts;
pub mod browser;
pub mod identity;
pub mod notifier;
pub mod store;
pub mod validator;

pub use accounts::MockAccountsApi;
pub use browser::{BrowserStep, MockBrowser};
pub use identity::MockIdentityProvider;
pub use notifier::RecordingNotifier;
pub use store::{MemoryStore, MockLocalStore, MockSecureStore, StoreWrite};
pub use validator::MockTokenValidator;

use crate::config::ProviderConfig;
use crate::environment::SessionEnvironment;
use crate::reducers::SessionReducer;
use crate::redirect::ProviderEndpoints;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use std::sync::{Mutex, MutexGuard, PoisonError};
use streckenheld_core::environment::SystemClock;

/// Issuer used by [`test_provider_config`].
pub const TEST_ISSUER: &str = "https://auth.test.streckenheld.com";

/// Redirect URI used by [`test_provider_config`].
pub const TEST_REDIRECT_URI: &str = "streckenheld://login";

/// Environment made of mocks.
pub type TestEnvironment<C = SystemClock> = SessionEnvironment<
    MockIdentityProvider,
    MockBrowser,
    MockSecureStore,
    MockLocalStore,
    RecordingNotifier,
    MockTokenValidator,
    C,
>;

/// Reducer over [`TestEnvironment`].
pub type TestReducer<C = SystemClock> = SessionReducer<
    MockIdentityProvider,
    MockBrowser,
    MockSecureStore,
    MockLocalStore,
    RecordingNotifier,
    MockTokenValidator,
    C,
>;

/// Provider settings for [`TEST_ISSUER`].
#[must_use]
pub fn test_provider_config() -> ProviderConfig {
    ProviderConfig {
        client_id: "test-client".to_string(),
        redirect_uri: TEST_REDIRECT_URI.to_string(),
        endpoints: ProviderEndpoints {
            issuer: TEST_ISSUER.to_string(),
            authorization_endpoint: format!("{TEST_ISSUER}/oauth2/auth"),
            token_endpoint: format!("{TEST_ISSUER}/oauth2/token"),
            end_session_endpoint: format!("{TEST_ISSUER}/logout"),
            jwks_uri: format!("{TEST_ISSUER}/.well-known/jwks.json"),
        },
    }
}

/// Fresh mocks on the system clock.
#[must_use]
pub fn test_environment() -> TestEnvironment {
    test_environment_with_clock(SystemClock)
}

/// Fresh mocks on `clock`.
#[must_use]
pub fn test_environment_with_clock<C>(clock: C) -> TestEnvironment<C>
where
    C: streckenheld_core::environment::Clock + Clone,
{
    SessionEnvironment::new(
        MockIdentityProvider::new(),
        MockBrowser::new(),
        MockSecureStore::default(),
        MockLocalStore::default(),
        RecordingNotifier::default(),
        MockTokenValidator::default(),
        clock,
        test_provider_config(),
    )
}

/// Unsigned JWT with `claims` as payload.
#[must_use]
pub fn fake_jwt(claims: &serde_json::Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256","typ":"JWT"}"#),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode(b"unsigned")
    )
}

/// Lock a mock's shared state, ignoring poisoning from a panicked test.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
