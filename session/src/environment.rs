//! Session environment.
//!
//! This module defines the environment type for dependency injection
//! into the session reducer.

use crate::config::ProviderConfig;
use crate::providers::{
    AuthSessionBrowser, IdentityProvider, LocalStore, Notifier, SecureStore, TokenValidator,
};
use streckenheld_core::environment::Clock;

/// Session environment.
///
/// Contains all external dependencies needed by the session reducer.
/// Effects clone the environment into their futures, so every dependency is
/// `Clone` (production types share clients and handles internally).
///
/// # Type Parameters
///
/// - `P`: Identity provider
/// - `B`: Interactive browser session
/// - `S`: Secure (credential) store
/// - `L`: Local (preference) store
/// - `N`: Notifier
/// - `V`: Token validator
/// - `C`: Clock
#[derive(Clone)]
pub struct SessionEnvironment<P, B, S, L, N, V, C>
where
    P: IdentityProvider + Clone,
    B: AuthSessionBrowser + Clone,
    S: SecureStore + Clone,
    L: LocalStore + Clone,
    N: Notifier + Clone,
    V: TokenValidator + Clone,
    C: Clock + Clone,
{
    /// Identity provider.
    pub provider: P,

    /// Interactive browser session.
    pub browser: B,

    /// Credential slots (`idToken`, `accessToken`).
    pub secure_store: S,

    /// Preferences (`darkMode`, `onboarded`).
    pub local_store: L,

    /// User-visible notifications.
    pub notifier: N,

    /// Token validation before persisting.
    pub validator: V,

    /// Time source for expiry checks.
    pub clock: C,

    /// Resolved provider settings.
    pub config: ProviderConfig,
}

impl<P, B, S, L, N, V, C> SessionEnvironment<P, B, S, L, N, V, C>
where
    P: IdentityProvider + Clone,
    B: AuthSessionBrowser + Clone,
    S: SecureStore + Clone,
    L: LocalStore + Clone,
    N: Notifier + Clone,
    V: TokenValidator + Clone,
    C: Clock + Clone,
{
    /// Create a new session environment.
    #[must_use]
    #[allow(clippy::too_many_arguments)]
    pub const fn new(
        provider: P,
        browser: B,
        secure_store: S,
        local_store: L,
        notifier: N,
        validator: V,
        clock: C,
        config: ProviderConfig,
    ) -> Self {
        Self {
            provider,
            browser,
            secure_store,
            local_store,
            notifier,
            validator,
            clock,
            config,
        }
    }
}
