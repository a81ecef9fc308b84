//! Session reducer.
//!
//! State transitions are synchronous and pure; everything that touches the
//! provider, the browser, or storage runs in `Effect::Future`s that report
//! back with events.
//!
//! # Flow
//!
//! ```text
//! CheckAuthentication ─► LoggingIn(true) ─► [read slots] ─► LoggedIn
//! Authenticate ─► LoggingIn(true) ─► [browser + exchange] ─► AuthorizationGranted
//!                                         │                        │
//!                                         └► AuthenticationFailed  └► [read slots] ─► LoggedIn
//! Logout ─► LoggedIn(none) ─► [end session + clear slots] ─► LoggedOut
//! ```

pub mod auth;
pub mod preferences;

use crate::actions::SessionAction;
use crate::environment::SessionEnvironment;
use crate::providers::{
    AuthSessionBrowser, IdentityProvider, LocalStore, Notifier, SecureStore, TokenValidator,
};
use crate::state::{Session, SessionOperation};
use std::marker::PhantomData;
use streckenheld_core::effect::Effect;
use streckenheld_core::environment::Clock;
use streckenheld_core::reducer::Reducer;
use streckenheld_core::{SmallVec, smallvec};
use uuid::Uuid;

/// Session reducer.
///
/// Owns no data; the type parameters only fix the environment it runs in.
pub struct SessionReducer<P, B, S, L, N, V, C> {
    _phantom: PhantomData<fn() -> (P, B, S, L, N, V, C)>,
}

impl<P, B, S, L, N, V, C> SessionReducer<P, B, S, L, N, V, C> {
    /// Create a new session reducer.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            _phantom: PhantomData,
        }
    }
}

impl<P, B, S, L, N, V, C> Default for SessionReducer<P, B, S, L, N, V, C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P, B, S, L, N, V, C> Clone for SessionReducer<P, B, S, L, N, V, C> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<P, B, S, L, N, V, C> std::fmt::Debug for SessionReducer<P, B, S, L, N, V, C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionReducer").finish()
    }
}

/// Refuse a command while another operation owns the session.
///
/// The rejection goes through an effect so subscribers waiting on the
/// command's correlation id see it.
fn reject(
    correlation_id: Uuid,
    requested: SessionOperation,
    active: SessionOperation,
) -> SmallVec<[Effect<SessionAction>; 4]> {
    tracing::info!(%requested, %active, "Session busy, rejecting command");
    smallvec![Effect::future(async move {
        Some(SessionAction::OperationRejected {
            correlation_id,
            requested,
            active,
        })
    })]
}

impl<P, B, S, L, N, V, C> Reducer for SessionReducer<P, B, S, L, N, V, C>
where
    P: IdentityProvider + Clone + 'static,
    B: AuthSessionBrowser + Clone + 'static,
    S: SecureStore + Clone + 'static,
    L: LocalStore + Clone + 'static,
    N: Notifier + Clone + 'static,
    V: TokenValidator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    type State = Session;
    type Action = SessionAction;
    type Environment = SessionEnvironment<P, B, S, L, N, V, C>;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            // ═══════════════════════════════════════════════════════════
            // Busy Flag
            // ═══════════════════════════════════════════════════════════
            SessionAction::LoggingIn { logging_in } => {
                state.is_logging_in = logging_in;
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Authentication
            // ═══════════════════════════════════════════════════════════
            SessionAction::CheckAuthentication { correlation_id } => {
                if let Some(active) = state.pending {
                    return reject(correlation_id, SessionOperation::CheckAuthentication, active);
                }
                self.check_authentication(state, correlation_id, env)
            },

            SessionAction::Authenticate {
                correlation_id,
                prompt,
            } => {
                if let Some(active) = state.pending {
                    return reject(correlation_id, prompt.operation(), active);
                }
                self.authenticate(state, correlation_id, prompt, env)
            },

            SessionAction::AuthorizationGranted {
                correlation_id,
                prompt,
            } => Self::finish_authorization(correlation_id, prompt, env),

            SessionAction::AuthenticationFailed { prompt, error, .. } => {
                tracing::debug!(%prompt, %error, "Authorization flow ended without tokens");
                state.is_logging_in = false;
                state.pending = None;
                smallvec![Effect::None]
            },

            SessionAction::LoggedIn {
                user,
                id_token,
                access_token,
                ..
            } => {
                state.apply_authentication(user, id_token, access_token);
                state.is_logging_in = false;
                state.pending = None;
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Logout
            // ═══════════════════════════════════════════════════════════
            SessionAction::Logout { correlation_id } => {
                if let Some(active) = state.pending {
                    return reject(correlation_id, SessionOperation::Logout, active);
                }
                self.logout(state, correlation_id, env)
            },

            SessionAction::LoggedOut { .. } => {
                state.is_logging_in = false;
                state.pending = None;
                smallvec![Effect::None]
            },

            // ═══════════════════════════════════════════════════════════
            // Preferences
            // ═══════════════════════════════════════════════════════════
            SessionAction::SetDarkMode { mode } => self.set_dark_mode(state, mode, env),

            SessionAction::LoadPreferences => Self::load_preferences(env),

            SessionAction::PreferencesLoaded { dark_mode } => {
                if let Some(mode) = dark_mode {
                    state.dark_mode = mode;
                }
                smallvec![Effect::None]
            },

            SessionAction::OperationRejected { .. } => smallvec![Effect::None],
        }
    }
}
