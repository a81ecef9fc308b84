//! Theme preference transitions.

use super::SessionReducer;
use crate::actions::SessionAction;
use crate::constants::DARK_MODE_KEY;
use crate::environment::SessionEnvironment;
use crate::providers::{
    AuthSessionBrowser, IdentityProvider, LocalStore, Notifier, SecureStore, TokenValidator,
};
use crate::state::{DarkMode, Session};
use streckenheld_core::effect::Effect;
use streckenheld_core::environment::Clock;
use streckenheld_core::{SmallVec, smallvec};

type Effects = SmallVec<[Effect<SessionAction>; 4]>;

/// Parse a persisted preference. Stored values are JSON strings.
fn parse_dark_mode(raw: &str) -> Option<DarkMode> {
    serde_json::from_str::<DarkMode>(raw)
        .ok()
        .or_else(|| raw.parse().ok())
}

impl<P, B, S, L, N, V, C> SessionReducer<P, B, S, L, N, V, C>
where
    P: IdentityProvider + Clone + 'static,
    B: AuthSessionBrowser + Clone + 'static,
    S: SecureStore + Clone + 'static,
    L: LocalStore + Clone + 'static,
    N: Notifier + Clone + 'static,
    V: TokenValidator + Clone + 'static,
    C: Clock + Clone + 'static,
{
    /// Update the preference and persist it. Persistence failures are logged
    /// and do not roll back the in-memory value.
    pub(super) fn set_dark_mode(
        &self,
        state: &mut Session,
        mode: Option<DarkMode>,
        env: &SessionEnvironment<P, B, S, L, N, V, C>,
    ) -> Effects {
        let mode = mode.unwrap_or_default();
        state.dark_mode = mode;

        let store = env.local_store.clone();
        smallvec![Effect::future(async move {
            let value = serde_json::Value::from(mode.as_str()).to_string();
            match store.set(DARK_MODE_KEY, &value).await {
                Ok(()) => tracing::debug!(%mode, "Theme preference saved"),
                Err(error) => tracing::warn!(%error, %mode, "Failed to persist theme preference"),
            }
            None
        })]
    }

    pub(super) fn load_preferences(env: &SessionEnvironment<P, B, S, L, N, V, C>) -> Effects {
        let store = env.local_store.clone();
        smallvec![Effect::future(async move {
            let dark_mode = match store.get(DARK_MODE_KEY).await {
                Ok(raw) => raw.as_deref().and_then(parse_dark_mode),
                Err(error) => {
                    tracing::warn!(%error, "Failed to read theme preference");
                    None
                },
            };
            Some(SessionAction::PreferencesLoaded { dark_mode })
        })]
    }
}
