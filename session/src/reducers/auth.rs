//! Authentication transitions: check, interactive flow, and logout.

use super::SessionReducer;
use crate::actions::SessionAction;
use crate::environment::SessionEnvironment;
use crate::error::SessionError;
use crate::flow;
use crate::providers::{
    AuthSessionBrowser, IdentityProvider, LocalStore, Notifier, SecureStore, TokenValidator,
};
use crate::state::{Prompt, Session, SessionOperation};
use crate::tokens;
use streckenheld_core::effect::Effect;
use streckenheld_core::environment::Clock;
use streckenheld_core::reducer::Reducer;
use streckenheld_core::{SmallVec, smallvec};
use uuid::Uuid;

type Effects = SmallVec<[Effect<SessionAction>; 4]>;

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
    /// Take the session for `operation` and raise the busy flag.
    fn begin(
        &self,
        state: &mut Session,
        operation: SessionOperation,
        env: &SessionEnvironment<P, B, S, L, N, V, C>,
    ) -> Effects {
        let effects = self.reduce(state, SessionAction::LoggingIn { logging_in: true }, env);
        state.pending = Some(operation);
        effects
    }

    pub(super) fn check_authentication(
        &self,
        state: &mut Session,
        correlation_id: Uuid,
        env: &SessionEnvironment<P, B, S, L, N, V, C>,
    ) -> Effects {
        let mut effects = self.begin(state, SessionOperation::CheckAuthentication, env);
        effects.extend(Self::load_authentication(correlation_id, env));
        effects
    }

    /// Read the credential slots and report the result as `LoggedIn`.
    fn load_authentication(
        correlation_id: Uuid,
        env: &SessionEnvironment<P, B, S, L, N, V, C>,
    ) -> Effects {
        let env = env.clone();
        smallvec![
            Effect::future(async move {
                let found = tokens::check_authentication(&env.secure_store, &env.clock).await;
                Some(logged_in(correlation_id, found))
            })
            .on_panic(signed_out(correlation_id))
        ]
    }

    /// Read back a fresh grant. Tokens that do not describe a user are
    /// reported and cleared.
    pub(super) fn finish_authorization(
        correlation_id: Uuid,
        prompt: Prompt,
        env: &SessionEnvironment<P, B, S, L, N, V, C>,
    ) -> Effects {
        let env = env.clone();
        smallvec![
            Effect::future(async move {
                let found = tokens::check_authentication(&env.secure_store, &env.clock).await;
                if !found.is_authenticated() {
                    let error = SessionError::missing_user();
                    tracing::warn!(
                        %prompt,
                        %error,
                        "Granted tokens rejected, clearing credential slots"
                    );
                    flow::clear_slots(&env.secure_store).await;
                    env.notifier
                        .show_snackbar(&format!("{}: {error}", prompt.failure_label()));
                }
                Some(logged_in(correlation_id, found))
            })
            .on_panic(signed_out(correlation_id))
        ]
    }

    pub(super) fn authenticate(
        &self,
        state: &mut Session,
        correlation_id: Uuid,
        prompt: Prompt,
        env: &SessionEnvironment<P, B, S, L, N, V, C>,
    ) -> Effects {
        let mut effects = self.begin(state, prompt.operation(), env);

        let env = env.clone();
        let aborted = SessionAction::AuthenticationFailed {
            correlation_id,
            prompt,
            error: SessionError::Aborted,
        };
        effects.push(Effect::future(async move {
            match flow::authenticate(&env, prompt).await {
                Ok(()) => Some(SessionAction::AuthorizationGranted {
                    correlation_id,
                    prompt,
                }),
                Err(error) => {
                    if error.is_user_cancellation() {
                        tracing::info!(%prompt, "Authorization cancelled by user");
                    } else {
                        tracing::warn!(%prompt, %error, "Authorization flow failed");
                    }
                    env.notifier
                        .show_snackbar(&format!("{}: {error}", prompt.failure_label()));
                    Some(SessionAction::AuthenticationFailed {
                        correlation_id,
                        prompt,
                        error,
                    })
                },
            }
        })
        .on_panic(aborted));
        effects
    }

    /// Sign out locally first, then end the provider session.
    pub(super) fn logout(
        &self,
        state: &mut Session,
        correlation_id: Uuid,
        env: &SessionEnvironment<P, B, S, L, N, V, C>,
    ) -> Effects {
        let mut effects = self.reduce(state, signed_out(correlation_id), env);
        effects.extend(self.begin(state, SessionOperation::Logout, env));

        let env = env.clone();
        effects.push(
            Effect::future(async move {
                flow::end_session(&env).await;
                tracing::info!("Signed out");
                Some(SessionAction::LoggedOut { correlation_id })
            })
            .on_panic(SessionAction::LoggedOut { correlation_id }),
        );
        effects
    }
}

fn logged_in(correlation_id: Uuid, found: tokens::Authentication) -> SessionAction {
    SessionAction::LoggedIn {
        correlation_id,
        user: found.user,
        id_token: found.id_token,
        access_token: found.access_token,
    }
}

fn signed_out(correlation_id: Uuid) -> SessionAction {
    logged_in(correlation_id, tokens::Authentication::default())
}
