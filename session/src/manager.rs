//! Session manager.
//!
//! The application-facing handle over the session store. Each operation
//! sends a command with a fresh correlation id and waits for the event that
//! ends it.

use crate::accounts::AccountsApi;
use crate::actions::SessionAction;
use crate::config::SessionConfig;
use crate::constants::{ACCOUNT_DELETION_ACCEPTED, ONBOARDED_KEY};
use crate::environment::SessionEnvironment;
use crate::error::{Result, SessionError};
use crate::providers::{
    AuthSessionBrowser, IdentityProvider, LocalStore, Notifier, SecureStore, TokenValidator,
};
use crate::reducers::SessionReducer;
use crate::routing::{OnboardingStatus, Route, resolve_route};
use crate::state::{DarkMode, Prompt, Session, UserProfile};
use crate::tokens;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::time::Duration;
use streckenheld_core::environment::Clock;
use streckenheld_runtime::Store;
use tokio::sync::{broadcast, watch};
use uuid::Uuid;

type SessionStore<P, B, S, L, N, V, C> = Store<
    Session,
    SessionAction,
    SessionEnvironment<P, B, S, L, N, V, C>,
    SessionReducer<P, B, S, L, N, V, C>,
>;

/// Owner of the session.
///
/// Created once by the application root and shared by reference. All state
/// changes go through the reducer; this type only sends commands and reads
/// snapshots.
pub struct SessionManager<P, B, S, L, N, V, C, A>
where
    P: IdentityProvider + Clone + 'static,
    B: AuthSessionBrowser + Clone + 'static,
    S: SecureStore + Clone + 'static,
    L: LocalStore + Clone + 'static,
    N: Notifier + Clone + 'static,
    V: TokenValidator + Clone + 'static,
    C: Clock + Clone + 'static,
    A: AccountsApi,
{
    store: SessionStore<P, B, S, L, N, V, C>,
    accounts: A,
    operation_timeout: Duration,
}

impl<P, B, S, L, N, V, C, A> SessionManager<P, B, S, L, N, V, C, A>
where
    P: IdentityProvider + Clone + 'static,
    B: AuthSessionBrowser + Clone + 'static,
    S: SecureStore + Clone + 'static,
    L: LocalStore + Clone + 'static,
    N: Notifier + Clone + 'static,
    V: TokenValidator + Clone + 'static,
    C: Clock + Clone + 'static,
    A: AccountsApi,
{
    /// Create a manager with a signed-out session.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Config`] if `config` is invalid.
    pub fn new(
        config: &SessionConfig,
        environment: SessionEnvironment<P, B, S, L, N, V, C>,
        accounts: A,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: Store::new(Session::default(), SessionReducer::new(), environment),
            accounts,
            operation_timeout: config.operation_timeout,
        })
    }

    fn environment(&self) -> &SessionEnvironment<P, B, S, L, N, V, C> {
        self.store.environment()
    }

    async fn run(&self, command: SessionAction, correlation_id: Uuid) -> Result<SessionAction> {
        let result = self
            .store
            .send_and_wait_for(
                command,
                move |action| action.terminates(correlation_id),
                self.operation_timeout,
            )
            .await?;

        if let SessionAction::OperationRejected { active, .. } = result {
            return Err(SessionError::OperationInProgress { active });
        }
        Ok(result)
    }

    // ═══════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════

    /// Restore the stored session and load preferences.
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable or the check times out.
    pub async fn start(&self) -> Result<Option<UserProfile>> {
        tracing::info!("Starting session");
        let user = self.check_authentication().await?;

        let mut handle = self.store.send(SessionAction::LoadPreferences).await?;
        handle.wait_with_timeout(self.operation_timeout).await?;

        Ok(user)
    }

    /// Stop accepting commands and wait for running effects.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Store`] if effects are still running after
    /// `timeout`.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        self.store.shutdown(timeout).await?;
        Ok(())
    }

    // ═══════════════════════════════════════════════════════════
    // Observation
    // ═══════════════════════════════════════════════════════════

    /// Current session.
    pub async fn snapshot(&self) -> Session {
        self.store.state(Clone::clone).await
    }

    /// Session updates, one per reduced action.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Session> {
        self.store.subscribe_state()
    }

    /// Session events produced by running operations.
    #[must_use]
    pub fn subscribe_events(&self) -> broadcast::Receiver<SessionAction> {
        self.store.subscribe_actions()
    }

    /// Screen for the current session.
    ///
    /// # Errors
    ///
    /// Returns error if the onboarding flag cannot be read.
    pub async fn current_route(&self) -> Result<Route> {
        let onboarding = self.onboarding_status().await?;
        Ok(resolve_route(&self.snapshot().await, onboarding))
    }

    // ═══════════════════════════════════════════════════════════
    // Authentication
    // ═══════════════════════════════════════════════════════════

    /// Rebuild the session from stored credentials.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::OperationInProgress`] if another operation
    /// owns the session and [`SessionError::Timeout`] if the check does not
    /// finish in time.
    pub async fn check_authentication(&self) -> Result<Option<UserProfile>> {
        let correlation_id = Uuid::new_v4();
        match self
            .run(
                SessionAction::CheckAuthentication { correlation_id },
                correlation_id,
            )
            .await?
        {
            SessionAction::LoggedIn { user, .. } => Ok(user),
            other => Err(unexpected(&other)),
        }
    }

    /// Sign in through the provider's login screen.
    ///
    /// # Errors
    ///
    /// Returns the flow's error (already shown to the user through the
    /// notifier), [`SessionError::OperationInProgress`], or
    /// [`SessionError::Timeout`].
    pub async fn login(&self) -> Result<UserProfile> {
        self.authenticate(Prompt::Login).await
    }

    /// Create an account through the provider's signup screen.
    ///
    /// # Errors
    ///
    /// Same as [`Self::login`].
    pub async fn register(&self) -> Result<UserProfile> {
        self.authenticate(Prompt::Signup).await
    }

    async fn authenticate(&self, prompt: Prompt) -> Result<UserProfile> {
        let correlation_id = Uuid::new_v4();
        let result = self
            .run(
                SessionAction::Authenticate {
                    correlation_id,
                    prompt,
                },
                correlation_id,
            )
            .await?;

        match result {
            SessionAction::LoggedIn { user: Some(user), .. } => Ok(user),
            SessionAction::LoggedIn { user: None, .. } => Err(SessionError::missing_user()),
            SessionAction::AuthenticationFailed { error, .. } => Err(error),
            other => Err(unexpected(&other)),
        }
    }

    /// Sign out locally and at the provider.
    ///
    /// Remote failures are logged; the local session is always cleared.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::OperationInProgress`] or
    /// [`SessionError::Timeout`].
    pub async fn logout(&self) -> Result<()> {
        let correlation_id = Uuid::new_v4();
        self.run(SessionAction::Logout { correlation_id }, correlation_id)
            .await
            .map(|_| ())
    }

    /// Stored access token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the secure store fails.
    pub async fn access_token(&self) -> Result<Option<String>> {
        tokens::get_access_token(&self.environment().secure_store).await
    }

    /// Stored id token.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the secure store fails.
    pub async fn id_token(&self) -> Result<Option<String>> {
        tokens::get_id_token(&self.environment().secure_store).await
    }

    // ═══════════════════════════════════════════════════════════
    // Preferences
    // ═══════════════════════════════════════════════════════════

    /// Change the theme preference (`None` means system).
    ///
    /// # Errors
    ///
    /// Returns error if the store is unavailable or persisting times out.
    pub async fn set_dark_mode(&self, mode: Option<DarkMode>) -> Result<DarkMode> {
        let mut handle = self.store.send(SessionAction::SetDarkMode { mode }).await?;
        handle.wait_with_timeout(self.operation_timeout).await?;
        Ok(self.store.state(|session| session.dark_mode).await)
    }

    /// Whether onboarding has been completed on this device.
    ///
    /// # Errors
    ///
    /// Returns error if the local store fails.
    pub async fn onboarding_status(&self) -> Result<OnboardingStatus> {
        Ok(OnboardingStatus::from_flag(self.local_load(ONBOARDED_KEY).await?))
    }

    /// Record that onboarding has been completed.
    ///
    /// # Errors
    ///
    /// Returns error if the local store fails.
    pub async fn mark_onboarded(&self) -> Result<()> {
        self.local_save(ONBOARDED_KEY, &true).await
    }

    // ═══════════════════════════════════════════════════════════
    // Storage and notification helpers
    // ═══════════════════════════════════════════════════════════

    /// Save a JSON value in the secure store.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if encoding or the store fails.
    pub async fn secure_save<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        self.environment()
            .secure_store
            .set(key, &encode(key, value)?)
            .await
    }

    /// Load a JSON value from the secure store.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the store fails or the value is
    /// not valid JSON for `T`.
    pub async fn secure_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        decode(key, self.environment().secure_store.get(key).await?)
    }

    /// Save a JSON value in the local store.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if encoding or the store fails.
    pub async fn local_save<T: Serialize + Sync>(&self, key: &str, value: &T) -> Result<()> {
        self.environment()
            .local_store
            .set(key, &encode(key, value)?)
            .await
    }

    /// Load a JSON value from the local store.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Storage`] if the store fails or the value is
    /// not valid JSON for `T`.
    pub async fn local_load<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>> {
        decode(key, self.environment().local_store.get(key).await?)
    }

    /// Show a message to the user.
    pub fn show_snackbar(&self, message: &str) {
        self.environment().notifier.show_snackbar(message);
    }

    /// Record an analytics event.
    pub fn log_event(&self, name: &str, data: &serde_json::Value) {
        tracing::info!(target: "streckenheld_session::events", event = name, %data, "Event");
    }

    // ═══════════════════════════════════════════════════════════
    // Account
    // ═══════════════════════════════════════════════════════════

    /// Request deletion of the signed-in account, then sign out.
    ///
    /// Every outcome is reported to the user through the notifier. Returns
    /// whether the backend accepted the request.
    ///
    /// # Errors
    ///
    /// Returns the transport error if the request could not be made, or the
    /// logout error if signing out afterwards fails.
    pub async fn delete_account(&self) -> Result<bool> {
        let Some(id_token) = self.store.state(|session| session.id_token.clone()).await else {
            self.show_snackbar("Error deleting account: not signed in");
            return Ok(false);
        };

        tracing::debug!("Deleting account");
        match self.accounts.delete_account(&id_token).await {
            Ok(response) if response.ok => {
                tracing::info!("Account deletion request received");
                self.show_snackbar(ACCOUNT_DELETION_ACCEPTED);
                self.logout().await?;
                Ok(true)
            },
            Ok(response) => {
                let reason = response.error.unwrap_or_else(|| "unknown error".to_string());
                tracing::warn!(%reason, "Account deletion refused");
                self.show_snackbar(&format!("Error deleting account: {reason}"));
                Ok(false)
            },
            Err(error) => {
                tracing::error!(%error, "Account deletion request failed");
                self.show_snackbar(&format!("Error deleting account: {error}"));
                Err(error)
            },
        }
    }
}

fn unexpected(action: &SessionAction) -> SessionError {
    tracing::error!(?action, "Unexpected terminal action");
    SessionError::Store(streckenheld_runtime::StoreError::ChannelClosed)
}

fn encode<T: Serialize>(key: &str, value: &T) -> Result<String> {
    serde_json::to_string(value)
        .map_err(|e| SessionError::Storage(format!("cannot encode {key}: {e}")))
}

fn decode<T: DeserializeOwned>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    raw.map(|raw| {
        serde_json::from_str(&raw)
            .map_err(|e| SessionError::Storage(format!("{key} is not valid JSON: {e}")))
    })
    .transpose()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::{MockAccountsApi, TestEnvironment, test_environment};

    type TestManager = SessionManager<
        crate::mocks::MockIdentityProvider,
        crate::mocks::MockBrowser,
        crate::mocks::MockSecureStore,
        crate::mocks::MockLocalStore,
        crate::mocks::RecordingNotifier,
        crate::mocks::MockTokenValidator,
        streckenheld_core::environment::SystemClock,
        MockAccountsApi,
    >;

    fn manager() -> (TestManager, TestEnvironment) {
        let env = test_environment();
        let config = SessionConfig::new(crate::mocks::TEST_ISSUER, "test-client");
        let manager = SessionManager::new(&config, env.clone(), MockAccountsApi::new()).unwrap();
        (manager, env)
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SessionConfig::new("", "test-client");
        let result = SessionManager::new(&config, test_environment(), MockAccountsApi::new());
        assert!(matches!(result, Err(SessionError::Config(_))));
    }

    #[tokio::test]
    async fn json_helpers_round_trip_through_stores() {
        let (manager, env) = manager();

        manager.local_save("favorites", &vec![1, 2, 3]).await.unwrap();
        assert_eq!(env.local_store.value("favorites").as_deref(), Some("[1,2,3]"));
        assert_eq!(
            manager.local_load::<Vec<u32>>("favorites").await.unwrap(),
            Some(vec![1, 2, 3])
        );

        manager.secure_save("pin", &"1234").await.unwrap();
        assert_eq!(env.secure_store.value("pin").as_deref(), Some("\"1234\""));
        assert_eq!(manager.local_load::<bool>("missing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn non_json_values_are_storage_errors() {
        let (manager, env) = manager();
        env.local_store.insert("onboarded", "yes please");

        assert!(matches!(
            manager.onboarding_status().await,
            Err(SessionError::Storage(_))
        ));
    }

    #[tokio::test]
    async fn onboarding_flag_drives_the_route() {
        let (manager, _env) = manager();
        assert_eq!(manager.current_route().await.unwrap(), Route::Onboarding);

        manager.mark_onboarded().await.unwrap();
        assert_eq!(manager.current_route().await.unwrap(), Route::Login);
    }

    #[tokio::test]
    async fn snackbar_goes_to_the_notifier() {
        let (manager, env) = manager();
        manager.show_snackbar("Saved");
        manager.log_event("route_saved", &serde_json::json!({"id": 7}));

        assert_eq!(env.notifier.messages(), vec!["Saved".to_string()]);
    }
}
