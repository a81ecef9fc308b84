//! Top-level screen selection.

use crate::state::Session;
use serde::{Deserialize, Serialize};

/// Whether the user has finished onboarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnboardingStatus {
    /// Not read from storage yet.
    #[default]
    Unknown,
    /// Fresh install.
    NotOnboarded,
    /// Onboarding completed.
    Onboarded,
}

impl OnboardingStatus {
    /// Status from the stored `onboarded` flag.
    #[must_use]
    pub const fn from_flag(onboarded: Option<bool>) -> Self {
        match onboarded {
            Some(true) => Self::Onboarded,
            Some(false) | None => Self::NotOnboarded,
        }
    }
}

/// Screen the application shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Session or onboarding state still being determined.
    Loading,
    /// Onboarding carousel.
    Onboarding,
    /// Sign-in screen.
    Login,
    /// Authenticated home.
    Home,
}

/// Pick the screen for the current session.
#[must_use]
pub const fn resolve_route(session: &Session, onboarding: OnboardingStatus) -> Route {
    if session.is_logging_in {
        return Route::Loading;
    }
    match onboarding {
        OnboardingStatus::Unknown => Route::Loading,
        OnboardingStatus::NotOnboarded => Route::Onboarding,
        OnboardingStatus::Onboarded if session.user.is_none() => Route::Login,
        OnboardingStatus::Onboarded => Route::Home,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::UserProfile;

    fn signed_in() -> Session {
        let mut session = Session::default();
        session.apply_authentication(
            Some(UserProfile {
                id: "kp_1".to_string(),
                given_name: None,
                family_name: None,
                email: None,
                picture: None,
            }),
            Some("id".to_string()),
            Some("access".to_string()),
        );
        session
    }

    #[test]
    fn busy_session_is_loading() {
        let session = Session {
            is_logging_in: true,
            ..signed_in()
        };
        assert_eq!(resolve_route(&session, OnboardingStatus::Onboarded), Route::Loading);
    }

    #[test]
    fn onboarding_comes_before_login() {
        let session = Session::default();
        assert_eq!(resolve_route(&session, OnboardingStatus::Unknown), Route::Loading);
        assert_eq!(
            resolve_route(&session, OnboardingStatus::NotOnboarded),
            Route::Onboarding
        );
        assert_eq!(resolve_route(&session, OnboardingStatus::Onboarded), Route::Login);
    }

    #[test]
    fn signed_in_user_goes_home() {
        assert_eq!(
            resolve_route(&signed_in(), OnboardingStatus::Onboarded),
            Route::Home
        );
    }

    #[test]
    fn missing_flag_means_not_onboarded() {
        assert_eq!(OnboardingStatus::from_flag(None), OnboardingStatus::NotOnboarded);
        assert_eq!(OnboardingStatus::from_flag(Some(true)), OnboardingStatus::Onboarded);
    }
}
