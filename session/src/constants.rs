//! Session constants.
//!
//! Storage keys, authorization parameters, and defaults shared across the
//! crate.

use std::time::Duration;

/// Secure-store key of the id token slot.
pub const ID_TOKEN_KEY: &str = "idToken";

/// Secure-store key of the access token slot.
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Local-store key of the theme preference.
pub const DARK_MODE_KEY: &str = "darkMode";

/// Local-store key of the onboarding flag.
pub const ONBOARDED_KEY: &str = "onboarded";

/// Scopes requested on every authorization.
pub const SCOPES: &[&str] = &["openid", "profile", "email", "offline"];

/// Ask the provider to show its own success page after sign-in.
pub const HAS_SUCCESS_PAGE: (&str, &str) = ("has_success_page", "true");

/// Redirect path used when none is configured.
pub const DEFAULT_REDIRECT_PATH: &str = "login";

/// Loopback port used when none is configured.
pub const DEFAULT_LOOPBACK_PORT: u16 = 8976;

/// Base URL of the Streckenheld API.
pub const DEFAULT_API_BASE_URL: &str = "https://api.streckenheld.com";

/// Timeout applied to every HTTP request.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// How long the manager waits for the result of an operation.
///
/// Interactive sign-in involves the user, so this is generous.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(300);

/// Service name under which credentials are stored in the OS keychain.
pub const KEYRING_SERVICE: &str = "com.streckenheld.session";

/// Notice shown once an account deletion request was accepted.
pub const ACCOUNT_DELETION_ACCEPTED: &str =
    "Account deletion request received. Please allow 48h to process.";

/// Clock skew tolerated when checking `exp`.
pub const EXPIRY_LEEWAY_SECONDS: i64 = 30;
