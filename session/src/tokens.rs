//! Credential slots and token decoding.
//!
//! The secure store holds exactly two slots, `idToken` and `accessToken`.
//! Readers here never verify signatures: tokens are validated once, before
//! they are written (see [`crate::flow`]).

use crate::constants::{ACCESS_TOKEN_KEY, EXPIRY_LEEWAY_SECONDS, ID_TOKEN_KEY};
use crate::error::{Result, SessionError};
use crate::providers::SecureStore;
use crate::state::{TokenKind, UserProfile};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::Value;
use streckenheld_core::environment::Clock;

/// Decoded JWT payload.
pub type Claims = serde_json::Map<String, Value>;

/// What an authentication check found in storage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Authentication {
    /// Profile from the id token.
    pub user: Option<UserProfile>,
    /// Stored id token.
    pub id_token: Option<String>,
    /// Stored access token.
    pub access_token: Option<String>,
}

impl Authentication {
    /// Whether a user was found.
    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        self.user.is_some()
    }
}

const fn slot_key(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Access => ACCESS_TOKEN_KEY,
        TokenKind::Id => ID_TOKEN_KEY,
    }
}

/// Interpret a raw slot value.
///
/// Tokens are stored as plain strings. A value written through the JSON
/// helpers is unwrapped if it is a JSON string and ignored otherwise, so
/// `null`, numbers, and objects never pass as tokens.
fn slot_value(raw: Option<String>) -> Option<String> {
    let raw = raw?;
    if raw.is_empty() {
        return None;
    }
    match serde_json::from_str::<Value>(&raw) {
        Ok(Value::String(inner)) if !inner.is_empty() => Some(inner),
        Ok(_) => None,
        Err(_) => Some(raw),
    }
}

/// Read a credential slot.
///
/// # Errors
///
/// Returns [`SessionError::Storage`] if the secure store fails.
pub async fn get_token<S: SecureStore>(store: &S, kind: TokenKind) -> Result<Option<String>> {
    Ok(slot_value(store.get(slot_key(kind)).await?))
}

/// Read the `accessToken` slot.
///
/// # Errors
///
/// Returns [`SessionError::Storage`] if the secure store fails.
pub async fn get_access_token<S: SecureStore>(store: &S) -> Result<Option<String>> {
    get_token(store, TokenKind::Access).await
}

/// Read the `idToken` slot.
///
/// # Errors
///
/// Returns [`SessionError::Storage`] if the secure store fails.
pub async fn get_id_token<S: SecureStore>(store: &S) -> Result<Option<String>> {
    get_token(store, TokenKind::Id).await
}

/// Decode a JWT payload without verifying its signature.
///
/// # Errors
///
/// Returns [`SessionError::MalformedToken`] unless `token` has three
/// segments and a base64url JSON object payload.
pub fn decode_claims(token: &str) -> Result<Claims> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(SessionError::MalformedToken(format!(
            "expected 3 segments, found {}",
            parts.len()
        )));
    }

    let payload = URL_SAFE_NO_PAD
        .decode(parts[1].trim_end_matches('='))
        .map_err(|e| SessionError::MalformedToken(format!("payload is not base64url: {e}")))?;

    match serde_json::from_slice::<Value>(&payload) {
        Ok(Value::Object(claims)) => Ok(claims),
        Ok(_) => Err(SessionError::MalformedToken(
            "payload is not a JSON object".to_string(),
        )),
        Err(e) => Err(SessionError::MalformedToken(format!(
            "payload is not JSON: {e}"
        ))),
    }
}

/// Read and decode a credential slot.
///
/// # Errors
///
/// Returns [`SessionError::Storage`] if the store fails and
/// [`SessionError::MalformedToken`] if the stored token cannot be decoded.
pub async fn get_decoded_token<S: SecureStore>(
    store: &S,
    kind: TokenKind,
) -> Result<Option<Claims>> {
    match get_token(store, kind).await? {
        Some(token) => decode_claims(&token).map(Some),
        None => Ok(None),
    }
}

fn string_claim(claims: &Claims, name: &str) -> Option<String> {
    claims
        .get(name)
        .and_then(Value::as_str)
        .map(std::string::ToString::to_string)
}

/// Project id-token claims onto a profile. Claims without `sub` give `None`.
#[must_use]
pub fn profile_from_claims(claims: &Claims) -> Option<UserProfile> {
    Some(UserProfile {
        id: string_claim(claims, "sub").filter(|sub| !sub.is_empty())?,
        given_name: string_claim(claims, "given_name"),
        family_name: string_claim(claims, "family_name"),
        email: string_claim(claims, "email"),
        picture: string_claim(claims, "picture"),
    })
}

/// Profile of the stored id token.
///
/// # Errors
///
/// Same as [`get_decoded_token`].
pub async fn get_user_profile<S: SecureStore>(store: &S) -> Result<Option<UserProfile>> {
    Ok(get_decoded_token(store, TokenKind::Id)
        .await?
        .as_ref()
        .and_then(profile_from_claims))
}

/// Expiry time of a token (`exp` claim), if it has one.
#[must_use]
pub fn expires_at(claims: &Claims) -> Option<DateTime<Utc>> {
    claims
        .get("exp")
        .and_then(Value::as_i64)
        .and_then(|exp| DateTime::from_timestamp(exp, 0))
}

/// Whether the token's `exp` lies in the past, with a small leeway.
///
/// An `exp` too far out to add the leeway to is not expired.
#[must_use]
pub fn is_expired(claims: &Claims, now: DateTime<Utc>) -> bool {
    expires_at(claims)
        .and_then(|exp| exp.checked_add_signed(chrono::Duration::seconds(EXPIRY_LEEWAY_SECONDS)))
        .is_some_and(|deadline| deadline < now)
}

/// Rebuild the session from the credential slots.
///
/// No access token, an expired access token, or an id token without a
/// profile all mean unauthenticated. An access token that is not a JWT
/// carries no expiry and is accepted as is. Storage and decoding errors are logged
/// and also mean unauthenticated. Slots are never modified here.
pub async fn check_authentication<S, C>(store: &S, clock: &C) -> Authentication
where
    S: SecureStore,
    C: Clock,
{
    match read_authentication(store, clock).await {
        Ok(authentication) => authentication,
        Err(error) => {
            tracing::warn!(%error, "Authentication check failed, treating session as signed out");
            Authentication::default()
        },
    }
}

async fn read_authentication<S, C>(store: &S, clock: &C) -> Result<Authentication>
where
    S: SecureStore,
    C: Clock,
{
    let Some(access_token) = get_access_token(store).await? else {
        tracing::debug!("No access token stored");
        return Ok(Authentication::default());
    };

    match decode_claims(&access_token) {
        Ok(claims) if is_expired(&claims, clock.now()) => {
            tracing::info!("Stored access token has expired, re-authentication required");
            return Ok(Authentication::default());
        },
        Ok(_) => {},
        Err(error) => {
            tracing::debug!(%error, "Access token is opaque, skipping expiry check");
        },
    }

    let id_token = get_id_token(store).await?;
    let user = match id_token.as_deref() {
        Some(token) => profile_from_claims(&decode_claims(token)?),
        None => None,
    };

    let Some(user) = user else {
        tracing::warn!("Access token present but no user profile, treating session as signed out");
        return Ok(Authentication::default());
    };

    tracing::debug!(user_id = %user.id, "Stored session found");
    Ok(Authentication {
        user: Some(user),
        id_token,
        access_token: Some(access_token),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::mocks::MockSecureStore;
    use serde_json::json;
    use streckenheld_testing::test_clock;

    fn jwt(payload: &Value) -> String {
        format!(
            "{}.{}.sig",
            URL_SAFE_NO_PAD.encode(br#"{"alg":"RS256"}"#),
            URL_SAFE_NO_PAD.encode(payload.to_string())
        )
    }

    #[test]
    fn decodes_payload_without_verification() {
        let token = jwt(&json!({"sub": "kp_1", "email": "ada@example.com"}));
        let claims = decode_claims(&token).unwrap();

        assert_eq!(claims.get("sub"), Some(&json!("kp_1")));
    }

    #[test]
    fn rejects_tokens_that_are_not_jwts() {
        assert!(matches!(
            decode_claims("opaque"),
            Err(SessionError::MalformedToken(_))
        ));
        assert!(matches!(
            decode_claims("a.!!!.c"),
            Err(SessionError::MalformedToken(_))
        ));
        let array = format!("a.{}.c", URL_SAFE_NO_PAD.encode("[1,2]"));
        assert!(matches!(
            decode_claims(&array),
            Err(SessionError::MalformedToken(_))
        ));
    }

    #[test]
    fn profile_requires_subject() {
        let claims = decode_claims(&jwt(&json!({
            "sub": "kp_1",
            "given_name": "Ada",
            "family_name": "Lovelace",
            "email": "ada@example.com",
            "picture": "https://example.com/ada.png"
        })))
        .unwrap();
        let profile = profile_from_claims(&claims).unwrap();
        assert_eq!(profile.id, "kp_1");
        assert_eq!(profile.given_name.as_deref(), Some("Ada"));
        assert_eq!(profile.family_name.as_deref(), Some("Lovelace"));

        let anonymous = decode_claims(&jwt(&json!({"email": "ada@example.com"}))).unwrap();
        assert!(profile_from_claims(&anonymous).is_none());
    }

    #[test]
    fn slot_values_must_be_strings() {
        assert_eq!(slot_value(Some("a.b.c".into())).as_deref(), Some("a.b.c"));
        assert_eq!(slot_value(Some("\"a.b.c\"".into())).as_deref(), Some("a.b.c"));
        assert_eq!(slot_value(Some("null".into())), None);
        assert_eq!(slot_value(Some("{\"token\":1}".into())), None);
        assert_eq!(slot_value(Some(String::new())), None);
        assert_eq!(slot_value(None), None);
    }

    #[test]
    fn expiry_uses_leeway() {
        let now = DateTime::from_timestamp(1_000_000, 0).unwrap();
        let claims = |exp: i64| decode_claims(&jwt(&json!({"exp": exp}))).unwrap();

        assert!(is_expired(&claims(1_000_000 - 60), now));
        assert!(!is_expired(&claims(1_000_000 - 10), now));
        assert!(!is_expired(&claims(1_000_000 + 3600), now));
        assert!(!is_expired(&Claims::new(), now));
    }

    // Largest `exp` chrono can represent; adding the leeway overflows.
    const LAST_REPRESENTABLE_EXP: i64 = 8_210_266_876_799;

    #[test]
    fn expiry_at_the_end_of_time_is_not_expired() {
        let now = DateTime::from_timestamp(1_000_000, 0).unwrap();
        let claims = decode_claims(&jwt(&json!({"exp": LAST_REPRESENTABLE_EXP}))).unwrap();

        assert!(expires_at(&claims).is_some());
        assert!(!is_expired(&claims, now));
    }

    fn store_with(access_token: &str) -> MockSecureStore {
        let store = MockSecureStore::default();
        store.insert(ID_TOKEN_KEY, &jwt(&json!({"sub": "kp_1", "given_name": "Ada"})));
        store.insert(ACCESS_TOKEN_KEY, access_token);
        store
    }

    #[tokio::test]
    async fn far_future_access_token_is_authenticated() {
        let store = store_with(&jwt(&json!({"exp": LAST_REPRESENTABLE_EXP})));

        let found = check_authentication(&store, &test_clock()).await;

        assert_eq!(found.user.map(|user| user.id).as_deref(), Some("kp_1"));
    }

    #[tokio::test]
    async fn opaque_access_token_is_accepted() {
        let store = store_with("opaque-access-token");

        let found = check_authentication(&store, &test_clock()).await;

        assert_eq!(found.user.map(|user| user.id).as_deref(), Some("kp_1"));
        assert_eq!(found.access_token.as_deref(), Some("opaque-access-token"));
    }

    #[tokio::test]
    async fn malformed_id_token_is_signed_out() {
        let store = MockSecureStore::default();
        store.insert(ID_TOKEN_KEY, "not-a-jwt");
        store.insert(ACCESS_TOKEN_KEY, "opaque-access-token");

        let found = check_authentication(&store, &test_clock()).await;

        assert_eq!(found, Authentication::default());
    }
}
