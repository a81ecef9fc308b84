//! HTTP providers against a mock issuer and API.

#![allow(clippy::unwrap_used)]

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::{Value, json};
use streckenheld_session::accounts::{AccountsApi, HttpAccountsApi};
use streckenheld_session::config::ProviderConfig;
use streckenheld_session::providers::{
    CodeExchange, HostedIdentityProvider, IdentityProvider, JwksTokenValidator, TokenValidator,
};
use streckenheld_session::redirect::ProviderEndpoints;
use streckenheld_session::{ConfigError, DeleteAccountResponse, SessionError};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn provider_for(server: &MockServer) -> HostedIdentityProvider {
    let config = ProviderConfig {
        client_id: "test-client".to_string(),
        redirect_uri: "streckenheld://login".to_string(),
        endpoints: ProviderEndpoints::from_issuer(&server.uri()).unwrap(),
    };
    HostedIdentityProvider::new(reqwest::Client::new(), &config)
}

fn exchange() -> CodeExchange {
    CodeExchange {
        code: "auth-code".to_string(),
        code_verifier: "verifier-123".to_string(),
        redirect_uri: "streckenheld://login".to_string(),
    }
}

fn signed_looking_token(header: &Value, claims: &Value) -> String {
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(header.to_string()),
        URL_SAFE_NO_PAD.encode(claims.to_string()),
        URL_SAFE_NO_PAD.encode([7u8; 256])
    )
}

// ═══════════════════════════════════════════════════════════
// Token endpoint
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn exchange_posts_a_pkce_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("client_id=test-client"))
        .and(body_string_contains("code=auth-code"))
        .and(body_string_contains("code_verifier=verifier-123"))
        .and(body_string_contains("redirect_uri=streckenheld%3A%2F%2Flogin"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "access",
            "id_token": "id",
            "token_type": "bearer",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let tokens = provider_for(&server).exchange_code(&exchange()).await.unwrap();

    assert_eq!(tokens.access_token, "access");
    assert_eq!(tokens.id_token, "id");
}

#[tokio::test]
async fn exchange_reports_oauth_errors() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": "invalid_grant",
            "error_description": "code expired"
        })))
        .mount(&server)
        .await;

    let error = provider_for(&server)
        .exchange_code(&exchange())
        .await
        .unwrap_err();

    assert_eq!(
        error,
        SessionError::TokenExchange("invalid_grant: code expired".to_string())
    );
}

#[tokio::test]
async fn exchange_without_id_token_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"access_token": "access"})))
        .mount(&server)
        .await;

    let error = provider_for(&server)
        .exchange_code(&exchange())
        .await
        .unwrap_err();

    assert_eq!(
        error,
        SessionError::TokenExchange("no id token returned".to_string())
    );
}

// ═══════════════════════════════════════════════════════════
// Discovery
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn discovery_falls_back_to_conventional_logout() {
    let server = MockServer::start().await;
    let issuer = server.uri();
    Mock::given(method("GET"))
        .and(path("/.well-known/openid-configuration"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "issuer": format!("{issuer}/"),
            "authorization_endpoint": format!("{issuer}/authorize"),
            "token_endpoint": format!("{issuer}/token"),
            "jwks_uri": format!("{issuer}/keys")
        })))
        .mount(&server)
        .await;

    let endpoints = ProviderEndpoints::discover(&reqwest::Client::new(), &issuer)
        .await
        .unwrap();

    assert_eq!(endpoints.issuer, issuer);
    assert_eq!(endpoints.authorization_endpoint, format!("{issuer}/authorize"));
    assert_eq!(endpoints.token_endpoint, format!("{issuer}/token"));
    assert_eq!(endpoints.end_session_endpoint, format!("{issuer}/logout"));
    assert_eq!(endpoints.jwks_uri, format!("{issuer}/keys"));
}

#[tokio::test]
async fn missing_discovery_document_is_a_config_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let result = ProviderEndpoints::discover(&reqwest::Client::new(), &server.uri()).await;

    assert!(matches!(result, Err(ConfigError::Discovery(_))));
}

// ═══════════════════════════════════════════════════════════
// JWKS validation
// ═══════════════════════════════════════════════════════════

async fn jwks_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/.well-known/jwks.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "keys": [{
                "kty": "RSA",
                "kid": "k1",
                "use": "sig",
                "n": URL_SAFE_NO_PAD.encode([0xC5u8; 256]),
                "e": "AQAB"
            }]
        })))
        .mount(&server)
        .await;
    server
}

fn claims(issuer: &str) -> Value {
    json!({"iss": issuer, "sub": "kp_1", "exp": chrono::Utc::now().timestamp() + 3600})
}

#[tokio::test]
async fn unknown_key_id_refetches_then_fails() {
    let server = jwks_server().await;
    let issuer = server.uri();
    let validator =
        JwksTokenValidator::new(reqwest::Client::new(), format!("{issuer}/.well-known/jwks.json"));
    let token = signed_looking_token(&json!({"alg": "RS256", "kid": "rotated"}), &claims(&issuer));

    for _ in 0..2 {
        let validation = validator.validate(&token, &issuer).await.unwrap();
        assert!(!validation.valid);
        assert_eq!(validation.message, "no matching signing key");
    }

    let fetches = server.received_requests().await.unwrap().len();
    assert_eq!(fetches, 2);
}

#[tokio::test]
async fn forged_signature_fails_verification() {
    let server = jwks_server().await;
    let issuer = server.uri();
    let validator =
        JwksTokenValidator::new(reqwest::Client::new(), format!("{issuer}/.well-known/jwks.json"));
    let token = signed_looking_token(&json!({"alg": "RS256", "kid": "k1"}), &claims(&issuer));

    let validation = validator.validate(&token, &issuer).await.unwrap();

    assert!(!validation.valid);
    assert_eq!(validation.message, "signature verification failed");
}

#[tokio::test]
async fn unreachable_key_set_is_an_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;
    let issuer = server.uri();
    let validator =
        JwksTokenValidator::new(reqwest::Client::new(), format!("{issuer}/.well-known/jwks.json"));
    let token = signed_looking_token(&json!({"alg": "RS256", "kid": "k1"}), &claims(&issuer));

    let result = validator.validate(&token, &issuer).await;

    assert!(matches!(result, Err(SessionError::Network(_))));
}

// ═══════════════════════════════════════════════════════════
// Accounts API
// ═══════════════════════════════════════════════════════════

#[tokio::test]
async fn delete_account_sends_the_id_token() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/accounts"))
        .and(header("authorization", "Bearer id-token"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .expect(1)
        .mount(&server)
        .await;

    let api = HttpAccountsApi::new(reqwest::Client::new(), format!("{}/", server.uri()));
    let response = api.delete_account("id-token").await.unwrap();

    assert_eq!(response, DeleteAccountResponse::accepted());
}

#[tokio::test]
async fn delete_account_passes_refusals_through() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/accounts"))
        .respond_with(
            ResponseTemplate::new(409).set_body_json(json!({"ok": false, "error": "subscription active"})),
        )
        .mount(&server)
        .await;

    let api = HttpAccountsApi::new(reqwest::Client::new(), server.uri());
    let response = api.delete_account("id-token").await.unwrap();

    assert_eq!(response, DeleteAccountResponse::refused("subscription active"));
}

#[tokio::test]
async fn non_json_account_response_is_a_network_error() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
        .mount(&server)
        .await;

    let api = HttpAccountsApi::new(reqwest::Client::new(), server.uri());
    let error = api.delete_account("id-token").await.unwrap_err();

    assert!(matches!(error, SessionError::Network(_)));
}
