//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use garnet_azure::auth::AuthConfig;
use garnet_azure::auth::AzureAuthService;
use garnet_azure::auth::TokenStore;
use serde_json::Value;
use serde_json::json;
use wiremock::MockServer;
use wiremock::Request;

pub const TOKEN_PATH: &str = "/common/oauth2/v2.0/token";
pub const USER_OID: &str = "00000000-0000-0000-0000-0000000000aa";
pub const TENANT_ID: &str = "00000000-0000-0000-0000-0000000000bb";

/// An unsigned JWT carrying `payload`.
pub fn fake_jwt(payload: Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.sig", header, body)
}

pub fn user_claims() -> Value {
    json!({
        "upn": "ada@example.com",
        "name": "Ada Lovelace",
        "oid": USER_OID,
        "tid": TENANT_ID,
    })
}

/// Token endpoint answer for a management sign-in.
pub fn management_token_body(refresh_token: &str) -> Value {
    json!({
        "token_type": "Bearer",
        "access_token": fake_jwt(user_claims()),
        "id_token": fake_jwt(user_claims()),
        "refresh_token": refresh_token,
        "expires_in": 3600,
        "scope": "https://management.azure.com/user_impersonation",
    })
}

pub fn auth_service(server: &MockServer, store: TokenStore) -> AzureAuthService {
    auth_service_with_timeout(server, store, Duration::from_secs(30))
}

pub fn auth_service_with_timeout(
    server: &MockServer,
    store: TokenStore,
    timeout: Duration,
) -> AzureAuthService {
    let config = AuthConfig::default()
        .with_authority_host(server.uri())
        .with_login_timeout(timeout);
    AzureAuthService::new(config, store)
}

/// A query parameter of `url`.
pub fn query_param(url: &str, name: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    parsed
        .query_pairs()
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// A field of a form-encoded request body.
pub fn form_field(request: &Request, name: &str) -> Option<String> {
    url::form_urlencoded::parse(&request.body)
        .find(|(k, _)| k == name)
        .map(|(_, v)| v.into_owned())
}

/// Requests the server received on the token endpoint.
pub async fn token_requests(server: &MockServer) -> Vec<Request> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .into_iter()
        .filter(|r| r.url.path() == TOKEN_PATH)
        .collect()
}
