//! Token endpoint plumbing shared by the interactive and silent paths

use chrono::Duration;
use chrono::Utc;
use serde::Deserialize;

use super::AccessToken;
use crate::error::AuthError;

// =============================================================================
// URL Helpers
// =============================================================================

/// Build v2 token endpoint URL.
pub(crate) fn token_url_v2(authority: &str) -> String {
    format!("{}/oauth2/v2.0/token", authority)
}

/// Build v2 authorize endpoint URL.
pub(crate) fn authorize_url_v2(authority: &str) -> String {
    format!("{}/oauth2/v2.0/authorize", authority)
}

/// Build a space-separated scope string, adding the OpenID scopes that
/// give us a refresh token and an id token.
pub(crate) fn scope_string(scopes: &[&str]) -> String {
    let mut all: Vec<&str> = scopes.to_vec();
    for extra in ["offline_access", "openid", "profile"] {
        if !all.contains(&extra) {
            all.push(extra);
        }
    }
    all.join(" ")
}

// =============================================================================
// Token Response Parsing
// =============================================================================

/// Token response from Azure AD.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenResponse {
    pub access_token: String,
    #[serde(default, deserialize_with = "deserialize_expires_in")]
    pub expires_in: Option<u64>,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub id_token: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

/// Deserializes `expires_in` which can be either a number or a string.
fn deserialize_expires_in<'de, D>(deserializer: D) -> Result<Option<u64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    use serde::de::Error;

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum StringOrNumber {
        String(String),
        Number(u64),
    }

    match Option::<StringOrNumber>::deserialize(deserializer)? {
        None => Ok(None),
        Some(StringOrNumber::Number(n)) => Ok(Some(n)),
        Some(StringOrNumber::String(s)) => s
            .parse::<u64>()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("invalid expires_in value: {}", s))),
    }
}

impl TokenResponse {
    pub fn scopes(&self) -> Vec<String> {
        self.scope
            .as_deref()
            .map(|s| s.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn to_access_token(&self) -> AccessToken {
        AccessToken {
            access_token: self.access_token.clone(),
            expires_at: self
                .expires_in
                .map(|secs| Utc::now() + Duration::seconds(secs as i64)),
            refresh_token: self.refresh_token.clone(),
        }
    }
}

/// Error response from Azure AD.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorResponse {
    pub error: String,
    pub error_description: Option<String>,
}

/// Maps Azure AD error codes to AuthError variants.
pub(crate) fn map_error_response(error: ErrorResponse) -> AuthError {
    let description = error
        .error_description
        .unwrap_or_else(|| error.error.clone());

    match error.error.as_str() {
        "invalid_grant" | "interaction_required" | "consent_required" | "login_required" => {
            AuthError::InvalidGrant {
                message: description,
            }
        }
        "invalid_client" | "unauthorized_client" => AuthError::InvalidClient {
            client_id: description,
        },
        _ => {
            if description.contains("AADSTS90002") || description.contains("AADSTS90014") {
                // Tenant not found
                AuthError::InvalidTenant {
                    tenant: description,
                }
            } else {
                AuthError::Provider {
                    error: error.error,
                    description,
                }
            }
        }
    }
}

// =============================================================================
// Token Exchange
// =============================================================================

/// Internal helper for token endpoint calls.
pub(crate) struct TokenExchange<'a> {
    pub http_client: &'a reqwest::Client,
    pub client_id: &'a str,
    pub authority: &'a str,
}

impl TokenExchange<'_> {
    /// Exchange authorization code for token (PKCE flow).
    pub async fn authorization_code(
        &self,
        code: &str,
        redirect_uri: &str,
        code_verifier: &str,
        scopes: &[&str],
    ) -> Result<TokenResponse, AuthError> {
        let scope = scope_string(scopes);
        let params = [
            ("grant_type", "authorization_code"),
            ("client_id", self.client_id),
            ("code", code),
            ("redirect_uri", redirect_uri),
            ("code_verifier", code_verifier),
            ("scope", scope.as_str()),
        ];
        self.post(&params).await
    }

    /// Redeem a refresh token for a token on the given scopes.
    pub async fn refresh(
        &self,
        refresh_token: &str,
        scopes: &[&str],
    ) -> Result<TokenResponse, AuthError> {
        let scope = scope_string(scopes);
        let params = [
            ("grant_type", "refresh_token"),
            ("client_id", self.client_id),
            ("refresh_token", refresh_token),
            ("scope", scope.as_str()),
        ];
        self.post(&params).await
    }

    async fn post(&self, params: &[(&str, &str)]) -> Result<TokenResponse, AuthError> {
        let token_url = token_url_v2(self.authority);
        log::debug!("POST {}", token_url);

        let response = self
            .http_client
            .post(&token_url)
            .form(params)
            .send()
            .await?;

        if response.status().is_success() {
            let body = response.text().await?;
            serde_json::from_str(&body)
                .map_err(|e| AuthError::Parse(format!("token response: {}", e)))
        } else {
            let status = response.status();
            let error_response: ErrorResponse =
                response.json().await.unwrap_or_else(|_| ErrorResponse {
                    error: "unknown".to_string(),
                    error_description: Some(format!("token endpoint returned {}", status)),
                });
            Err(map_error_response(error_response))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scope_string_adds_openid_scopes_once() {
        assert_eq!(
            scope_string(&["https://management.azure.com/user_impersonation", "offline_access"]),
            "https://management.azure.com/user_impersonation offline_access openid profile"
        );
    }

    #[test]
    fn expires_in_accepts_strings() {
        let response: TokenResponse =
            serde_json::from_str(r#"{"access_token":"a","expires_in":"3599","scope":"x y"}"#)
                .unwrap();
        assert_eq!(response.expires_in, Some(3599));
        assert_eq!(response.scopes(), vec!["x", "y"]);
        assert!(response.to_access_token().expires_at.is_some());
    }

    #[test]
    fn maps_provider_errors() {
        let err = map_error_response(ErrorResponse {
            error: "invalid_grant".into(),
            error_description: Some("AADSTS70008: code expired".into()),
        });
        assert!(matches!(err, AuthError::InvalidGrant { .. }));

        let err = map_error_response(ErrorResponse {
            error: "invalid_request".into(),
            error_description: Some("AADSTS90002: Tenant 'x' not found".into()),
        });
        assert!(matches!(err, AuthError::InvalidTenant { .. }));

        let err = map_error_response(ErrorResponse {
            error: "temporarily_unavailable".into(),
            error_description: None,
        });
        match err {
            AuthError::Provider { error, description } => {
                assert_eq!(error, "temporarily_unavailable");
                assert_eq!(description, "temporarily_unavailable");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }
}
