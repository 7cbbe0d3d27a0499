//! Access tokens and sign-in results

use async_trait::async_trait;
use chrono::DateTime;
use chrono::Utc;
use serde::Serialize;

use super::AccountInfo;
use crate::error::AuthError;

/// An OAuth2 access token with optional expiration and refresh token.
#[derive(Clone)]
pub struct AccessToken {
    /// The bearer token used for API authentication.
    pub access_token: String,
    /// When the token expires, if known.
    pub expires_at: Option<DateTime<Utc>>,
    /// Refresh token for obtaining new access tokens without re-authentication.
    pub refresh_token: Option<String>,
}

impl AccessToken {
    /// Creates a new access token with just the token string.
    pub fn new(access_token: impl Into<String>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: None,
            refresh_token: None,
        }
    }

    /// Creates a new access token with expiration time.
    pub fn with_expiry(access_token: impl Into<String>, expires_at: DateTime<Utc>) -> Self {
        Self {
            access_token: access_token.into(),
            expires_at: Some(expires_at),
            refresh_token: None,
        }
    }

    /// Returns `true` if the token has expired.
    ///
    /// Returns `false` if expiration time is unknown.
    pub fn is_expired(&self) -> bool {
        self.expires_at.is_some_and(|exp| Utc::now() >= exp)
    }

    /// Returns `true` if the token will expire within the given duration.
    ///
    /// Returns `false` if expiration time is unknown.
    pub fn expires_within(&self, duration: chrono::Duration) -> bool {
        self.expires_at
            .is_some_and(|exp| Utc::now() + duration >= exp)
    }

    /// Returns `true` if a refresh token is available.
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some()
    }

    /// Returns the token as a bearer authorization header value.
    pub fn as_bearer(&self) -> String {
        format!("Bearer {}", self.access_token)
    }
}

impl std::fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AccessToken")
            .field("expires_at", &self.expires_at)
            .field("can_refresh", &self.can_refresh())
            .finish_non_exhaustive()
    }
}

/// Hands out bearer tokens for a scope.
///
/// Implementations return the cached token while it is fresh and refresh it
/// silently otherwise. They never prompt.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Gets an access token for `scope` (e.g.
    /// `https://management.azure.com/user_impersonation`).
    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError>;
}

/// Outcome of a successful interactive sign-in.
///
/// Serialized as the payload answered over IPC, so the field names follow the
/// camelCase convention of the renderer.
#[derive(Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthenticationResult {
    /// Management-plane access token.
    pub access_token: String,
    /// When the access token expires, if known.
    pub expires_on: Option<DateTime<Utc>>,
    /// Scopes granted by the token endpoint.
    pub scopes: Vec<String>,
    /// The signed-in account.
    pub account: AccountInfo,
}

impl std::fmt::Debug for AuthenticationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthenticationResult")
            .field("expires_on", &self.expires_on)
            .field("scopes", &self.scopes)
            .field("account", &self.account)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expiry_checks_respect_unknown_expiry() {
        let token = AccessToken::new("abc");
        assert!(!token.is_expired());
        assert!(!token.expires_within(chrono::Duration::minutes(5)));
    }

    #[test]
    fn expires_within_buffer() {
        let token = AccessToken::with_expiry("abc", Utc::now() + chrono::Duration::minutes(2));
        assert!(!token.is_expired());
        assert!(token.expires_within(chrono::Duration::minutes(5)));
        assert!(!token.expires_within(chrono::Duration::seconds(30)));
    }

    #[test]
    fn debug_hides_secrets() {
        let mut token = AccessToken::new("secret-access");
        token.refresh_token = Some("secret-refresh".into());
        let rendered = format!("{token:?}");
        assert!(!rendered.contains("secret"));
        assert_eq!(token.as_bearer(), "Bearer secret-access");
    }
}
