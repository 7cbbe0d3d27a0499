//! JWT payload decoding for display purposes.
//!
//! Tokens are not validated here. Signatures are the resource server's
//! business; we only read who the token was issued to.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde::Deserialize;
use serde::Serialize;

/// Claims we read out of an Azure AD token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TokenClaims {
    #[serde(default)]
    pub upn: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub unique_name: Option<String>,
    #[serde(default)]
    pub preferred_username: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub oid: Option<String>,
    #[serde(default)]
    pub tid: Option<String>,
    #[serde(default)]
    pub exp: Option<i64>,
}

impl TokenClaims {
    /// Decodes the payload segment of a JWT.
    ///
    /// Returns `None` if the token does not have a payload segment or it is
    /// not base64url-encoded JSON.
    pub fn decode(token: &str) -> Option<Self> {
        let payload = token.split('.').nth(1)?;
        let bytes = URL_SAFE_NO_PAD
            .decode(payload.trim_end_matches('='))
            .ok()?;
        serde_json::from_slice(&bytes).ok()
    }

    /// The sign-in name, in the order Azure AD populates it.
    pub fn sign_in_name(&self) -> Option<&str> {
        self.upn
            .as_deref()
            .or(self.email.as_deref())
            .or(self.unique_name.as_deref())
            .or(self.preferred_username.as_deref())
    }
}

/// The signed-in account, as known to the token store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// `{oid}.{tid}`, stable across tokens for the same user and tenant.
    pub home_account_id: String,
    pub tenant_id: Option<String>,
    pub username: Option<String>,
    pub name: Option<String>,
    /// Object id of the user in the tenant.
    pub local_account_id: Option<String>,
}

impl AccountInfo {
    /// Builds the account from decoded claims.
    pub fn from_claims(claims: &TokenClaims) -> Self {
        let oid = claims.oid.clone().unwrap_or_default();
        let home_account_id = match &claims.tid {
            Some(tid) => format!("{}.{}", oid, tid),
            None => oid,
        };
        Self {
            home_account_id,
            tenant_id: claims.tid.clone(),
            username: claims.sign_in_name().map(str::to_string),
            name: claims.name.clone(),
            local_account_id: claims.oid.clone(),
        }
    }
}

/// Display identity of the user behind the management token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub name: String,
    pub oid: Option<String>,
}

impl UserProfile {
    const ANONYMOUS: &'static str = "Azure User";
    const PLACEHOLDER: &'static str = "default";

    /// Derives the profile from a management token.
    ///
    /// No token gives the anonymous profile. A token that cannot be decoded
    /// gives the `default`/`default` placeholder.
    pub fn from_token(token: Option<&str>) -> Self {
        let Some(token) = token else {
            return Self {
                name: Self::ANONYMOUS.to_string(),
                oid: None,
            };
        };

        match TokenClaims::decode(token) {
            Some(claims) => Self {
                name: claims
                    .upn
                    .as_deref()
                    .or(claims.email.as_deref())
                    .or(claims.unique_name.as_deref())
                    .unwrap_or(Self::ANONYMOUS)
                    .to_string(),
                oid: claims.oid,
            },
            None => Self {
                name: Self::PLACEHOLDER.to_string(),
                oid: Some(Self::PLACEHOLDER.to_string()),
            },
        }
    }
}

#[cfg(test)]
pub(crate) fn fake_jwt(payload: serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(payload.to_string());
    format!("{}.{}.sig", header, body)
}
