//! Custom-scheme redirect handling
//!
//! When the app is registered for a URL scheme, the identity platform can
//! redirect to `<scheme>://azure/oauth/callback?code=...` instead of the
//! loopback listener. The shell hands such URLs to [`DeepLinkHandler`].

use url::Url;

use crate::auth::AuthenticationResult;
use crate::auth::AzureAuthService;
use crate::ipc::IpcOnEvent;

const OAUTH_CALLBACK: &str = "azure/oauth/callback";

/// What a handled deep link produced.
#[derive(Debug, Clone)]
pub enum DeepLinkEvent {
    /// Outcome of exchanging the code; errors are already user-facing
    /// messages.
    AzureOauthCallback(Result<AuthenticationResult, String>),
}

impl DeepLinkEvent {
    /// The push channel this event goes out on.
    pub fn channel(&self) -> IpcOnEvent {
        match self {
            Self::AzureOauthCallback(_) => IpcOnEvent::AzureOauthCallback,
        }
    }

    /// JSON body for the renderer.
    pub fn payload(&self) -> serde_json::Value {
        match self {
            Self::AzureOauthCallback(Ok(result)) => serde_json::json!({
                "success": true,
                "result": result,
            }),
            Self::AzureOauthCallback(Err(message)) => serde_json::json!({
                "success": false,
                "error": message,
            }),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeepLinkHandler {
    auth: AzureAuthService,
}

impl DeepLinkHandler {
    pub fn new(auth: AzureAuthService) -> Self {
        Self { auth }
    }

    /// Handles one deep link URL.
    ///
    /// Returns `None` for links that are not ours or carry no code.
    pub async fn handle(&self, url: &str) -> Option<DeepLinkEvent> {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                log::warn!("Ignoring malformed deep link: {}", e);
                return None;
            }
        };

        let route = format!(
            "{}{}",
            parsed.host_str().unwrap_or_default(),
            parsed.path()
        );
        if route.trim_end_matches('/') != OAUTH_CALLBACK {
            log::warn!("Unknown deep link route: {}", route);
            return None;
        }

        let Some(code) = parsed
            .query_pairs()
            .find(|(k, _)| k == "code")
            .map(|(_, v)| v.into_owned())
        else {
            log::warn!("Deep link OAuth callback without a code");
            return None;
        };

        let redirect_uri = self
            .auth
            .config()
            .deep_link_redirect_uri
            .clone()
            .unwrap_or_else(|| format!("{}://{}", parsed.scheme(), OAUTH_CALLBACK));

        let result = self
            .auth
            .handle_auth_code(&code, &redirect_uri)
            .await
            .map_err(|e| {
                log::error!("Deep link code exchange failed: {}", e);
                e.to_string()
            });

        Some(DeepLinkEvent::AzureOauthCallback(result))
    }
}
