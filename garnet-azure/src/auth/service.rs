//! Azure AD sign-in service

use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use super::AccessToken;
use super::AccountInfo;
use super::AuthConfig;
use super::AuthenticationResult;
use super::COSMOS_SCOPE;
use super::MANAGEMENT_SCOPE;
use super::PendingLogin;
use super::PkceCodes;
use super::TokenClaims;
use super::TokenProvider;
use super::TokenStore;
use super::common::TokenExchange;
use super::common::authorize_url_v2;
use super::common::scope_string;
use super::pkce::generate_state;
use crate::error::AuthError;

/// Refresh cached tokens this long before they expire.
const REFRESH_BUFFER_SECS: i64 = 300;

/// Signs the user in and hands out tokens.
///
/// Owns the outstanding PKCE pair and writes the shared [`TokenStore`]. Cheap
/// to clone; clones share state. Construct one per application and pass it
/// to whatever needs it.
///
/// # Example
///
/// ```ignore
/// use garnet_azure::auth::{AuthConfig, AzureAuthService, TokenStore};
///
/// let store = TokenStore::new();
/// let auth = AzureAuthService::new(AuthConfig::default(), store.clone());
///
/// let pending = auth.start_login().await?;
/// pending.open_browser()?;
/// let result = pending.wait().await?;
/// println!("signed in as {:?}", result.account.username);
///
/// let cosmos = auth.cosmos_access_token().await?;
/// ```
#[derive(Clone)]
pub struct AzureAuthService {
    inner: Arc<AzureAuthServiceInner>,
}

struct AzureAuthServiceInner {
    config: AuthConfig,
    authority: String,
    http_client: reqwest::Client,
    store: TokenStore,
    pkce: Mutex<Option<PkceCodes>>,
}

impl AzureAuthService {
    /// Creates a new service writing into `store`.
    pub fn new(config: AuthConfig, store: TokenStore) -> Self {
        Self::with_http_client(config, store, reqwest::Client::new())
    }

    /// Creates a new service with a custom HTTP client.
    pub fn with_http_client(config: AuthConfig, store: TokenStore, http_client: reqwest::Client) -> Self {
        Self {
            inner: Arc::new(AzureAuthServiceInner {
                authority: config.authority(),
                config,
                http_client,
                store,
                pkce: Mutex::new(None),
            }),
        }
    }

    /// The token store this service writes.
    pub fn store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// The configuration this service was built with.
    pub fn config(&self) -> &AuthConfig {
        &self.inner.config
    }

    /// The signed-in account, if any.
    pub async fn account(&self) -> Option<AccountInfo> {
        self.inner.store.account().await
    }

    /// The current management bearer token, if any.
    pub async fn management_token(&self) -> Option<String> {
        self.inner.store.management_token().await
    }

    /// Starts an interactive login.
    ///
    /// Generates a fresh PKCE pair (replacing any outstanding one), binds the
    /// loopback listener and builds the authorization URL.
    pub async fn start_login(&self) -> Result<PendingLogin, AuthError> {
        let port = self.inner.config.redirect_port.unwrap_or(0);
        let addr = SocketAddr::from(([127, 0, 0, 1], port));
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| AuthError::CallbackServerFailed(format!("Failed to bind: {}", e)))?;

        let local_addr = listener.local_addr().map_err(|e| {
            AuthError::CallbackServerFailed(format!("Failed to get local address: {}", e))
        })?;

        let redirect_uri = format!("http://localhost:{}/callback", local_addr.port());

        let pkce = PkceCodes::generate();
        let state = generate_state();
        let scope = scope_string(&[MANAGEMENT_SCOPE, COSMOS_SCOPE, "offline_access"]);

        let auth_url = format!(
            "{}?client_id={}&response_type=code&response_mode=query&redirect_uri={}&scope={}&state={}&code_challenge={}&code_challenge_method=S256&prompt=select_account",
            authorize_url_v2(&self.inner.authority),
            urlencoding::encode(&self.inner.config.client_id),
            urlencoding::encode(&redirect_uri),
            urlencoding::encode(&scope),
            urlencoding::encode(&state),
            urlencoding::encode(&pkce.challenge),
        );

        *self.pkce_slot() = Some(pkce);
        log::info!("Listening for Azure sign-in redirect on {}", redirect_uri);

        Ok(PendingLogin::new(
            auth_url,
            redirect_uri,
            listener,
            local_addr,
            state,
            self.clone(),
            self.inner.config.login_timeout,
        ))
    }

    /// Starts a login, opens the browser and waits for the redirect.
    pub async fn login(&self) -> Result<AuthenticationResult, AuthError> {
        self.login_with_cancel(CancellationToken::new()).await
    }

    /// Like [`login`](Self::login), abandoning the attempt when `cancel` fires.
    pub async fn login_with_cancel(
        &self,
        cancel: CancellationToken,
    ) -> Result<AuthenticationResult, AuthError> {
        let pending = self.start_login().await?;
        // On failure `pending` is dropped here, which closes the listener.
        pending.open_browser()?;
        pending.wait_with_cancel(cancel).await
    }

    /// Exchanges an authorization code for the management token.
    ///
    /// Consumes the PKCE pair from the preceding [`start_login`](Self::start_login).
    /// `redirect_uri` must be the one the code was requested with.
    pub async fn handle_auth_code(
        &self,
        code: &str,
        redirect_uri: &str,
    ) -> Result<AuthenticationResult, AuthError> {
        let pkce = self.pkce_slot().take().ok_or(AuthError::PkceMissing)?;

        let response = self
            .exchange()
            .authorization_code(
                code,
                redirect_uri,
                &pkce.verifier,
                &[MANAGEMENT_SCOPE, "offline_access"],
            )
            .await?;

        let claims = response
            .id_token
            .as_deref()
            .and_then(TokenClaims::decode)
            .or_else(|| TokenClaims::decode(&response.access_token))
            .unwrap_or_default();
        let account = AccountInfo::from_claims(&claims);
        let token = response.to_access_token();

        let result = AuthenticationResult {
            access_token: token.access_token.clone(),
            expires_on: token.expires_at,
            scopes: response.scopes(),
            account: account.clone(),
        };

        self.inner.store.sign_in(account, token).await;
        log::info!(
            "Signed in to Azure as {}",
            result.account.username.as_deref().unwrap_or("<unknown>")
        );

        Ok(result)
    }

    /// Silently acquires a token for Azure Cosmos DB.
    ///
    /// Requires a signed-in account. Returns the cached token while it is
    /// fresh, otherwise redeems the cached refresh token. Never prompts.
    pub async fn cosmos_access_token(&self) -> Result<String, AuthError> {
        self.acquire_token_silent(COSMOS_SCOPE)
            .await
            .map(|t| t.access_token)
    }

    /// Returns a fresh management token, refreshing it silently if it is
    /// about to expire.
    pub async fn management_access_token(&self) -> Result<String, AuthError> {
        self.acquire_token_silent(MANAGEMENT_SCOPE)
            .await
            .map(|t| t.access_token)
    }

    /// Redeems the refresh token for a new management token, even if the
    /// cached one is still fresh.
    pub async fn refresh_management_token(&self) -> Result<String, AuthError> {
        if self.inner.store.account().await.is_none() {
            return Err(AuthError::Unauthenticated);
        }
        self.redeem_refresh_token(MANAGEMENT_SCOPE)
            .await
            .map(|t| t.access_token)
    }

    /// Forgets the account, its tokens and any outstanding PKCE pair.
    pub async fn sign_out(&self) {
        *self.pkce_slot() = None;
        self.inner.store.clear().await;
        log::info!("Signed out of Azure");
    }

    async fn acquire_token_silent(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let store = &self.inner.store;
        if store.account().await.is_none() {
            return Err(AuthError::Unauthenticated);
        }

        let cached = if scope == COSMOS_SCOPE {
            store.cosmos().await
        } else {
            store.management().await
        };
        let buffer = chrono::Duration::seconds(REFRESH_BUFFER_SECS);
        if let Some(token) = cached.filter(|t| !t.expires_within(buffer)) {
            return Ok(token);
        }

        self.redeem_refresh_token(scope).await
    }

    async fn redeem_refresh_token(&self, scope: &str) -> Result<AccessToken, AuthError> {
        let store = &self.inner.store;
        let Some(refresh_token) = store.refresh_token().await else {
            return Err(AuthError::SilentAcquisitionFailed {
                scope: scope.to_string(),
                message: "no refresh token cached".to_string(),
            });
        };

        log::debug!("Silently acquiring token for {}", scope);
        let response = match self.exchange().refresh(&refresh_token, &[scope]).await {
            Ok(response) => response,
            Err(AuthError::InvalidGrant { message }) => {
                return Err(AuthError::SilentAcquisitionFailed {
                    scope: scope.to_string(),
                    message,
                });
            }
            Err(e) => return Err(e),
        };

        let token = response.to_access_token();
        if scope == COSMOS_SCOPE {
            store.set_cosmos_token(token.clone()).await;
        } else {
            store.set_management_token(token.clone()).await;
        }
        Ok(token)
    }

    fn exchange(&self) -> TokenExchange<'_> {
        TokenExchange {
            http_client: &self.inner.http_client,
            client_id: &self.inner.config.client_id,
            authority: &self.inner.authority,
        }
    }

    fn pkce_slot(&self) -> std::sync::MutexGuard<'_, Option<PkceCodes>> {
        self.inner.pkce.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl TokenProvider for AzureAuthService {
    async fn get_token(&self, scope: &str) -> Result<AccessToken, AuthError> {
        self.acquire_token_silent(scope).await
    }
}

impl std::fmt::Debug for AzureAuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AzureAuthService")
            .field("client_id", &self.inner.config.client_id)
            .field("tenant", &self.inner.config.tenant)
            .finish_non_exhaustive()
    }
}
