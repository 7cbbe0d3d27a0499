//! Process-lifetime token store

use std::sync::Arc;

use tokio::sync::RwLock;

use super::AccessToken;
use super::AccountInfo;

/// Holds the signed-in account and its tokens.
///
/// Cheap to clone; all clones share the same state. The auth service writes
/// it on a successful login or silent refresh, the resource browser reads it.
#[derive(Clone, Default)]
pub struct TokenStore {
    inner: Arc<RwLock<TokenState>>,
}

#[derive(Default)]
struct TokenState {
    account: Option<AccountInfo>,
    management: Option<AccessToken>,
    cosmos: Option<AccessToken>,
    refresh_token: Option<String>,
}

impl TokenStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the account and management token after an interactive login.
    ///
    /// Any token cached for another audience belongs to the previous
    /// account and is dropped.
    pub async fn sign_in(&self, account: AccountInfo, management: AccessToken) {
        let mut state = self.inner.write().await;
        state.refresh_token = management.refresh_token.clone();
        state.account = Some(account);
        state.management = Some(management);
        state.cosmos = None;
    }

    /// Sets the management token directly, without an account.
    ///
    /// Used when the token was obtained elsewhere.
    pub async fn set_management_token(&self, token: AccessToken) {
        let mut state = self.inner.write().await;
        if let Some(refresh) = &token.refresh_token {
            state.refresh_token = Some(refresh.clone());
        }
        state.management = Some(token);
    }

    /// Stores a silently reacquired Cosmos token.
    pub(crate) async fn set_cosmos_token(&self, token: AccessToken) {
        let mut state = self.inner.write().await;
        if let Some(refresh) = &token.refresh_token {
            state.refresh_token = Some(refresh.clone());
        }
        state.cosmos = Some(token);
    }

    /// Clears everything.
    pub async fn clear(&self) {
        *self.inner.write().await = TokenState::default();
    }

    /// The signed-in account, if any.
    pub async fn account(&self) -> Option<AccountInfo> {
        self.inner.read().await.account.clone()
    }

    /// The management bearer token, if any.
    pub async fn management_token(&self) -> Option<String> {
        self.inner
            .read()
            .await
            .management
            .as_ref()
            .map(|t| t.access_token.clone())
    }

    /// Returns `true` if a management token is present.
    pub async fn has_management_token(&self) -> bool {
        self.inner.read().await.management.is_some()
    }

    pub(crate) async fn management(&self) -> Option<AccessToken> {
        self.inner.read().await.management.clone()
    }

    pub(crate) async fn cosmos(&self) -> Option<AccessToken> {
        self.inner.read().await.cosmos.clone()
    }

    pub(crate) async fn refresh_token(&self) -> Option<String> {
        self.inner.read().await.refresh_token.clone()
    }
}

impl std::fmt::Debug for TokenStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenStore").finish_non_exhaustive()
    }
}
