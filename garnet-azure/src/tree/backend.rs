use std::sync::Arc;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::arm::ClusterResource;
use crate::arm::GarnetCluster;
use crate::arm::ResourceBrowser;
use crate::arm::ResourceGroup;
use crate::arm::Subscription;
use crate::auth::AuthConfig;
use crate::auth::AuthenticationResult;
use crate::auth::AzureAuthService;
use crate::auth::TokenStore;
use crate::auth::UserProfile;
use crate::error::Error;

/// What the connection tree needs from Azure.
#[async_trait]
pub trait AzureBackend: Send + Sync {
    /// Returns true if ARM calls can be made without logging in first.
    async fn has_management_token(&self) -> bool;

    /// Runs an interactive login.
    async fn login(&self) -> Result<AuthenticationResult, Error>;

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, Error>;

    async fn list_resource_groups(&self, subscription_id: &str)
    -> Result<Vec<ResourceGroup>, Error>;

    async fn list_garnet_clusters(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ClusterResource>, Error>;

    async fn get_garnet_cluster(
        &self,
        subscription_id: &str,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<GarnetCluster, Error>;

    /// Silently acquires a Cosmos DB token.
    async fn cosmos_access_token(&self) -> Result<String, Error>;

    async fn user_profile(&self) -> UserProfile;
}

/// The auth service and resource browser, sharing one token store.
#[derive(Debug, Clone)]
pub struct AzureServices {
    auth: AzureAuthService,
    browser: ResourceBrowser,
    login_cancel: Arc<Mutex<CancellationToken>>,
}

impl AzureServices {
    /// Pairs an auth service with a browser.
    ///
    /// Both should have been built over the same [`TokenStore`], and the
    /// browser should take its tokens from `auth` so they are refreshed.
    pub fn new(auth: AzureAuthService, browser: ResourceBrowser) -> Self {
        Self {
            auth,
            browser,
            login_cancel: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Builds both services over a fresh token store with default HTTP
    /// settings.
    pub fn from_config(config: AuthConfig) -> Result<Self, Error> {
        let store = TokenStore::new();
        let auth = AzureAuthService::new(config, store.clone());
        let browser = ResourceBrowser::builder()
            .token_store(store)
            .token_provider(auth.clone())
            .build()?;
        Ok(Self::new(auth, browser))
    }

    pub fn auth(&self) -> &AzureAuthService {
        &self.auth
    }

    pub fn browser(&self) -> &ResourceBrowser {
        &self.browser
    }

    /// Abandons the login in flight, if any.
    pub fn cancel_login(&self) {
        self.cancel_slot().cancel();
    }

    fn cancel_slot(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.login_cancel.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl AzureBackend for AzureServices {
    async fn has_management_token(&self) -> bool {
        self.browser.has_management_token().await
    }

    async fn login(&self) -> Result<AuthenticationResult, Error> {
        let cancel = CancellationToken::new();
        *self.cancel_slot() = cancel.clone();
        Ok(self.auth.login_with_cancel(cancel).await?)
    }

    async fn list_subscriptions(&self) -> Result<Vec<Subscription>, Error> {
        Ok(self.browser.list_subscriptions().await?.value)
    }

    async fn list_resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<Vec<ResourceGroup>, Error> {
        Ok(self.browser.list_resource_groups(subscription_id).await?.value)
    }

    async fn list_garnet_clusters(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<Vec<ClusterResource>, Error> {
        Ok(self
            .browser
            .list_garnet_clusters(subscription_id, resource_group)
            .await?
            .value)
    }

    async fn get_garnet_cluster(
        &self,
        subscription_id: &str,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<GarnetCluster, Error> {
        Ok(self
            .browser
            .get_garnet_cluster(subscription_id, resource_group, cluster_name)
            .await?)
    }

    async fn cosmos_access_token(&self) -> Result<String, Error> {
        Ok(self.auth.cosmos_access_token().await?)
    }

    async fn user_profile(&self) -> UserProfile {
        self.browser.user_profile().await
    }
}
