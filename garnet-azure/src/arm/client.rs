//! Resource browser over Azure Resource Manager

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;

use super::ArmList;
use super::ClusterResource;
use super::GarnetCluster;
use super::ResourceGroup;
use super::Subscription;
use crate::auth::AccessToken;
use crate::auth::MANAGEMENT_SCOPE;
use crate::auth::TokenProvider;
use crate::auth::TokenStore;
use crate::auth::UserProfile;
use crate::error::ArmError;
use crate::error::AuthError;

/// Public Azure Resource Manager endpoint.
pub const DEFAULT_MANAGEMENT_URL: &str = "https://management.azure.com";

const GARNET_CLUSTER_TYPE: &str = "Microsoft.DocumentDB/garnetClusters";

/// Lists subscriptions, resource groups and Garnet clusters with the
/// management token held in a [`TokenStore`].
///
/// Every call is a single read of the first page. Without a management token
/// every call fails with [`ArmError::Unauthenticated`] before touching the
/// network.
///
/// With a [`TokenProvider`] (normally the [`AzureAuthService`] sharing the
/// store), the bearer is asked from the provider before each call, so a token
/// about to expire is refreshed first.
///
/// [`AzureAuthService`]: crate::auth::AzureAuthService
///
/// This client is cheap to clone (uses `Arc` internally).
///
/// # Example
///
/// ```ignore
/// use garnet_azure::arm::ResourceBrowser;
///
/// let browser = ResourceBrowser::builder()
///     .token_store(store)
///     .token_provider(auth.clone())
///     .timeout(Duration::from_secs(30))
///     .build()?;
///
/// for sub in browser.list_subscriptions().await?.value {
///     println!("{}", sub.label());
/// }
/// ```
#[derive(Clone)]
pub struct ResourceBrowser {
    inner: Arc<ResourceBrowserInner>,
}

struct ResourceBrowserInner {
    management_url: String,
    store: TokenStore,
    token_provider: Option<Arc<dyn TokenProvider>>,
    http_client: Client,
    timeout: Option<Duration>,
}

impl ResourceBrowser {
    /// Creates a new builder for constructing a browser.
    pub fn builder() -> ResourceBrowserBuilder<Missing> {
        ResourceBrowserBuilder::new()
    }

    /// The token store this browser reads.
    pub fn token_store(&self) -> &TokenStore {
        &self.inner.store
    }

    /// Returns the base URL of the management endpoint.
    pub fn management_url(&self) -> &str {
        &self.inner.management_url
    }

    /// Sets the management token directly.
    pub async fn set_management_token(&self, token: impl Into<String>) {
        self.inner
            .store
            .set_management_token(AccessToken::new(token))
            .await;
    }

    /// Returns `true` if a management token is present.
    pub async fn has_management_token(&self) -> bool {
        self.inner.store.has_management_token().await
    }

    /// `GET /subscriptions`
    pub async fn list_subscriptions(&self) -> Result<ArmList<Subscription>, ArmError> {
        self.get_json("/subscriptions?api-version=2020-01-01").await
    }

    /// `GET /subscriptions/{sub}/resourcegroups`
    pub async fn list_resource_groups(
        &self,
        subscription_id: &str,
    ) -> Result<ArmList<ResourceGroup>, ArmError> {
        let path = format!(
            "/subscriptions/{}/resourcegroups?api-version=2021-04-01",
            urlencoding::encode(subscription_id)
        );
        self.get_json(&path).await
    }

    /// `GET /subscriptions/{sub}/resourceGroups/{rg}/resources`, filtered to
    /// Garnet clusters.
    pub async fn list_garnet_clusters(
        &self,
        subscription_id: &str,
        resource_group: &str,
    ) -> Result<ArmList<ClusterResource>, ArmError> {
        let filter = format!("resourceType eq '{}'", GARNET_CLUSTER_TYPE);
        let path = format!(
            "/subscriptions/{}/resourceGroups/{}/resources?api-version=2025-04-01&$filter={}",
            urlencoding::encode(subscription_id),
            urlencoding::encode(resource_group),
            urlencoding::encode(&filter),
        );
        self.get_json(&path).await
    }

    /// `GET .../providers/Microsoft.DocumentDB/garnetClusters/{name}`
    pub async fn get_garnet_cluster(
        &self,
        subscription_id: &str,
        resource_group: &str,
        cluster_name: &str,
    ) -> Result<GarnetCluster, ArmError> {
        let path = format!(
            "/subscriptions/{}/resourceGroups/{}/providers/{}/{}?api-version=2025-11-01-preview",
            urlencoding::encode(subscription_id),
            urlencoding::encode(resource_group),
            GARNET_CLUSTER_TYPE,
            urlencoding::encode(cluster_name),
        );
        self.get_json(&path).await
    }

    /// Who the management token was issued to.
    pub async fn user_profile(&self) -> UserProfile {
        let token = self.inner.store.management_token().await;
        UserProfile::from_token(token.as_deref())
    }

    /// The bearer for the next call.
    async fn bearer(&self) -> Result<String, ArmError> {
        if let Some(provider) = &self.inner.token_provider {
            match provider.get_token(MANAGEMENT_SCOPE).await {
                Ok(token) => return Ok(token.access_token),
                // No account; a token set directly may still be there.
                Err(AuthError::Unauthenticated) => {}
                Err(e) => {
                    log::warn!("Failed to refresh management token: {}", e);
                    return Err(e.into());
                }
            }
        }
        self.inner
            .store
            .management_token()
            .await
            .ok_or(ArmError::Unauthenticated)
    }

    async fn get_json<T: DeserializeOwned>(&self, path_and_query: &str) -> Result<T, ArmError> {
        let token = self.bearer().await?;

        let url = format!(
            "{}{}",
            self.inner.management_url.trim_end_matches('/'),
            path_and_query
        );
        log::debug!("ARM GET {}", url);

        let mut request = self.inner.http_client.get(&url).bearer_auth(&token);
        if let Some(timeout) = self.inner.timeout {
            request = request.timeout(timeout);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            log::warn!("ARM GET {} failed with {}", url, status);
            return Err(ArmError::from_response(status.as_u16(), body));
        }

        serde_json::from_str(&body)
            .map_err(|e| ArmError::parse_with_body(e.to_string(), body))
    }
}

impl std::fmt::Debug for ResourceBrowser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResourceBrowser")
            .field("management_url", &self.inner.management_url)
            .field("timeout", &self.inner.timeout)
            .field("token_provider", &self.inner.token_provider.is_some())
            .finish_non_exhaustive()
    }
}

// =============================================================================
// Typestate Builder
// =============================================================================

/// Marker type for missing required builder fields.
pub struct Missing;

/// Marker type for set builder fields.
pub struct Set<T>(T);

/// Builder for constructing a [`ResourceBrowser`].
///
/// The token store is required and checked at compile time.
pub struct ResourceBrowserBuilder<Store> {
    store: Store,
    token_provider: Option<Arc<dyn TokenProvider>>,
    management_url: String,
    timeout: Option<Duration>,
    connect_timeout: Option<Duration>,
    http_client: Option<Client>,
}

impl ResourceBrowserBuilder<Missing> {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            store: Missing,
            token_provider: None,
            management_url: DEFAULT_MANAGEMENT_URL.to_string(),
            timeout: None,
            connect_timeout: None,
            http_client: None,
        }
    }

    /// Sets the token store to read the management token from.
    pub fn token_store(self, store: TokenStore) -> ResourceBrowserBuilder<Set<TokenStore>> {
        ResourceBrowserBuilder {
            store: Set(store),
            token_provider: self.token_provider,
            management_url: self.management_url,
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
            http_client: self.http_client,
        }
    }
}

impl Default for ResourceBrowserBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S> ResourceBrowserBuilder<S> {
    /// Sets the management endpoint.
    ///
    /// Defaults to `https://management.azure.com`.
    pub fn management_url(mut self, url: impl Into<String>) -> Self {
        self.management_url = url.into();
        self
    }

    /// Sets where fresh management tokens come from.
    ///
    /// Without one the browser sends whatever token the store holds.
    pub fn token_provider(mut self, provider: impl TokenProvider + 'static) -> Self {
        self.token_provider = Some(Arc::new(provider));
        self
    }

    /// Sets the request timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Sets the connection timeout.
    ///
    /// This is applied when building the HTTP client.
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    /// Sets a custom HTTP client.
    ///
    /// If not set, a default client will be created.
    pub fn http_client(mut self, client: Client) -> Self {
        self.http_client = Some(client);
        self
    }
}

impl ResourceBrowserBuilder<Set<TokenStore>> {
    /// Builds the [`ResourceBrowser`].
    pub fn build(self) -> Result<ResourceBrowser, ArmError> {
        let http_client = match self.http_client {
            Some(client) => client,
            None => {
                let mut builder = Client::builder();
                if let Some(timeout) = self.connect_timeout {
                    builder = builder.connect_timeout(timeout);
                }
                builder.build()?
            }
        };

        Ok(ResourceBrowser {
            inner: Arc::new(ResourceBrowserInner {
                management_url: self.management_url,
                store: self.store.0,
                token_provider: self.token_provider,
                http_client,
                timeout: self.timeout,
            }),
        })
    }
}
