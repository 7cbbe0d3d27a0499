//! Sign-in configuration

use std::time::Duration;

/// Public client registered for interactive sign-in.
pub const DEFAULT_CLIENT_ID: &str = "fdf090fe-ea78-471b-8678-8ea1545573f4";

/// Multi-tenant authority segment.
pub const DEFAULT_TENANT: &str = "common";

/// Identity platform host.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Azure Resource Manager scope.
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/user_impersonation";

/// Azure Cosmos DB data-plane scope.
pub const COSMOS_SCOPE: &str = "https://cosmos.azure.com/user_impersonation";

/// Configuration for [`AzureAuthService`](super::AzureAuthService).
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use garnet_azure::auth::AuthConfig;
///
/// let config = AuthConfig::default()
///     .with_tenant("contoso.onmicrosoft.com")
///     .with_login_timeout(Duration::from_secs(120));
/// assert_eq!(config.tenant, "contoso.onmicrosoft.com");
/// ```
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Azure AD application (client) ID.
    pub client_id: String,
    /// Tenant ID, domain, or `common` / `organizations`.
    pub tenant: String,
    /// Authority host, overridden in tests.
    pub authority_host: String,
    /// Fixed loopback port. `None` picks an ephemeral one.
    pub redirect_port: Option<u16>,
    /// How long a login waits for the browser redirect.
    ///
    /// Default: 5 minutes
    pub login_timeout: Duration,
    /// Redirect URI registered for the custom-scheme deep link callback.
    pub deep_link_redirect_uri: Option<String>,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: DEFAULT_CLIENT_ID.to_string(),
            tenant: DEFAULT_TENANT.to_string(),
            authority_host: DEFAULT_AUTHORITY_HOST.to_string(),
            redirect_port: None,
            login_timeout: Duration::from_secs(300),
            deep_link_redirect_uri: None,
        }
    }
}

impl AuthConfig {
    /// Creates a config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the client ID.
    pub fn with_client_id(mut self, client_id: impl Into<String>) -> Self {
        self.client_id = client_id.into();
        self
    }

    /// Sets the tenant.
    pub fn with_tenant(mut self, tenant: impl Into<String>) -> Self {
        self.tenant = tenant.into();
        self
    }

    /// Sets the authority host (e.g. a mock server in tests).
    pub fn with_authority_host(mut self, host: impl Into<String>) -> Self {
        self.authority_host = host.into();
        self
    }

    /// Sets a fixed redirect port.
    pub fn with_redirect_port(mut self, port: u16) -> Self {
        self.redirect_port = Some(port);
        self
    }

    /// Sets the login timeout.
    pub fn with_login_timeout(mut self, timeout: Duration) -> Self {
        self.login_timeout = timeout;
        self
    }

    /// Sets the deep link redirect URI.
    pub fn with_deep_link_redirect_uri(mut self, uri: impl Into<String>) -> Self {
        self.deep_link_redirect_uri = Some(uri.into());
        self
    }

    pub(crate) fn authority(&self) -> String {
        format!(
            "{}/{}",
            self.authority_host.trim_end_matches('/'),
            self.tenant
        )
    }
}
