//! Azure sign-in and Garnet cluster discovery
//!
//! Signs a user in to Azure AD with the authorization code flow (PKCE, loopback
//! redirect), browses their subscriptions and resource groups for Garnet
//! clusters, and resolves a selected cluster into connection details.

pub mod arm;
pub mod auth;
pub mod deep_link;
pub mod error;
pub mod ipc;
pub mod tree;

pub use arm::ResourceBrowser;
pub use auth::AzureAuthService;
pub use auth::TokenStore;
pub use error::Error;
pub use tree::AzureServices;
pub use tree::ConnectionDescriptor;
pub use tree::ConnectionTree;
