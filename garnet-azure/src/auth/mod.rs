//! Authentication

mod claims;
pub(crate) mod common;
mod config;
mod loopback;
mod pkce;
mod service;
mod store;
mod token;

pub use claims::AccountInfo;
pub use claims::TokenClaims;
pub use claims::UserProfile;
pub use config::AuthConfig;
pub use config::COSMOS_SCOPE;
pub use config::DEFAULT_AUTHORITY_HOST;
pub use config::DEFAULT_CLIENT_ID;
pub use config::DEFAULT_TENANT;
pub use config::MANAGEMENT_SCOPE;
pub use loopback::LoginProgress;
pub use loopback::LoginState;
pub use loopback::PendingLogin;
pub use pkce::PkceCodes;
pub use pkce::code_challenge;
pub use service::AzureAuthService;
pub use store::TokenStore;
pub use token::AccessToken;
pub use token::AuthenticationResult;
pub use token::TokenProvider;

#[cfg(test)]
pub(crate) use claims::fake_jwt;
