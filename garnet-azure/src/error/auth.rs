//! Authentication error types

/// Errors that can occur during sign-in and token acquisition.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// No account or token is present. Sign in first.
    #[error("No account available. Please login first.")]
    Unauthenticated,

    /// A code exchange was attempted without an outstanding login.
    #[error("PKCE codes not found. Start login first.")]
    PkceMissing,

    /// The identity provider redirected back with an error.
    #[error("{error}: {description}")]
    Provider { error: String, description: String },

    /// The `state` echoed by the redirect does not match the one we sent.
    #[error("State mismatch in authorization callback")]
    StateMismatch,

    /// The authorization code or refresh token was rejected.
    #[error("Grant rejected: {message}")]
    InvalidGrant { message: String },

    /// The specified tenant ID is invalid or not found.
    #[error("Invalid tenant: {tenant}")]
    InvalidTenant { tenant: String },

    /// The specified client ID is invalid or not authorized.
    #[error("Invalid client: {client_id}")]
    InvalidClient { client_id: String },

    /// Silent acquisition produced no token; an interactive login is needed.
    #[error("Failed to get {scope} access token silently: {message}")]
    SilentAcquisitionFailed { scope: String, message: String },

    /// The login was cancelled before the browser redirected back.
    #[error("Login cancelled")]
    LoginCancelled,

    /// The browser did not redirect back in time.
    #[error("Login timed out after {0:?}")]
    LoginTimedOut(std::time::Duration),

    /// The system browser could not be opened.
    #[error("Failed to open browser: {0}")]
    BrowserLaunch(String),

    /// The local callback server failed.
    #[error("Callback server failed: {0}")]
    CallbackServerFailed(String),

    /// Network error during authentication.
    #[error("Network error during auth: {0}")]
    Network(#[from] reqwest::Error),

    /// Failed to parse an authentication response.
    #[error("Auth response parse error: {0}")]
    Parse(String),
}

impl AuthError {
    /// Returns `true` if the user has to go through the browser again.
    pub fn requires_interaction(&self) -> bool {
        matches!(
            self,
            Self::Unauthenticated
                | Self::PkceMissing
                | Self::InvalidGrant { .. }
                | Self::SilentAcquisitionFailed { .. }
        )
    }
}
