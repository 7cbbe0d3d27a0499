//! Named request channels
//!
//! The desktop shell forwards renderer requests by channel name. Only the
//! auth channels are answered here.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::sync::Mutex;

use tokio_util::sync::CancellationToken;

use crate::auth::AzureAuthService;
use crate::error::AuthError;

/// Request/response channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpcInvokeEvent {
    StartDeviceLogin,
    PollForToken,
    GetCosmosToken,
}

impl IpcInvokeEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::StartDeviceLogin => "azure:start:device:login",
            Self::PollForToken => "azure:poll:for:token",
            Self::GetCosmosToken => "azure:get:cosmos:token",
        }
    }
}

impl fmt::Display for IpcInvokeEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IpcInvokeEvent {
    type Err = IpcError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "azure:start:device:login" => Ok(Self::StartDeviceLogin),
            "azure:poll:for:token" => Ok(Self::PollForToken),
            "azure:get:cosmos:token" => Ok(Self::GetCosmosToken),
            _ => Err(IpcError::UnsupportedChannel(s.to_string())),
        }
    }
}

/// Channels pushed to the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IpcOnEvent {
    AzureOauthCallback,
}

impl IpcOnEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AzureOauthCallback => "azure:oauth:callback",
        }
    }
}

impl fmt::Display for IpcOnEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum IpcError {
    #[error("Unsupported channel: {0}")]
    UnsupportedChannel(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error("Failed to serialize response: {0}")]
    Serialize(#[from] serde_json::Error),
}
/// Answers the auth invoke channels.
#[derive(Debug, Clone)]
pub struct AuthIpcHandler {
    auth: AzureAuthService,
    login_cancel: Arc<Mutex<CancellationToken>>,
}

impl AuthIpcHandler {
    pub fn new(auth: AzureAuthService) -> Self {
        Self {
            auth,
            login_cancel: Arc::new(Mutex::new(CancellationToken::new())),
        }
    }

    /// Abandons a login started over `azure:start:device:login`, if one is
    /// running.
    pub fn cancel_login(&self) {
        self.cancel_slot().cancel();
    }

    /// Dispatches one request and returns its JSON payload.
    pub async fn handle(&self, channel: &str) -> Result<serde_json::Value, IpcError> {
        let event: IpcInvokeEvent = channel.parse()?;
        log::debug!("IPC invoke {}", event);

        match event {
            IpcInvokeEvent::StartDeviceLogin => {
                let result = self.auth.login_with_cancel(self.begin_login()).await?;
                Ok(serde_json::to_value(result)?)
            }
            IpcInvokeEvent::GetCosmosToken => {
                let token = self.auth.cosmos_access_token().await?;
                Ok(serde_json::Value::String(token))
            }
            // Polling belonged to the device code flow, which is gone.
            IpcInvokeEvent::PollForToken => Err(IpcError::UnsupportedChannel(channel.to_string())),
        }
    }

    /// Installs a fresh token for the login about to start.
    fn begin_login(&self) -> CancellationToken {
        let cancel = CancellationToken::new();
        *self.cancel_slot() = cancel.clone();
        cancel
    }

    fn cancel_slot(&self) -> std::sync::MutexGuard<'_, CancellationToken> {
        self.login_cancel.lock().unwrap_or_else(|e| e.into_inner())
    }
}
