//! Error types

mod arm;
mod auth;

pub use arm::*;
pub use auth::*;

/// Any failure surfaced by the sign-in or resource browsing layers.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Sign-in or token acquisition failed.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// An Azure Resource Manager call failed.
    #[error(transparent)]
    Arm(#[from] ArmError),

    /// A cluster was found but exposes no reachable node.
    #[error("No nodes found in Garnet Cluster")]
    NoClusterNodes,

    /// The first node of a cluster lacks an address or a port.
    #[error("Garnet Cluster node '{0}' has no address or port")]
    IncompleteClusterNode(String),
}

impl Error {
    /// Returns `true` if the failure means no user is signed in.
    pub fn is_unauthenticated(&self) -> bool {
        matches!(
            self,
            Self::Auth(AuthError::Unauthenticated) | Self::Arm(ArmError::Unauthenticated)
        )
    }
}
