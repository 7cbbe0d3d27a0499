//! Azure Resource Manager browsing
//!
//! [`ResourceBrowser`] walks subscriptions, resource groups and Garnet
//! clusters with the management token held in the shared token store.

mod client;
mod models;
mod resource_id;

pub use client::*;
pub use models::*;
pub use resource_id::ResourceId;
