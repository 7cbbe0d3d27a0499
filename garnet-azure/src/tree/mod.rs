//! Connection tree presenter
//!
//! Drives the `login -> loading -> resources` flow of the connection dialog
//! and turns a selected Garnet cluster into a [`ConnectionDescriptor`]. The
//! presenter only holds state; rendering is left to the caller via
//! [`ConnectionTree::rows`].

mod backend;
mod descriptor;
mod presenter;

pub use backend::*;
pub use descriptor::ConnectionDescriptor;
pub use presenter::*;
