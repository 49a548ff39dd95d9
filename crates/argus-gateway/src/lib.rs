//! The inbound boundary and process wiring.
//!
//! The messaging transport itself lives outside this workspace; it calls
//! [`InboundHandler`] after [`verify`]-ing request signatures, and receives
//! outbound sends through the `MessageSender` it registered with the queue.

pub mod app;
pub mod error;
pub mod handler;
#[cfg(test)]
pub(crate) mod testutil;
pub mod verify;

pub use app::{ArgusApp, ExternalProviders};
pub use error::{GatewayError, Result};
pub use handler::InboundHandler;
