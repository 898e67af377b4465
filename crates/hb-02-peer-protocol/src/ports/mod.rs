//! # Ports Layer
//!
//! - **Driven Ports (Outbound):** what a peer session needs from its host
//!   node and from the network.

pub mod outbound;

pub use outbound::{AuthEndpointClient, HandlerError, SessionHandler};
