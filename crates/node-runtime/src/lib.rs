//! # Hydrabase Node Runtime
//!
//! Library half of the `hydrabase-node` binary, exposed for integration
//! tests.
//!
//! ## Modules
//!
//! - `config` - `HB_*` environment configuration
//! - `node/` - peer set, announce relay, search fan-out
//! - `server` - `/auth` and WebSocket upgrade over axum
//! - `discovery` - bootstrap candidates
//! - `runtime` - startup and shutdown
//!
//! ## Connection Flow
//!
//! ```text
//!  dialer                                   acceptor
//!    │  GET /auth ─────────────────────────────→ │
//!    │ ←──────────────── {signature, address}    │
//!    │  GET / (upgrade, x-signature/x-address)   │
//!    │ ─────────────────────────────────────────→│ GET /auth of dialer
//!    │ ←──────────────────────── 101 / 4xx       │
//!    │  {capability} ⇄ {capability}              │
//!    │  request/response, announce               │
//! ```

pub mod config;
pub mod discovery;
pub mod node;
pub mod runtime;
pub mod server;

pub use config::{ConfigError, NodeConfig};
pub use discovery::{bootstrap, DiscoveryError, PeerDiscovery, StaticDiscovery};
pub use node::{Node, NodeError, NodeSettings, PeerSummary};
pub use runtime::{load_plugins, NodeRuntime, RuntimeError};
