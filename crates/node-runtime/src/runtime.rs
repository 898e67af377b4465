//! # Node Runtime
//!
//! Assembles a node from configuration and runs its server.
//!
//! Startup sequence:
//! 1. Load the plugin catalog, if configured.
//! 2. Build the reconciler and the node identity.
//! 3. Bind the listener and serve `/auth` and the WebSocket upgrade.
//! 4. Bootstrap from discovery.

use crate::config::NodeConfig;
use crate::discovery::{bootstrap, PeerDiscovery, StaticDiscovery};
use crate::node::{Node, NodeError};
use crate::server;
use hb_03_reconciliation::{MemoryCache, PluginError, PluginRegistry, Reconciler, StaticCatalog};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Plugin id of the catalog loaded from `HB_CATALOG_PATH`.
pub const CATALOG_PLUGIN_ID: &str = "catalog";

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read catalog {path}: {source}")]
    Catalog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Plugin(#[from] PluginError),

    #[error(transparent)]
    Node(#[from] NodeError),
}

/// A running node and its server task.
pub struct NodeRuntime {
    node: Arc<Node>,
    local_addr: Option<SocketAddr>,
    shutdown_tx: watch::Sender<bool>,
    server: JoinHandle<std::io::Result<()>>,
}

impl NodeRuntime {
    /// Bind `config.listen_addr()` and start.
    pub async fn start(config: NodeConfig) -> Result<Self, RuntimeError> {
        let addr = config.listen_addr();
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| RuntimeError::Bind { addr, source })?;
        let plugins = load_plugins(&config).await?;
        Self::start_on(listener, config, plugins).await
    }

    /// Start on an already bound listener with the given plugins.
    pub async fn start_on(
        listener: TcpListener,
        config: NodeConfig,
        plugins: PluginRegistry,
    ) -> Result<Self, RuntimeError> {
        let reconciler = Reconciler::new(plugins, Arc::new(MemoryCache::new()), config.reconciler_config());
        let node = Node::from_config(&config, reconciler)?;
        let local_addr = listener.local_addr().ok();

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let server = tokio::spawn(server::serve(listener, Arc::clone(&node), shutdown_rx));

        info!(
            address = %node.address(),
            hostname = %node.hostname(),
            room = %config.dht_room,
            agreement = %config.agreement,
            combiner = %config.combiner,
            "Node started"
        );

        let discovery = StaticDiscovery::new(config.bootstrap_peers.clone());
        if !config.bootstrap_peers.is_empty() {
            let node = Arc::clone(&node);
            let room = config.dht_room.clone();
            tokio::spawn(async move {
                bootstrap(&node, &discovery as &dyn PeerDiscovery, &room).await;
            });
        }

        Ok(Self {
            node,
            local_addr,
            shutdown_tx,
            server,
        })
    }

    pub fn node(&self) -> &Arc<Node> {
        &self.node
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// Close every session, then stop the server.
    pub async fn shutdown(self) {
        info!("Shutting down node");
        self.node.shutdown();
        let _ = self.shutdown_tx.send(true);
        match self.server.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(error = %e, "Server error"),
            Err(e) => error!(error = %e, "Server task failed"),
        }
        info!("Node stopped");
    }
}

/// Plugins configured for this node: the JSON catalog when a path is set.
pub async fn load_plugins(config: &NodeConfig) -> Result<PluginRegistry, RuntimeError> {
    let mut registry = PluginRegistry::new();
    if let Some(path) = &config.catalog_path {
        let json = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| RuntimeError::Catalog {
                path: path.clone(),
                source,
            })?;
        let catalog = StaticCatalog::from_json(CATALOG_PLUGIN_ID, &json)?;
        info!(path = %path.display(), records = catalog.len(), "Loaded catalog");
        registry.register(Arc::new(catalog));
    }
    Ok(registry)
}
