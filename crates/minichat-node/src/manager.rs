//! Node manager
//!
//! Owns the node a session is attached to and hands out clients for it. The
//! attachment mode comes from an explicit [`NodeAttachmentConfig`]; the first
//! client request starts the local node (and its listeners) or connects to
//! the remote one, and later requests reuse it.

use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, OnceCell};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use minichat_core::{
    ClientSource, NodeAttachmentConfig, NodeResult, SharedMessengerClient, SharedProtocolClient,
};

use crate::local::{LocalNode, NodeConfig};
use crate::remote::RemoteNode;
use crate::server::NodeServer;

#[derive(Clone)]
enum AttachedNode {
    Local(LocalNode),
    Remote(RemoteNode),
}

/// Lazily attaches to a node and provides session clients for it
pub struct NodeManager {
    attachment: NodeAttachmentConfig,
    node_config: NodeConfig,
    cancel: CancellationToken,
    node: OnceCell<AttachedNode>,
    servers: Mutex<Vec<(SocketAddr, JoinHandle<NodeResult<()>>)>>,
}

impl NodeManager {
    pub fn new(attachment: NodeAttachmentConfig, node_config: NodeConfig) -> Self {
        Self {
            attachment,
            node_config,
            cancel: CancellationToken::new(),
            node: OnceCell::new(),
            servers: Mutex::new(Vec::new()),
        }
    }

    pub fn attachment(&self) -> &NodeAttachmentConfig {
        &self.attachment
    }

    /// Whether a node has been started or connected yet
    pub fn is_attached(&self) -> bool {
        self.node.initialized()
    }

    /// Start the local node or connect to the remote one
    ///
    /// Idempotent: concurrent and repeated calls share one attachment.
    pub async fn attach(&self) -> NodeResult<()> {
        self.node().await.map(|_| ())
    }

    /// Addresses the local node is currently serving on
    pub async fn listening_addrs(&self) -> Vec<SocketAddr> {
        self.servers.lock().await.iter().map(|(addr, _)| *addr).collect()
    }

    /// Stop listeners and wait for them to finish
    pub async fn shutdown(&self) {
        self.cancel.cancel();
        let servers: Vec<_> = self.servers.lock().await.drain(..).collect();
        for (addr, server) in servers {
            match server.await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => warn!(%addr, error = %e, "Node listener failed"),
                Err(e) => warn!(%addr, error = %e, "Node listener task panicked"),
            }
        }
    }

    async fn node(&self) -> NodeResult<&AttachedNode> {
        self.node.get_or_try_init(|| self.start()).await
    }

    async fn start(&self) -> NodeResult<AttachedNode> {
        match &self.attachment {
            NodeAttachmentConfig::Local(local) => {
                let node = LocalNode::new(self.node_config.clone());

                // Bind every listener before spawning any, so a bad address
                // leaves nothing running.
                let mut bound = Vec::with_capacity(local.listeners.len());
                for addr in &local.listeners {
                    bound.push(NodeServer::bind(node.clone(), *addr).await?);
                }

                let mut servers = self.servers.lock().await;
                for server in bound {
                    let addr = server.local_addr()?;
                    servers.push((addr, server.spawn(self.cancel.child_token())));
                }

                info!(mode = %self.attachment, "Node attached");
                Ok(AttachedNode::Local(node))
            }
            NodeAttachmentConfig::Remote(remote) => {
                let node = RemoteNode::connect(remote.clone()).await?;
                info!(mode = %self.attachment, "Node attached");
                Ok(AttachedNode::Remote(node))
            }
        }
    }
}

impl Drop for NodeManager {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

#[async_trait]
impl ClientSource for NodeManager {
    async fn messenger_client(&self) -> NodeResult<SharedMessengerClient> {
        let client: SharedMessengerClient = match self.node().await? {
            AttachedNode::Local(node) => Arc::new(node.clone()),
            AttachedNode::Remote(node) => Arc::new(node.clone()),
        };
        Ok(client)
    }

    async fn protocol_client(&self) -> NodeResult<SharedProtocolClient> {
        let client: SharedProtocolClient = match self.node().await? {
            AttachedNode::Local(node) => Arc::new(node.clone()),
            AttachedNode::Remote(node) => Arc::new(node.clone()),
        };
        Ok(client)
    }
}
