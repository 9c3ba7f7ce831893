//! Node attachment configuration
//!
//! Decides whether session clients are served by an in-process node or by a
//! remote node. The configuration is resolved once from the two independent
//! flag groups and then passed by value to whoever provisions clients.

use std::fmt;
use std::net::SocketAddr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Default timeout for connecting to and awaiting answers from a remote node
pub const DEFAULT_REMOTE_TIMEOUT: Duration = Duration::from_secs(5);

/// Settings for a node running inside this process
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalServerConfig {
    /// Addresses the in-process node also serves remote clients on
    pub listeners: Vec<SocketAddr>,
}

impl LocalServerConfig {
    /// Whether any local-server option was explicitly set
    pub fn is_populated(&self) -> bool {
        !self.listeners.is_empty()
    }
}

/// Settings for attaching to a node running elsewhere
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteNodeConfig {
    /// `host:port` of the remote node
    pub addr: String,
    /// Bound on connecting and on waiting for each answer
    pub timeout: Duration,
}

impl RemoteNodeConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        Self {
            addr: addr.into(),
            timeout: DEFAULT_REMOTE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Errors raised while resolving the attachment mode
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AttachmentError {
    #[error("Conflicting node flags: local listeners {listeners:?} cannot be combined with remote node {remote_addr}")]
    Conflicting {
        listeners: Vec<SocketAddr>,
        remote_addr: String,
    },

    #[error("Invalid remote node address: {0:?}")]
    InvalidRemoteAddr(String),

    #[error("Remote node timeout must be greater than zero")]
    ZeroTimeout,
}

/// Resolved attachment mode for a node manager
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeAttachmentConfig {
    Local(LocalServerConfig),
    Remote(RemoteNodeConfig),
}

impl Default for NodeAttachmentConfig {
    fn default() -> Self {
        NodeAttachmentConfig::Local(LocalServerConfig::default())
    }
}

impl NodeAttachmentConfig {
    /// Resolve the attachment mode from both flag groups
    ///
    /// A remote node wins when it is the only group populated. Populating both
    /// groups is rejected instead of silently picking one.
    pub fn resolve(
        local: LocalServerConfig,
        remote: Option<RemoteNodeConfig>,
    ) -> Result<Self, AttachmentError> {
        let Some(remote) = remote else {
            return Ok(NodeAttachmentConfig::Local(local));
        };

        if local.is_populated() {
            return Err(AttachmentError::Conflicting {
                listeners: local.listeners,
                remote_addr: remote.addr,
            });
        }

        if !is_host_port(&remote.addr) {
            return Err(AttachmentError::InvalidRemoteAddr(remote.addr));
        }

        if remote.timeout.is_zero() {
            return Err(AttachmentError::ZeroTimeout);
        }

        Ok(NodeAttachmentConfig::Remote(remote))
    }

    pub fn is_local(&self) -> bool {
        matches!(self, NodeAttachmentConfig::Local(_))
    }
}

impl fmt::Display for NodeAttachmentConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeAttachmentConfig::Local(local) if local.listeners.is_empty() => write!(f, "local"),
            NodeAttachmentConfig::Local(local) => {
                write!(f, "local (serving on ")?;
                for (i, addr) in local.listeners.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", addr)?;
                }
                write!(f, ")")
            }
            NodeAttachmentConfig::Remote(remote) => write!(f, "remote ({})", remote.addr),
        }
    }
}

fn is_host_port(addr: &str) -> bool {
    match addr.rsplit_once(':') {
        Some((host, port)) => !host.is_empty() && port.parse::<u16>().is_ok(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listener() -> SocketAddr {
        "127.0.0.1:9091".parse().unwrap()
    }

    #[test]
    fn test_no_flags_resolves_to_plain_local() {
        let config = NodeAttachmentConfig::resolve(LocalServerConfig::default(), None).unwrap();
        assert!(config.is_local());
        assert_eq!(config.to_string(), "local");
    }

    #[test]
    fn test_local_listeners_keep_local_mode() {
        let local = LocalServerConfig {
            listeners: vec![listener()],
        };
        let config = NodeAttachmentConfig::resolve(local.clone(), None).unwrap();
        assert_eq!(config, NodeAttachmentConfig::Local(local));
        assert_eq!(config.to_string(), "local (serving on 127.0.0.1:9091)");
    }

    #[test]
    fn test_remote_only_resolves_to_remote() {
        let remote = RemoteNodeConfig::new("node.example:9091");
        let config = NodeAttachmentConfig::resolve(LocalServerConfig::default(), Some(remote.clone())).unwrap();
        assert_eq!(config, NodeAttachmentConfig::Remote(remote));
    }

    #[test]
    fn test_both_groups_populated_is_rejected() {
        let local = LocalServerConfig {
            listeners: vec![listener()],
        };
        let err = NodeAttachmentConfig::resolve(local, Some(RemoteNodeConfig::new("10.0.0.1:9091"))).unwrap_err();
        assert!(matches!(err, AttachmentError::Conflicting { .. }));
    }

    #[test]
    fn test_remote_address_and_timeout_are_validated() {
        let err = NodeAttachmentConfig::resolve(LocalServerConfig::default(), Some(RemoteNodeConfig::new("no-port")))
            .unwrap_err();
        assert_eq!(err, AttachmentError::InvalidRemoteAddr("no-port".to_string()));

        let remote = RemoteNodeConfig::new("127.0.0.1:1").with_timeout(Duration::ZERO);
        let err = NodeAttachmentConfig::resolve(LocalServerConfig::default(), Some(remote)).unwrap_err();
        assert_eq!(err, AttachmentError::ZeroTimeout);
    }
}
