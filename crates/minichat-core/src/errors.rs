//! Error types returned by node clients

use crate::types::GroupId;

/// Errors produced while attaching to or talking with a node
#[derive(Debug, thiserror::Error)]
pub enum NodeError {
    #[error("Node unreachable at {addr}: {reason}")]
    Unreachable { addr: String, reason: String },

    #[error("Node startup failed: {0}")]
    Startup(String),

    #[error("Unknown group: {0}")]
    UnknownGroup(GroupId),

    #[error("Invalid group invitation: {0}")]
    InvalidInvitation(String),

    #[error("Wire protocol error: {0}")]
    Protocol(String),

    #[error("Remote node error: {0}")]
    Remote(String),

    #[error("Node is shut down")]
    Shutdown,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for NodeError {
    fn from(err: serde_json::Error) -> Self {
        NodeError::Protocol(err.to_string())
    }
}

/// Result type for node client operations
pub type NodeResult<T> = std::result::Result<T, NodeError>;
