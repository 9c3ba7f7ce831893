//! minichat node attachment
//!
//! Implementations of the session client interfaces from `minichat-core`:
//!
//! - [`LocalNode`]: an in-process node holding groups and history in memory
//! - [`NodeServer`]: serves a local node to other processes over TCP
//! - [`RemoteNode`]: clients for a node served by another process
//! - [`NodeManager`]: picks one of the above from a `NodeAttachmentConfig`

pub mod local;
pub mod manager;
pub mod remote;
pub mod server;
pub mod wire;

pub use local::{LocalNode, NodeConfig, DEFAULT_HISTORY_LIMIT};
pub use manager::NodeManager;
pub use remote::RemoteNode;
pub use server::NodeServer;
