//! minichat core
//!
//! Shared vocabulary for the minichat terminal client: identifiers, group and
//! message types, the two client interfaces a session consumes (messenger-level
//! and protocol-level), and the node attachment configuration that decides
//! whether those clients talk to an in-process node or a remote one.
//!
//! Nothing in this crate performs network I/O. Concrete node implementations
//! live in `minichat-node`.

pub mod attachment;
pub mod client;
pub mod errors;
pub mod invitation;
pub mod types;

pub use attachment::{AttachmentError, LocalServerConfig, NodeAttachmentConfig, RemoteNodeConfig};
pub use client::{ClientSource, MessengerClient, ProtocolClient, SharedMessengerClient, SharedProtocolClient};
pub use errors::{NodeError, NodeResult};
pub use invitation::Invitation;
pub use types::{
    ConversationMessage, DeviceId, DeviceInfo, GroupId, GroupInfo, IdParseError, MessageId,
    NodeEvent,
};

/// Capacity of per-subscriber event channels handed out by node clients
pub const EVENT_CHANNEL_CAPACITY: usize = 256;
