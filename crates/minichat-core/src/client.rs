//! Client interfaces consumed by a chat session
//!
//! A session holds two handles onto the same node: a messenger-level client
//! for conversations and display names, and a protocol-level client for group
//! membership. Both may be backed by an in-process node or by a connection to
//! a remote one; callers cannot tell the difference.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::errors::NodeResult;
use crate::types::{ConversationMessage, DeviceId, DeviceInfo, GroupId, GroupInfo, MessageId, NodeEvent};

// ----------------------------------------------------------------------------
// Messenger Client
// ----------------------------------------------------------------------------

/// Higher-level messaging API (conversations, display names)
#[async_trait]
pub trait MessengerClient: Send + Sync {
    /// Display name the node uses when a session does not choose one
    async fn default_display_name(&self) -> NodeResult<String>;

    /// Post a message to a group conversation
    async fn send_message(&self, group: GroupId, author: &str, body: &str) -> NodeResult<MessageId>;

    /// Most recent messages of a group, oldest first
    async fn history(&self, group: GroupId, limit: usize) -> NodeResult<Vec<ConversationMessage>>;

    /// Subscribe to events of a group
    ///
    /// The subscription ends when the receiver is dropped or the node stops.
    async fn subscribe(&self, group: GroupId) -> NodeResult<mpsc::Receiver<NodeEvent>>;
}

// ----------------------------------------------------------------------------
// Protocol Client
// ----------------------------------------------------------------------------

/// Lower-level protocol API (devices and group membership)
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    async fn device_info(&self) -> NodeResult<DeviceInfo>;

    /// Create a new group owned by this device
    async fn create_group(&self, name: &str) -> NodeResult<GroupInfo>;

    /// Join the group described by an invitation token
    async fn join_group(&self, invitation: &str) -> NodeResult<GroupInfo>;

    /// Invitation token other devices can use to join `group`
    async fn group_invitation(&self, group: GroupId) -> NodeResult<String>;

    async fn members(&self, group: GroupId) -> NodeResult<Vec<DeviceId>>;
}

pub type SharedMessengerClient = Arc<dyn MessengerClient>;
pub type SharedProtocolClient = Arc<dyn ProtocolClient>;

// ----------------------------------------------------------------------------
// Client Source
// ----------------------------------------------------------------------------

/// Something that hands out session clients, typically a node manager
///
/// Whether the clients are backed by a local or a remote node is decided by
/// the implementation, never by the caller.
#[async_trait]
pub trait ClientSource: Send + Sync {
    async fn messenger_client(&self) -> NodeResult<SharedMessengerClient>;

    async fn protocol_client(&self) -> NodeResult<SharedProtocolClient>;
}
