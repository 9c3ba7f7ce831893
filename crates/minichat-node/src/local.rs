//! In-process node
//!
//! Keeps groups, members and message history in memory and fans events out to
//! subscribers over a broadcast channel. Every client handed out for a local
//! node shares the same state, so a messenger client and a protocol client
//! obtained separately still observe each other's effects.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, info, warn};

use minichat_core::{
    ConversationMessage, DeviceId, DeviceInfo, GroupId, GroupInfo, Invitation, MessageId,
    MessengerClient, NodeError, NodeEvent, NodeResult, ProtocolClient, EVENT_CHANNEL_CAPACITY,
};

/// Messages kept per group when no explicit limit is configured
pub const DEFAULT_HISTORY_LIMIT: usize = 1000;

const BROADCAST_CAPACITY: usize = 1024;
const FALLBACK_DISPLAY_NAME: &str = "anonymous";

// ----------------------------------------------------------------------------
// Configuration
// ----------------------------------------------------------------------------

/// Identity and retention settings for a local node
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// Display name announced by the node; empty selects a default
    pub display_name: String,
    /// Fixed device identifier, generated when absent
    pub device_id: Option<DeviceId>,
    pub history_limit: usize,
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            device_id: None,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }
}

impl NodeConfig {
    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// Display name with the empty case replaced by the login name
    pub fn effective_display_name(&self) -> String {
        if !self.display_name.is_empty() {
            return self.display_name.clone();
        }

        std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| FALLBACK_DISPLAY_NAME.to_string())
    }
}

// ----------------------------------------------------------------------------
// Node State
// ----------------------------------------------------------------------------

#[derive(Debug)]
struct GroupState {
    info: GroupInfo,
    members: Vec<DeviceId>,
    messages: VecDeque<ConversationMessage>,
}

impl GroupState {
    fn new(info: GroupInfo) -> Self {
        Self {
            info,
            members: Vec::new(),
            messages: VecDeque::new(),
        }
    }

    /// Returns true when the device was not yet a member
    fn add_member(&mut self, device: DeviceId) -> bool {
        if self.members.contains(&device) {
            return false;
        }
        self.members.push(device);
        true
    }
}

struct Inner {
    device: DeviceInfo,
    history_limit: usize,
    groups: RwLock<HashMap<GroupId, GroupState>>,
    events: broadcast::Sender<NodeEvent>,
}

/// Node running inside the current process
#[derive(Clone)]
pub struct LocalNode {
    inner: Arc<Inner>,
}

impl LocalNode {
    pub fn new(config: NodeConfig) -> Self {
        let device = DeviceInfo {
            device_id: config.device_id.unwrap_or_else(DeviceId::generate),
            display_name: config.effective_display_name(),
        };
        let (events, _) = broadcast::channel(BROADCAST_CAPACITY);

        info!(device = %device.device_id, name = %device.display_name, "Local node started");

        Self {
            inner: Arc::new(Inner {
                device,
                history_limit: config.history_limit.max(1),
                groups: RwLock::new(HashMap::new()),
                events,
            }),
        }
    }

    pub fn device_id(&self) -> DeviceId {
        self.inner.device.device_id
    }

    /// Number of live event subscriptions
    pub fn subscriber_count(&self) -> usize {
        self.inner.events.receiver_count()
    }

    /// Number of groups this node knows about
    pub async fn group_count(&self) -> usize {
        self.inner.groups.read().await.len()
    }

    fn publish(&self, event: NodeEvent) {
        // No receivers is not an error; nobody is listening yet.
        let _ = self.inner.events.send(event);
    }

    async fn register_member(&self, info: GroupInfo, device: DeviceId) -> GroupInfo {
        let mut groups = self.inner.groups.write().await;
        let group = groups.entry(info.id).or_insert_with(|| GroupState::new(info));
        let joined = group.add_member(device);
        let info = group.info.clone();
        drop(groups);

        if joined {
            debug!(group = %info.id, device = %device, "Member joined group");
            self.publish(NodeEvent::MemberJoined {
                group: info.id,
                device,
            });
        }
        info
    }
}

// ----------------------------------------------------------------------------
// Client Implementations
// ----------------------------------------------------------------------------

#[async_trait]
impl MessengerClient for LocalNode {
    async fn default_display_name(&self) -> NodeResult<String> {
        Ok(self.inner.device.display_name.clone())
    }

    async fn send_message(&self, group: GroupId, author: &str, body: &str) -> NodeResult<MessageId> {
        let message = ConversationMessage::new(group, self.device_id(), author, body);
        let id = message.id;

        {
            let mut groups = self.inner.groups.write().await;
            let state = groups.get_mut(&group).ok_or(NodeError::UnknownGroup(group))?;
            state.messages.push_back(message.clone());
            while state.messages.len() > self.inner.history_limit {
                state.messages.pop_front();
            }
        }

        self.publish(NodeEvent::MessageReceived { message });
        Ok(id)
    }

    async fn history(&self, group: GroupId, limit: usize) -> NodeResult<Vec<ConversationMessage>> {
        let groups = self.inner.groups.read().await;
        let state = groups.get(&group).ok_or(NodeError::UnknownGroup(group))?;
        let skip = state.messages.len().saturating_sub(limit);
        Ok(state.messages.iter().skip(skip).cloned().collect())
    }

    async fn subscribe(&self, group: GroupId) -> NodeResult<mpsc::Receiver<NodeEvent>> {
        if !self.inner.groups.read().await.contains_key(&group) {
            return Err(NodeError::UnknownGroup(group));
        }

        let mut events = self.inner.events.subscribe();
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        tokio::spawn(async move {
            loop {
                let received = tokio::select! {
                    _ = tx.closed() => break,
                    received = events.recv() => received,
                };

                match received {
                    Ok(event) if event.group() == group => {
                        if tx.send(event).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(group = %group, skipped, "Subscriber lagged behind node events");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
            debug!(group = %group, "Subscription closed");
        });

        Ok(rx)
    }
}

#[async_trait]
impl ProtocolClient for LocalNode {
    async fn device_info(&self) -> NodeResult<DeviceInfo> {
        Ok(self.inner.device.clone())
    }

    async fn create_group(&self, name: &str) -> NodeResult<GroupInfo> {
        let id = GroupId::random();
        let name = if name.is_empty() {
            format!("group-{}", id.short())
        } else {
            name.to_string()
        };
        let info = GroupInfo {
            id,
            name,
            created_by: self.device_id(),
        };

        info!(group = %info.id, name = %info.name, "Created group");
        Ok(self.register_member(info, self.device_id()).await)
    }

    async fn join_group(&self, invitation: &str) -> NodeResult<GroupInfo> {
        let invitation = Invitation::decode(invitation)?;
        let info = invitation.into_group_info();

        info!(group = %info.id, name = %info.name, "Joining group");
        Ok(self.register_member(info, self.device_id()).await)
    }

    async fn group_invitation(&self, group: GroupId) -> NodeResult<String> {
        let groups = self.inner.groups.read().await;
        let state = groups.get(&group).ok_or(NodeError::UnknownGroup(group))?;
        Invitation::for_group(&state.info).encode()
    }

    async fn members(&self, group: GroupId) -> NodeResult<Vec<DeviceId>> {
        let groups = self.inner.groups.read().await;
        let state = groups.get(&group).ok_or(NodeError::UnknownGroup(group))?;
        Ok(state.members.clone())
    }
}
