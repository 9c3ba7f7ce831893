//! Identifier and message types shared by node clients and the session loop

use std::fmt;
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

// ----------------------------------------------------------------------------
// Identifiers
// ----------------------------------------------------------------------------

/// Error returned when parsing a hex identifier fails
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} identifier: {reason}")]
pub struct IdParseError {
    pub kind: &'static str,
    pub reason: String,
}

fn decode_fixed<const N: usize>(kind: &'static str, s: &str) -> Result<[u8; N], IdParseError> {
    let bytes = hex::decode(s).map_err(|e| IdParseError {
        kind,
        reason: e.to_string(),
    })?;

    if bytes.len() != N {
        return Err(IdParseError {
            kind,
            reason: format!("expected {} bytes ({} hex chars), got {} bytes", N, N * 2, bytes.len()),
        });
    }

    let mut out = [0u8; N];
    out.copy_from_slice(&bytes);
    Ok(out)
}

/// Identifier of a messaging group
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct GroupId([u8; 16]);

impl GroupId {
    pub const fn new(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    /// Generate a fresh random group identifier
    pub fn random() -> Self {
        Self(Uuid::new_v4().into_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Short form used when rendering group names in the terminal
    pub fn short(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for GroupId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed("group", s).map(Self)
    }
}

impl TryFrom<String> for GroupId {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<GroupId> for String {
    fn from(id: GroupId) -> Self {
        id.to_string()
    }
}

/// Identifier of a node device (8 bytes, rendered as 16 hex chars)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DeviceId([u8; 8]);

impl DeviceId {
    pub const fn new(bytes: [u8; 8]) -> Self {
        Self(bytes)
    }

    /// Derive a device identifier from arbitrary seed material
    pub fn from_seed(seed: &[u8]) -> Self {
        let digest = Sha256::digest(seed);
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        Self(bytes)
    }

    /// Generate a random device identifier
    pub fn generate() -> Self {
        Self::from_seed(Uuid::new_v4().as_bytes())
    }

    pub fn as_bytes(&self) -> &[u8; 8] {
        &self.0
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for DeviceId {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        decode_fixed("device", s).map(Self)
    }
}

impl TryFrom<String> for DeviceId {
    type Error = IdParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DeviceId> for String {
    fn from(id: DeviceId) -> Self {
        id.to_string()
    }
}

/// Identifier of a single conversation message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MessageId(pub Uuid);

impl MessageId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MessageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

// ----------------------------------------------------------------------------
// Groups and Messages
// ----------------------------------------------------------------------------

/// Identity of the device a client is attached to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub device_id: DeviceId,
    /// Name the node announces when a session does not provide one
    pub display_name: String,
}

/// A group known to a node
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupInfo {
    pub id: GroupId,
    pub name: String,
    pub created_by: DeviceId,
}

/// A message posted to a group conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub id: MessageId,
    pub group: GroupId,
    pub sender: DeviceId,
    /// Display name chosen by the author at send time
    pub author: String,
    pub body: String,
    /// Milliseconds since the Unix epoch
    pub sent_at_ms: u64,
}

impl ConversationMessage {
    pub fn new(group: GroupId, sender: DeviceId, author: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: MessageId::new(),
            group,
            sender,
            author: author.into(),
            body: body.into(),
            sent_at_ms: now_millis(),
        }
    }
}

/// Events delivered to group subscribers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeEvent {
    MessageReceived { message: ConversationMessage },
    MemberJoined { group: GroupId, device: DeviceId },
}

impl NodeEvent {
    /// Group this event belongs to
    pub fn group(&self) -> GroupId {
        match self {
            NodeEvent::MessageReceived { message } => message.group,
            NodeEvent::MemberJoined { group, .. } => *group,
        }
    }
}

/// Current wall-clock time in milliseconds since the Unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}
