//! Group invitation tokens
//!
//! An invitation is an opaque string for the session bootstrap. Only nodes
//! decode it, when a protocol client is asked to join a group.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use serde::{Deserialize, Serialize};

use crate::errors::{NodeError, NodeResult};
use crate::types::{DeviceId, GroupId, GroupInfo};

/// Decoded contents of a group invitation token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Invitation {
    pub group: GroupId,
    pub name: String,
    pub inviter: DeviceId,
}

impl Invitation {
    pub fn for_group(group: &GroupInfo) -> Self {
        Self {
            group: group.id,
            name: group.name.clone(),
            inviter: group.created_by,
        }
    }

    /// Encode as a URL-safe token
    pub fn encode(&self) -> NodeResult<String> {
        let json = serde_json::to_vec(self)?;
        Ok(URL_SAFE_NO_PAD.encode(json))
    }

    /// Decode a token produced by [`Invitation::encode`]
    pub fn decode(token: &str) -> NodeResult<Self> {
        let bytes = URL_SAFE_NO_PAD
            .decode(token.trim())
            .map_err(|e| NodeError::InvalidInvitation(format!("not base64url: {}", e)))?;

        serde_json::from_slice(&bytes)
            .map_err(|e| NodeError::InvalidInvitation(format!("malformed payload: {}", e)))
    }

    pub fn into_group_info(self) -> GroupInfo {
        GroupInfo {
            id: self.group,
            name: self.name,
            created_by: self.inviter,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invitation_decodes_what_it_encodes() {
        let info = GroupInfo {
            id: GroupId::new([7; 16]),
            name: "friends".to_string(),
            created_by: DeviceId::new([9; 8]),
        };
        let token = Invitation::for_group(&info).encode().unwrap();
        assert!(!token.contains('='));

        let decoded = Invitation::decode(&token).unwrap();
        assert_eq!(decoded.into_group_info(), info);
    }

    #[test]
    fn test_invalid_tokens_are_rejected() {
        assert!(matches!(
            Invitation::decode("not a token!"),
            Err(NodeError::InvalidInvitation(_))
        ));
        let not_json = URL_SAFE_NO_PAD.encode(b"hello");
        assert!(matches!(
            Invitation::decode(&not_json),
            Err(NodeError::InvalidInvitation(_))
        ));
    }
}
