//! Session configuration assembly

use minichat_core::{SharedMessengerClient, SharedProtocolClient};

use crate::error::BootstrapError;
use crate::logging::SessionLogger;

/// Everything an interactive session needs, fixed for its lifetime
#[derive(Clone)]
pub struct SessionConfig {
    group_invitation: String,
    messenger_client: SharedMessengerClient,
    protocol_client: SharedProtocolClient,
    logger: SessionLogger,
    display_name: String,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("group_invitation", &self.group_invitation)
            .field("logger", &self.logger)
            .field("display_name", &self.display_name)
            .finish_non_exhaustive()
    }
}

impl SessionConfig {
    pub fn builder(logger: SessionLogger) -> SessionConfigBuilder {
        SessionConfigBuilder {
            logger,
            group_invitation: String::new(),
            display_name: String::new(),
            messenger_client: None,
            protocol_client: None,
        }
    }

    /// Invitation to join; empty means a new group is created
    pub fn group_invitation(&self) -> &str {
        &self.group_invitation
    }

    pub fn creates_group(&self) -> bool {
        self.group_invitation.is_empty()
    }

    pub fn messenger_client(&self) -> &SharedMessengerClient {
        &self.messenger_client
    }

    pub fn protocol_client(&self) -> &SharedProtocolClient {
        &self.protocol_client
    }

    pub fn logger(&self) -> &SessionLogger {
        &self.logger
    }

    /// Display name for this session; empty means the node's default
    pub fn display_name(&self) -> &str {
        &self.display_name
    }
}

/// Collects resolved inputs and produces a [`SessionConfig`]
pub struct SessionConfigBuilder {
    logger: SessionLogger,
    group_invitation: String,
    display_name: String,
    messenger_client: Option<SharedMessengerClient>,
    protocol_client: Option<SharedProtocolClient>,
}

impl SessionConfigBuilder {
    /// Invitation token, kept verbatim
    pub fn group_invitation(mut self, invitation: impl Into<String>) -> Self {
        self.group_invitation = invitation.into();
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    pub fn messenger_client(mut self, client: SharedMessengerClient) -> Self {
        self.messenger_client = Some(client);
        self
    }

    pub fn protocol_client(mut self, client: SharedProtocolClient) -> Self {
        self.protocol_client = Some(client);
        self
    }

    /// Assemble the configuration; both clients are required
    pub fn build(self) -> Result<SessionConfig, BootstrapError> {
        let messenger_client = self.messenger_client.ok_or(BootstrapError::IncompleteSession {
            missing: "messenger client",
        })?;
        let protocol_client = self.protocol_client.ok_or(BootstrapError::IncompleteSession {
            missing: "protocol client",
        })?;

        Ok(SessionConfig {
            group_invitation: self.group_invitation,
            messenger_client,
            protocol_client,
            logger: self.logger,
            display_name: self.display_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::LoggingPolicy;
    use minichat_node::{LocalNode, NodeConfig};
    use std::sync::Arc;

    fn logger() -> SessionLogger {
        SessionLogger::init(LoggingPolicy::default()).unwrap().named("mini")
    }

    #[test]
    fn test_missing_messenger_client_is_rejected() {
        let node = LocalNode::new(NodeConfig::default());
        let err = SessionConfig::builder(logger())
            .protocol_client(Arc::new(node))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::IncompleteSession { missing: "messenger client" }
        ));
    }

    #[test]
    fn test_missing_protocol_client_is_rejected() {
        let node = LocalNode::new(NodeConfig::default());
        let err = SessionConfig::builder(logger())
            .messenger_client(Arc::new(node))
            .build()
            .unwrap_err();
        assert!(matches!(
            err,
            BootstrapError::IncompleteSession { missing: "protocol client" }
        ));
    }

    #[test]
    fn test_inputs_pass_through_verbatim() {
        let node = LocalNode::new(NodeConfig::default());
        let config = SessionConfig::builder(logger())
            .group_invitation("  abc123 ")
            .display_name("")
            .messenger_client(Arc::new(node.clone()))
            .protocol_client(Arc::new(node))
            .build()
            .unwrap();

        assert_eq!(config.group_invitation(), "  abc123 ");
        assert!(!config.creates_group());
        assert_eq!(config.display_name(), "");
        assert_eq!(config.logger().name(), "mini");
    }
}
