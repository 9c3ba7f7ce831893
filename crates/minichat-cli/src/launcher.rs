//! Session launcher
//!
//! Hands an assembled [`SessionConfig`] to an interactive loop and waits for
//! it. The loop's outcome is returned as is.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::Result;
use crate::session::SessionConfig;

/// An interactive session driven by a user
///
/// Implementations return when the user exits, a fatal error occurs, or
/// `cancel` fires.
#[async_trait]
pub trait SessionLoop: Send {
    async fn run(&mut self, cancel: CancellationToken, config: SessionConfig) -> Result<()>;
}

/// Run `session` to completion under the session's logger
pub async fn launch<L>(session: &mut L, cancel: CancellationToken, config: SessionConfig) -> Result<()>
where
    L: SessionLoop + ?Sized,
{
    let logger = config.logger().clone();
    logger.in_scope(|| tracing::debug!(group = %config.group_invitation(), "Launching session"));
    logger.scope(session.run(cancel, config)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use crate::logging::{LoggingPolicy, SessionLogger};
    use minichat_node::{LocalNode, NodeConfig};
    use std::sync::Arc;

    struct ScriptedLoop {
        outcome: Option<CliError>,
        seen_group: Option<String>,
    }

    #[async_trait]
    impl SessionLoop for ScriptedLoop {
        async fn run(&mut self, cancel: CancellationToken, config: SessionConfig) -> Result<()> {
            self.seen_group = Some(config.group_invitation().to_string());
            if let Some(err) = self.outcome.take() {
                return Err(err);
            }
            cancel.cancelled().await;
            Ok(())
        }
    }

    fn config() -> SessionConfig {
        let node = LocalNode::new(NodeConfig::default());
        SessionConfig::builder(SessionLogger::init(LoggingPolicy::default()).unwrap())
            .group_invitation("abc123")
            .messenger_client(Arc::new(node.clone()))
            .protocol_client(Arc::new(node))
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_loop_error_is_passed_through() {
        let mut session = ScriptedLoop {
            outcome: Some(CliError::Session("boom".to_string())),
            seen_group: None,
        };
        let err = launch(&mut session, CancellationToken::new(), config()).await.unwrap_err();
        assert!(matches!(err, CliError::Session(ref msg) if msg == "boom"));
        assert_eq!(session.seen_group.as_deref(), Some("abc123"));
    }

    #[tokio::test]
    async fn test_cancellation_unblocks_the_loop() {
        let mut session = ScriptedLoop {
            outcome: None,
            seen_group: None,
        };
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            trigger.cancel();
        });

        launch(&mut session, cancel, config()).await.unwrap();
    }
}
