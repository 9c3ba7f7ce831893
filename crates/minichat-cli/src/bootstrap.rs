//! Session bootstrap
//!
//! Turns resolved `mini` flags into a launched session. The sequence is
//! strictly linear and stops at the first failure:
//!
//! ```text
//! Start → LoggingResolved → ClientsProvisioned → ConfigurationAssembled → Launched → Exited
//!   └──────────────┴──────────────────┴───────────────────┴───────────────┴→ Failed
//! ```
//!
//! Nothing is retried here. Retrying attachment, if wanted, belongs to the
//! client source.

use std::fmt;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use minichat_core::{ClientSource, SharedMessengerClient, SharedProtocolClient};

use crate::error::{BootstrapError, ClientKind, Result};
use crate::launcher::{launch, SessionLoop};
use crate::logging::{LoggingPolicy, LoggingRequest, SessionLogger};
use crate::session::SessionConfig;

/// Name of the logger every session line is tagged with
pub const SESSION_LOGGER_NAME: &str = "mini";

// ----------------------------------------------------------------------------
// Stages
// ----------------------------------------------------------------------------

/// Progress of a bootstrap run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapStage {
    Start,
    LoggingResolved,
    ClientsProvisioned,
    ConfigurationAssembled,
    Launched,
    Exited,
    Failed,
}

impl fmt::Display for BootstrapStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BootstrapStage::Start => "start",
            BootstrapStage::LoggingResolved => "logging resolved",
            BootstrapStage::ClientsProvisioned => "clients provisioned",
            BootstrapStage::ConfigurationAssembled => "configuration assembled",
            BootstrapStage::Launched => "launched",
            BootstrapStage::Exited => "exited",
            BootstrapStage::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Inputs of the `mini` command after flag and config file resolution
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MiniRequest {
    /// Invitation token; empty creates a new group
    pub group_invitation: String,
    /// Display name; empty uses the node's default
    pub display_name: String,
    pub logging: LoggingRequest,
}

// ----------------------------------------------------------------------------
// Bootstrap
// ----------------------------------------------------------------------------

/// Drives one `mini` invocation from flags to a running session
pub struct Bootstrap<'a> {
    request: MiniRequest,
    source: &'a dyn ClientSource,
    install_global_logger: bool,
    stages: Vec<BootstrapStage>,
    logger: Option<SessionLogger>,
}

impl<'a> Bootstrap<'a> {
    pub fn new(request: MiniRequest, source: &'a dyn ClientSource) -> Self {
        Self {
            request,
            source,
            install_global_logger: false,
            stages: vec![BootstrapStage::Start],
            logger: None,
        }
    }

    /// Also install the session logger as the process-wide default
    pub fn with_global_logger(mut self) -> Self {
        self.install_global_logger = true;
        self
    }

    /// Stages reached so far, in order
    pub fn stages(&self) -> &[BootstrapStage] {
        &self.stages
    }

    pub fn stage(&self) -> BootstrapStage {
        self.stages.last().copied().unwrap_or(BootstrapStage::Start)
    }

    /// Resolve logging, provision clients and assemble the session
    pub async fn prepare(&mut self) -> std::result::Result<SessionConfig, BootstrapError> {
        let result = self.try_prepare().await;
        if result.is_err() {
            self.advance(BootstrapStage::Failed);
        }
        result
    }

    /// Prepare the session, then run `session` until it returns
    ///
    /// Cancelling `cancel` while the session is being prepared aborts with
    /// [`BootstrapError::Interrupted`]. The bootstrap keeps its logger after
    /// returning, so lines logged during teardown still reach the log file.
    pub async fn run<L>(&mut self, session: &mut L, cancel: CancellationToken) -> Result<()>
    where
        L: SessionLoop + ?Sized,
    {
        let prepared = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            prepared = self.prepare() => Some(prepared),
        };

        let config = match prepared {
            Some(prepared) => prepared?,
            None => {
                self.advance(BootstrapStage::Failed);
                return Err(BootstrapError::Interrupted { stage: self.last_reached() }.into());
            }
        };

        self.advance(BootstrapStage::Launched);
        let outcome = launch(session, cancel, config).await;

        self.advance(if outcome.is_ok() {
            BootstrapStage::Exited
        } else {
            BootstrapStage::Failed
        });
        outcome
    }

    /// Session logger, once logging has been resolved
    pub fn logger(&self) -> Option<&SessionLogger> {
        self.logger.as_ref()
    }

    /// Last stage reached before a failure
    fn last_reached(&self) -> BootstrapStage {
        self.stages
            .iter()
            .rev()
            .copied()
            .find(|stage| *stage != BootstrapStage::Failed)
            .unwrap_or(BootstrapStage::Start)
    }

    async fn try_prepare(&mut self) -> std::result::Result<SessionConfig, BootstrapError> {
        let logger = self.resolve_logger()?;
        self.logger = Some(logger.clone());
        self.advance(BootstrapStage::LoggingResolved);

        let (messenger, protocol) = provision_clients(self.source).await?;
        self.advance(BootstrapStage::ClientsProvisioned);

        let config = SessionConfig::builder(logger)
            .group_invitation(self.request.group_invitation.clone())
            .display_name(self.request.display_name.clone())
            .messenger_client(messenger)
            .protocol_client(protocol)
            .build()?;
        self.advance(BootstrapStage::ConfigurationAssembled);

        Ok(config)
    }

    fn resolve_logger(&self) -> std::result::Result<SessionLogger, BootstrapError> {
        let policy = LoggingPolicy::for_interactive(self.request.logging.clone());
        let logger = SessionLogger::init(policy)?;
        if self.install_global_logger {
            logger.install()?;
        }
        Ok(logger.named(SESSION_LOGGER_NAME))
    }

    fn advance(&mut self, stage: BootstrapStage) {
        if let Some(logger) = &self.logger {
            logger.in_scope(|| debug!(%stage, "Bootstrap stage reached"));
        }
        self.stages.push(stage);
    }
}

/// Obtain both session clients, messenger first
///
/// A messenger failure returns before the protocol client is requested.
pub async fn provision_clients(
    source: &dyn ClientSource,
) -> std::result::Result<(SharedMessengerClient, SharedProtocolClient), BootstrapError> {
    let messenger = source
        .messenger_client()
        .await
        .map_err(|source| BootstrapError::ClientUnavailable {
            client: ClientKind::Messenger,
            source,
        })?;

    let protocol = source
        .protocol_client()
        .await
        .map_err(|source| BootstrapError::ClientUnavailable {
            client: ClientKind::Protocol,
            source,
        })?;

    Ok((messenger, protocol))
}
