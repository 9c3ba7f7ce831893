//! Error handling for the minichat CLI

use std::fmt;

use minichat_core::NodeError;
use thiserror::Error;

use crate::bootstrap::BootstrapStage;
use crate::config::ConfigError;

/// Which of the two session clients a failure concerns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClientKind {
    Messenger,
    Protocol,
}

impl fmt::Display for ClientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientKind::Messenger => write!(f, "messenger"),
            ClientKind::Protocol => write!(f, "protocol"),
        }
    }
}

/// Failures of the session bootstrap, one per stage
#[derive(Error, Debug)]
pub enum BootstrapError {
    #[error("Logger initialization failed: {reason}")]
    LoggerInitialization { reason: String },

    #[error("The {client} client is unavailable: {source}")]
    ClientUnavailable {
        client: ClientKind,
        #[source]
        source: NodeError,
    },

    #[error("Incomplete session configuration: missing {missing}")]
    IncompleteSession { missing: &'static str },

    #[error("Interrupted during startup after stage: {stage}")]
    Interrupted { stage: BootstrapStage },
}

impl BootstrapError {
    pub fn logger(reason: impl fmt::Display) -> Self {
        BootstrapError::LoggerInitialization {
            reason: reason.to_string(),
        }
    }
}

/// CLI-specific error types
#[derive(Error, Debug)]
pub enum CliError {
    #[error(transparent)]
    Bootstrap(#[from] BootstrapError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Node error: {0}")]
    Node(#[from] NodeError),

    #[error("Session error: {0}")]
    Session(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
