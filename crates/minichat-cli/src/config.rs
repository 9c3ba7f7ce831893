//! minichat CLI configuration management
//!
//! Configuration is layered with figment, with the following priority:
//! command line flags > environment > configuration file > defaults.
//!
//! The file is TOML, read from `--config` when given, otherwise from
//! `<config dir>/minichat/config.toml` if that file exists.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::providers::{Env, Serialized};
use figment::Figment;
use serde::{Deserialize, Serialize};

use minichat_core::{
    attachment::DEFAULT_REMOTE_TIMEOUT, AttachmentError, LocalServerConfig, NodeAttachmentConfig,
    RemoteNodeConfig,
};
use minichat_node::NodeConfig;

use crate::bootstrap::MiniRequest;
use crate::cli::{Cli, Commands};
use crate::logging::{LoggingRequest, DEFAULT_FILE_FILTER};

/// Prefix of configuration environment variables
///
/// Nested keys are separated by `__`, as in `MINICHAT_NODE__REMOTE_ADDR`.
pub const ENV_PREFIX: &str = "MINICHAT_";

// ----------------------------------------------------------------------------
// Configuration Sections
// ----------------------------------------------------------------------------

/// Complete configuration for the minichat CLI
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub log: LogConfig,
    pub node: NodeSection,
    pub mini: MiniSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log file path, empty disables file logging
    pub file: String,
    /// Console filter expression
    pub filters: String,
    /// Filter expression for the log file
    pub file_filters: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSection {
    pub display_name: String,
    pub listeners: Vec<SocketAddr>,
    /// Remote node address, empty means run a local node
    pub remote_addr: String,
    pub remote_timeout_secs: u64,
    pub history_limit: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MiniSection {
    /// Group invitation to join, empty creates a new group
    pub group: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            file: String::new(),
            filters: "info".to_string(),
            file_filters: DEFAULT_FILE_FILTER.to_string(),
        }
    }
}

impl Default for NodeSection {
    fn default() -> Self {
        Self {
            display_name: String::new(),
            listeners: Vec::new(),
            remote_addr: String::new(),
            remote_timeout_secs: DEFAULT_REMOTE_TIMEOUT.as_secs(),
            history_limit: minichat_node::DEFAULT_HISTORY_LIMIT,
        }
    }
}

// ----------------------------------------------------------------------------
// Configuration Loading Logic
// ----------------------------------------------------------------------------

impl AppConfig {
    /// Load configuration with the standard priority order:
    /// 1. Command line flags (highest priority)
    /// 2. Environment variables (`MINICHAT_*`)
    /// 3. Configuration file
    /// 4. Default values (lowest priority)
    pub fn from_cli(cli: &Cli) -> Result<Self, ConfigError> {
        let figment = Self::figment(cli.config.as_deref())?.merge(Env::prefixed(ENV_PREFIX).split("__"));
        let config = with_flag_overrides(figment, cli).extract()?;
        Ok(config)
    }

    /// Load defaults and the configuration file only
    ///
    /// An explicit path must exist. Without one, the default location is
    /// used when present.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(path)?.extract()?)
    }

    /// Defaults with the configuration file merged on top
    fn figment(path: Option<&Path>) -> Result<Figment, ConfigError> {
        let figment = Figment::new().merge(Serialized::defaults(Self::default()));

        let path = match path {
            Some(path) => Some(path.to_path_buf()),
            None => Self::default_config_path().filter(|path| path.is_file()),
        };

        match path {
            Some(path) => Ok(figment.merge(Serialized::defaults(Self::read_file(&path)?))),
            None => Ok(figment),
        }
    }

    fn read_file(path: &Path) -> Result<toml::Table, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::FileSystem(format!("Failed to read {}: {}", path.display(), e)))?;
        Ok(toml::from_str(&contents)?)
    }

    /// Default configuration file location
    pub fn default_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("minichat").join("config.toml"))
    }

    // ------------------------------------------------------------------------
    // Resolved views
    // ------------------------------------------------------------------------

    pub fn logging_request(&self) -> LoggingRequest {
        LoggingRequest {
            log_file: self.log.file.clone(),
            console_filter: self.log.filters.clone(),
            file_filter: self.log.file_filters.clone(),
        }
    }

    /// Resolve local or remote attachment from the node section
    pub fn node_attachment(&self) -> Result<NodeAttachmentConfig, ConfigError> {
        let local = LocalServerConfig {
            listeners: self.node.listeners.clone(),
        };
        let remote = if self.node.remote_addr.is_empty() {
            None
        } else {
            Some(
                RemoteNodeConfig::new(self.node.remote_addr.clone())
                    .with_timeout(Duration::from_secs(self.node.remote_timeout_secs)),
            )
        };

        Ok(NodeAttachmentConfig::resolve(local, remote)?)
    }

    pub fn node_config(&self) -> NodeConfig {
        NodeConfig {
            display_name: self.node.display_name.clone(),
            device_id: None,
            history_limit: self.node.history_limit,
        }
    }

    pub fn mini_request(&self) -> MiniRequest {
        MiniRequest {
            group_invitation: self.mini.group.clone(),
            display_name: self.node.display_name.clone(),
            logging: self.logging_request(),
        }
    }
}

/// Apply every flag given on the command line as the top layer
fn with_flag_overrides(figment: Figment, cli: &Cli) -> Figment {
    let logging = &cli.logging;
    let mut figment = figment
        .merge_flag("log.file", &logging.file)
        .merge_flag("log.filters", &logging.filters)
        .merge_flag("log.file_filters", &logging.file_filters);

    let (messenger, local) = match &cli.command {
        Commands::Mini(args) => {
            figment = figment
                .merge_flag("mini.group", &args.group)
                .merge_flag("node.remote_addr", &args.remote.remote_addr)
                .merge_flag("node.remote_timeout_secs", &args.remote.remote_timeout);
            (&args.messenger, &args.local)
        }
        Commands::Daemon(args) => (&args.messenger, &args.local),
    };

    figment
        .merge_flag("node.display_name", &messenger.display_name)
        .merge_flag("node.listeners", &local.listeners)
}

trait MergeFlag {
    fn merge_flag<T: Serialize>(self, key: &str, value: &Option<T>) -> Self;
}

impl MergeFlag for Figment {
    fn merge_flag<T: Serialize>(self, key: &str, value: &Option<T>) -> Self {
        match value {
            Some(value) => self.merge(Serialized::default(key, value)),
            None => self,
        }
    }
}

// ----------------------------------------------------------------------------
// Error Types
// ----------------------------------------------------------------------------

/// Configuration-related errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration loading error: {0}")]
    Loading(#[from] figment::Error),

    #[error("TOML parsing error: {0}")]
    TomlParsing(#[from] toml::de::Error),

    #[error("File system error: {0}")]
    FileSystem(String),

    #[error(transparent)]
    Attachment(#[from] AttachmentError),

    #[error("Configuration validation error: {0}")]
    Validation(String),
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
