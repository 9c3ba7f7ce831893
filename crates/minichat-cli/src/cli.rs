//! Command-line interface definitions and parsing
//!
//! Every flag is optional here; unset flags fall back to the configuration
//! file and then to built-in defaults (see [`crate::config::AppConfig`]).

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "minichat", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Configuration file path
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub logging: LoggingFlags,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start a terminal-based mini client
    Mini(MiniArgs),
    /// Run a local node serving remote mini clients
    Daemon(DaemonArgs),
}

/// Logging flags shared by all commands
#[derive(Args, Debug, Clone, Default)]
pub struct LoggingFlags {
    /// Write logs to this file
    #[arg(long = "log.file", global = true, value_name = "PATH")]
    pub file: Option<String>,

    /// Console log filter (ignored by `mini` unless --log.file is set)
    #[arg(long = "log.filters", global = true, value_name = "EXPR")]
    pub filters: Option<String>,

    /// Log filter for the log file
    #[arg(long = "log.file-filters", global = true, value_name = "EXPR")]
    pub file_filters: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct MiniArgs {
    /// Group to join, leave empty to create a new group
    #[arg(long = "mini.group", value_name = "INVITATION")]
    pub group: Option<String>,

    #[command(flatten)]
    pub messenger: MessengerFlags,

    #[command(flatten)]
    pub local: LocalServerFlags,

    #[command(flatten)]
    pub remote: RemoteNodeFlags,
}

#[derive(Args, Debug, Clone, Default)]
pub struct DaemonArgs {
    #[command(flatten)]
    pub messenger: MessengerFlags,

    #[command(flatten)]
    pub local: LocalServerFlags,
}

/// Messenger identity flags
#[derive(Args, Debug, Clone, Default)]
pub struct MessengerFlags {
    /// Display name, leave empty to use the node's default
    #[arg(long = "node.display-name", value_name = "NAME")]
    pub display_name: Option<String>,
}

/// Flags for running the node in this process
#[derive(Args, Debug, Clone, Default)]
pub struct LocalServerFlags {
    /// Also serve the local node on these addresses (comma separated)
    #[arg(long = "node.listeners", value_name = "ADDR", value_delimiter = ',')]
    pub listeners: Option<Vec<SocketAddr>>,
}

/// Flags for attaching to a node in another process
#[derive(Args, Debug, Clone, Default)]
pub struct RemoteNodeFlags {
    /// Attach to the node served at this address instead of running one
    #[arg(long = "node.remote-addr", value_name = "HOST:PORT")]
    pub remote_addr: Option<String>,

    /// Seconds to wait when connecting to the remote node
    #[arg(long = "node.remote-timeout", value_name = "SECS")]
    pub remote_timeout: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mini_flags_parse() {
        let cli = Cli::try_parse_from([
            "minichat",
            "mini",
            "--mini.group",
            "abc123",
            "--node.listeners",
            "127.0.0.1:9091,127.0.0.1:9092",
            "--log.file",
            "/tmp/x.log",
        ])
        .unwrap();

        assert_eq!(cli.logging.file.as_deref(), Some("/tmp/x.log"));
        match cli.command {
            Commands::Mini(args) => {
                assert_eq!(args.group.as_deref(), Some("abc123"));
                assert_eq!(args.local.listeners.map(|l| l.len()), Some(2));
                assert!(args.remote.remote_addr.is_none());
            }
            other => panic!("expected mini, got {:?}", other),
        }
    }

    #[test]
    fn test_daemon_has_no_remote_flags() {
        let result = Cli::try_parse_from(["minichat", "daemon", "--node.remote-addr", "1.2.3.4:5"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_invalid_listener_is_rejected() {
        let result = Cli::try_parse_from(["minichat", "mini", "--node.listeners", "not-an-addr"]);
        assert!(result.is_err());
    }
}
