//! Command handlers for the minichat CLI

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use minichat_node::NodeManager;

use crate::bootstrap::Bootstrap;
use crate::cli::{Cli, Commands};
use crate::config::{AppConfig, ConfigError};
use crate::error::Result;
use crate::logging::{LoggingPolicy, SessionLogger};
use crate::terminal::TerminalSession;

/// Command dispatcher for handling CLI commands
pub struct CommandDispatcher;

impl CommandDispatcher {
    /// Execute a CLI command
    pub async fn execute(cli: Cli) -> Result<()> {
        let config = AppConfig::from_cli(&cli)?;

        match cli.command {
            Commands::Mini(_) => Self::handle_mini_command(config).await,
            Commands::Daemon(_) => Self::handle_daemon_command(config).await,
        }
    }

    /// Handle the mini command: bootstrap a session and run it on the terminal
    async fn handle_mini_command(config: AppConfig) -> Result<()> {
        let manager = NodeManager::new(config.node_attachment()?, config.node_config());
        let cancel = interrupt_token();

        let mut session = TerminalSession::stdio();
        let mut bootstrap = Bootstrap::new(config.mini_request(), &manager).with_global_logger();
        let outcome = bootstrap.run(&mut session, cancel).await;

        manager.shutdown().await;
        // The bootstrap owns the log file writer; flush only after teardown.
        drop(bootstrap);
        outcome
    }

    /// Handle the daemon command: serve a local node until interrupted
    async fn handle_daemon_command(config: AppConfig) -> Result<()> {
        let attachment = config.node_attachment()?;
        if !matches!(&attachment, minichat_core::NodeAttachmentConfig::Local(local) if local.is_populated()) {
            return Err(ConfigError::Validation("daemon needs at least one --node.listeners address".to_string()).into());
        }

        let logger = SessionLogger::init(LoggingPolicy::for_background(config.logging_request()))?;
        logger.install()?;

        let manager = NodeManager::new(attachment, config.node_config());
        manager.attach().await?;

        for addr in manager.listening_addrs().await {
            info!(%addr, "Serving node");
            println!("listening on {}", addr);
        }

        let cancel = interrupt_token();
        cancel.cancelled().await;
        info!("Shutting down node");

        manager.shutdown().await;
        Ok(())
    }
}

/// Token cancelled on Ctrl-C
fn interrupt_token() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => trigger.cancel(),
            Err(e) => warn!(error = %e, "Cannot listen for Ctrl-C"),
        }
    });
    cancel
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CliError;
    use clap::Parser;
    use minichat_core::AttachmentError;

    /// Parse `args` with a configuration file holding `file`
    fn parse_with_config(file: &str, args: &[&str]) -> (tempfile::TempDir, Cli) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("minichat.toml");
        std::fs::write(&path, file).unwrap();

        let path = path.to_str().unwrap().to_string();
        let argv = ["minichat", "--config", path.as_str()]
            .into_iter()
            .chain(args.iter().copied());
        let cli = Cli::try_parse_from(argv).unwrap();
        (dir, cli)
    }

    #[tokio::test]
    async fn test_daemon_requires_a_listener() {
        let (_dir, cli) = parse_with_config("", &["daemon"]);

        let err = CommandDispatcher::execute(cli).await.unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_daemon_rejects_remote_node_from_file() {
        let file = "[node]\nremote_addr = \"10.0.0.2:9091\"\n";

        let (_dir, cli) = parse_with_config(file, &["daemon", "--node.listeners", "127.0.0.1:0"]);
        let err = CommandDispatcher::execute(cli).await.unwrap_err();
        assert!(matches!(
            err,
            CliError::Config(ConfigError::Attachment(AttachmentError::Conflicting { .. }))
        ));

        // Without a listener the file's remote node is not something to serve
        let (_dir, cli) = parse_with_config(file, &["daemon"]);
        let err = CommandDispatcher::execute(cli).await.unwrap_err();
        assert!(matches!(err, CliError::Config(ConfigError::Validation(_))));
    }

    #[tokio::test]
    async fn test_mini_stops_on_conflicting_attachment() {
        let (_dir, cli) = parse_with_config(
            "[node]\nlisteners = [\"127.0.0.1:0\"]\n",
            &["mini", "--node.remote-addr", "10.0.0.2:9091"],
        );

        let err = CommandDispatcher::execute(cli).await.unwrap_err();
        assert!(matches!(
            err,
            CliError::Config(ConfigError::Attachment(AttachmentError::Conflicting { .. }))
        ));
    }
}
