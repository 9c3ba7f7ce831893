//! minichat CLI library
//!
//! Bootstrap for the terminal-based mini client: flag and configuration
//! resolution, the interactive logging policy, client provisioning, session
//! assembly and the launcher that hands the session to the terminal loop.

pub mod bootstrap;
pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod launcher;
pub mod logging;
pub mod session;
pub mod terminal;

pub use bootstrap::{provision_clients, Bootstrap, BootstrapStage, MiniRequest};
pub use cli::{Cli, Commands};
pub use config::AppConfig;
pub use error::{BootstrapError, CliError, ClientKind, Result};
pub use launcher::{launch, SessionLoop};
pub use logging::{LoggingPolicy, LoggingRequest, SessionLogger};
pub use session::{SessionConfig, SessionConfigBuilder};
pub use terminal::TerminalSession;
