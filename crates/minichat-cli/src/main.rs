//! minichat - terminal-based mini client entry point

use clap::Parser;

use minichat_cli::{cli::Cli, commands::CommandDispatcher};

#[tokio::main]
async fn main() {
    // Parse command line arguments
    let cli = Cli::parse();

    // Logging may be disabled for interactive sessions, so report on stderr
    if let Err(e) = CommandDispatcher::execute(cli).await {
        eprintln!("minichat: {}", e);
        std::process::exit(1);
    }
}
