//! dcforge - Active Directory forest deployment for Azure
//!
//! This is the main entry point for the dcforge CLI.

mod cli;

use anyhow::Result;
use cli::commands::CommandContext;
use cli::{Cli, Commands};
use dcforge::config::DeploymentConfig;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = match DeploymentConfig::load(cli.config.as_ref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("error: failed to load config: {}", e);
            std::process::exit(e.exit_code());
        }
    };

    // Create command context
    let mut ctx = CommandContext::new(&cli, config);

    // Execute the appropriate command
    let exit_code = match &cli.command {
        Commands::Deploy(args) => args.execute(&mut ctx).await?,
        Commands::Scripts(args) => args.execute(&mut ctx)?,
        Commands::Init(args) => args.execute(&mut ctx)?,
    };

    std::process::exit(exit_code);
}

/// Initialize logging based on verbosity level
fn init_logging(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(verbosity >= 3).with_writer(std::io::stderr))
        .with(env_filter)
        .init();
}
