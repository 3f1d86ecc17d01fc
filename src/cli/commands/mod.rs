//! Subcommand implementations for the dcforge CLI.

pub mod deploy;
pub mod init;
pub mod scripts;

use crate::cli::output::OutputFormatter;
use crate::cli::Cli;
use dcforge::config::DeploymentConfig;

/// Common context shared between commands.
pub struct CommandContext {
    /// Loaded configuration (defaults merged with the config file)
    pub config: DeploymentConfig,
    /// Output formatter
    pub output: OutputFormatter,
    /// Verbosity level
    pub verbosity: u8,
}

impl CommandContext {
    /// Build the context from parsed CLI arguments and loaded config.
    pub fn new(cli: &Cli, config: DeploymentConfig) -> Self {
        Self {
            config,
            output: OutputFormatter::new(!cli.no_color, cli.verbosity()),
            verbosity: cli.verbosity(),
        }
    }
}
