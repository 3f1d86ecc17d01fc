//! CLI module for dcforge.
//!
//! Argument parsing, configuration loading, and subcommand handling.

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// dcforge - Active Directory forest deployment for Azure
///
/// Provisions a two-controller forest: network, two Windows Server VMs,
/// forest promotion, replica join, and DNS cut-over.
#[derive(Parser, Debug, Clone)]
#[command(name = "dcforge")]
#[command(author = "Dcforge Contributors")]
#[command(version)]
#[command(about = "Deploy a two-controller Active Directory forest into Azure", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Path to configuration file
    #[arg(short = 'c', long, global = true, env = "DCFORGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short = 'v', long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl Cli {
    /// Parse command line arguments.
    pub fn parse_args() -> Self {
        Self::parse()
    }

    /// Verbosity level from repeated -v flags.
    pub fn verbosity(&self) -> u8 {
        self.verbose
    }
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Deploy the forest (provision, promote, join, finalize DNS)
    Deploy(commands::deploy::DeployArgs),

    /// Render the remote configuration payloads for inspection
    Scripts(commands::scripts::ScriptsArgs),

    /// Write a starter configuration file
    Init(commands::init::InitArgs),
}
