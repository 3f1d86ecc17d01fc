//! The `init` subcommand: write a starter configuration file.

use super::CommandContext;
use anyhow::{Context, Result};
use clap::Parser;
use dcforge::config::{DeploymentConfig, DEFAULT_CONFIG_FILE};
use std::path::PathBuf;

/// Arguments for the init command.
#[derive(Parser, Debug, Clone)]
pub struct InitArgs {
    /// Where to write the configuration file
    #[arg(default_value = DEFAULT_CONFIG_FILE)]
    pub path: PathBuf,

    /// Overwrite an existing file
    #[arg(long)]
    pub force: bool,
}

impl InitArgs {
    /// Execute the init command. Returns the process exit code.
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        if self.path.exists() && !self.force {
            ctx.output.error(&format!(
                "{} already exists (use --force to overwrite)",
                self.path.display()
            ));
            return Ok(1);
        }

        let config = DeploymentConfig::default();
        let content = toml::to_string_pretty(&config).context("serializing default config")?;
        std::fs::write(&self.path, content)
            .with_context(|| format!("writing {}", self.path.display()))?;

        ctx.output
            .success(&format!("wrote {}", self.path.display()));
        ctx.output
            .info("edit the topology and names, then run: dcforge deploy");
        Ok(0)
    }
}
