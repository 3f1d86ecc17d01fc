//! The `scripts` subcommand: render the remote payloads for inspection.
//!
//! Secrets are replaced with placeholders; this is for reviewing what will
//! run inside the VMs, not for execution.

use super::CommandContext;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use dcforge::credentials::Credential;
use dcforge::scripts;

/// Which payload to render.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PayloadKind {
    /// Forest promotion payload (DC1)
    Forest,
    /// Replica join payload (DC2)
    Replica,
    /// Readiness probe run between the two
    Probe,
}

/// Arguments for the scripts command.
#[derive(Parser, Debug, Clone)]
pub struct ScriptsArgs {
    /// Forest FQDN to interpolate (overrides config)
    #[arg(long)]
    pub domain: Option<String>,

    /// Render only one payload; all three when omitted
    #[arg(long, value_enum)]
    pub payload: Option<PayloadKind>,
}

impl ScriptsArgs {
    /// Execute the scripts command. Returns the process exit code.
    pub fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let config = &ctx.config;
        let domain = self.domain.as_deref().unwrap_or(&config.domain);
        let admin = Credential::new(&config.admin_username, "<admin-password>");

        let render = |kind: PayloadKind| -> String {
            match kind {
                PayloadKind::Forest => scripts::forest_promotion(domain, "<safe-mode-password>"),
                PayloadKind::Replica => scripts::replica_join(
                    domain,
                    &config.network.dc1_private_ip,
                    &admin,
                    "<safe-mode-password>",
                ),
                PayloadKind::Probe => scripts::readiness_probe(domain),
            }
        };

        match self.payload {
            Some(kind) => println!("{}", render(kind)),
            None => {
                for (title, kind) in [
                    ("forest promotion (DC1)", PayloadKind::Forest),
                    ("replica join (DC2)", PayloadKind::Replica),
                    ("readiness probe", PayloadKind::Probe),
                ] {
                    ctx.output.banner(title);
                    println!("{}", render(kind));
                }
            }
        }

        Ok(0)
    }
}
