//! The `deploy` subcommand: run the full deployment sequence.

use super::CommandContext;
use anyhow::Result;
use clap::Parser;
use dcforge::azure::rest::TOKEN_ENV_VAR;
use dcforge::azure::ArmClient;
use dcforge::credentials::CredentialSet;
use dcforge::deploy::{AutoApprove, ConfirmGate, Deployer, InteractiveGate};
use dcforge::error::Error;

/// Arguments for the deploy command.
#[derive(Parser, Debug, Clone)]
pub struct DeployArgs {
    /// Resource group to create (overrides config)
    #[arg(long)]
    pub resource_group: Option<String>,

    /// Azure region (overrides config)
    #[arg(long)]
    pub location: Option<String>,

    /// Fully-qualified domain name of the new forest (overrides config)
    #[arg(long)]
    pub domain: Option<String>,

    /// Administrator username (overrides config)
    #[arg(long)]
    pub admin_username: Option<String>,

    /// Administrator password; prompted interactively when absent
    #[arg(long, env = "DCFORGE_ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// VM size for both controllers (overrides config)
    #[arg(long)]
    pub vm_size: Option<String>,

    /// Azure subscription id
    #[arg(long, env = "AZURE_SUBSCRIPTION_ID")]
    pub subscription_id: String,

    /// Management-plane bearer token
    #[arg(long, env = TOKEN_ENV_VAR, hide_env_values = true)]
    pub access_token: String,

    /// Skip all confirmation prompts
    #[arg(short = 'y', long)]
    pub yes: bool,
}

impl DeployArgs {
    /// Execute the deploy command. Returns the process exit code.
    pub async fn execute(&self, ctx: &mut CommandContext) -> Result<i32> {
        let mut config = ctx.config.clone();

        if let Some(rg) = &self.resource_group {
            config.resource_group = rg.clone();
        }
        if let Some(location) = &self.location {
            config.location = location.clone();
        }
        if let Some(domain) = &self.domain {
            config.domain = domain.clone();
        }
        if let Some(username) = &self.admin_username {
            config.admin_username = username.clone();
        }
        if let Some(size) = &self.vm_size {
            config.vm_size = size.clone();
        }
        if self.yes {
            config.assume_yes = true;
        }

        if let Err(e) = config.ensure_valid() {
            ctx.output.error(&e.to_string());
            return Ok(e.exit_code());
        }

        // Credentials come first: a cancelled prompt must abort before any
        // provider call is issued.
        let credentials = match &self.admin_password {
            Some(password) => CredentialSet::shared(&config.admin_username, password),
            None => match CredentialSet::prompt(&config.admin_username) {
                Ok(set) => set,
                Err(e @ Error::PromptCancelled) => {
                    ctx.output.error("credential prompt cancelled, nothing was created");
                    return Ok(e.exit_code());
                }
                Err(e) => return Err(e.into()),
            },
        };

        let client = ArmClient::new(&self.subscription_id, &self.access_token)?;
        let gate: Box<dyn ConfirmGate> = if config.assume_yes {
            Box::new(AutoApprove)
        } else {
            Box::new(InteractiveGate)
        };

        ctx.output.banner("DCFORGE DEPLOY");
        ctx.output.info(&format!(
            "Deploying forest '{}' into resource group '{}' ({})",
            config.domain, config.resource_group, config.location
        ));

        let deployer = Deployer::new(&client, &config, &credentials, gate.as_ref());

        // The spinner would garble the interactive confirmation prompts
        let spinner = config
            .assume_yes
            .then(|| ctx.output.spinner("provisioning and configuring controllers"));
        let result = deployer.run().await;
        if let Some(spinner) = spinner {
            spinner.finish_and_clear();
        }

        match result {
            Ok(summary) => {
                ctx.output.success("deployment complete");
                println!("{}", summary);
                Ok(0)
            }
            Err(e) => {
                ctx.output.error(&e.to_string());
                Ok(e.exit_code())
            }
        }
    }
}
