//! # dcforge - Active Directory forest deployment for Azure
//!
//! dcforge provisions a two-controller Active Directory forest in Azure:
//! it creates the network (one virtual network, two subnets, an NSG, two
//! public IPs, two NICs), brings up two Windows Server VMs, promotes the
//! first to a new forest, joins the second as a replica controller, and
//! finally points the virtual network's DNS at the two controllers.
//!
//! The sequence is strictly linear (every step consumes the handle the
//! previous one returned) and fails fast: the first error aborts the run
//! without cleanup.
//!
//! ## Quick Example
//!
//! ```rust,ignore
//! use dcforge::azure::ArmClient;
//! use dcforge::config::DeploymentConfig;
//! use dcforge::credentials::CredentialSet;
//! use dcforge::deploy::{AutoApprove, Deployer};
//!
//! #[tokio::main]
//! async fn main() -> dcforge::error::Result<()> {
//!     let config = DeploymentConfig::load(None)?;
//!     config.ensure_valid()?;
//!
//!     let credentials = CredentialSet::shared("azureadmin", "...");
//!     let client = ArmClient::new(subscription_id, token)?;
//!
//!     let deployer = Deployer::new(&client, &config, &credentials, &AutoApprove);
//!     let summary = deployer.run().await?;
//!     println!("{}", summary);
//!     Ok(())
//! }
//! ```

#![warn(clippy::all)]

/// Error types and result aliases for dcforge operations.
pub mod error;

/// Deployment configuration: names, region, topology, image, readiness
/// tuning. Defaults reproduce the classic two-controller layout.
pub mod config;

/// Credential slots for the VM admin, domain admin and DSRM password.
pub mod credentials;

/// Bounded retry-with-backoff used for readiness probes and long-running
/// operation polling.
pub mod retry;

/// The PowerShell payloads pushed through the run-command channel.
pub mod scripts;

/// ARM management-plane client: the [`azure::AzureApi`] trait and the
/// reqwest-backed [`azure::ArmClient`].
pub mod azure;

/// The deployment orchestrator and its summary record.
pub mod deploy;

/// Returns the current version of dcforge.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
