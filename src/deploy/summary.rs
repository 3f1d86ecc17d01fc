//! Result record returned by a completed deployment.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What the caller gets back after both controllers are up and DNS points
/// at them.
///
/// The public IPs are read back from the two public-IP resources by name,
/// not derived from anything else; they are `None` only if the platform
/// has not surfaced an address on the resource.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSummary {
    /// Resource group holding the deployment
    pub resource_group: String,
    /// Forest FQDN
    pub domain: String,
    /// Public IP of the forest root controller
    pub dc1_public_ip: Option<String>,
    /// Public IP of the replica controller
    pub dc2_public_ip: Option<String>,
    /// Administrator account name
    pub admin_username: String,
    /// When the deployment finished
    pub completed_at: DateTime<Utc>,
}

impl std::fmt::Display for DeploymentSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Resource group : {}", self.resource_group)?;
        writeln!(f, "Forest         : {}", self.domain)?;
        writeln!(
            f,
            "DC1 public IP  : {}",
            self.dc1_public_ip.as_deref().unwrap_or("(not allocated)")
        )?;
        writeln!(
            f,
            "DC2 public IP  : {}",
            self.dc2_public_ip.as_deref().unwrap_or("(not allocated)")
        )?;
        write!(f, "Admin username : {}", self.admin_username)
    }
}
