//! Deployment configuration.
//!
//! Every knob of the deployment (names, region, forest FQDN, network
//! topology, image, readiness tuning) lives in an explicit, immutable
//! [`DeploymentConfig`] that is validated once and then passed into the
//! orchestrator. The defaults reproduce the classic two-controller layout:
//! a `10.0.0.0/16` virtual network with one `/24` per controller and the
//! controllers at `.4` of their subnet.
//!
//! Configuration is loaded from a TOML file (`dcforge.toml` by default) and
//! individual fields can be overridden from the CLI.

use crate::error::{Error, Result};
use crate::retry::{BackoffStrategy, JitterStrategy, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use validator::{Validate, ValidationError};

/// Default configuration file name, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "dcforge.toml";

/// Policy for a replica-join failure detected in DC2's remote output.
///
/// The join runs inside the VM; the orchestrator only sees its output. What
/// to do when that output signals failure is an explicit operator choice:
/// `fail` aborts the run before the DNS cut-over, `continue` logs a warning
/// and finalizes anyway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OnJoinFailure {
    /// Abort the deployment before DNS finalization.
    #[default]
    Fail,
    /// Log a warning and proceed to DNS finalization.
    Continue,
}

/// Reference to a platform VM image.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageReference {
    /// Image publisher (e.g., "MicrosoftWindowsServer")
    pub publisher: String,
    /// Image offer (e.g., "WindowsServer")
    pub offer: String,
    /// Image SKU (e.g., "2022-datacenter-azure-edition")
    pub sku: String,
    /// Image version ("latest" or a pinned version)
    pub version: String,
}

impl Default for ImageReference {
    fn default() -> Self {
        Self {
            publisher: "MicrosoftWindowsServer".to_string(),
            offer: "WindowsServer".to_string(),
            sku: "2022-datacenter-azure-edition".to_string(),
            version: "latest".to_string(),
        }
    }
}

/// One subnet of the deployment network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct SubnetTopology {
    /// Subnet name
    #[validate(length(min = 1))]
    pub name: String,
    /// Address prefix in CIDR notation
    #[validate(custom(function = validate_cidr))]
    pub prefix: String,
}

impl Default for SubnetTopology {
    fn default() -> Self {
        Self {
            name: "dc1-subnet".to_string(),
            prefix: "10.0.1.0/24".to_string(),
        }
    }
}

/// Network topology for the deployment.
///
/// Two subnets, one domain controller in each, with static private IPs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct NetworkTopology {
    /// Virtual network address space in CIDR notation
    #[validate(custom(function = validate_cidr))]
    pub address_space: String,

    /// Subnet hosting the first domain controller
    #[validate(nested)]
    pub dc1_subnet: SubnetTopology,

    /// Subnet hosting the replica domain controller
    #[validate(nested)]
    pub dc2_subnet: SubnetTopology,

    /// Static private IP of the first domain controller
    #[validate(custom(function = validate_ipv4))]
    pub dc1_private_ip: String,

    /// Static private IP of the replica domain controller
    #[validate(custom(function = validate_ipv4))]
    pub dc2_private_ip: String,
}

impl Default for NetworkTopology {
    fn default() -> Self {
        Self {
            address_space: "10.0.0.0/16".to_string(),
            dc1_subnet: SubnetTopology {
                name: "dc1-subnet".to_string(),
                prefix: "10.0.1.0/24".to_string(),
            },
            dc2_subnet: SubnetTopology {
                name: "dc2-subnet".to_string(),
                prefix: "10.0.2.0/24".to_string(),
            },
            dc1_private_ip: "10.0.1.4".to_string(),
            dc2_private_ip: "10.0.2.4".to_string(),
        }
    }
}

impl NetworkTopology {
    /// DNS server list pushed to the virtual network after both controllers
    /// are configured. Order matters: DC1 (the forest root) first.
    pub fn dns_servers(&self) -> Vec<String> {
        vec![self.dc1_private_ip.clone(), self.dc2_private_ip.clone()]
    }
}

/// Names of the resources created by a deployment.
///
/// Public IP and NIC names are derived from the VM names rather than
/// configured separately.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct ResourceNames {
    /// Virtual network name
    #[validate(length(min = 1))]
    pub virtual_network: String,
    /// Network security group name
    #[validate(length(min = 1))]
    pub network_security_group: String,
    /// First domain controller VM name (also its computer name)
    #[validate(custom(function = validate_computer_name))]
    pub dc1: String,
    /// Replica domain controller VM name
    #[validate(custom(function = validate_computer_name))]
    pub dc2: String,
}

impl Default for ResourceNames {
    fn default() -> Self {
        Self {
            virtual_network: "ad-vnet".to_string(),
            network_security_group: "ad-nsg".to_string(),
            dc1: "ad-dc1".to_string(),
            dc2: "ad-dc2".to_string(),
        }
    }
}

impl ResourceNames {
    /// Public IP resource name for a VM.
    pub fn public_ip_for(&self, vm: &str) -> String {
        format!("{}-pip", vm)
    }

    /// Network interface resource name for a VM.
    pub fn nic_for(&self, vm: &str) -> String {
        format!("{}-nic", vm)
    }
}

/// Tuning for the DC1 readiness probe that runs between forest promotion
/// and the replica join.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReadinessConfig {
    /// Delay before the first retry of the probe.
    #[serde(with = "humantime_serde")]
    pub initial_delay: Duration,

    /// Maximum number of probe retries.
    pub max_retries: u32,

    /// Cap on the delay between probes.
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(30),
            max_retries: 10,
            max_delay: Duration::from_secs(120),
        }
    }
}

impl ReadinessConfig {
    /// Build the retry policy used by the orchestrator for the probe.
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::builder()
            .max_retries(self.max_retries)
            .initial_delay(self.initial_delay)
            .max_delay(self.max_delay)
            .backoff(BackoffStrategy::Exponential { multiplier: 1.5 })
            .jitter(JitterStrategy::Equal)
            .build()
    }
}

/// Main deployment configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
#[serde(default)]
pub struct DeploymentConfig {
    /// Resource group that receives every resource of the deployment
    #[validate(length(min = 1, message = "resource group name must not be empty"))]
    pub resource_group: String,

    /// Azure region (e.g., "eastus")
    #[validate(length(min = 1, message = "location must not be empty"))]
    pub location: String,

    /// Fully-qualified domain name of the new forest
    #[validate(custom(function = validate_fqdn))]
    pub domain: String,

    /// VM size for both domain controllers
    #[validate(length(min = 1))]
    pub vm_size: String,

    /// Local administrator username (also becomes the domain administrator)
    #[validate(length(min = 1))]
    pub admin_username: String,

    /// Network topology
    #[validate(nested)]
    pub network: NetworkTopology,

    /// VM image for both controllers
    pub image: ImageReference,

    /// Resource names
    #[validate(nested)]
    pub names: ResourceNames,

    /// Readiness probe tuning
    pub readiness: ReadinessConfig,

    /// What to do when DC2 reports a join failure
    pub on_join_failure: OnJoinFailure,

    /// Skip all confirmation prompts
    pub assume_yes: bool,
}

impl Default for DeploymentConfig {
    fn default() -> Self {
        Self {
            resource_group: "ad-forest-rg".to_string(),
            location: "eastus".to_string(),
            domain: "corp.contoso.com".to_string(),
            vm_size: "Standard_DS1_v2".to_string(),
            admin_username: "azureadmin".to_string(),
            network: NetworkTopology::default(),
            image: ImageReference::default(),
            names: ResourceNames::default(),
            readiness: ReadinessConfig::default(),
            on_join_failure: OnJoinFailure::default(),
            assume_yes: false,
        }
    }
}

impl DeploymentConfig {
    /// Load configuration from an explicit path, or from `dcforge.toml` in
    /// the working directory when present, or fall back to defaults.
    pub fn load(path: Option<&PathBuf>) -> Result<Self> {
        match path {
            Some(p) => Self::from_file(p),
            None => {
                let default = Path::new(DEFAULT_CONFIG_FILE);
                if default.exists() {
                    Self::from_file(default)
                } else {
                    Ok(Self::default())
                }
            }
        }
    }

    /// Load configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Validate the whole configuration, flattening validator output into a
    /// single configuration error.
    pub fn ensure_valid(&self) -> Result<()> {
        self.validate()
            .map_err(|errors| Error::Config(errors.to_string()))
    }
}

fn fqdn_regex() -> &'static regex::Regex {
    static RE: OnceLock<regex::Regex> = OnceLock::new();
    RE.get_or_init(|| {
        regex::Regex::new(r"^([a-zA-Z0-9]([a-zA-Z0-9-]{0,61}[a-zA-Z0-9])?\.)+[a-zA-Z]{2,}$")
            .expect("fqdn regex")
    })
}

fn validation_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

/// A forest FQDN needs at least two dot-separated labels; a single-label
/// domain cannot be promoted.
fn validate_fqdn(value: &str) -> std::result::Result<(), ValidationError> {
    if fqdn_regex().is_match(value) {
        Ok(())
    } else {
        Err(validation_error(
            "fqdn",
            "must be a fully-qualified domain name (e.g. corp.contoso.com)",
        ))
    }
}

fn validate_ipv4(value: &str) -> std::result::Result<(), ValidationError> {
    value
        .parse::<std::net::Ipv4Addr>()
        .map(|_| ())
        .map_err(|_| validation_error("ipv4", "must be a valid IPv4 address"))
}

fn validate_cidr(value: &str) -> std::result::Result<(), ValidationError> {
    let invalid = || validation_error("cidr", "must be IPv4 CIDR notation (a.b.c.d/n)");

    let (addr, prefix) = value.split_once('/').ok_or_else(invalid)?;
    addr.parse::<std::net::Ipv4Addr>().map_err(|_| invalid())?;
    let bits: u8 = prefix.parse().map_err(|_| invalid())?;
    if bits > 32 {
        return Err(invalid());
    }
    Ok(())
}

/// Windows computer names are capped at 15 characters and limited to
/// alphanumerics and hyphens.
fn validate_computer_name(value: &str) -> std::result::Result<(), ValidationError> {
    let ok = !value.is_empty()
        && value.len() <= 15
        && value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-')
        && !value.starts_with('-')
        && !value.ends_with('-');
    if ok {
        Ok(())
    } else {
        Err(validation_error(
            "computer_name",
            "must be 1-15 alphanumeric/hyphen characters and not start or end with a hyphen",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_classic_topology() {
        let config = DeploymentConfig::default();
        assert_eq!(config.network.address_space, "10.0.0.0/16");
        assert_eq!(config.network.dc1_subnet.prefix, "10.0.1.0/24");
        assert_eq!(config.network.dc2_subnet.prefix, "10.0.2.0/24");
        assert_eq!(config.network.dc1_private_ip, "10.0.1.4");
        assert_eq!(config.network.dc2_private_ip, "10.0.2.4");
        assert_eq!(config.image.publisher, "MicrosoftWindowsServer");
        assert_eq!(config.on_join_failure, OnJoinFailure::Fail);
        config.ensure_valid().unwrap();
    }

    #[test]
    fn test_dns_servers_order() {
        let topology = NetworkTopology::default();
        assert_eq!(
            topology.dns_servers(),
            vec!["10.0.1.4".to_string(), "10.0.2.4".to_string()]
        );
    }

    #[test]
    fn test_derived_resource_names() {
        let names = ResourceNames::default();
        assert_eq!(names.public_ip_for(&names.dc1), "ad-dc1-pip");
        assert_eq!(names.nic_for(&names.dc2), "ad-dc2-nic");
    }

    #[test]
    fn test_rejects_bare_domain() {
        let config = DeploymentConfig {
            domain: "corp".to_string(),
            ..Default::default()
        };
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_rejects_empty_resource_group() {
        let config = DeploymentConfig {
            resource_group: String::new(),
            ..Default::default()
        };
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_rejects_long_computer_name() {
        let config = DeploymentConfig {
            names: ResourceNames {
                dc1: "a-very-long-computer-name".to_string(),
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(config.ensure_valid().is_err());
    }

    #[test]
    fn test_cidr_validation() {
        assert!(validate_cidr("10.0.0.0/16").is_ok());
        assert!(validate_cidr("10.0.0.0").is_err());
        assert!(validate_cidr("10.0.0.0/40").is_err());
        assert!(validate_cidr("300.0.0.0/8").is_err());
    }

    #[test]
    fn test_toml_round_trip() {
        let config = DeploymentConfig::default();
        let text = toml::to_string(&config).unwrap();
        let parsed: DeploymentConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let parsed: DeploymentConfig = toml::from_str(
            r#"
            resource_group = "prod-ad-rg"
            domain = "ad.example.org"

            [network]
            dc1_private_ip = "10.0.1.10"
            "#,
        )
        .unwrap();

        assert_eq!(parsed.resource_group, "prod-ad-rg");
        assert_eq!(parsed.domain, "ad.example.org");
        assert_eq!(parsed.network.dc1_private_ip, "10.0.1.10");
        // Untouched fields keep their defaults
        assert_eq!(parsed.network.dc2_private_ip, "10.0.2.4");
        assert_eq!(parsed.location, "eastus");
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dcforge.toml");
        std::fs::write(&path, "resource_group = \"file-rg\"\n").unwrap();

        let config = DeploymentConfig::from_file(&path).unwrap();
        assert_eq!(config.resource_group, "file-rg");
        assert_eq!(config.domain, "corp.contoso.com");
    }

    #[test]
    fn test_readiness_policy_bounds() {
        let readiness = ReadinessConfig::default();
        let policy = readiness.policy();
        assert_eq!(policy.max_retries, 10);
        assert_eq!(policy.initial_delay, Duration::from_secs(30));
        assert_eq!(policy.max_delay, Duration::from_secs(120));
    }
}
