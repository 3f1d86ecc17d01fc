//! Deployment orchestrator.
//!
//! [`Deployer`] drives the fixed sequence that turns an empty resource
//! group into a working two-controller forest:
//!
//! 1. resource group → virtual network (two subnets) → NSG
//! 2. DC1 chain: public IP → NIC → VM, then the same for DC2
//! 3. forest promotion on DC1, readiness probe, replica join on DC2
//! 4. rewrite the virtual network's DNS servers to the two controllers
//! 5. read back both public IPs into a [`DeploymentSummary`]
//!
//! The sequence is strictly linear; each step consumes handles returned by
//! the previous one. The first failed create aborts the run: there is no
//! retry of create calls and no cleanup of partially created resources.
//! Rerunning against an existing resource-group name is not guaranteed
//! safe.

pub mod summary;

pub use summary::DeploymentSummary;

use crate::azure::models::{
    AddressSpace, DhcpOptions, HardwareProfile, IpConfiguration, IpConfigurationProperties,
    NetworkInterface, NetworkInterfaceProperties, NetworkProfile, NetworkSecurityGroup,
    NetworkSecurityGroupProperties, OsDisk, OsProfile, PublicIpAddress, ResourceGroup,
    RunCommandInput, SecurityRule, SecurityRuleProperties, StorageProfile, SubResource, Subnet,
    VirtualMachine, VirtualMachineProperties, VirtualNetwork, VirtualNetworkProperties,
};
use crate::azure::AzureApi;
use crate::config::{DeploymentConfig, OnJoinFailure};
use crate::credentials::CredentialSet;
use crate::error::{Error, Result};
use crate::scripts;
use chrono::Utc;
use dialoguer::theme::ColorfulTheme;
use dialoguer::Confirm;
use is_terminal::IsTerminal;
use tracing::{info, warn};

/// Decides whether a mutating phase may proceed.
///
/// The deployment asks before each mutating phase unless `assume_yes` is
/// set. A declined gate aborts the run with
/// [`Error::PromptCancelled`].
pub trait ConfirmGate: Send + Sync {
    /// Returns true when the described action may proceed.
    fn confirm(&self, action: &str) -> Result<bool>;
}

/// Gate that approves everything; used with `--yes` and in tests.
pub struct AutoApprove;

impl ConfirmGate for AutoApprove {
    fn confirm(&self, _action: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Interactive gate backed by a terminal prompt. Without a terminal it
/// declines, so unattended runs must opt in via `assume_yes`.
pub struct InteractiveGate;

impl ConfirmGate for InteractiveGate {
    fn confirm(&self, action: &str) -> Result<bool> {
        if !std::io::stderr().is_terminal() {
            return Ok(false);
        }
        Confirm::with_theme(&ColorfulTheme::default())
            .with_prompt(action)
            .default(false)
            .interact()
            .map_err(|_| Error::PromptCancelled)
    }
}

/// Handles produced by the provisioning phase and consumed downstream.
struct ProvisionedNetwork {
    dc1_subnet_id: String,
    dc2_subnet_id: String,
    nsg_id: String,
}

/// Orchestrates one deployment against a management-plane client.
pub struct Deployer<'a> {
    api: &'a dyn AzureApi,
    config: &'a DeploymentConfig,
    credentials: &'a CredentialSet,
    gate: &'a dyn ConfirmGate,
}

impl<'a> Deployer<'a> {
    pub fn new(
        api: &'a dyn AzureApi,
        config: &'a DeploymentConfig,
        credentials: &'a CredentialSet,
        gate: &'a dyn ConfirmGate,
    ) -> Self {
        Self {
            api,
            config,
            credentials,
            gate,
        }
    }

    /// Run the whole sequence and return the summary record.
    pub async fn run(&self) -> Result<DeploymentSummary> {
        let cfg = self.config;

        self.confirm(&format!(
            "Create resource group '{}' and network resources in {}?",
            cfg.resource_group, cfg.location
        ))?;
        let network = self.provision_network().await?;

        self.provision_controller(
            &cfg.names.dc1,
            &network.dc1_subnet_id,
            &cfg.network.dc1_private_ip,
            &network.nsg_id,
        )
        .await?;
        self.provision_controller(
            &cfg.names.dc2,
            &network.dc2_subnet_id,
            &cfg.network.dc2_private_ip,
            &network.nsg_id,
        )
        .await?;

        self.confirm(&format!(
            "Promote '{}' to forest '{}' and join '{}' as a replica controller?",
            cfg.names.dc1, cfg.domain, cfg.names.dc2
        ))?;
        self.promote_forest().await?;
        self.wait_for_forest_root().await?;
        self.join_replica().await?;

        self.confirm(&format!(
            "Point virtual network '{}' DNS at the new controllers?",
            cfg.names.virtual_network
        ))?;
        self.finalize_dns().await?;

        self.report().await
    }

    fn confirm(&self, action: &str) -> Result<()> {
        if self.config.assume_yes {
            return Ok(());
        }
        if self.gate.confirm(action)? {
            Ok(())
        } else {
            Err(Error::PromptCancelled)
        }
    }

    // ------------------------------------------------------------------
    // Phase 1: network provisioning
    // ------------------------------------------------------------------

    async fn provision_network(&self) -> Result<ProvisionedNetwork> {
        let cfg = self.config;

        info!("Creating resource group '{}'", cfg.resource_group);
        self.api
            .create_or_update_resource_group(
                &cfg.resource_group,
                &ResourceGroup::create(&cfg.location),
            )
            .await
            .map_err(|e| Error::provisioning("resource group", &cfg.resource_group, e.to_string()))?;

        info!("Creating virtual network '{}'", cfg.names.virtual_network);
        let vnet_body = VirtualNetwork {
            id: None,
            name: None,
            location: cfg.location.clone(),
            properties: VirtualNetworkProperties {
                address_space: AddressSpace {
                    address_prefixes: vec![cfg.network.address_space.clone()],
                },
                subnets: vec![
                    Subnet::new(&cfg.network.dc1_subnet.name, &cfg.network.dc1_subnet.prefix),
                    Subnet::new(&cfg.network.dc2_subnet.name, &cfg.network.dc2_subnet.prefix),
                ],
                dhcp_options: None,
                provisioning_state: None,
            },
        };
        let vnet = self
            .api
            .create_or_update_virtual_network(
                &cfg.resource_group,
                &cfg.names.virtual_network,
                &vnet_body,
            )
            .await
            .map_err(|e| {
                Error::provisioning("virtual network", &cfg.names.virtual_network, e.to_string())
            })?;

        let dc1_subnet_id = subnet_id(&vnet, &cfg.network.dc1_subnet.name)?;
        let dc2_subnet_id = subnet_id(&vnet, &cfg.network.dc2_subnet.name)?;

        info!(
            "Creating network security group '{}'",
            cfg.names.network_security_group
        );
        let nsg_body = NetworkSecurityGroup {
            id: None,
            location: cfg.location.clone(),
            properties: NetworkSecurityGroupProperties {
                security_rules: security_rules(),
                provisioning_state: None,
            },
        };
        let nsg = self
            .api
            .create_or_update_network_security_group(
                &cfg.resource_group,
                &cfg.names.network_security_group,
                &nsg_body,
            )
            .await
            .map_err(|e| {
                Error::provisioning(
                    "network security group",
                    &cfg.names.network_security_group,
                    e.to_string(),
                )
            })?;

        let nsg_id = nsg.id.ok_or_else(|| {
            Error::Internal("network security group response carried no id".to_string())
        })?;

        Ok(ProvisionedNetwork {
            dc1_subnet_id,
            dc2_subnet_id,
            nsg_id,
        })
    }

    /// Provision the public IP → NIC → VM chain of one controller.
    async fn provision_controller(
        &self,
        vm_name: &str,
        subnet_id: &str,
        private_ip: &str,
        nsg_id: &str,
    ) -> Result<()> {
        let cfg = self.config;

        let pip_name = cfg.names.public_ip_for(vm_name);
        info!("Creating public IP '{}'", pip_name);
        let pip = self
            .api
            .create_or_update_public_ip(
                &cfg.resource_group,
                &pip_name,
                &PublicIpAddress::create_static(&cfg.location),
            )
            .await
            .map_err(|e| Error::provisioning("public IP", &pip_name, e.to_string()))?;
        let pip_id = pip
            .id
            .ok_or_else(|| Error::Internal("public IP response carried no id".to_string()))?;

        let nic_name = cfg.names.nic_for(vm_name);
        info!("Creating network interface '{}'", nic_name);
        let nic_body = NetworkInterface {
            id: None,
            location: cfg.location.clone(),
            properties: NetworkInterfaceProperties {
                ip_configurations: vec![IpConfiguration {
                    name: "ipconfig1".to_string(),
                    properties: IpConfigurationProperties {
                        subnet: SubResource::new(subnet_id),
                        private_ip_allocation_method: "Static".to_string(),
                        private_ip_address: Some(private_ip.to_string()),
                        public_ip_address: Some(SubResource::new(pip_id)),
                    },
                }],
                network_security_group: Some(SubResource::new(nsg_id)),
                provisioning_state: None,
            },
        };
        let nic = self
            .api
            .create_or_update_network_interface(&cfg.resource_group, &nic_name, &nic_body)
            .await
            .map_err(|e| Error::provisioning("network interface", &nic_name, e.to_string()))?;
        let nic_id = nic
            .id
            .ok_or_else(|| Error::Internal("network interface response carried no id".to_string()))?;

        info!("Creating virtual machine '{}' ({})", vm_name, cfg.vm_size);
        let vm_body = VirtualMachine {
            id: None,
            location: cfg.location.clone(),
            properties: VirtualMachineProperties {
                hardware_profile: HardwareProfile {
                    vm_size: cfg.vm_size.clone(),
                },
                storage_profile: StorageProfile {
                    image_reference: cfg.image.clone(),
                    os_disk: Some(OsDisk {
                        create_option: "FromImage".to_string(),
                    }),
                },
                os_profile: Some(OsProfile {
                    computer_name: vm_name.to_string(),
                    admin_username: self.credentials.vm_admin.username.clone(),
                    admin_password: Some(self.credentials.vm_admin.password().to_string()),
                }),
                network_profile: NetworkProfile {
                    network_interfaces: vec![SubResource::new(nic_id)],
                },
                provisioning_state: None,
            },
        };
        self.api
            .create_or_update_virtual_machine(&cfg.resource_group, vm_name, &vm_body)
            .await
            .map_err(|e| Error::provisioning("virtual machine", vm_name, e.to_string()))?;

        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 2: remote configuration
    // ------------------------------------------------------------------

    async fn promote_forest(&self) -> Result<()> {
        let cfg = self.config;
        info!(
            "Promoting '{}' to a new forest '{}'",
            cfg.names.dc1, cfg.domain
        );

        let script =
            scripts::forest_promotion(&cfg.domain, self.credentials.safe_mode_password());
        let result = self
            .api
            .run_command(
                &cfg.resource_group,
                &cfg.names.dc1,
                &RunCommandInput::powershell(&script),
            )
            .await?;

        if result.has_error() {
            return Err(Error::remote_command(&cfg.names.dc1, result.output_text()));
        }
        Ok(())
    }

    /// Probe DC1 until the directory service answers, instead of sleeping
    /// a fixed interval and hoping.
    async fn wait_for_forest_root(&self) -> Result<()> {
        let cfg = self.config;
        info!("Waiting for '{}' to come back as a domain controller", cfg.names.dc1);

        let probe = scripts::readiness_probe(&cfg.domain);
        let input = RunCommandInput::powershell(&probe);

        cfg.readiness
            .policy()
            .execute_until(
                || self.api.run_command(&cfg.resource_group, &cfg.names.dc1, &input),
                |result| result.output_text().contains(scripts::READY_SENTINEL),
            )
            .await
            .map_err(|e| e.into_not_ready(&format!("domain controller '{}'", cfg.names.dc1)))?;

        Ok(())
    }

    async fn join_replica(&self) -> Result<()> {
        let cfg = self.config;
        info!(
            "Joining '{}' to '{}' as a replica controller",
            cfg.names.dc2, cfg.domain
        );

        let script = scripts::replica_join(
            &cfg.domain,
            &cfg.network.dc1_private_ip,
            &self.credentials.domain_admin,
            self.credentials.safe_mode_password(),
        );
        let result = self
            .api
            .run_command(
                &cfg.resource_group,
                &cfg.names.dc2,
                &RunCommandInput::powershell(&script),
            )
            .await?;

        let output = result.output_text();
        if output.contains(scripts::JOIN_FAILURE_SENTINEL) || result.has_error() {
            match cfg.on_join_failure {
                OnJoinFailure::Fail => {
                    return Err(Error::JoinFailed {
                        vm: cfg.names.dc2.clone(),
                        message: output,
                    });
                }
                OnJoinFailure::Continue => {
                    warn!(
                        "'{}' reported a join failure; continuing per policy: {}",
                        cfg.names.dc2, output
                    );
                }
            }
        }
        Ok(())
    }

    // ------------------------------------------------------------------
    // Phase 3: DNS finalization and reporting
    // ------------------------------------------------------------------

    /// Rewrite the virtual network's DNS server list to the two
    /// controllers, DC1 first.
    async fn finalize_dns(&self) -> Result<()> {
        let cfg = self.config;
        info!(
            "Pointing '{}' DNS at {:?}",
            cfg.names.virtual_network,
            cfg.network.dns_servers()
        );

        let mut vnet = self
            .api
            .get_virtual_network(&cfg.resource_group, &cfg.names.virtual_network)
            .await?;
        vnet.properties.dhcp_options = Some(DhcpOptions {
            dns_servers: cfg.network.dns_servers(),
        });
        self.api
            .create_or_update_virtual_network(
                &cfg.resource_group,
                &cfg.names.virtual_network,
                &vnet,
            )
            .await
            .map_err(|e| {
                Error::provisioning("virtual network", &cfg.names.virtual_network, e.to_string())
            })?;
        Ok(())
    }

    async fn report(&self) -> Result<DeploymentSummary> {
        let cfg = self.config;

        let dc1_pip = self
            .api
            .get_public_ip(&cfg.resource_group, &cfg.names.public_ip_for(&cfg.names.dc1))
            .await?;
        let dc2_pip = self
            .api
            .get_public_ip(&cfg.resource_group, &cfg.names.public_ip_for(&cfg.names.dc2))
            .await?;

        Ok(DeploymentSummary {
            resource_group: cfg.resource_group.clone(),
            domain: cfg.domain.clone(),
            dc1_public_ip: dc1_pip.properties.ip_address,
            dc2_public_ip: dc2_pip.properties.ip_address,
            admin_username: self.credentials.vm_admin.username.clone(),
            completed_at: Utc::now(),
        })
    }
}

/// The two inbound rules of the deployment: RDP from anywhere, and
/// unrestricted traffic inside the virtual network (controllers talk
/// LDAP/Kerberos/DNS/replication to each other).
fn security_rules() -> Vec<SecurityRule> {
    vec![
        SecurityRule {
            name: "allow-rdp".to_string(),
            properties: SecurityRuleProperties {
                protocol: "Tcp".to_string(),
                source_port_range: "*".to_string(),
                destination_port_range: "3389".to_string(),
                source_address_prefix: "*".to_string(),
                destination_address_prefix: "*".to_string(),
                access: "Allow".to_string(),
                priority: 300,
                direction: "Inbound".to_string(),
            },
        },
        SecurityRule {
            name: "allow-vnet-inbound".to_string(),
            properties: SecurityRuleProperties {
                protocol: "*".to_string(),
                source_port_range: "*".to_string(),
                destination_port_range: "*".to_string(),
                source_address_prefix: "VirtualNetwork".to_string(),
                destination_address_prefix: "VirtualNetwork".to_string(),
                access: "Allow".to_string(),
                priority: 310,
                direction: "Inbound".to_string(),
            },
        },
    ]
}

/// Subnet id from the service response, falling back to the id derived
/// from the virtual network's own id.
fn subnet_id(vnet: &VirtualNetwork, name: &str) -> Result<String> {
    if let Some(id) = vnet.subnet_id(name) {
        return Ok(id);
    }
    vnet.id
        .as_ref()
        .map(|vnet_id| format!("{}/subnets/{}", vnet_id, name))
        .ok_or_else(|| {
            Error::Internal(format!(
                "virtual network response carried no id for subnet '{}'",
                name
            ))
        })
}
