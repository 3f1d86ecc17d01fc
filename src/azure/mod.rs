//! Azure management-plane client.
//!
//! The deployment drives a handful of ARM endpoints: resource groups,
//! virtual networks, network security groups, public IPs, network
//! interfaces, virtual machines and the VM run-command channel. The
//! [`AzureApi`] trait covers exactly those calls so the orchestrator stays
//! independent of the transport and tests can substitute a recording fake.
//!
//! [`ArmClient`] is the real implementation: reqwest against
//! `management.azure.com` with a caller-supplied bearer token.
//!
//! ## Authentication
//!
//! Management-plane authentication is consumed as a black box. The client
//! takes a ready-made bearer token (typically `az account get-access-token
//! --query accessToken -o tsv` exported as `AZURE_ACCESS_TOKEN`) rather
//! than embedding an OAuth flow.

pub mod models;
pub mod rest;

pub use models::{
    NetworkInterface, NetworkSecurityGroup, PublicIpAddress, ResourceGroup, RunCommandInput,
    RunCommandResult, VirtualMachine, VirtualNetwork,
};
pub use rest::ArmClient;

use crate::error::Result;
use async_trait::async_trait;

/// The management-plane operations the deployment sequence needs.
///
/// PUT-style calls follow ARM's create-or-update semantics; the returned
/// model is the service's view of the resource, including server-assigned
/// ids.
#[async_trait]
pub trait AzureApi: Send + Sync {
    /// Create or update a resource group.
    async fn create_or_update_resource_group(
        &self,
        name: &str,
        group: &ResourceGroup,
    ) -> Result<ResourceGroup>;

    /// Create or update a virtual network (also used for the DNS
    /// finalization PUT).
    async fn create_or_update_virtual_network(
        &self,
        group: &str,
        name: &str,
        vnet: &VirtualNetwork,
    ) -> Result<VirtualNetwork>;

    /// Fetch a virtual network.
    async fn get_virtual_network(&self, group: &str, name: &str) -> Result<VirtualNetwork>;

    /// Create or update a network security group.
    async fn create_or_update_network_security_group(
        &self,
        group: &str,
        name: &str,
        nsg: &NetworkSecurityGroup,
    ) -> Result<NetworkSecurityGroup>;

    /// Create or update a public IP address.
    async fn create_or_update_public_ip(
        &self,
        group: &str,
        name: &str,
        ip: &PublicIpAddress,
    ) -> Result<PublicIpAddress>;

    /// Fetch a public IP address.
    async fn get_public_ip(&self, group: &str, name: &str) -> Result<PublicIpAddress>;

    /// Create or update a network interface.
    async fn create_or_update_network_interface(
        &self,
        group: &str,
        name: &str,
        nic: &NetworkInterface,
    ) -> Result<NetworkInterface>;

    /// Create or update a virtual machine and wait until it is provisioned.
    async fn create_or_update_virtual_machine(
        &self,
        group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<VirtualMachine>;

    /// Execute a script inside a VM and wait for its output.
    async fn run_command(
        &self,
        group: &str,
        vm: &str,
        input: &RunCommandInput,
    ) -> Result<RunCommandResult>;
}
