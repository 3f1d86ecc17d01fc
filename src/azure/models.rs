//! Resource models for the ARM management plane.
//!
//! These mirror the wire shape of the resources this tool touches: the
//! `properties` envelope, camelCase field names, and ARM's `IP`
//! capitalization quirks. Only the fields the deployment reads or writes
//! are modeled; unknown response fields are ignored on deserialization.

use crate::config::ImageReference;
use serde::{Deserialize, Serialize};

/// Provisioning state reported by ARM once an operation settles.
pub const PROVISIONING_SUCCEEDED: &str = "Succeeded";

/// Reference to another resource by ARM id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubResource {
    /// Full ARM resource id
    pub id: String,
}

impl SubResource {
    pub fn new(id: impl Into<String>) -> Self {
        Self { id: id.into() }
    }
}

// ============================================================================
// Resource group
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<ResourceGroupProperties>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceGroupProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

impl ResourceGroup {
    /// Request body for a create call.
    pub fn create(location: impl Into<String>) -> Self {
        Self {
            id: None,
            name: None,
            location: location.into(),
            properties: None,
        }
    }
}

// ============================================================================
// Virtual network
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressSpace {
    pub address_prefixes: Vec<String>,
}

/// DNS servers applied to every NIC in the virtual network.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DhcpOptions {
    pub dns_servers: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subnet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    pub properties: SubnetProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubnetProperties {
    pub address_prefix: String,
}

impl Subnet {
    pub fn new(name: impl Into<String>, address_prefix: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            properties: SubnetProperties {
                address_prefix: address_prefix.into(),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetwork {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub location: String,
    pub properties: VirtualNetworkProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualNetworkProperties {
    pub address_space: AddressSpace,
    pub subnets: Vec<Subnet>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dhcp_options: Option<DhcpOptions>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

impl VirtualNetwork {
    /// ARM id of a subnet by name, as returned by the service.
    pub fn subnet_id(&self, name: &str) -> Option<String> {
        self.properties
            .subnets
            .iter()
            .find(|s| s.name == name)
            .and_then(|s| s.id.clone())
    }
}

// ============================================================================
// Network security group
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSecurityGroup {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub location: String,
    pub properties: NetworkSecurityGroupProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSecurityGroupProperties {
    pub security_rules: Vec<SecurityRule>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRule {
    pub name: String,
    pub properties: SecurityRuleProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SecurityRuleProperties {
    pub protocol: String,
    pub source_port_range: String,
    pub destination_port_range: String,
    pub source_address_prefix: String,
    pub destination_address_prefix: String,
    pub access: String,
    pub priority: u32,
    pub direction: String,
}

// ============================================================================
// Public IP address
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddress {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub location: String,
    pub properties: PublicIpAddressProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicIpAddressProperties {
    #[serde(rename = "publicIPAllocationMethod")]
    pub public_ip_allocation_method: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

impl PublicIpAddress {
    /// Request body for a static public IP.
    pub fn create_static(location: impl Into<String>) -> Self {
        Self {
            id: None,
            location: location.into(),
            properties: PublicIpAddressProperties {
                public_ip_allocation_method: "Static".to_string(),
                ip_address: None,
                provisioning_state: None,
            },
        }
    }
}

// ============================================================================
// Network interface
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterface {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub location: String,
    pub properties: NetworkInterfaceProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkInterfaceProperties {
    pub ip_configurations: Vec<IpConfiguration>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_security_group: Option<SubResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfiguration {
    pub name: String,
    pub properties: IpConfigurationProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IpConfigurationProperties {
    pub subnet: SubResource,
    #[serde(rename = "privateIPAllocationMethod")]
    pub private_ip_allocation_method: String,
    #[serde(rename = "privateIPAddress", skip_serializing_if = "Option::is_none")]
    pub private_ip_address: Option<String>,
    #[serde(rename = "publicIPAddress", skip_serializing_if = "Option::is_none")]
    pub public_ip_address: Option<SubResource>,
}

// ============================================================================
// Virtual machine
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachine {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub location: String,
    pub properties: VirtualMachineProperties,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualMachineProperties {
    pub hardware_profile: HardwareProfile,
    pub storage_profile: StorageProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_profile: Option<OsProfile>,
    pub network_profile: NetworkProfile,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provisioning_state: Option<String>,
}

impl VirtualMachine {
    /// Whether ARM reports the machine as fully provisioned.
    pub fn is_provisioned(&self) -> bool {
        self.properties.provisioning_state.as_deref() == Some(PROVISIONING_SUCCEEDED)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HardwareProfile {
    pub vm_size: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageProfile {
    pub image_reference: ImageReference,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub os_disk: Option<OsDisk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsDisk {
    pub create_option: String,
}

/// OS profile for a VM create. The admin password is write-only: ARM never
/// returns it, and GET responses simply omit the field.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OsProfile {
    pub computer_name: String,
    pub admin_username: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub admin_password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkProfile {
    pub network_interfaces: Vec<SubResource>,
}

// ============================================================================
// Run command
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandInput {
    pub command_id: String,
    pub script: Vec<String>,
}

impl RunCommandInput {
    /// A PowerShell payload, split into lines as the endpoint expects.
    pub fn powershell(script: &str) -> Self {
        Self {
            command_id: "RunPowerShellScript".to_string(),
            script: script.lines().map(str::to_string).collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstanceViewStatus {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Output of a run-command invocation: one status per output stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunCommandResult {
    #[serde(default)]
    pub value: Vec<InstanceViewStatus>,
}

impl RunCommandResult {
    /// All status messages joined; this is where the remote payload's
    /// stdout and stderr land.
    pub fn output_text(&self) -> String {
        self.value
            .iter()
            .filter_map(|s| s.message.as_deref())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Whether any status reports at error level.
    pub fn has_error(&self) -> bool {
        self.value
            .iter()
            .any(|s| s.level.as_deref().is_some_and(|l| l.eq_ignore_ascii_case("error")))
    }
}

// ============================================================================
// Long-running operations and errors
// ============================================================================

/// Status document behind an `Azure-AsyncOperation` URL.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AsyncOperationStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<CloudErrorBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<serde_json::Value>,
}

impl AsyncOperationStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "Succeeded" | "Failed" | "Canceled")
    }

    pub fn is_succeeded(&self) -> bool {
        self.status == "Succeeded"
    }
}

/// Error envelope returned by ARM on failed requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudError {
    pub error: CloudErrorBody,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CloudErrorBody {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}
