//! Shared test support: a recording fake for the management-plane client.

use async_trait::async_trait;
use dcforge::azure::models::{
    InstanceViewStatus, NetworkInterface, NetworkSecurityGroup, PublicIpAddress, ResourceGroup,
    RunCommandInput, RunCommandResult, VirtualMachine, VirtualNetwork,
};
use dcforge::azure::AzureApi;
use dcforge::deploy::ConfirmGate;
use dcforge::error::{Error, Result};
use std::collections::HashMap;
use std::sync::Mutex;

/// One recorded management-plane call, in issue order.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiCall {
    CreateResourceGroup(String),
    CreateVirtualNetwork {
        name: String,
        dns_servers: Option<Vec<String>>,
    },
    GetVirtualNetwork(String),
    CreateNetworkSecurityGroup(String),
    CreatePublicIp(String),
    GetPublicIp(String),
    CreateNetworkInterface(String),
    CreateVirtualMachine(String),
    RunCommand {
        vm: String,
        kind: ScriptKind,
    },
}

/// Classified remote payload, so assertions don't match on script text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    ForestPromotion,
    ReadinessProbe,
    ReplicaJoin,
    Other,
}

fn classify(input: &RunCommandInput) -> ScriptKind {
    let text = input.script.join("\n");
    if text.contains("Install-ADDSForest") {
        ScriptKind::ForestPromotion
    } else if text.contains("Install-ADDSDomainController") {
        ScriptKind::ReplicaJoin
    } else if text.contains("Get-Service -Name NTDS") {
        ScriptKind::ReadinessProbe
    } else {
        ScriptKind::Other
    }
}

/// Hand-written `AzureApi` fake: records every call, hands back plausible
/// resource models with server-assigned ids, and can be programmed to fail
/// a given step or report a failing replica join.
#[derive(Default)]
pub struct RecordingApi {
    pub calls: Mutex<Vec<ApiCall>>,
    fail_resource_group: bool,
    join_fails: bool,
    probe_never_ready: bool,
    vnet_state: Mutex<Option<VirtualNetwork>>,
    assigned_ips: Mutex<HashMap<String, String>>,
}

impl RecordingApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the very first create call.
    pub fn with_resource_group_failure(mut self) -> Self {
        self.fail_resource_group = true;
        self
    }

    /// Make the replica join report its failure sentinel.
    pub fn with_join_failure(mut self) -> Self {
        self.join_fails = true;
        self
    }

    /// Make the readiness probe never report ready.
    pub fn with_probe_never_ready(mut self) -> Self {
        self.probe_never_ready = true;
        self
    }

    pub fn recorded(&self) -> Vec<ApiCall> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: ApiCall) {
        self.calls.lock().unwrap().push(call);
    }

    fn arm_id(group: &str, provider: &str, resource_type: &str, name: &str) -> String {
        format!(
            "/subscriptions/test-sub/resourceGroups/{}/providers/{}/{}/{}",
            group, provider, resource_type, name
        )
    }

    fn stdout(message: &str) -> RunCommandResult {
        RunCommandResult {
            value: vec![InstanceViewStatus {
                code: Some("ComponentStatus/StdOut/succeeded".to_string()),
                level: Some("Info".to_string()),
                display_status: Some("Provisioning succeeded".to_string()),
                message: Some(message.to_string()),
            }],
        }
    }
}

#[async_trait]
impl AzureApi for RecordingApi {
    async fn create_or_update_resource_group(
        &self,
        name: &str,
        group: &ResourceGroup,
    ) -> Result<ResourceGroup> {
        self.record(ApiCall::CreateResourceGroup(name.to_string()));
        if self.fail_resource_group {
            return Err(Error::Api {
                status: 403,
                code: Some("AuthorizationFailed".to_string()),
                message: "not allowed".to_string(),
            });
        }
        let mut created = group.clone();
        created.id = Some(format!("/subscriptions/test-sub/resourceGroups/{}", name));
        created.name = Some(name.to_string());
        Ok(created)
    }

    async fn create_or_update_virtual_network(
        &self,
        group: &str,
        name: &str,
        vnet: &VirtualNetwork,
    ) -> Result<VirtualNetwork> {
        self.record(ApiCall::CreateVirtualNetwork {
            name: name.to_string(),
            dns_servers: vnet
                .properties
                .dhcp_options
                .as_ref()
                .map(|d| d.dns_servers.clone()),
        });

        let vnet_id = Self::arm_id(group, "Microsoft.Network", "virtualNetworks", name);
        let mut created = vnet.clone();
        created.id = Some(vnet_id.clone());
        created.name = Some(name.to_string());
        for subnet in &mut created.properties.subnets {
            subnet.id = Some(format!("{}/subnets/{}", vnet_id, subnet.name));
        }
        created.properties.provisioning_state = Some("Succeeded".to_string());

        *self.vnet_state.lock().unwrap() = Some(created.clone());
        Ok(created)
    }

    async fn get_virtual_network(&self, _group: &str, name: &str) -> Result<VirtualNetwork> {
        self.record(ApiCall::GetVirtualNetwork(name.to_string()));
        self.vnet_state
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| Error::Api {
                status: 404,
                code: Some("NotFound".to_string()),
                message: format!("virtual network '{}' does not exist", name),
            })
    }

    async fn create_or_update_network_security_group(
        &self,
        group: &str,
        name: &str,
        nsg: &NetworkSecurityGroup,
    ) -> Result<NetworkSecurityGroup> {
        self.record(ApiCall::CreateNetworkSecurityGroup(name.to_string()));
        let mut created = nsg.clone();
        created.id = Some(Self::arm_id(
            group,
            "Microsoft.Network",
            "networkSecurityGroups",
            name,
        ));
        Ok(created)
    }

    async fn create_or_update_public_ip(
        &self,
        group: &str,
        name: &str,
        ip: &PublicIpAddress,
    ) -> Result<PublicIpAddress> {
        self.record(ApiCall::CreatePublicIp(name.to_string()));

        // Deterministic address per resource, assigned at create time
        let address = {
            let mut assigned = self.assigned_ips.lock().unwrap();
            let next = format!("203.0.113.{}", 10 + assigned.len());
            assigned.entry(name.to_string()).or_insert(next).clone()
        };

        let mut created = ip.clone();
        created.id = Some(Self::arm_id(
            group,
            "Microsoft.Network",
            "publicIPAddresses",
            name,
        ));
        created.properties.ip_address = Some(address);
        Ok(created)
    }

    async fn get_public_ip(&self, group: &str, name: &str) -> Result<PublicIpAddress> {
        self.record(ApiCall::GetPublicIp(name.to_string()));
        let address = {
            let assigned = self.assigned_ips.lock().unwrap();
            assigned.get(name).cloned()
        }
        .ok_or_else(|| Error::Api {
            status: 404,
            code: Some("NotFound".to_string()),
            message: format!("public IP '{}' does not exist", name),
        })?;

        let mut ip = PublicIpAddress::create_static("eastus");
        ip.id = Some(Self::arm_id(
            group,
            "Microsoft.Network",
            "publicIPAddresses",
            name,
        ));
        ip.properties.ip_address = Some(address);
        Ok(ip)
    }

    async fn create_or_update_network_interface(
        &self,
        group: &str,
        name: &str,
        nic: &NetworkInterface,
    ) -> Result<NetworkInterface> {
        self.record(ApiCall::CreateNetworkInterface(name.to_string()));
        let mut created = nic.clone();
        created.id = Some(Self::arm_id(
            group,
            "Microsoft.Network",
            "networkInterfaces",
            name,
        ));
        Ok(created)
    }

    async fn create_or_update_virtual_machine(
        &self,
        group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<VirtualMachine> {
        self.record(ApiCall::CreateVirtualMachine(name.to_string()));
        let mut created = vm.clone();
        created.id = Some(Self::arm_id(
            group,
            "Microsoft.Compute",
            "virtualMachines",
            name,
        ));
        created.properties.provisioning_state = Some("Succeeded".to_string());
        Ok(created)
    }

    async fn run_command(
        &self,
        _group: &str,
        vm: &str,
        input: &RunCommandInput,
    ) -> Result<RunCommandResult> {
        let kind = classify(input);
        self.record(ApiCall::RunCommand {
            vm: vm.to_string(),
            kind,
        });

        Ok(match kind {
            ScriptKind::ForestPromotion => Self::stdout("forest promotion scheduled"),
            ScriptKind::ReadinessProbe => {
                if self.probe_never_ready {
                    Self::stdout("DCFORGE_DC_NOT_READY")
                } else {
                    Self::stdout("DCFORGE_DC_READY")
                }
            }
            ScriptKind::ReplicaJoin => {
                if self.join_fails {
                    Self::stdout(
                        "DCFORGE_JOIN_FAILED: forest DNS did not resolve after 10 attempts",
                    )
                } else {
                    Self::stdout("replica join scheduled")
                }
            }
            ScriptKind::Other => Self::stdout(""),
        })
    }
}

/// Gate that declines every prompt.
pub struct DenyAll;

impl ConfirmGate for DenyAll {
    fn confirm(&self, _action: &str) -> Result<bool> {
        Ok(false)
    }
}
