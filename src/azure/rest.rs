//! reqwest implementation of the ARM management-plane client.
//!
//! Every call is a single HTTPS request to the management endpoint with a
//! bearer token and a fresh `x-ms-client-request-id`. Two operations are
//! long-running and polled to completion through the retry policy: VM
//! creation (GET until `provisioningState` settles) and run-command (GET on
//! the `Azure-AsyncOperation` URL until the operation reaches a terminal
//! state).

use crate::azure::models::{
    AsyncOperationStatus, CloudError, NetworkInterface, NetworkSecurityGroup, PublicIpAddress,
    ResourceGroup, RunCommandInput, RunCommandResult, VirtualMachine, VirtualNetwork,
};
use crate::azure::AzureApi;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;
use async_trait::async_trait;
use reqwest::{Method, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Public ARM endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// Name of the environment variable the CLI reads the bearer token from.
pub const TOKEN_ENV_VAR: &str = "AZURE_ACCESS_TOKEN";

const RESOURCE_API_VERSION: &str = "2021-04-01";
const NETWORK_API_VERSION: &str = "2023-09-01";
const COMPUTE_API_VERSION: &str = "2024-03-01";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// ARM REST client.
pub struct ArmClient {
    http: reqwest::Client,
    endpoint: Url,
    subscription_id: String,
    token: String,
    lro_policy: RetryPolicy,
}

impl ArmClient {
    /// Create a client against the public ARM endpoint.
    pub fn new(subscription_id: impl Into<String>, token: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            endpoint: Url::parse(DEFAULT_ENDPOINT)?,
            subscription_id: subscription_id.into(),
            token: token.into(),
            lro_policy: RetryPolicy::constant(60, Duration::from_secs(10)),
        })
    }

    /// Point the client at a different endpoint (sovereign clouds, tests).
    pub fn with_endpoint(mut self, endpoint: &str) -> Result<Self> {
        self.endpoint = Url::parse(endpoint)?;
        Ok(self)
    }

    /// Override the polling policy for long-running operations.
    pub fn with_lro_policy(mut self, policy: RetryPolicy) -> Self {
        self.lro_policy = policy;
        self
    }

    fn url(&self, path: &str, api_version: &str) -> Result<Url> {
        let mut url = self.endpoint.join(path)?;
        url.query_pairs_mut().append_pair("api-version", api_version);
        Ok(url)
    }

    fn group_path(&self, name: &str) -> String {
        format!(
            "subscriptions/{}/resourceGroups/{}",
            self.subscription_id, name
        )
    }

    fn network_path(&self, group: &str, resource_type: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Network/{}/{}",
            self.group_path(group),
            resource_type,
            name
        )
    }

    fn vm_path(&self, group: &str, name: &str) -> String {
        format!(
            "{}/providers/Microsoft.Compute/virtualMachines/{}",
            self.group_path(group),
            name
        )
    }

    fn request(&self, method: Method, url: Url) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("x-ms-client-request-id", uuid::Uuid::new_v4().to_string())
    }

    async fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T> {
        let status = response.status();
        if status.is_success() {
            Ok(response.json().await?)
        } else {
            Err(Self::error_from_response(status, response).await)
        }
    }

    async fn error_from_response(status: StatusCode, response: Response) -> Error {
        let body = response.text().await.unwrap_or_default();
        match serde_json::from_str::<CloudError>(&body) {
            Ok(cloud) => Error::Api {
                status: status.as_u16(),
                code: cloud.error.code,
                message: cloud.error.message.unwrap_or_else(|| body.clone()),
            },
            Err(_) => Error::Api {
                status: status.as_u16(),
                code: None,
                message: body,
            },
        }
    }

    async fn put<B: Serialize, T: DeserializeOwned>(&self, url: Url, body: &B) -> Result<T> {
        debug!(%url, "PUT");
        let response = self.request(Method::PUT, url).json(body).send().await?;
        Self::parse_json(response).await
    }

    async fn get<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        debug!(%url, "GET");
        let response = self.request(Method::GET, url).send().await?;
        Self::parse_json(response).await
    }

    async fn get_virtual_machine(&self, group: &str, name: &str) -> Result<VirtualMachine> {
        let url = self.url(&self.vm_path(group, name), COMPUTE_API_VERSION)?;
        self.get(url).await
    }
}

#[async_trait]
impl AzureApi for ArmClient {
    async fn create_or_update_resource_group(
        &self,
        name: &str,
        group: &ResourceGroup,
    ) -> Result<ResourceGroup> {
        let url = self.url(&self.group_path(name), RESOURCE_API_VERSION)?;
        self.put(url, group).await
    }

    async fn create_or_update_virtual_network(
        &self,
        group: &str,
        name: &str,
        vnet: &VirtualNetwork,
    ) -> Result<VirtualNetwork> {
        let url = self.url(
            &self.network_path(group, "virtualNetworks", name),
            NETWORK_API_VERSION,
        )?;
        self.put(url, vnet).await
    }

    async fn get_virtual_network(&self, group: &str, name: &str) -> Result<VirtualNetwork> {
        let url = self.url(
            &self.network_path(group, "virtualNetworks", name),
            NETWORK_API_VERSION,
        )?;
        self.get(url).await
    }

    async fn create_or_update_network_security_group(
        &self,
        group: &str,
        name: &str,
        nsg: &NetworkSecurityGroup,
    ) -> Result<NetworkSecurityGroup> {
        let url = self.url(
            &self.network_path(group, "networkSecurityGroups", name),
            NETWORK_API_VERSION,
        )?;
        self.put(url, nsg).await
    }

    async fn create_or_update_public_ip(
        &self,
        group: &str,
        name: &str,
        ip: &PublicIpAddress,
    ) -> Result<PublicIpAddress> {
        let url = self.url(
            &self.network_path(group, "publicIPAddresses", name),
            NETWORK_API_VERSION,
        )?;
        self.put(url, ip).await
    }

    async fn get_public_ip(&self, group: &str, name: &str) -> Result<PublicIpAddress> {
        let url = self.url(
            &self.network_path(group, "publicIPAddresses", name),
            NETWORK_API_VERSION,
        )?;
        self.get(url).await
    }

    async fn create_or_update_network_interface(
        &self,
        group: &str,
        name: &str,
        nic: &NetworkInterface,
    ) -> Result<NetworkInterface> {
        let url = self.url(
            &self.network_path(group, "networkInterfaces", name),
            NETWORK_API_VERSION,
        )?;
        self.put(url, nic).await
    }

    async fn create_or_update_virtual_machine(
        &self,
        group: &str,
        name: &str,
        vm: &VirtualMachine,
    ) -> Result<VirtualMachine> {
        let url = self.url(&self.vm_path(group, name), COMPUTE_API_VERSION)?;
        let created: VirtualMachine = self.put(url, vm).await?;

        if created.is_provisioned() {
            return Ok(created);
        }

        // ARM accepts the create and finishes it asynchronously; poll the
        // resource until provisioningState settles.
        self.lro_policy
            .execute_until(
                || self.get_virtual_machine(group, name),
                VirtualMachine::is_provisioned,
            )
            .await
            .map_err(|e| e.into_not_ready(&format!("virtual machine '{}'", name)))
    }

    async fn run_command(
        &self,
        group: &str,
        vm: &str,
        input: &RunCommandInput,
    ) -> Result<RunCommandResult> {
        let url = self.url(
            &format!("{}/runCommand", self.vm_path(group, vm)),
            COMPUTE_API_VERSION,
        )?;
        debug!(%url, "POST runCommand");
        let response = self.request(Method::POST, url).json(input).send().await?;

        let status = response.status();
        if status == StatusCode::ACCEPTED {
            // Long-running: the result lives behind the Azure-AsyncOperation
            // URL once the operation reaches a terminal state.
            let poll_url = response
                .headers()
                .get("azure-asyncoperation")
                .and_then(|v| v.to_str().ok())
                .map(Url::parse)
                .transpose()?
                .ok_or_else(|| {
                    Error::Internal("202 response without Azure-AsyncOperation header".to_string())
                })?;

            let operation: AsyncOperationStatus = self
                .lro_policy
                .execute_until(
                    || self.get::<AsyncOperationStatus>(poll_url.clone()),
                    AsyncOperationStatus::is_terminal,
                )
                .await
                .map_err(|e| e.into_not_ready(&format!("run-command on '{}'", vm)))?;

            if !operation.is_succeeded() {
                let message = operation
                    .error
                    .and_then(|e| e.message)
                    .unwrap_or_else(|| format!("operation ended as {}", operation.status));
                return Err(Error::remote_command(vm, message));
            }

            let result = operation
                .properties
                .and_then(|p| p.get("output").cloned())
                .map(serde_json::from_value::<RunCommandResult>)
                .transpose()?
                .unwrap_or_default();
            return Ok(result);
        }

        Self::parse_json(response).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> ArmClient {
        ArmClient::new("0000-sub", "token").unwrap()
    }

    #[test]
    fn test_group_url_shape() {
        let c = client();
        let url = c
            .url(&c.group_path("ad-forest-rg"), RESOURCE_API_VERSION)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://management.azure.com/subscriptions/0000-sub/resourceGroups/ad-forest-rg?api-version=2021-04-01"
        );
    }

    #[test]
    fn test_network_url_shape() {
        let c = client();
        let url = c
            .url(
                &c.network_path("rg", "virtualNetworks", "ad-vnet"),
                NETWORK_API_VERSION,
            )
            .unwrap();
        assert!(url.path().ends_with(
            "/resourceGroups/rg/providers/Microsoft.Network/virtualNetworks/ad-vnet"
        ));
        assert_eq!(url.query(), Some("api-version=2023-09-01"));
    }

    #[test]
    fn test_vm_url_shape() {
        let c = client();
        let url = c.url(&c.vm_path("rg", "ad-dc1"), COMPUTE_API_VERSION).unwrap();
        assert!(url
            .path()
            .ends_with("/providers/Microsoft.Compute/virtualMachines/ad-dc1"));
    }

    #[test]
    fn test_custom_endpoint() {
        let c = client().with_endpoint("http://127.0.0.1:18080").unwrap();
        let url = c.url(&c.group_path("rg"), RESOURCE_API_VERSION).unwrap();
        assert!(url.as_str().starts_with("http://127.0.0.1:18080/subscriptions/"));
    }
}
