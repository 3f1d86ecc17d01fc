//! Integration tests for the deployment orchestrator.
//!
//! These pin the contract of the sequence itself: the fixed dependency
//! order of create calls, fail-fast behavior, both branches of the
//! replica-join failure policy, the DNS finalization payload, and the
//! origin of the reported public IPs.

mod common;

use common::{ApiCall, DenyAll, RecordingApi, ScriptKind};
use dcforge::config::{DeploymentConfig, OnJoinFailure};
use dcforge::credentials::CredentialSet;
use dcforge::deploy::{AutoApprove, Deployer};
use dcforge::error::Error;
use pretty_assertions::assert_eq;
use std::time::Duration;

fn test_config() -> DeploymentConfig {
    let mut config = DeploymentConfig::default();
    config.assume_yes = true;
    // Keep probe retries instant in tests
    config.readiness.initial_delay = Duration::from_millis(1);
    config.readiness.max_delay = Duration::from_millis(2);
    config
}

fn test_credentials() -> CredentialSet {
    CredentialSet::shared("azureadmin", "S3cretPassw0rd!")
}

#[tokio::test]
async fn test_full_sequence_issues_calls_in_dependency_order() {
    let api = RecordingApi::new();
    let config = test_config();
    let credentials = test_credentials();
    let deployer = Deployer::new(&api, &config, &credentials, &AutoApprove);

    let summary = deployer.run().await.unwrap();

    let calls = api.recorded();
    let expected = vec![
        ApiCall::CreateResourceGroup("ad-forest-rg".to_string()),
        ApiCall::CreateVirtualNetwork {
            name: "ad-vnet".to_string(),
            dns_servers: None,
        },
        ApiCall::CreateNetworkSecurityGroup("ad-nsg".to_string()),
        ApiCall::CreatePublicIp("ad-dc1-pip".to_string()),
        ApiCall::CreateNetworkInterface("ad-dc1-nic".to_string()),
        ApiCall::CreateVirtualMachine("ad-dc1".to_string()),
        ApiCall::CreatePublicIp("ad-dc2-pip".to_string()),
        ApiCall::CreateNetworkInterface("ad-dc2-nic".to_string()),
        ApiCall::CreateVirtualMachine("ad-dc2".to_string()),
        ApiCall::RunCommand {
            vm: "ad-dc1".to_string(),
            kind: ScriptKind::ForestPromotion,
        },
        ApiCall::RunCommand {
            vm: "ad-dc1".to_string(),
            kind: ScriptKind::ReadinessProbe,
        },
        ApiCall::RunCommand {
            vm: "ad-dc2".to_string(),
            kind: ScriptKind::ReplicaJoin,
        },
        ApiCall::GetVirtualNetwork("ad-vnet".to_string()),
        ApiCall::CreateVirtualNetwork {
            name: "ad-vnet".to_string(),
            dns_servers: Some(vec!["10.0.1.4".to_string(), "10.0.2.4".to_string()]),
        },
        ApiCall::GetPublicIp("ad-dc1-pip".to_string()),
        ApiCall::GetPublicIp("ad-dc2-pip".to_string()),
    ];
    assert_eq!(calls, expected);

    assert_eq!(summary.resource_group, "ad-forest-rg");
    assert_eq!(summary.domain, "corp.contoso.com");
    assert_eq!(summary.admin_username, "azureadmin");
}

#[tokio::test]
async fn test_resource_group_failure_stops_the_run() {
    let api = RecordingApi::new().with_resource_group_failure();
    let config = test_config();
    let credentials = test_credentials();
    let deployer = Deployer::new(&api, &config, &credentials, &AutoApprove);

    let err = deployer.run().await.unwrap_err();
    assert!(matches!(
        err,
        Error::Provisioning {
            kind: "resource group",
            ..
        }
    ));

    // Nothing after the failed create was issued
    let calls = api.recorded();
    assert_eq!(
        calls,
        vec![ApiCall::CreateResourceGroup("ad-forest-rg".to_string())]
    );
}

#[tokio::test]
async fn test_join_failure_aborts_before_dns_finalization_by_default() {
    let api = RecordingApi::new().with_join_failure();
    let config = test_config();
    assert_eq!(config.on_join_failure, OnJoinFailure::Fail);
    let credentials = test_credentials();
    let deployer = Deployer::new(&api, &config, &credentials, &AutoApprove);

    let err = deployer.run().await.unwrap_err();
    match err {
        Error::JoinFailed { vm, message } => {
            assert_eq!(vm, "ad-dc2");
            assert!(message.contains("DCFORGE_JOIN_FAILED"));
        }
        other => panic!("expected JoinFailed, got: {}", other),
    }

    // The DNS cut-over never happened
    let calls = api.recorded();
    assert!(!calls
        .iter()
        .any(|c| matches!(c, ApiCall::GetVirtualNetwork(_))));
    assert!(!calls.iter().any(|c| matches!(
        c,
        ApiCall::CreateVirtualNetwork {
            dns_servers: Some(_),
            ..
        }
    )));
}

#[tokio::test]
async fn test_join_failure_continue_policy_still_finalizes_dns() {
    // With the continue policy, a replica-join failure detected only
    // inside the VM must not stop DNS finalization.
    let api = RecordingApi::new().with_join_failure();
    let mut config = test_config();
    config.on_join_failure = OnJoinFailure::Continue;
    let credentials = test_credentials();
    let deployer = Deployer::new(&api, &config, &credentials, &AutoApprove);

    let summary = deployer.run().await.unwrap();
    assert_eq!(summary.resource_group, "ad-forest-rg");

    let calls = api.recorded();
    assert!(calls.iter().any(|c| matches!(
        c,
        ApiCall::CreateVirtualNetwork {
            dns_servers: Some(servers),
            ..
        } if servers == &vec!["10.0.1.4".to_string(), "10.0.2.4".to_string()]
    )));
}

#[tokio::test]
async fn test_dns_finalization_carries_controller_ips_in_order() {
    let api = RecordingApi::new();
    let mut config = test_config();
    config.network.dc1_private_ip = "10.0.1.10".to_string();
    config.network.dc2_private_ip = "10.0.2.20".to_string();
    let credentials = test_credentials();
    let deployer = Deployer::new(&api, &config, &credentials, &AutoApprove);

    deployer.run().await.unwrap();

    let finalize = api
        .recorded()
        .into_iter()
        .filter_map(|c| match c {
            ApiCall::CreateVirtualNetwork {
                dns_servers: Some(servers),
                ..
            } => Some(servers),
            _ => None,
        })
        .next()
        .expect("no DNS finalization PUT recorded");

    assert_eq!(
        finalize,
        vec!["10.0.1.10".to_string(), "10.0.2.20".to_string()]
    );
}

#[tokio::test]
async fn test_declined_gate_issues_no_provider_calls() {
    let api = RecordingApi::new();
    let mut config = test_config();
    config.assume_yes = false;
    let credentials = test_credentials();
    let deployer = Deployer::new(&api, &config, &credentials, &DenyAll);

    let err = deployer.run().await.unwrap_err();
    assert!(matches!(err, Error::PromptCancelled));
    assert!(api.recorded().is_empty());
}

#[tokio::test]
async fn test_summary_ips_come_from_the_public_ip_resources() {
    let api = RecordingApi::new();
    let config = test_config();
    let credentials = test_credentials();
    let deployer = Deployer::new(&api, &config, &credentials, &AutoApprove);

    let summary = deployer.run().await.unwrap();

    // The fake assigns addresses at public-IP creation, DC1 first; the
    // summary must read those same resources back by name.
    assert_eq!(summary.dc1_public_ip.as_deref(), Some("203.0.113.10"));
    assert_eq!(summary.dc2_public_ip.as_deref(), Some("203.0.113.11"));
}

#[tokio::test]
async fn test_probe_exhaustion_is_a_typed_not_ready_error() {
    let api = RecordingApi::new().with_probe_never_ready();
    let mut config = test_config();
    config.readiness.max_retries = 2;
    let credentials = test_credentials();
    let deployer = Deployer::new(&api, &config, &credentials, &AutoApprove);

    let err = deployer.run().await.unwrap_err();
    match err {
        Error::NotReady { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected NotReady, got: {}", other),
    }

    // The replica join and the DNS cut-over never ran
    let calls = api.recorded();
    assert!(!calls.iter().any(|c| matches!(
        c,
        ApiCall::RunCommand {
            kind: ScriptKind::ReplicaJoin,
            ..
        }
    )));
    assert!(!calls
        .iter()
        .any(|c| matches!(c, ApiCall::GetVirtualNetwork(_))));
}
