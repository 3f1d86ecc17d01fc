//! Remote configuration payloads.
//!
//! The two domain controllers are configured through the VM run-command
//! channel with PowerShell payloads built here: one that promotes DC1 to a
//! new forest, one that joins DC2 to that forest as a replica controller,
//! and a small readiness probe the orchestrator runs on DC1 between the
//! two.
//!
//! The replica payload carries its own DNS polling loop because it runs
//! inside the VM, where the orchestrator cannot observe intermediate
//! state: it retries resolution of the forest FQDN against DC1 up to
//! [`DNS_POLL_ATTEMPTS`] times and signals failure with
//! [`JOIN_FAILURE_SENTINEL`] on stdout plus a non-zero exit.
//!
//! All interpolated values go through [`powershell_escape`]; passwords are
//! no exception.

use crate::credentials::Credential;

/// Marker printed by the replica payload when the domain join could not be
/// attempted. The orchestrator greps run-command output for this.
pub const JOIN_FAILURE_SENTINEL: &str = "DCFORGE_JOIN_FAILED";

/// Marker printed by the readiness probe once the directory service
/// answers on DC1.
pub const READY_SENTINEL: &str = "DCFORGE_DC_READY";

/// How many times the replica payload polls DNS before giving up.
pub const DNS_POLL_ATTEMPTS: u32 = 10;

/// Pause between DNS polls inside the replica payload, in seconds.
pub const DNS_POLL_INTERVAL_SECS: u32 = 30;

/// Escapes a string for safe use as a PowerShell single-quoted literal.
///
/// Single quotes are doubled; everything else is inert inside single
/// quotes.
pub fn powershell_escape(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Payload for DC1: install the directory-service role and promote a new
/// forest, then reboot.
pub fn forest_promotion(domain: &str, safe_mode_password: &str) -> String {
    format!(
        r#"$ErrorActionPreference = 'Stop'
Install-WindowsFeature -Name AD-Domain-Services -IncludeManagementTools | Out-Null
Import-Module ADDSDeployment
$safeModePassword = ConvertTo-SecureString {password} -AsPlainText -Force
Install-ADDSForest `
    -DomainName {domain} `
    -SafeModeAdministratorPassword $safeModePassword `
    -InstallDns `
    -NoRebootOnCompletion `
    -Force
Restart-Computer -Force
"#,
        domain = powershell_escape(domain),
        password = powershell_escape(safe_mode_password),
    )
}

/// Payload for DC2: poll DNS resolution of the forest FQDN against DC1,
/// and only if resolution succeeds, join the domain as an additional
/// controller and reboot.
///
/// Exhausting the poll budget prints [`JOIN_FAILURE_SENTINEL`] and exits
/// non-zero without touching the machine.
pub fn replica_join(
    domain: &str,
    dc1_private_ip: &str,
    domain_admin: &Credential,
    safe_mode_password: &str,
) -> String {
    let qualified_user = format!("{}\\{}", domain, domain_admin.username);
    format!(
        r#"$ErrorActionPreference = 'Stop'
$resolved = $false
for ($attempt = 1; $attempt -le {attempts}; $attempt++) {{
    try {{
        Resolve-DnsName -Name {domain} -Server {dc1_ip} -ErrorAction Stop | Out-Null
        $resolved = $true
        break
    }} catch {{
        Start-Sleep -Seconds {interval}
    }}
}}
if (-not $resolved) {{
    Write-Output '{sentinel}: forest DNS did not resolve after {attempts} attempts'
    exit 1
}}
Install-WindowsFeature -Name AD-Domain-Services -IncludeManagementTools | Out-Null
Import-Module ADDSDeployment
$safeModePassword = ConvertTo-SecureString {safe_mode} -AsPlainText -Force
$domainPassword = ConvertTo-SecureString {admin_password} -AsPlainText -Force
$domainCredential = New-Object System.Management.Automation.PSCredential({admin_user}, $domainPassword)
Install-ADDSDomainController `
    -DomainName {domain} `
    -Credential $domainCredential `
    -SafeModeAdministratorPassword $safeModePassword `
    -InstallDns `
    -NoRebootOnCompletion `
    -Force
Restart-Computer -Force
"#,
        attempts = DNS_POLL_ATTEMPTS,
        interval = DNS_POLL_INTERVAL_SECS,
        sentinel = JOIN_FAILURE_SENTINEL,
        domain = powershell_escape(domain),
        dc1_ip = powershell_escape(dc1_private_ip),
        safe_mode = powershell_escape(safe_mode_password),
        admin_password = powershell_escape(domain_admin.password()),
        admin_user = powershell_escape(&qualified_user),
    )
}

/// Probe run on DC1 between promotion and replica join: the directory
/// services must be running and the forest FQDN must resolve locally.
pub fn readiness_probe(domain: &str) -> String {
    format!(
        r#"$ErrorActionPreference = 'Stop'
try {{
    $ntds = Get-Service -Name NTDS -ErrorAction Stop
    $adws = Get-Service -Name ADWS -ErrorAction Stop
    if ($ntds.Status -eq 'Running' -and $adws.Status -eq 'Running') {{
        Resolve-DnsName -Name {domain} -Server 127.0.0.1 -ErrorAction Stop | Out-Null
        Write-Output '{sentinel}'
        exit 0
    }}
}} catch {{ }}
Write-Output 'DCFORGE_DC_NOT_READY'
exit 1
"#,
        domain = powershell_escape(domain),
        sentinel = READY_SENTINEL,
    )
}
