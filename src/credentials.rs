//! Credential handling for the deployment.
//!
//! A forest deployment needs three secrets: the VM local administrator,
//! the domain administrator used for the replica join, and the DSRM
//! safe-mode password. By default all three share one username/password
//! pair, but the contract is explicit: [`CredentialSet`] has a distinct
//! slot per role, so callers can see (and tests can pin) exactly where
//! each secret flows.
//!
//! Passwords never appear in `Debug` output.

use crate::error::{Error, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Input, Password};
use is_terminal::IsTerminal;

/// A username/password pair.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// Account name
    pub username: String,
    password: String,
}

impl Credential {
    /// Create a credential from a username and password.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// The secret itself. Callers interpolating it into a payload are
    /// responsible for escaping.
    pub fn password(&self) -> &str {
        &self.password
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"***")
            .finish()
    }
}

/// The three credential roles of a forest deployment.
#[derive(Clone, PartialEq, Eq)]
pub struct CredentialSet {
    /// Local administrator on both VMs
    pub vm_admin: Credential,
    /// Domain administrator used for the replica join
    pub domain_admin: Credential,
    /// DSRM safe-mode recovery password
    safe_mode_password: String,
}

impl std::fmt::Debug for CredentialSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSet")
            .field("vm_admin", &self.vm_admin)
            .field("domain_admin", &self.domain_admin)
            .field("safe_mode_password", &"***")
            .finish()
    }
}

impl CredentialSet {
    /// Build a set where every slot shares one username/password pair.
    ///
    /// Single-credential deployments are the common case; the trade-off is
    /// visible in the type rather than implied.
    pub fn shared(username: impl Into<String>, password: impl Into<String>) -> Self {
        let username = username.into();
        let password = password.into();
        Self {
            vm_admin: Credential::new(username.clone(), password.clone()),
            domain_admin: Credential::new(username, password.clone()),
            safe_mode_password: password,
        }
    }

    /// The DSRM safe-mode password.
    pub fn safe_mode_password(&self) -> &str {
        &self.safe_mode_password
    }

    /// Prompt interactively for the shared credential.
    ///
    /// Fails with [`Error::PromptCancelled`] when the operator interrupts
    /// the prompt or when stderr is not attached to a terminal, in both
    /// cases before any provider call has been made.
    pub fn prompt(default_username: &str) -> Result<Self> {
        if !std::io::stderr().is_terminal() {
            return Err(Error::PromptCancelled);
        }

        let theme = ColorfulTheme::default();

        let username: String = Input::with_theme(&theme)
            .with_prompt("Admin username")
            .default(default_username.to_string())
            .interact_text()
            .map_err(|_| Error::PromptCancelled)?;

        let password = Password::with_theme(&theme)
            .with_prompt("Admin password")
            .with_confirmation("Confirm password", "Passwords do not match")
            .interact()
            .map_err(|_| Error::PromptCancelled)?;

        Ok(Self::shared(username, password))
    }
}
