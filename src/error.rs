//! Error types for dcforge.
//!
//! This module defines the error types used throughout dcforge, providing
//! rich error information for debugging and user feedback.

use thiserror::Error;

/// Result type alias for dcforge operations.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for dcforge.
#[derive(Error, Debug)]
pub enum Error {
    // ========================================================================
    // Provisioning Errors
    // ========================================================================
    /// A management-plane create call failed. The run aborts at the first
    /// failed create; no partial cleanup is attempted.
    #[error("Failed to provision {kind} '{name}': {message}")]
    Provisioning {
        /// Resource kind (e.g. "virtual network")
        kind: &'static str,
        /// Resource name
        name: String,
        /// Error message
        message: String,
    },

    /// The management plane rejected a request.
    #[error("Azure API request failed with status {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// ARM error code, when the response body carried one
        code: Option<String>,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Remote Configuration Errors
    // ========================================================================
    /// A run-command payload failed on a VM.
    #[error("Remote command failed on '{vm}': {message}")]
    RemoteCommand {
        /// Target VM name
        vm: String,
        /// Error message
        message: String,
    },

    /// The replica controller reported a domain-join failure.
    #[error("Replica join failed on '{vm}': {message}")]
    JoinFailed {
        /// Target VM name
        vm: String,
        /// Error message
        message: String,
    },

    /// A readiness probe exhausted its retry budget.
    #[error("'{what}' was not ready after {attempts} attempts ({elapsed_secs}s elapsed)")]
    NotReady {
        /// What was being waited for
        what: String,
        /// Number of attempts made
        attempts: u32,
        /// Total elapsed seconds
        elapsed_secs: u64,
    },

    // ========================================================================
    // Input Errors
    // ========================================================================
    /// The operator declined a prompt or the prompt was interrupted.
    #[error("Cancelled by operator")]
    PromptCancelled,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid configuration value.
    #[error("Invalid configuration value for '{key}': {message}")]
    InvalidConfig {
        /// Configuration key
        key: String,
        /// Error message
        message: String,
    },

    // ========================================================================
    // Transport and Serialization Errors
    // ========================================================================
    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// URL construction error.
    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    /// JSON parsing error.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// TOML parsing error.
    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ========================================================================
    // Other Errors
    // ========================================================================
    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Creates a new provisioning error.
    pub fn provisioning(
        kind: &'static str,
        name: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Provisioning {
            kind,
            name: name.into(),
            message: message.into(),
        }
    }

    /// Creates a new remote command error.
    pub fn remote_command(vm: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCommand {
            vm: vm.into(),
            message: message.into(),
        }
    }

    /// Creates a new invalid configuration error.
    pub fn invalid_config(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Returns the error code for CLI exit status.
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Provisioning { .. } | Error::Api { .. } => 2,
            Error::RemoteCommand { .. } | Error::JoinFailed { .. } => 3,
            Error::NotReady { .. } => 4,
            Error::Config(_) | Error::InvalidConfig { .. } => 5,
            Error::PromptCancelled => 6,
            _ => 1,
        }
    }
}
