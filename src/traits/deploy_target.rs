//! DeployTarget trait for certificate deployment destinations

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{CdnError, CommandError};

/// Errors that can occur when deploying certificate material to a target
#[derive(Debug, Clone, Error)]
pub enum DeployError {
    #[error("Unsupported configuration: {0}")]
    UnsupportedConfiguration(String),
    #[error("Process execution failed: {0}")]
    ProcessExecution(String),
    #[error("Remote API error: {0}")]
    RemoteApi(String),
}

impl From<CdnError> for DeployError {
    fn from(e: CdnError) -> Self {
        DeployError::RemoteApi(e.to_string())
    }
}

impl From<CommandError> for DeployError {
    fn from(e: CommandError) -> Self {
        DeployError::ProcessExecution(e.to_string())
    }
}

/// A renewed certificate chain and its private key, as PEM text.
///
/// The contents are never parsed; targets only compare and transport them.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertificateMaterial {
    pub chain: String,
    pub private_key: String,
}

impl CertificateMaterial {
    pub fn new(chain: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            chain: chain.into(),
            private_key: private_key.into(),
        }
    }
}

impl std::fmt::Debug for CertificateMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CertificateMaterial")
            .field("chain_len", &self.chain.len())
            .field("private_key", &"<REDACTED>")
            .finish()
    }
}

/// Trait that all deploy targets must implement
///
/// Production: local nginx reload, remote CDN certificate sync
/// Testing: Recording targets with scripted outcomes
#[async_trait::async_trait]
pub trait DeployTarget: Send + Sync {
    /// Name this target was registered under
    fn name(&self) -> &str;

    /// Target type identifier (e.g., "nginx")
    fn target_type(&self) -> &str;

    /// Push the renewed certificate to this target
    async fn run(&self, cert_name: &str, material: &CertificateMaterial) -> Result<(), DeployError>;
}
