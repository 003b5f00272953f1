//! Trait definitions for dependency injection
//!
//! All external dependencies are abstracted behind traits to enable testing.

use std::sync::Arc;

mod cdn_client;
mod command_runner;
mod deploy_target;

pub use cdn_client::{CdnApi, CdnError, NewCertificate, RemoteCertificate};
pub use command_runner::{CommandError, CommandRunner};
pub use deploy_target::{CertificateMaterial, DeployError, DeployTarget};

#[cfg(test)]
pub use cdn_client::MockCdnApi;
#[cfg(test)]
pub use command_runner::MockCommandRunner;

use crate::config::RemoteCdnConfig;

/// Builds a remote API client from a `remote-cdn` deploy definition
pub type CdnClientFactory =
    Arc<dyn Fn(&RemoteCdnConfig) -> Result<Arc<dyn CdnApi>, CdnError> + Send + Sync>;
