//! Startup composition: configuration -> registry -> jobs -> runner

use std::sync::Arc;

use crate::config::{DeployHeader, NginxConfig, RemoteCdnConfig, RenewConfig};
use crate::error::RenewError;
use crate::production::{QiniuCdnClient, TokioCommandRunner};
use crate::registry::DeployRegistry;
use crate::renewal::RenewalJob;
use crate::scheduler::Runner;
use crate::targets::{NginxReloadTarget, RemoteCdnTarget};
use crate::traits::{CdnApi, CdnClientFactory, CdnError, CommandRunner, DeployTarget};

/// External capabilities the composed runner depends on
#[derive(Clone)]
pub struct Dependencies {
    pub commands: Arc<dyn CommandRunner>,
    pub cdn_clients: CdnClientFactory,
}

impl Dependencies {
    /// Subprocesses via tokio::process, CDN calls via the signed Qiniu client
    pub fn production() -> Self {
        let cdn_clients: CdnClientFactory = Arc::new(
            |config: &RemoteCdnConfig| -> Result<Arc<dyn CdnApi>, CdnError> {
                Ok(Arc::new(QiniuCdnClient::new(config)?))
            },
        );
        Self {
            commands: Arc::new(TokioCommandRunner::new()),
            cdn_clients,
        }
    }
}

fn parse_section<T: serde::de::DeserializeOwned>(
    name: &str,
    raw: &serde_json::Value,
) -> Result<T, RenewError> {
    serde_json::from_value(raw.clone())
        .map_err(|e| RenewError::Configuration(format!("deploy {}: {}", name, e)))
}

/// Build one deploy target from its raw definition.
///
/// Returns `Ok(None)` for an unrecognised `type`.
fn build_target(
    header: &DeployHeader,
    raw: &serde_json::Value,
    deps: &Dependencies,
) -> Result<Option<Arc<dyn DeployTarget>>, RenewError> {
    let target: Arc<dyn DeployTarget> = match header.target_type.as_str() {
        "nginx" => {
            let config: NginxConfig = parse_section(&header.name, raw)?;
            let target = NginxReloadTarget::new(header.name.clone(), &config, deps.commands.clone())
                .map_err(|source| RenewError::Deploy {
                    target: header.name.clone(),
                    source,
                })?;
            Arc::new(target)
        }
        "remote-cdn" | "qiniu" => {
            let config: RemoteCdnConfig = parse_section(&header.name, raw)?;
            let client = (deps.cdn_clients)(&config).map_err(|e| {
                RenewError::Configuration(format!("deploy {}: {}", header.name, e))
            })?;
            Arc::new(RemoteCdnTarget::new(header.name.clone(), &config, client))
        }
        _ => return Ok(None),
    };
    Ok(Some(target))
}

/// Build the deploy registry from the raw `deploy` definitions
pub fn build_registry(config: &RenewConfig, deps: &Dependencies) -> Result<DeployRegistry, RenewError> {
    let mut registry = DeployRegistry::new();

    for raw in &config.deploy {
        let header: DeployHeader = serde_json::from_value(raw.clone())
            .map_err(|e| RenewError::Configuration(format!("deploy entry: {}", e)))?;

        match build_target(&header, raw, deps)? {
            Some(target) => {
                registry.register(header.name.clone(), target)?;
                tracing::info!(name = %header.name, target_type = %header.target_type, "Deploy target configured");
            }
            None => tracing::warn!(
                name = %header.name,
                target_type = %header.target_type,
                "Unknown deploy type, skipping"
            ),
        }
    }

    Ok(registry)
}

/// Compose the full runner from configuration
pub fn build_runner(config: &RenewConfig, deps: &Dependencies) -> Result<Runner, RenewError> {
    let registry = Arc::new(build_registry(config, deps)?);

    let jobs = config
        .renew
        .iter()
        .map(|job| {
            RenewalJob::new(
                job.clone(),
                config.issuance.clone(),
                registry.clone(),
                deps.commands.clone(),
            )
        })
        .collect::<Vec<_>>();

    tracing::info!(
        targets = registry.len(),
        jobs = jobs.len(),
        "Renewal runner composed"
    );
    Ok(Runner::new(config.tick_period(), jobs))
}
