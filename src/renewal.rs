//! Renewal job: issue one certificate and fan it out to its deploy targets
//!
//! Each run invokes the external issuance command, reads the chain and key it
//! left on disk, then calls the configured targets one at a time in order. The
//! first failing target stops the job; targets already run keep their effect.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::{IssuanceConfig, RenewalJobConfig};
use crate::error::RenewError;
use crate::registry::DeployRegistry;
use crate::traits::{CertificateMaterial, CommandRunner};

/// Drop a single trailing line terminator (`\n` or `\r\n`), nothing else
fn trim_line_terminator(mut bytes: Vec<u8>) -> Vec<u8> {
    if bytes.last() == Some(&b'\n') {
        bytes.pop();
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
    }
    bytes
}

async fn read_pem(path: &Path) -> Result<String, RenewError> {
    let material_error = |message: String| RenewError::Material {
        path: path.display().to_string(),
        message,
    };
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| material_error(e.to_string()))?;
    String::from_utf8(trim_line_terminator(bytes)).map_err(|e| material_error(e.to_string()))
}

/// Read the chain and key produced by the issuance step
pub async fn read_material(chain_path: &Path, key_path: &Path) -> Result<CertificateMaterial, RenewError> {
    let chain = read_pem(chain_path).await?;
    let private_key = read_pem(key_path).await?;
    Ok(CertificateMaterial { chain, private_key })
}

/// One certificate's renewal unit
pub struct RenewalJob {
    config: RenewalJobConfig,
    issuance: IssuanceConfig,
    registry: Arc<DeployRegistry>,
    commands: Arc<dyn CommandRunner>,
}

impl RenewalJob {
    pub fn new(
        config: RenewalJobConfig,
        issuance: IssuanceConfig,
        registry: Arc<DeployRegistry>,
        commands: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            config,
            issuance,
            registry,
            commands,
        }
    }

    pub fn cert_name(&self) -> &str {
        &self.config.cert_name
    }

    pub fn target_names(&self) -> &[String] {
        &self.config.deploy
    }

    pub fn chain_path(&self) -> PathBuf {
        self.config.chain_path(&self.issuance)
    }

    pub fn key_path(&self) -> PathBuf {
        self.config.key_path(&self.issuance)
    }

    async fn issue(&self) -> Result<(), RenewError> {
        let Some(program) = self.issuance.command.as_deref() else {
            tracing::debug!(cert_name = %self.cert_name(), "No issuance command configured, using files on disk");
            return Ok(());
        };

        let mut args = self.issuance.args.clone();
        args.push(self.config.cert_name.clone());

        tracing::info!(cert_name = %self.cert_name(), program = %program, "Issuing certificate");
        self.commands
            .run(program, &args)
            .await
            .map_err(|e| RenewError::Issuance(e.to_string()))
    }

    /// Run one renewal attempt
    pub async fn run(&self) -> Result<(), RenewError> {
        self.issue().await?;

        let material = read_material(&self.chain_path(), &self.key_path()).await?;
        let cert_name = self.cert_name();

        for target_name in &self.config.deploy {
            tracing::debug!(cert_name = %cert_name, target = %target_name, "Deploy begin");
            let target = self.registry.resolve(target_name)?;
            target
                .run(cert_name, &material)
                .await
                .map_err(|source| RenewError::Deploy {
                    target: target_name.clone(),
                    source,
                })?;
            tracing::debug!(cert_name = %cert_name, target = %target_name, "Deploy end");
        }

        Ok(())
    }
}
