//! Remote CDN certificate-sync target
//!
//! Makes a CDN serve the renewed certificate on a fixed list of domains without
//! piling up duplicate certificate records across runs:
//!
//! 1. List the remote certificate ids and fetch each record in turn.
//! 2. If a record already holds exactly this chain and key, stop: nothing to do.
//! 3. Otherwise upload the pair under `<prefix><YYYYmmddHHMMSS>`.
//! 4. Rebind every configured domain to the new id, in order.
//!
//! Upload and rebinding are not atomic. If a binding fails, the uploaded record
//! stays behind and the domains bound so far keep pointing at it.

use std::sync::Arc;

use chrono::{DateTime, Local};

use crate::config::RemoteCdnConfig;
use crate::traits::{CdnApi, CertificateMaterial, DeployError, DeployTarget, NewCertificate};

const UPLOAD_NAME_FORMAT: &str = "%Y%m%d%H%M%S";

/// What a single sync run ended up doing
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncOutcome {
    /// A remote record already matched; nothing was changed
    AlreadyPresent { cert_id: String },
    /// A new record was uploaded and bound to every domain
    Uploaded { cert_id: String, name: String },
}

/// A deploy target backed by a remote certificate-management API
pub struct RemoteCdnTarget {
    name: String,
    domains: Vec<String>,
    name_prefix: String,
    client: Arc<dyn CdnApi>,
}

impl RemoteCdnTarget {
    pub fn new(name: String, config: &RemoteCdnConfig, client: Arc<dyn CdnApi>) -> Self {
        Self {
            name,
            domains: config.domains.clone(),
            name_prefix: config.name_prefix.clone(),
            client,
        }
    }

    /// Record name for an upload made at `now`
    pub fn upload_name(&self, now: DateTime<Local>) -> String {
        format!("{}{}", self.name_prefix, now.format(UPLOAD_NAME_FORMAT))
    }

    /// Id of the first remote record whose chain and key equal `material`
    async fn find_existing(&self, material: &CertificateMaterial) -> Result<Option<String>, DeployError> {
        let ids = self.client.list_certificates().await?;
        tracing::debug!(target = %self.name, count = ids.len(), "Listed remote certificates");

        for id in ids {
            let record = self.client.get_certificate(&id).await?;
            if record.chain == material.chain && record.private_key == material.private_key {
                return Ok(Some(record.id));
            }
        }
        Ok(None)
    }

    /// Run the sync and report whether anything was uploaded
    pub async fn sync(
        &self,
        cert_name: &str,
        material: &CertificateMaterial,
        now: DateTime<Local>,
    ) -> Result<SyncOutcome, DeployError> {
        if let Some(cert_id) = self.find_existing(material).await? {
            tracing::info!(
                target = %self.name,
                cert_name = %cert_name,
                cert_id = %cert_id,
                "Certificate already present on CDN, skipping upload"
            );
            return Ok(SyncOutcome::AlreadyPresent { cert_id });
        }

        let name = self.upload_name(now);
        let cert_id = self
            .client
            .add_certificate(&NewCertificate {
                name: name.clone(),
                common_name: cert_name.to_string(),
                chain: material.chain.clone(),
                private_key: material.private_key.clone(),
            })
            .await?;
        tracing::debug!(target = %self.name, cert_id = %cert_id, name = %name, "Uploaded certificate");

        for domain in &self.domains {
            if let Err(e) = self.client.bind_certificate(domain, &cert_id, true).await {
                tracing::warn!(
                    target = %self.name,
                    domain = %domain,
                    cert_id = %cert_id,
                    error = %e,
                    "Domain rebinding failed; uploaded certificate left in place"
                );
                return Err(e.into());
            }
            tracing::info!(target = %self.name, domain = %domain, cert_id = %cert_id, "Domain rebound");
        }

        Ok(SyncOutcome::Uploaded { cert_id, name })
    }
}

#[async_trait::async_trait]
impl DeployTarget for RemoteCdnTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_type(&self) -> &str {
        "remote-cdn"
    }

    async fn run(&self, cert_name: &str, material: &CertificateMaterial) -> Result<(), DeployError> {
        self.sync(cert_name, material, Local::now()).await.map(|_| ())
    }
}
