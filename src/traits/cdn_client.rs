//! Remote certificate-management API trait

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CdnError {
    #[error("Network error: {0}")]
    Network(String),
    #[error("HTTP error {status}: {body}")]
    Http { status: u16, body: String },
    #[error("Decode error: {0}")]
    Decode(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Client configuration error: {0}")]
    Configuration(String),
}

/// A certificate record as stored by the remote service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteCertificate {
    #[serde(rename = "certid")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(rename = "ca", default)]
    pub chain: String,
    #[serde(rename = "pri", default)]
    pub private_key: String,
}

/// Payload for uploading a new certificate record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewCertificate {
    pub name: String,
    pub common_name: String,
    #[serde(rename = "ca")]
    pub chain: String,
    #[serde(rename = "pri")]
    pub private_key: String,
}

/// Trait for the remote CDN certificate API
///
/// Production: QBox-signed reqwest client
/// Testing: In-memory certificate store with recorded calls
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CdnApi: Send + Sync {
    /// Ids of every certificate currently stored remotely
    async fn list_certificates(&self) -> Result<Vec<String>, CdnError>;

    /// Full record for a single certificate
    async fn get_certificate(&self, id: &str) -> Result<RemoteCertificate, CdnError>;

    /// Upload a certificate, returning the id assigned by the service
    async fn add_certificate(&self, cert: &NewCertificate) -> Result<String, CdnError>;

    /// Point a domain at a certificate
    async fn bind_certificate(
        &self,
        domain: &str,
        cert_id: &str,
        force_https: bool,
    ) -> Result<(), CdnError>;
}
