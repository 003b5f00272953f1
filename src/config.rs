//! JSON configuration document for renewal jobs and deploy targets

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::RenewError;

pub const DEFAULT_CONFIG_PATH: &str = "./conf.json";

const DEFAULT_CHAIN_PATH: &str = "/etc/nginx/ssl/cert.pem";
const DEFAULT_KEY_PATH: &str = "/etc/nginx/ssl/key.pem";
const CERT_NAME_PLACEHOLDER: &str = "{cert_name}";

/// Top-level configuration document
#[derive(Debug, Clone, Deserialize)]
pub struct RenewConfig {
    /// Tick period; `None` or zero means run once
    #[serde(default, deserialize_with = "deserialize_interval")]
    pub interval: Option<Duration>,
    #[serde(default)]
    pub log_dir: Option<PathBuf>,
    #[serde(default)]
    pub issuance: IssuanceConfig,
    /// Deploy definitions, kept raw until the `type` header is inspected
    #[serde(default)]
    pub deploy: Vec<serde_json::Value>,
    #[serde(default)]
    pub renew: Vec<RenewalJobConfig>,
}

impl RenewConfig {
    pub fn load(path: &Path) -> Result<Self, RenewError> {
        let data = std::fs::read_to_string(path).map_err(|e| {
            RenewError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self, RenewError> {
        serde_json::from_str(data).map_err(|e| RenewError::Configuration(e.to_string()))
    }

    /// Interval to wait between cycles, if the runner should loop at all
    pub fn tick_period(&self) -> Option<Duration> {
        self.interval.filter(|d| !d.is_zero())
    }
}

fn deserialize_interval<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.trim().is_empty() => Ok(None),
        Some(s) => humantime::parse_duration(s.trim())
            .map(Some)
            .map_err(|e| serde::de::Error::custom(format!("invalid interval {:?}: {}", s, e))),
    }
}

/// How certificates are issued and where the result lands on disk
#[derive(Debug, Clone, Deserialize)]
pub struct IssuanceConfig {
    /// Issuance executable; `null` skips the subprocess and reads existing files
    #[serde(default = "default_issuance_command")]
    pub command: Option<String>,
    /// Arguments placed before the certificate name
    #[serde(default = "default_issuance_args")]
    pub args: Vec<String>,
    #[serde(default = "default_chain_path")]
    pub chain_path: String,
    #[serde(default = "default_key_path")]
    pub key_path: String,
}

impl Default for IssuanceConfig {
    fn default() -> Self {
        Self {
            command: default_issuance_command(),
            args: default_issuance_args(),
            chain_path: default_chain_path(),
            key_path: default_key_path(),
        }
    }
}

fn default_issuance_command() -> Option<String> {
    Some("certbot".to_string())
}

fn default_issuance_args() -> Vec<String> {
    vec!["renew".to_string(), "--cert-name".to_string()]
}

fn default_chain_path() -> String {
    DEFAULT_CHAIN_PATH.to_string()
}

fn default_key_path() -> String {
    DEFAULT_KEY_PATH.to_string()
}

/// One certificate's renewal unit
#[derive(Debug, Clone, Deserialize)]
pub struct RenewalJobConfig {
    pub cert_name: String,
    /// Deploy target names, invoked in this order
    #[serde(default)]
    pub deploy: Vec<String>,
    #[serde(default)]
    pub chain_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
}

impl RenewalJobConfig {
    pub fn new(cert_name: impl Into<String>, deploy: Vec<String>) -> Self {
        Self {
            cert_name: cert_name.into(),
            deploy,
            chain_path: None,
            key_path: None,
        }
    }

    /// Chain file for this job, with `{cert_name}` expanded
    pub fn chain_path(&self, issuance: &IssuanceConfig) -> PathBuf {
        let template = self.chain_path.as_deref().unwrap_or(&issuance.chain_path);
        PathBuf::from(template.replace(CERT_NAME_PLACEHOLDER, &self.cert_name))
    }

    /// Private key file for this job, with `{cert_name}` expanded
    pub fn key_path(&self, issuance: &IssuanceConfig) -> PathBuf {
        let template = self.key_path.as_deref().unwrap_or(&issuance.key_path);
        PathBuf::from(template.replace(CERT_NAME_PLACEHOLDER, &self.cert_name))
    }
}

/// The `{name, type}` header shared by every deploy definition
#[derive(Debug, Clone, Deserialize)]
pub struct DeployHeader {
    pub name: String,
    #[serde(rename = "type")]
    pub target_type: String,
}

/// Settings for the local web-server reload target
#[derive(Debug, Clone, Deserialize)]
pub struct NginxConfig {
    pub address: String,
    #[serde(default = "default_service")]
    pub service: String,
    #[serde(default = "default_action")]
    pub action: String,
}

fn default_service() -> String {
    "nginx".to_string()
}

fn default_action() -> String {
    "restart".to_string()
}

/// Settings for the remote CDN certificate-sync target
#[derive(Clone, Deserialize)]
pub struct RemoteCdnConfig {
    #[serde(alias = "access_token")]
    pub access_key: String,
    #[serde(alias = "access_secret", alias = "access_secert")]
    pub secret_key: String,
    #[serde(default)]
    pub domains: Vec<String>,
    #[serde(default = "default_api_base")]
    pub api_base: String,
    #[serde(default = "default_name_prefix")]
    pub name_prefix: String,
}

impl std::fmt::Debug for RemoteCdnConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteCdnConfig")
            .field("access_key", &self.access_key)
            .field("secret_key", &"<REDACTED>")
            .field("domains", &self.domains)
            .field("api_base", &self.api_base)
            .field("name_prefix", &self.name_prefix)
            .finish()
    }
}

fn default_api_base() -> String {
    "https://api.qiniu.com".to_string()
}

fn default_name_prefix() -> String {
    "qiniu_".to_string()
}
