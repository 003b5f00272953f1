//! Test doubles for dependency injection
//!
//! Provides in-memory implementations of all external dependencies for isolated testing.

use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use async_trait::async_trait;

use crate::traits::{
    CdnApi, CdnError, NewCertificate, RemoteCertificate,
    CommandRunner, CommandError,
    CertificateMaterial, DeployError, DeployTarget,
};

// ============================================================================
// RecordedCdnClient
// ============================================================================

/// A call made against the in-memory CDN API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CdnCall {
    List,
    Get(String),
    Add { name: String },
    Bind { domain: String, cert_id: String, force_https: bool },
}

/// In-memory CDN certificate store for testing
///
/// Holds certificate records keyed by id, records every call, and can be told
/// to fail bindings for specific domains.
#[derive(Clone, Default)]
pub struct RecordedCdnClient {
    certs: Arc<Mutex<BTreeMap<String, RemoteCertificate>>>,
    bindings: Arc<Mutex<Vec<(String, String)>>>,
    calls: Arc<Mutex<Vec<CdnCall>>>,
    failing_domains: Arc<Mutex<HashSet<String>>>,
    fail_list: Arc<Mutex<Option<CdnError>>>,
    next_id: Arc<Mutex<usize>>,
}

impl RecordedCdnClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing remote record
    pub fn insert(&self, id: &str, chain: &str, private_key: &str) {
        self.certs.lock().unwrap().insert(
            id.to_string(),
            RemoteCertificate {
                id: id.to_string(),
                name: id.to_string(),
                chain: chain.to_string(),
                private_key: private_key.to_string(),
            },
        );
    }

    /// Make bindings for `domain` fail with an HTTP 500
    pub fn fail_binding_for(&self, domain: &str) {
        self.failing_domains.lock().unwrap().insert(domain.to_string());
    }

    /// Make listing fail with the given error
    pub fn fail_listing(&self, error: CdnError) {
        *self.fail_list.lock().unwrap() = Some(error);
    }

    pub fn stored(&self, id: &str) -> Option<RemoteCertificate> {
        self.certs.lock().unwrap().get(id).cloned()
    }

    pub fn certificate_count(&self) -> usize {
        self.certs.lock().unwrap().len()
    }

    /// Successful bindings as (domain, cert_id), in call order
    pub fn bindings(&self) -> Vec<(String, String)> {
        self.bindings.lock().unwrap().clone()
    }

    pub fn calls(&self) -> Vec<CdnCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn upload_count(&self) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| matches!(c, CdnCall::Add { .. }))
            .count()
    }

    fn record(&self, call: CdnCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl CdnApi for RecordedCdnClient {
    async fn list_certificates(&self) -> Result<Vec<String>, CdnError> {
        self.record(CdnCall::List);
        if let Some(error) = self.fail_list.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.certs.lock().unwrap().keys().cloned().collect())
    }

    async fn get_certificate(&self, id: &str) -> Result<RemoteCertificate, CdnError> {
        self.record(CdnCall::Get(id.to_string()));
        self.stored(id).ok_or_else(|| CdnError::Http {
            status: 404,
            body: format!("no such certificate {}", id),
        })
    }

    async fn add_certificate(&self, cert: &NewCertificate) -> Result<String, CdnError> {
        self.record(CdnCall::Add { name: cert.name.clone() });
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("uploaded-{}", *next)
        };
        self.certs.lock().unwrap().insert(
            id.clone(),
            RemoteCertificate {
                id: id.clone(),
                name: cert.name.clone(),
                chain: cert.chain.clone(),
                private_key: cert.private_key.clone(),
            },
        );
        Ok(id)
    }

    async fn bind_certificate(&self, domain: &str, cert_id: &str, force_https: bool) -> Result<(), CdnError> {
        self.record(CdnCall::Bind {
            domain: domain.to_string(),
            cert_id: cert_id.to_string(),
            force_https,
        });
        if self.failing_domains.lock().unwrap().contains(domain) {
            return Err(CdnError::Http {
                status: 500,
                body: format!("cannot update {}", domain),
            });
        }
        self.bindings
            .lock()
            .unwrap()
            .push((domain.to_string(), cert_id.to_string()));
        Ok(())
    }
}

// ============================================================================
// RecordedCommandRunner
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandInvocation {
    pub program: String,
    pub args: Vec<String>,
}

/// Command runner for testing
///
/// Records every invocation and fails any whose program is in the failing set.
#[derive(Clone, Default)]
pub struct RecordedCommandRunner {
    invocations: Arc<Mutex<Vec<CommandInvocation>>>,
    failing_programs: Arc<Mutex<HashSet<String>>>,
}

impl RecordedCommandRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every run of `program` exit with status 1
    pub fn fail_program(&self, program: &str) {
        self.failing_programs.lock().unwrap().insert(program.to_string());
    }

    pub fn invocations(&self) -> Vec<CommandInvocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.invocations.lock().unwrap().len()
    }
}

#[async_trait]
impl CommandRunner for RecordedCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), CommandError> {
        self.invocations.lock().unwrap().push(CommandInvocation {
            program: program.to_string(),
            args: args.to_vec(),
        });
        if self.failing_programs.lock().unwrap().contains(program) {
            return Err(CommandError::NonZeroExit {
                program: program.to_string(),
                code: Some(1),
                stderr: String::new(),
            });
        }
        Ok(())
    }
}

// ============================================================================
// RecordingTarget
// ============================================================================

/// One deploy invocation seen by a RecordingTarget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRecord {
    pub target: String,
    pub cert_name: String,
    pub material: CertificateMaterial,
}

/// Shared, ordered log of deploy invocations across several targets
pub type DeployLog = Arc<Mutex<Vec<DeployRecord>>>;

/// Deploy target for testing
///
/// Appends each invocation to a log (optionally shared between targets so call
/// order can be asserted), can be made to fail, and can be slowed down.
#[derive(Clone)]
pub struct RecordingTarget {
    name: String,
    log: DeployLog,
    failure: Arc<Mutex<Option<DeployError>>>,
    delay: Option<Duration>,
}

impl RecordingTarget {
    pub fn new(name: &str) -> Self {
        Self::with_log(name, Arc::new(Mutex::new(Vec::new())))
    }

    pub fn with_log(name: &str, log: DeployLog) -> Self {
        Self {
            name: name.to_string(),
            log,
            failure: Arc::new(Mutex::new(None)),
            delay: None,
        }
    }

    /// Fail every run with the given error
    pub fn failing(self, error: DeployError) -> Self {
        *self.failure.lock().unwrap() = Some(error);
        self
    }

    /// Sleep for `delay` before completing each run
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn records(&self) -> Vec<DeployRecord> {
        self.log
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.target == self.name)
            .cloned()
            .collect()
    }

    pub fn call_count(&self) -> usize {
        self.records().len()
    }
}

#[async_trait]
impl DeployTarget for RecordingTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_type(&self) -> &str {
        "recording"
    }

    async fn run(&self, cert_name: &str, material: &CertificateMaterial) -> Result<(), DeployError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.log.lock().unwrap().push(DeployRecord {
            target: self.name.clone(),
            cert_name: cert_name.to_string(),
            material: material.clone(),
        });
        match self.failure.lock().unwrap().clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cdn_client_assigns_ids_and_lists_them() {
        let client = RecordedCdnClient::new();
        client.insert("seeded", "C0", "K0");

        let id = client
            .add_certificate(&NewCertificate {
                name: "qiniu_1".to_string(),
                common_name: "example.com".to_string(),
                chain: "C1".to_string(),
                private_key: "K1".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(id, "uploaded-1");
        let ids = client.list_certificates().await.unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(client.get_certificate("uploaded-1").await.unwrap().chain, "C1");
        assert!(client.get_certificate("missing").await.is_err());
    }

    #[tokio::test]
    async fn test_cdn_client_listing_failure() {
        let client = RecordedCdnClient::new();
        client.fail_listing(CdnError::Network("connection refused".to_string()));
        assert!(matches!(client.list_certificates().await, Err(CdnError::Network(_))));
    }

    #[tokio::test]
    async fn test_command_runner_records_and_fails() {
        let runner = RecordedCommandRunner::new();
        runner.fail_program("certbot");

        runner.run("service", &["nginx".to_string(), "restart".to_string()]).await.unwrap();
        assert!(runner.run("certbot", &[]).await.is_err());

        assert_eq!(runner.call_count(), 2);
        assert_eq!(runner.invocations()[0].args, vec!["nginx", "restart"]);
    }

    #[tokio::test]
    async fn test_recording_targets_share_log() {
        let log: DeployLog = Arc::new(Mutex::new(Vec::new()));
        let a = RecordingTarget::with_log("a", log.clone());
        let b = RecordingTarget::with_log("b", log.clone())
            .failing(DeployError::RemoteApi("down".to_string()));
        let material = CertificateMaterial::new("C", "K");

        a.run("example.com", &material).await.unwrap();
        assert!(b.run("example.com", &material).await.is_err());

        assert_eq!(log.lock().unwrap().len(), 2);
        assert_eq!(a.call_count(), 1);
        assert_eq!(b.records()[0].cert_name, "example.com");
    }
}
