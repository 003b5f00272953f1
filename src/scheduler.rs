//! Renewal runner: drives repeated renewal cycles
//!
//! A cycle runs every job strictly one after another; a failing job is logged
//! and the next one still runs. Between cycles the runner waits for either the
//! next tick or a close request. Close requests are only observed between
//! cycles, so a job already in progress always finishes.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

use crate::renewal::RenewalJob;

/// Outcome of a single renewal cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleReport {
    pub succeeded: Vec<String>,
    /// (cert_name, error message)
    pub failed: Vec<(String, String)>,
}

impl CycleReport {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Cloneable handle that asks a running [`Runner`] to stop
#[derive(Clone)]
pub struct ShutdownHandle {
    tx: Arc<watch::Sender<bool>>,
}

impl ShutdownHandle {
    pub fn close(&self) {
        // send_replace works with or without active receivers
        self.tx.send_replace(true);
    }

    pub fn is_closed(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Owns the renewal jobs and runs them once or on a fixed interval
pub struct Runner {
    interval: Option<Duration>,
    jobs: Vec<RenewalJob>,
    shutdown: ShutdownHandle,
}

impl Runner {
    /// `interval` of `None` or zero means run a single cycle
    pub fn new(interval: Option<Duration>, jobs: Vec<RenewalJob>) -> Self {
        let (tx, _rx) = watch::channel(false);
        Self {
            interval: interval.filter(|d| !d.is_zero()),
            jobs,
            shutdown: ShutdownHandle { tx: Arc::new(tx) },
        }
    }

    pub fn interval(&self) -> Option<Duration> {
        self.interval
    }

    pub fn is_continuous(&self) -> bool {
        self.interval.is_some()
    }

    pub fn jobs(&self) -> &[RenewalJob] {
        &self.jobs
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        self.shutdown.clone()
    }

    /// Request the loop to stop at the next cycle boundary
    pub fn close(&self) {
        self.shutdown.close();
    }

    /// Run every job once, in order, isolating failures per job
    pub async fn run_cycle(&self) -> CycleReport {
        let mut report = CycleReport::default();

        for job in &self.jobs {
            let cert_name = job.cert_name();
            tracing::info!(cert_name = %cert_name, "Renew cert begin");
            match job.run().await {
                Ok(()) => {
                    tracing::info!(cert_name = %cert_name, "Renew cert finished");
                    report.succeeded.push(cert_name.to_string());
                }
                Err(e) => {
                    tracing::error!(cert_name = %cert_name, error = %e, "Renew cert failed");
                    report.failed.push((cert_name.to_string(), e.to_string()));
                }
            }
        }

        report
    }

    /// Run cycles until closed, or a single cycle in run-once mode.
    ///
    /// Returns the number of cycles started.
    pub async fn run(&self) -> usize {
        let Some(period) = self.interval else {
            tracing::info!(jobs = self.jobs.len(), "Running renewal cycle once");
            if self.shutdown.is_closed() {
                return 0;
            }
            self.run_cycle().await;
            return 1;
        };

        tracing::info!(
            jobs = self.jobs.len(),
            interval = %humantime::format_duration(period),
            "Renewal runner started"
        );

        let mut shutdown = self.shutdown.tx.subscribe();
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cycles = 0;

        loop {
            if *shutdown.borrow_and_update() {
                break;
            }

            tokio::select! {
                biased;
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow_and_update() {
                        break;
                    }
                    continue;
                }
                _ = ticker.tick() => {}
            }

            // The tick may have raced a close request
            if *shutdown.borrow() {
                break;
            }

            cycles += 1;
            tracing::debug!(cycle = cycles, "Renewal cycle begin");
            let report = self.run_cycle().await;
            tracing::debug!(
                cycle = cycles,
                succeeded = report.succeeded.len(),
                failed = report.failed.len(),
                "Renewal cycle end"
            );
        }

        tracing::info!(cycles, "Renewal runner stopped");
        cycles
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::Mutex;

    use tempfile::NamedTempFile;

    use crate::config::{IssuanceConfig, RenewalJobConfig};
    use crate::mocks::{DeployLog, RecordedCommandRunner, RecordingTarget};
    use crate::registry::DeployRegistry;
    use crate::traits::DeployError;

    struct Fixture {
        _chain: NamedTempFile,
        _key: NamedTempFile,
        issuance: IssuanceConfig,
        log: DeployLog,
    }

    impl Fixture {
        fn new() -> Self {
            let mut chain = NamedTempFile::new().unwrap();
            writeln!(chain, "CHAIN").unwrap();
            let mut key = NamedTempFile::new().unwrap();
            writeln!(key, "KEY").unwrap();
            let issuance = IssuanceConfig {
                command: None,
                args: vec![],
                chain_path: chain.path().display().to_string(),
                key_path: key.path().display().to_string(),
            };
            Self {
                _chain: chain,
                _key: key,
                issuance,
                log: Arc::new(Mutex::new(Vec::new())),
            }
        }

        fn job(&self, cert_name: &str, registry: &Arc<DeployRegistry>, targets: &[&str]) -> RenewalJob {
            RenewalJob::new(
                RenewalJobConfig::new(cert_name, targets.iter().map(|t| t.to_string()).collect()),
                self.issuance.clone(),
                registry.clone(),
                Arc::new(RecordedCommandRunner::new()),
            )
        }

        fn deployed_certs(&self) -> Vec<String> {
            self.log.lock().unwrap().iter().map(|r| r.cert_name.clone()).collect()
        }
    }

    #[tokio::test]
    async fn test_failing_job_does_not_block_others() {
        let fx = Fixture::new();
        let mut registry = DeployRegistry::new();
        registry.register("ok", Arc::new(RecordingTarget::with_log("ok", fx.log.clone()))).unwrap();
        registry
            .register(
                "broken",
                Arc::new(
                    RecordingTarget::with_log("broken", fx.log.clone())
                        .failing(DeployError::RemoteApi("HTTP 500".into())),
                ),
            )
            .unwrap();
        let registry = Arc::new(registry);

        let runner = Runner::new(
            None,
            vec![
                fx.job("a.example.com", &registry, &["broken"]),
                fx.job("b.example.com", &registry, &["missing"]),
                fx.job("c.example.com", &registry, &["ok"]),
            ],
        );

        let report = runner.run_cycle().await;

        assert_eq!(report.succeeded, vec!["c.example.com"]);
        assert_eq!(report.failed.len(), 2);
        assert_eq!(report.failed[0].0, "a.example.com");
        assert_eq!(report.failed[1].0, "b.example.com");
        assert!(report.failed[1].1.contains("missing"));
        assert!(!report.is_success());
        assert_eq!(fx.deployed_certs(), vec!["a.example.com", "c.example.com"]);
    }

    #[tokio::test]
    async fn test_run_once_mode() {
        let fx = Fixture::new();
        let mut registry = DeployRegistry::new();
        registry.register("ok", Arc::new(RecordingTarget::with_log("ok", fx.log.clone()))).unwrap();
        let registry = Arc::new(registry);

        let runner = Runner::new(Some(Duration::ZERO), vec![fx.job("example.com", &registry, &["ok"])]);
        assert!(!runner.is_continuous());

        assert_eq!(runner.run().await, 1);
        assert_eq!(fx.deployed_certs(), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_close_before_run_starts_no_cycle() {
        let fx = Fixture::new();
        let mut registry = DeployRegistry::new();
        registry.register("ok", Arc::new(RecordingTarget::with_log("ok", fx.log.clone()))).unwrap();
        let registry = Arc::new(registry);

        let runner = Runner::new(
            Some(Duration::from_secs(3600)),
            vec![fx.job("example.com", &registry, &["ok"])],
        );
        runner.close();

        assert_eq!(runner.run().await, 0);
        assert!(fx.deployed_certs().is_empty());
    }

    #[tokio::test]
    async fn test_close_between_ticks_stops_without_extra_cycle() {
        let fx = Fixture::new();
        let mut registry = DeployRegistry::new();
        registry.register("ok", Arc::new(RecordingTarget::with_log("ok", fx.log.clone()))).unwrap();
        let registry = Arc::new(registry);

        let runner = Arc::new(Runner::new(
            Some(Duration::from_secs(3600)),
            vec![fx.job("example.com", &registry, &["ok"])],
        ));
        let handle = runner.shutdown_handle();

        let task = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run().await }
        });

        // First tick fires immediately; let that cycle finish, then close while waiting
        tokio::time::sleep(Duration::from_millis(100)).await;
        handle.close();

        let cycles = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("runner should stop promptly")
            .unwrap();
        assert_eq!(cycles, 1);
        assert_eq!(fx.deployed_certs(), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_close_during_cycle_lets_job_finish() {
        let fx = Fixture::new();
        let mut registry = DeployRegistry::new();
        registry
            .register(
                "slow",
                Arc::new(
                    RecordingTarget::with_log("slow", fx.log.clone()).slow(Duration::from_millis(300)),
                ),
            )
            .unwrap();
        let registry = Arc::new(registry);

        let runner = Arc::new(Runner::new(
            Some(Duration::from_secs(3600)),
            vec![fx.job("example.com", &registry, &["slow"])],
        ));
        let handle = runner.shutdown_handle();

        let task = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run().await }
        });

        // Close while the slow target is still running
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.close();
        assert!(fx.deployed_certs().is_empty());

        let cycles = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .expect("runner should stop after the cycle")
            .unwrap();
        assert_eq!(cycles, 1);
        assert_eq!(fx.deployed_certs(), vec!["example.com"]);
    }

    #[tokio::test]
    async fn test_short_interval_runs_repeatedly() {
        let fx = Fixture::new();
        let mut registry = DeployRegistry::new();
        registry.register("ok", Arc::new(RecordingTarget::with_log("ok", fx.log.clone()))).unwrap();
        let registry = Arc::new(registry);

        let runner = Arc::new(Runner::new(
            Some(Duration::from_millis(20)),
            vec![fx.job("example.com", &registry, &["ok"])],
        ));
        let handle = runner.shutdown_handle();
        let task = tokio::spawn({
            let runner = runner.clone();
            async move { runner.run().await }
        });

        tokio::time::sleep(Duration::from_millis(150)).await;
        handle.close();
        let cycles = task.await.unwrap();

        assert!(cycles >= 2, "expected several cycles, got {}", cycles);
        assert_eq!(fx.deployed_certs().len(), cycles);
    }
}
