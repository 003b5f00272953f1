//! Local nginx reload target
//!
//! Restarts the local web server through the service manager. The server picks up
//! the renewed files from its own configured paths, so nothing is passed through.
//! Command: `service <service> <action>`

use std::sync::Arc;

use crate::config::NginxConfig;
use crate::traits::{CertificateMaterial, CommandRunner, DeployError, DeployTarget};

const SERVICE_PROGRAM: &str = "service";
const LOOPBACK_ADDRESSES: [&str; 2] = ["127.0.0.1", "localhost"];

/// A deploy target that reloads a web server on this host
pub struct NginxReloadTarget {
    name: String,
    service: String,
    action: String,
    runner: Arc<dyn CommandRunner>,
}

impl NginxReloadTarget {
    /// Create a reload target; only loopback addresses are accepted
    pub fn new(
        name: String,
        config: &NginxConfig,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, DeployError> {
        if !LOOPBACK_ADDRESSES.contains(&config.address.as_str()) {
            return Err(DeployError::UnsupportedConfiguration(format!(
                "nginx target {} only supports localhost, got {}",
                name, config.address
            )));
        }

        Ok(Self {
            name,
            service: config.service.clone(),
            action: config.action.clone(),
            runner,
        })
    }

    fn command_args(&self) -> Vec<String> {
        vec![self.service.clone(), self.action.clone()]
    }
}

#[async_trait::async_trait]
impl DeployTarget for NginxReloadTarget {
    fn name(&self) -> &str {
        &self.name
    }

    fn target_type(&self) -> &str {
        "nginx"
    }

    async fn run(&self, cert_name: &str, _material: &CertificateMaterial) -> Result<(), DeployError> {
        tracing::info!(
            target = %self.name,
            cert_name = %cert_name,
            service = %self.service,
            action = %self.action,
            "Reloading local web server"
        );
        self.runner.run(SERVICE_PROGRAM, &self.command_args()).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::{CommandError, MockCommandRunner};
    use mockall::predicate::eq;

    fn config(address: &str) -> NginxConfig {
        NginxConfig {
            address: address.to_string(),
            service: "nginx".to_string(),
            action: "restart".to_string(),
        }
    }

    fn material() -> CertificateMaterial {
        CertificateMaterial::new("CHAIN", "KEY")
    }

    #[test]
    fn loopback_addresses_accepted() {
        for address in ["127.0.0.1", "localhost"] {
            let target = NginxReloadTarget::new(
                "local".to_string(),
                &config(address),
                Arc::new(MockCommandRunner::new()),
            );
            assert!(target.is_ok(), "{} should be accepted", address);
        }
    }

    #[test]
    fn remote_address_rejected() {
        let result = NginxReloadTarget::new(
            "local".to_string(),
            &config("10.0.0.5"),
            Arc::new(MockCommandRunner::new()),
        );
        assert!(matches!(result, Err(DeployError::UnsupportedConfiguration(_))));
    }

    #[tokio::test]
    async fn run_restarts_service() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .with(eq("service"), eq(vec!["nginx".to_string(), "restart".to_string()]))
            .times(1)
            .returning(|_, _| Ok(()));

        let target =
            NginxReloadTarget::new("local".to_string(), &config("127.0.0.1"), Arc::new(runner))
                .unwrap();
        target.run("example.com", &material()).await.unwrap();
    }

    #[tokio::test]
    async fn run_uses_configured_action() {
        let mut runner = MockCommandRunner::new();
        runner
            .expect_run()
            .withf(|program, args| program == "service" && args == ["openresty", "reload"])
            .times(1)
            .returning(|_, _| Ok(()));

        let cfg = NginxConfig {
            address: "localhost".to_string(),
            service: "openresty".to_string(),
            action: "reload".to_string(),
        };
        let target = NginxReloadTarget::new("local".to_string(), &cfg, Arc::new(runner)).unwrap();
        target.run("example.com", &material()).await.unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_process_error() {
        let mut runner = MockCommandRunner::new();
        runner.expect_run().times(1).returning(|program, _| {
            Err(CommandError::NonZeroExit {
                program: program.to_string(),
                code: Some(1),
                stderr: "Job for nginx.service failed".to_string(),
            })
        });

        let target =
            NginxReloadTarget::new("local".to_string(), &config("127.0.0.1"), Arc::new(runner))
                .unwrap();
        let err = target.run("example.com", &material()).await.unwrap_err();
        assert!(matches!(err, DeployError::ProcessExecution(_)));
    }
}
