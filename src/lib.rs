//! CertRelay - Renew TLS certificates and push them to their deploy targets
//!
//! This library provides the renewal pipeline, organized around trait-based
//! dependency injection for testability: deploy targets, the remote CDN API
//! and subprocess execution all sit behind traits in [`traits`].

pub mod config;
pub mod error;
pub mod mocks;
pub mod privilege;
pub mod production;
pub mod registry;
pub mod renewal;
pub mod scheduler;
pub mod state;
pub mod targets;
pub mod traits;

use std::path::Path;

use tracing_appender::rolling;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::RenewConfig;
pub use error::RenewError;
pub use registry::{DeployRegistry, RegistryError};
pub use renewal::RenewalJob;
pub use scheduler::{CycleReport, Runner, ShutdownHandle};
pub use state::{build_runner, Dependencies};

/// Initialize logging to stdout, plus a daily rolling file when `log_dir` is set
pub fn init_logging(log_dir: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "certrelay=info,certrelay_lib=info".into()),
    );

    let file_layer = match log_dir {
        Some(dir) => {
            std::fs::create_dir_all(dir)?;
            let file_appender = rolling::daily(dir, "certrelay.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            // Keep guard alive for the process lifetime
            std::mem::forget(guard);
            Some(
                tracing_subscriber::fmt::layer()
                    .with_writer(non_blocking)
                    .with_ansi(false),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer()) // stdout
        .with(file_layer)
        .try_init()?;

    Ok(())
}

/// Compose the runner from `config` and drive it until done or closed by Ctrl-C.
///
/// Continuous mode requires root; run-once mode does not.
pub async fn run_from_config(
    config: &RenewConfig,
    deps: &Dependencies,
) -> Result<CycleSummary, RenewError> {
    let runner = build_runner(config, deps)?;

    if runner.is_continuous() {
        privilege::ensure_elevated()?;
    }
    tracing::info!(user = %privilege::current_user(), "certrelay is running");

    let shutdown = runner.shutdown_handle();
    let ctrl_c = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("Shutdown requested");
            shutdown.close();
        }
    });

    let cycles = runner.run().await;
    ctrl_c.abort();

    Ok(CycleSummary { cycles })
}

/// What [`run_from_config`] did before returning
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CycleSummary {
    pub cycles: usize,
}
