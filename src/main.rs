use std::path::PathBuf;
use std::process::ExitCode;

use certrelay_lib::config::DEFAULT_CONFIG_PATH;
use certrelay_lib::{init_logging, run_from_config, Dependencies, RenewConfig};

#[tokio::main]
async fn main() -> ExitCode {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    // Logging is not up yet, so configuration errors go to stderr
    let config = match RenewConfig::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{}", e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = init_logging(config.log_dir.as_deref()) {
        eprintln!("failed to initialize logging: {}", e);
        return ExitCode::FAILURE;
    }
    tracing::info!(path = %config_path.display(), "Loaded configuration");

    match run_from_config(&config, &Dependencies::production()).await {
        Ok(summary) => {
            tracing::info!(cycles = summary.cycles, "certrelay finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(error = %e, "certrelay failed");
            ExitCode::FAILURE
        }
    }
}
