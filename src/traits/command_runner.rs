//! Subprocess execution trait

use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum CommandError {
    #[error("Failed to start {program}: {message}")]
    Spawn { program: String, message: String },
    #[error("{program} exited with status {code:?}: {stderr}")]
    NonZeroExit {
        program: String,
        code: Option<i32>,
        stderr: String,
    },
}

/// Trait for running external commands whose exit code is the only signal
///
/// Production: tokio::process
/// Testing: Recorded invocations with scripted exit results
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run `program` with `args` to completion
    async fn run(&self, program: &str, args: &[String]) -> Result<(), CommandError>;
}
