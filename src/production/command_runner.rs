//! tokio::process-based command runner

use std::process::Stdio;
use tokio::process::Command;
use crate::traits::{CommandError, CommandRunner};

pub struct TokioCommandRunner;

impl TokioCommandRunner {
    pub fn new() -> Self {
        Self
    }
}

impl Default for TokioCommandRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl CommandRunner for TokioCommandRunner {
    async fn run(&self, program: &str, args: &[String]) -> Result<(), CommandError> {
        tracing::debug!(program = %program, args = ?args, "Running command");

        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|e| CommandError::Spawn {
                program: program.to_string(),
                message: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::warn!(program = %program, status = ?output.status.code(), "Command failed");
            return Err(CommandError::NonZeroExit {
                program: program.to_string(),
                code: output.status.code(),
                stderr,
            });
        }

        Ok(())
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_successful_command() {
        let runner = TokioCommandRunner::new();
        runner.run("true", &[]).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_zero_exit() {
        let runner = TokioCommandRunner::new();
        let err = runner.run("false", &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::NonZeroExit { code: Some(1), .. }));
    }

    #[tokio::test]
    async fn test_stderr_captured() {
        let runner = TokioCommandRunner::new();
        let args = vec!["-c".to_string(), "echo broken >&2; exit 3".to_string()];
        match runner.run("sh", &args).await {
            Err(CommandError::NonZeroExit { code, stderr, .. }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr, "broken");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_missing_program() {
        let runner = TokioCommandRunner::new();
        let err = runner.run("certrelay-no-such-binary", &[]).await.unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
