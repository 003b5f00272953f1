//! Top-level error type for renewal runs and startup composition

use thiserror::Error;

use crate::registry::RegistryError;
use crate::traits::DeployError;

#[derive(Debug, Error)]
pub enum RenewError {
    #[error("Configuration error: {0}")]
    Configuration(String),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error("Permission error: {0}")]
    Permission(String),
    #[error("Issuance failed: {0}")]
    Issuance(String),
    #[error("Cannot read certificate material {path}: {message}")]
    Material { path: String, message: String },
    #[error("Deploy {target} failed: {source}")]
    Deploy {
        target: String,
        #[source]
        source: DeployError,
    },
}

impl RenewError {
    /// Whether this error belongs to startup composition rather than a renewal run
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            RenewError::Configuration(_)
                | RenewError::Registry(_)
                | RenewError::Deploy {
                    source: DeployError::UnsupportedConfiguration(_),
                    ..
                }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deploy_error_message_names_target() {
        let err = RenewError::Deploy {
            target: "cdn".to_string(),
            source: DeployError::RemoteApi("HTTP error 500: boom".to_string()),
        };
        assert_eq!(
            err.to_string(),
            "Deploy cdn failed: Remote API error: HTTP error 500: boom"
        );
    }

    #[test]
    fn test_configuration_classification() {
        assert!(RenewError::Configuration("x".into()).is_configuration());
        assert!(RenewError::from(RegistryError::DuplicateName("a".into())).is_configuration());
        assert!(!RenewError::Issuance("exit 1".into()).is_configuration());
        assert!(!RenewError::Permission("uid 1000".into()).is_configuration());
    }
}
