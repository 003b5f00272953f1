//! Deploy Registry - name-keyed collection of deploy targets
//!
//! Built once at startup from configuration, then only read. Renewal jobs resolve
//! their target names through it at run time, so a dangling name fails the
//! individual renewal rather than startup.

use std::collections::HashMap;
use std::sync::Arc;

use crate::traits::DeployTarget;

/// Error types for DeployRegistry operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Deploy target already registered: {0}")]
    DuplicateName(String),
    #[error("Deploy target not found: {0}")]
    UnknownName(String),
}

/// Registry of deploy targets keyed by configured name
#[derive(Default)]
pub struct DeployRegistry {
    targets: HashMap<String, Arc<dyn DeployTarget>>,
}

impl DeployRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a target under `name`, refusing to replace an existing entry
    pub fn register(
        &mut self,
        name: impl Into<String>,
        target: Arc<dyn DeployTarget>,
    ) -> Result<(), RegistryError> {
        let name = name.into();
        if self.targets.contains_key(&name) {
            return Err(RegistryError::DuplicateName(name));
        }
        tracing::debug!(name = %name, target_type = %target.target_type(), "Registered deploy target");
        self.targets.insert(name, target);
        Ok(())
    }

    /// Look up a target by name
    pub fn resolve(&self, name: &str) -> Result<Arc<dyn DeployTarget>, RegistryError> {
        self.targets
            .get(name)
            .cloned()
            .ok_or_else(|| RegistryError::UnknownName(name.to_string()))
    }

    /// List all registered targets: (name, target_type), sorted by name
    pub fn list(&self) -> Vec<(String, String)> {
        let mut entries: Vec<_> = self
            .targets
            .iter()
            .map(|(name, t)| (name.clone(), t.target_type().to_string()))
            .collect();
        entries.sort();
        entries
    }

    pub fn len(&self) -> usize {
        self.targets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
