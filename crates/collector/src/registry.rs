//! Registry of configured source environments.
//!
//! The registry is the single source of truth for which environments exist
//! and how to reach them. It is read-only once built.

use crate::source::{self, AuditSource};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};
use trailpack_common::{Error, Result};
use trailpack_schema::EnvironmentDescriptor;

#[derive(Default)]
pub struct EnvironmentRegistry {
    environments: Vec<EnvironmentDescriptor>,
    sources: HashMap<String, Arc<dyn AuditSource>>,
}

impl EnvironmentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry, creating the transport for each descriptor.
    pub fn from_descriptors(descriptors: Vec<EnvironmentDescriptor>) -> Result<Self> {
        let mut registry = Self::new();
        for descriptor in descriptors {
            let transport = source::from_config(&descriptor.transport).map_err(|e| {
                Error::Config(format!("environment {}: {:#}", descriptor.id, e))
            })?;
            registry = registry.with_source(descriptor, Arc::from(transport))?;
        }
        info!("Registered {} environment(s)", registry.environments.len());
        Ok(registry)
    }

    /// Register an environment with an explicit transport.
    pub fn with_source(
        mut self,
        descriptor: EnvironmentDescriptor,
        source: Arc<dyn AuditSource>,
    ) -> Result<Self> {
        if descriptor.id.trim().is_empty() {
            return Err(Error::Config("environment id must not be empty".to_string()));
        }
        if self.sources.contains_key(&descriptor.id) {
            return Err(Error::Config(format!(
                "duplicate environment id: {}",
                descriptor.id
            )));
        }
        debug!("Environment {} -> {}", descriptor.id, source.describe());
        self.sources.insert(descriptor.id.clone(), source);
        self.environments.push(descriptor);
        Ok(self)
    }

    pub fn list_environments(&self) -> &[EnvironmentDescriptor] {
        &self.environments
    }

    pub fn get(&self, id: &str) -> Option<&EnvironmentDescriptor> {
        self.environments.iter().find(|e| e.id == id)
    }

    /// Ids of all active environments, in registration order.
    pub fn active_ids(&self) -> Vec<String> {
        self.environments
            .iter()
            .filter(|e| e.active)
            .map(|e| e.id.clone())
            .collect()
    }

    /// Transport for an active environment.
    pub fn source(&self, id: &str) -> Result<Arc<dyn AuditSource>> {
        let descriptor = self
            .get(id)
            .ok_or_else(|| Error::UnknownEnvironment(id.to_string()))?;
        if !descriptor.active {
            return Err(Error::SourceFetch {
                environment: id.to_string(),
                reason: "environment is inactive".to_string(),
            });
        }
        self.sources
            .get(id)
            .cloned()
            .ok_or_else(|| Error::UnknownEnvironment(id.to_string()))
    }

    /// Test connectivity. Inactive environments report `false`.
    pub async fn test_environment(&self, id: &str) -> Result<bool> {
        let descriptor = self
            .get(id)
            .ok_or_else(|| Error::UnknownEnvironment(id.to_string()))?;
        if !descriptor.active {
            return Ok(false);
        }
        match self.sources.get(id) {
            Some(source) => Ok(source.test().await),
            None => Err(Error::UnknownEnvironment(id.to_string())),
        }
    }
}
