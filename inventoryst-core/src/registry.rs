//! Fixed table from job id to connector factory.
//!
//! Connectors are registered once at startup; nothing is resolved from
//! arbitrary names at run time.

use std::collections::BTreeMap;
use std::fmt;

use crate::config::JobSettings;
use crate::contract::{Connector, ConnectorError};

/// Builds a connector from its settings section.
pub type ConnectorFactory =
    Box<dyn Fn(&JobSettings) -> Result<Box<dyn Connector>, ConnectorError> + Send + Sync>;

#[derive(Debug)]
pub enum RegistryError {
    UnknownJob(String),
    Construction { job: String, source: ConnectorError },
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegistryError::UnknownJob(job) => write!(f, "no connector registered for job '{job}'"),
            RegistryError::Construction { job, source } => {
                write!(f, "failed to construct connector for job '{job}': {source}")
            }
        }
    }
}

impl std::error::Error for RegistryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RegistryError::Construction { source, .. } => Some(source.as_ref()),
            RegistryError::UnknownJob(_) => None,
        }
    }
}

#[derive(Default)]
pub struct ConnectorRegistry {
    factories: BTreeMap<String, ConnectorFactory>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `factory` under `job`, replacing any previous entry.
    pub fn register<F>(&mut self, job: impl Into<String>, factory: F)
    where
        F: Fn(&JobSettings) -> Result<Box<dyn Connector>, ConnectorError> + Send + Sync + 'static,
    {
        self.factories.insert(job.into(), Box::new(factory));
    }

    pub fn contains(&self, job: &str) -> bool {
        self.factories.contains_key(job)
    }

    /// Registered job ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        self.factories.keys().map(String::as_str).collect()
    }

    pub fn create(
        &self,
        job: &str,
        settings: &JobSettings,
    ) -> Result<Box<dyn Connector>, RegistryError> {
        let factory = self
            .factories
            .get(job)
            .ok_or_else(|| RegistryError::UnknownJob(job.to_string()))?;
        factory(settings).map_err(|source| RegistryError::Construction {
            job: job.to_string(),
            source,
        })
    }
}

impl fmt::Debug for ConnectorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectorRegistry")
            .field("jobs", &self.ids())
            .finish()
    }
}
