//! Platform connectors shipped with the binary.
//!
//! Each connector fetches typed payloads through [`crate::http::ApiClient`] and
//! hands them to pure `render_*` functions, so page layout is testable without
//! network access.

pub mod dockerhub;
pub mod netlify;
pub mod readthedocs;

use inventoryst_core::contract::Connector;
use inventoryst_core::registry::ConnectorRegistry;

/// Registry with every built-in connector.
pub fn registry() -> ConnectorRegistry {
    let mut registry = ConnectorRegistry::new();
    registry.register(netlify::JOB_ID, |settings| {
        Ok(Box::new(netlify::Netlify::from_settings(settings)?) as Box<dyn Connector>)
    });
    registry.register(readthedocs::JOB_ID, |settings| {
        Ok(Box::new(readthedocs::ReadTheDocs::from_settings(settings)?) as Box<dyn Connector>)
    });
    registry.register(dockerhub::JOB_ID, |settings| {
        Ok(Box::new(dockerhub::DockerHub::from_settings(settings)?) as Box<dyn Connector>)
    });
    registry
}
