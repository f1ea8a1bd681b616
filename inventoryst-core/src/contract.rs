//! # contract: the interface between platform connectors and the core
//!
//! A connector enumerates one platform (Netlify, Read the Docs, ...) and hands
//! back a [`PageMap`]. The core never looks inside a connector; it only needs
//! the pages and the number of outbound API calls made while producing them.
//!
//! ## Mocking & Testing
//! - The trait is annotated for `mockall`, so tests can script connector
//!   behaviour (`MockConnector`) without any network access.
//! - Mocks are exported behind the default `test-export-mocks` feature so the
//!   CLI crate's tests can use them too.

use async_trait::async_trait;

use mockall::automock;

use crate::page::PageMap;

/// Error type for connectors (boxed, so each connector keeps its own errors).
pub type ConnectorError = Box<dyn std::error::Error + Send + Sync>;

/// A platform connector: one job in an inventory run.
#[cfg_attr(any(test, feature = "test-export-mocks"), automock)]
#[async_trait]
pub trait Connector: Send + Sync {
    /// Enumerate the platform and render its report pages.
    async fn produce_pages(&self) -> Result<PageMap, ConnectorError>;

    /// Outbound API requests made so far.
    fn api_call_count(&self) -> u64;
}
