#![doc = "inventoryst-core: core logic library for inventoryst."]

//! This crate holds everything between a platform connector and the files on
//! disk: the page model, the normalizer, change detection, the incremental
//! publisher and the run coordinator. It makes no network calls itself;
//! connectors live in the `inventoryst` crate.
//!
//! # Usage
//! Implement [`contract::Connector`], register it in a
//! [`registry::ConnectorRegistry`] and hand both to a
//! [`coordinator::Coordinator`] together with a [`publish::Publisher`].

pub mod config;
pub mod contract;
pub mod coordinator;
pub mod fingerprint;
pub mod memory;
pub mod normalize;
pub mod page;
pub mod publish;
pub mod registry;
