//! inventoryst: command-line front end and platform connectors.
//!
//! Everything between a connector's page map and the files on disk lives in
//! `inventoryst-core`; this crate adds the CLI, configuration loading, the
//! shared HTTP client and the built-in connectors.

pub mod cli;
pub mod connectors;
pub mod http;
pub mod load_config;
pub mod markdown;

pub use cli::{run, Cli, Commands, Outcome};
