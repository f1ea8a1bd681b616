//! `load_config`: reads the YAML run configuration into the core [`Config`].
//!
//! ```yaml
//! output_dir: /srv/wiki/inventory   # optional, see below
//! jobs: [netlify, readthedocs]
//! platforms:
//!   netlify:
//!     team: acme
//!     user_inactive_days: 30
//! ```
//!
//! The output directory resolves as: `OUTPUT_DIRECTORY` from the environment,
//! then `output_dir` from the file, then [`DEFAULT_OUTPUT_DIR`]. Secrets are not
//! expected in the file; connectors fall back to `<JOB>_<KEY>` variables.
//!
//! All failures are `anyhow` errors surfaced at the CLI boundary.

use anyhow::{Context, Result};
use inventoryst_core::config::{Config, JobSettings};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{error, info};

pub const OUTPUT_DIR_ENV: &str = "OUTPUT_DIRECTORY";
pub const DEFAULT_OUTPUT_DIR: &str = "/app/output";

#[derive(Debug, Deserialize)]
struct RawConfig {
    #[serde(default)]
    output_dir: Option<PathBuf>,
    #[serde(default)]
    jobs: Option<Vec<String>>,
    #[serde(default)]
    platforms: Option<BTreeMap<String, JobSettings>>,
}

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let path_ref = path.as_ref();
    info!(config_path = ?path_ref, "Loading configuration from file");

    let content = fs::read_to_string(path_ref)
        .map_err(|e| {
            error!(error = ?e, config_path = ?path_ref, "Failed to read config file");
            e
        })
        .with_context(|| format!("Failed to read config file {}", path_ref.display()))?;

    let config = parse_config(&content, std::env::var(OUTPUT_DIR_ENV).ok())?;
    info!(config_path = ?path_ref, "Parsed config YAML successfully");
    Ok(config)
}

/// Parses YAML content; `output_dir_env` is the value of `OUTPUT_DIRECTORY`, if set.
pub fn parse_config(content: &str, output_dir_env: Option<String>) -> Result<Config> {
    // An empty file is a valid, empty configuration.
    let raw: RawConfig = if content.trim().is_empty() {
        RawConfig {
            output_dir: None,
            jobs: None,
            platforms: None,
        }
    } else {
        serde_yaml::from_str(content).map_err(|e| {
            error!(error = ?e, "Failed to parse config YAML");
            anyhow::anyhow!("Failed to parse config YAML: {e}")
        })?
    };

    let output_dir = output_dir_env
        .filter(|dir| !dir.trim().is_empty())
        .map(PathBuf::from)
        .or(raw.output_dir)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));

    Ok(Config {
        output_dir,
        jobs: raw.jobs.unwrap_or_default(),
        platforms: raw.platforms.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn environment_overrides_file_which_overrides_default() {
        let yaml = "output_dir: /from/file\n";
        assert_eq!(
            parse_config(yaml, Some("/from/env".into())).unwrap().output_dir,
            PathBuf::from("/from/env")
        );
        assert_eq!(
            parse_config(yaml, None).unwrap().output_dir,
            PathBuf::from("/from/file")
        );
        assert_eq!(
            parse_config("jobs: []\n", None).unwrap().output_dir,
            PathBuf::from(DEFAULT_OUTPUT_DIR)
        );
        assert_eq!(
            parse_config(yaml, Some("  ".into())).unwrap().output_dir,
            PathBuf::from("/from/file")
        );
    }

    #[test]
    fn empty_file_is_an_empty_configuration() {
        let config = parse_config("", None).unwrap();
        assert!(config.jobs.is_empty());
        assert!(config.platforms.is_empty());
    }
}
