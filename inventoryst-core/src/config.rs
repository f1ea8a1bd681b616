use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info};

/// Resolved run configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Root directory every page path is resolved against. Must already exist.
    pub output_dir: PathBuf,
    /// Jobs to run, in order.
    #[serde(default)]
    pub jobs: Vec<String>,
    /// Connector-specific settings keyed by job id.
    #[serde(default)]
    pub platforms: BTreeMap<String, JobSettings>,
}

impl Config {
    pub fn trace_loaded(&self) {
        info!(
            output_dir = %self.output_dir.display(),
            jobs_count = self.jobs.len(),
            jobs = ?self.jobs,
            "Loaded Config"
        );
        debug!(platforms = ?self.platforms.keys().collect::<Vec<_>>(), "Config loaded (platform sections)");
    }

    /// Settings for `job`, or an empty section when none were configured.
    pub fn settings_for(&self, job: &str) -> JobSettings {
        settings_in(&self.platforms, job)
    }
}

/// Section for `job` in `platforms`, or an empty section.
pub fn settings_in(platforms: &BTreeMap<String, JobSettings>, job: &str) -> JobSettings {
    platforms.get(job).cloned().unwrap_or_default()
}

/// Free-form settings section for one connector.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobSettings {
    values: Map<String, Value>,
}

// Sections may carry secrets; only the keys are printed.
impl fmt::Debug for JobSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobSettings")
            .field("keys", &self.values.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingSetting {
    pub key: String,
    pub env: Option<String>,
}

impl fmt::Display for MissingSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.env {
            Some(env) => write!(
                f,
                "setting '{}' not configured and environment variable '{}' not available",
                self.key, env
            ),
            None => write!(f, "setting '{}' not configured", self.key),
        }
    }
}

impl std::error::Error for MissingSetting {}

impl JobSettings {
    pub fn from_map(values: Map<String, Value>) -> Self {
        Self { values }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .and_then(Value::as_str)
            .filter(|value| !value.is_empty())
    }

    pub fn get_u64(&self, key: &str) -> Option<u64> {
        self.values.get(key).and_then(Value::as_u64)
    }

    pub fn get_str_list(&self, key: &str) -> Vec<String> {
        self.values
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn require_str(&self, key: &str) -> Result<&str, MissingSetting> {
        self.get_str(key).ok_or_else(|| MissingSetting {
            key: key.to_string(),
            env: None,
        })
    }

    /// Looks up a secret in the section, then in `<JOB>_<KEY>` from the environment.
    pub fn secret(&self, job: &str, key: &str) -> Result<String, MissingSetting> {
        if let Some(value) = self.get_str(key) {
            return Ok(value.to_string());
        }
        let env_name = secret_env_name(job, key);
        match std::env::var(&env_name) {
            Ok(value) if !value.is_empty() => Ok(value),
            _ => Err(MissingSetting {
                key: key.to_string(),
                env: Some(env_name),
            }),
        }
    }
}

/// Environment variable consulted for a job secret, e.g. `NETLIFY_API_KEY`.
pub fn secret_env_name(job: &str, key: &str) -> String {
    format!("{job}_{key}")
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}
