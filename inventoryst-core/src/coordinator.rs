//! Run Coordinator: drives the configured jobs one after another.
//!
//! For each job id, in order:
//!   - build the connector from the registry
//!   - let it produce its page map
//!   - publish the pages
//!   - record duration, memory delta and API calls
//!
//! A failing job is logged with its full error chain and skipped; the other
//! jobs still run. A panic inside a connector counts as a failed job. Only fatal publish errors (missing output root, directory
//! creation failure) abort the run. There are no retries at this layer.
//!
//! # Navigation
//! - Main entrypoint: [`Coordinator::run`]
//! - Supporting types: [`RunSummary`], [`JobMetrics`], [`JobState`]

use std::any::Any;
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};

use futures::FutureExt;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::config::{self, JobSettings};
use crate::contract::Connector;
use crate::memory;
use crate::publish::{PublishError, Publisher};
use crate::registry::ConnectorRegistry;

/// Lifecycle of a single job within one run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Pending,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }
}

/// Metrics recorded for every job, failed or not.
#[derive(Debug, Clone, PartialEq)]
pub struct JobMetrics {
    pub job: String,
    pub state: JobState,
    pub api_calls: u64,
    pub pages_changed: usize,
    pub duration: Duration,
    pub memory_delta: Option<i64>,
}

/// Result of one inventory run.
#[derive(Debug, Clone, Default)]
pub struct RunSummary {
    pub requested: Vec<String>,
    pub processed: Vec<String>,
    pub failed: Vec<String>,
    pub pages_changed: usize,
    pub metrics: Vec<JobMetrics>,
}

impl RunSummary {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn metrics_for(&self, job: &str) -> Option<&JobMetrics> {
        self.metrics.iter().find(|m| m.job == job)
    }
}

/// Run-aborting failure.
#[derive(Debug)]
pub enum RunError {
    Publish { job: Option<String>, source: PublishError },
}

impl fmt::Display for RunError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunError::Publish { job: Some(job), source } => {
                write!(f, "run aborted while publishing job '{job}': {source}")
            }
            RunError::Publish { job: None, source } => write!(f, "run aborted: {source}"),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            RunError::Publish { source, .. } => Some(source),
        }
    }
}

pub struct Coordinator<'a> {
    registry: &'a ConnectorRegistry,
    publisher: &'a Publisher,
    settings: &'a BTreeMap<String, JobSettings>,
}

enum JobOutcome {
    Succeeded { pages_changed: usize },
    Failed,
}

impl<'a> Coordinator<'a> {
    pub fn new(
        registry: &'a ConnectorRegistry,
        publisher: &'a Publisher,
        settings: &'a BTreeMap<String, JobSettings>,
    ) -> Self {
        Self {
            registry,
            publisher,
            settings,
        }
    }

    /// Runs `job_ids` sequentially in the given order.
    pub async fn run(&self, job_ids: &[String]) -> Result<RunSummary, RunError> {
        self.publisher.validate_root().map_err(|source| {
            error!(error = %source, "Output directory unusable, aborting run");
            RunError::Publish { job: None, source }
        })?;

        let mut summary = RunSummary::default();
        let mut seen = HashSet::new();
        for job in job_ids {
            if !seen.insert(job.as_str()) {
                warn!(job = %job, "Job requested more than once, ignoring repeat");
                continue;
            }
            summary.requested.push(job.clone());
        }
        info!(jobs = ?summary.requested, "Starting inventory run");

        for job in summary.requested.clone() {
            let metrics = self
                .run_job(&job)
                .instrument(info_span!("job", job = %job))
                .await?;
            match metrics.state {
                JobState::Succeeded => {
                    summary.processed.push(job.clone());
                    summary.pages_changed += metrics.pages_changed;
                }
                _ => summary.failed.push(job.clone()),
            }
            summary.metrics.push(metrics);
        }

        info!(
            requested = summary.requested.len(),
            processed = summary.processed.len(),
            failed = summary.failed.len(),
            pages_changed = summary.pages_changed,
            "Inventory run finished"
        );
        debug!(metrics = ?summary.metrics, "Per-job metrics");
        Ok(summary)
    }

    async fn run_job(&self, job: &str) -> Result<JobMetrics, RunError> {
        let mut state = JobState::Pending;
        debug!(?state, "Job registered");

        let started = Instant::now();
        let memory_before = memory::resident_bytes();
        state = transition(state, JobState::Running);

        let settings = config::settings_in(self.settings, job);
        let created = catch_unwind(AssertUnwindSafe(|| self.registry.create(job, &settings)));
        let (outcome, api_calls) = match created {
            Ok(Ok(connector)) => {
                let outcome = self.produce_and_publish(job, connector.as_ref()).await?;
                (outcome, connector.api_call_count())
            }
            Ok(Err(e)) => {
                log_failure(job, "Could not construct connector", &e);
                (JobOutcome::Failed, 0)
            }
            Err(payload) => {
                log_panic(job, "Connector panicked during construction", payload.as_ref());
                (JobOutcome::Failed, 0)
            }
        };

        let (final_state, pages_changed) = match outcome {
            JobOutcome::Succeeded { pages_changed } => (JobState::Succeeded, pages_changed),
            JobOutcome::Failed => (JobState::Failed, 0),
        };
        state = transition(state, final_state);

        let metrics = JobMetrics {
            job: job.to_string(),
            state,
            api_calls,
            pages_changed,
            duration: started.elapsed(),
            memory_delta: memory::delta(memory_before, memory::resident_bytes()),
        };
        info!(
            state = ?metrics.state,
            api_calls = metrics.api_calls,
            pages_changed = metrics.pages_changed,
            duration_ms = metrics.duration.as_millis() as u64,
            memory_delta = ?metrics.memory_delta,
            "Job finished"
        );
        Ok(metrics)
    }

    async fn produce_and_publish(
        &self,
        job: &str,
        connector: &dyn Connector,
    ) -> Result<JobOutcome, RunError> {
        let produced = AssertUnwindSafe(async { connector.produce_pages().await })
            .catch_unwind()
            .await;
        let pages = match produced {
            Ok(Ok(pages)) => pages,
            Ok(Err(e)) => {
                log_failure(job, "Connector failed", &*e);
                return Ok(JobOutcome::Failed);
            }
            Err(payload) => {
                log_panic(job, "Connector panicked", payload.as_ref());
                return Ok(JobOutcome::Failed);
            }
        };
        info!(pages = pages.len(), "Connector produced pages");

        match self.publisher.publish(&pages) {
            Ok(report) => Ok(JobOutcome::Succeeded {
                pages_changed: report.written(),
            }),
            Err(e) if e.is_fatal() => {
                error!(error = %e, "Fatal publish error, aborting run");
                Err(RunError::Publish {
                    job: Some(job.to_string()),
                    source: e,
                })
            }
            Err(e) => {
                log_failure(job, "Publishing failed", &e);
                Ok(JobOutcome::Failed)
            }
        }
    }
}

fn transition(from: JobState, to: JobState) -> JobState {
    debug_assert!(!from.is_terminal(), "job re-entered after {from:?}");
    debug!(?from, ?to, "Job state change");
    to
}

fn log_failure(job: &str, what: &str, err: &(dyn std::error::Error + 'static)) {
    let mut chain = Vec::new();
    let mut cause = err.source();
    while let Some(inner) = cause {
        chain.push(inner.to_string());
        cause = inner.source();
    }
    error!(job = %job, error = %err, debug = ?err, causes = ?chain, "{what}");
}

fn log_panic(job: &str, what: &str, payload: &(dyn Any + Send)) {
    error!(job = %job, panic = panic_message(payload), "{what}");
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    payload
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| payload.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("non-string panic payload")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(!JobState::Pending.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Succeeded.is_terminal());
        assert!(JobState::Failed.is_terminal());
    }

    #[test]
    fn panic_payloads_are_readable() {
        let literal = std::panic::catch_unwind(|| panic!("boom")).unwrap_err();
        assert_eq!(panic_message(literal.as_ref()), "boom");

        let formatted = std::panic::catch_unwind(|| panic!("index {} out of bounds", 3)).unwrap_err();
        assert_eq!(panic_message(formatted.as_ref()), "index 3 out of bounds");

        let opaque = std::panic::catch_unwind(|| std::panic::panic_any(7_u8)).unwrap_err();
        assert_eq!(panic_message(opaque.as_ref()), "non-string panic payload");
    }

    #[test]
    fn summary_reports_failures() {
        let mut summary = RunSummary::default();
        assert!(summary.all_succeeded());
        summary.failed.push("netlify".into());
        assert!(!summary.all_succeeded());
    }
}
