//! Publisher: writes a job's pages under the output root, touching only the
//! files whose content actually changed.
//!
//! # Responsibilities
//! - Validate that the configured output root exists (fatal when it does not)
//! - Create intermediate directories on demand (fatal when that fails)
//! - Fingerprint each page without its `modified` stamp and compare it with
//!   the file on disk
//! - Write changed pages through a temporary file in the same directory,
//!   renamed into place, so readers never observe a torn file
//!
//! Pages are independent; no write order is guaranteed.

use std::fmt;
use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};

use chrono::NaiveDate;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::fingerprint;
use crate::normalize;
use crate::page::{Page, PageMap};

/// Outcome of publishing one page map.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PublishReport {
    pub created: Vec<String>,
    pub updated: Vec<String>,
    pub unchanged: Vec<String>,
}

impl PublishReport {
    /// Number of files written (created + updated).
    pub fn written(&self) -> usize {
        self.created.len() + self.updated.len()
    }
}

#[derive(Debug)]
pub enum PublishError {
    /// The configured output root is missing or not a directory.
    MissingOutputRoot(PathBuf),
    /// A page's parent directory could not be created.
    CreateDir { path: PathBuf, source: io::Error },
    /// A page path escapes the output root or is otherwise unusable.
    InvalidPath(String),
    /// Writing a page failed.
    Write { path: PathBuf, source: io::Error },
}

impl PublishError {
    /// Fatal errors abort the whole run; the rest only fail the current job.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PublishError::MissingOutputRoot(_) | PublishError::CreateDir { .. }
        )
    }
}

impl fmt::Display for PublishError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PublishError::MissingOutputRoot(path) => write!(
                f,
                "the output directory '{}' does not exist",
                path.display()
            ),
            PublishError::CreateDir { path, source } => write!(
                f,
                "failed to create directory '{}': {source}",
                path.display()
            ),
            PublishError::InvalidPath(page) => write!(f, "invalid page path '{page}'"),
            PublishError::Write { path, source } => {
                write!(f, "failed to write page '{}': {source}", path.display())
            }
        }
    }
}

impl std::error::Error for PublishError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PublishError::CreateDir { source, .. } | PublishError::Write { source, .. } => {
                Some(source)
            }
            _ => None,
        }
    }
}

/// Writes pages under a single output root, stamping them with the run date.
#[derive(Debug, Clone)]
pub struct Publisher {
    output_root: PathBuf,
    run_date: NaiveDate,
}

impl Publisher {
    pub fn new(output_root: impl Into<PathBuf>, run_date: NaiveDate) -> Self {
        Self {
            output_root: output_root.into(),
            run_date,
        }
    }

    pub fn output_root(&self) -> &Path {
        &self.output_root
    }

    pub fn run_date(&self) -> NaiveDate {
        self.run_date
    }

    /// Fails when the output root does not exist. The root is never created.
    pub fn validate_root(&self) -> Result<(), PublishError> {
        if self.output_root.is_dir() {
            Ok(())
        } else {
            Err(PublishError::MissingOutputRoot(self.output_root.clone()))
        }
    }

    /// Publishes every page in `pages`, writing only those that changed.
    pub fn publish(&self, pages: &PageMap) -> Result<PublishReport, PublishError> {
        self.validate_root()?;

        let mut report = PublishReport::default();
        for (page_path, page) in pages {
            debug!(page = %page_path, "Publishing page");
            let outcome = self.publish_page(page_path, page)?;
            match outcome {
                PageOutcome::Created => report.created.push(page_path.clone()),
                PageOutcome::Updated => report.updated.push(page_path.clone()),
                PageOutcome::Unchanged => report.unchanged.push(page_path.clone()),
            }
        }

        info!(
            created = report.created.len(),
            updated = report.updated.len(),
            unchanged = report.unchanged.len(),
            "Published page map"
        );
        Ok(report)
    }

    fn publish_page(&self, page_path: &str, page: &Page) -> Result<PageOutcome, PublishError> {
        let target = self.resolve(page_path)?;

        if let Some(parent) = target.parent() {
            if !parent.is_dir() {
                fs::create_dir_all(parent).map_err(|source| PublishError::CreateDir {
                    path: parent.to_path_buf(),
                    source,
                })?;
                debug!(path = %parent.display(), "Created page directory");
            }
        }

        let stamped = page.stamped(self.run_date);
        let fresh = normalize::render(&stamped.properties, &stamped.body_lines, false);

        let existed = target.exists();
        let existing = if existed { read_existing(&target) } else { None };
        if let Some(content) = existing.as_deref() {
            debug!(
                page = %page_path,
                old_hash = %fingerprint::fingerprint_existing(content),
                new_hash = %fingerprint::digest(&fresh),
                "Compared fingerprints"
            );
        }

        if !fingerprint::needs_write(existing.as_deref(), &fresh) {
            debug!(page = %page_path, "No changes for page");
            return Ok(PageOutcome::Unchanged);
        }

        let full = normalize::render(&stamped.properties, &stamped.body_lines, true);
        write_atomic(&target, &full).map_err(|source| PublishError::Write {
            path: target.clone(),
            source,
        })?;

        if existed {
            info!(page = %page_path, "Page content changed, updated");
            Ok(PageOutcome::Updated)
        } else {
            info!(page = %page_path, "Page created");
            Ok(PageOutcome::Created)
        }
    }

    /// Joins a slash-separated relative page path onto the output root.
    fn resolve(&self, page_path: &str) -> Result<PathBuf, PublishError> {
        let relative = Path::new(page_path);
        let is_plain = !page_path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        if !is_plain {
            return Err(PublishError::InvalidPath(page_path.to_string()));
        }
        Ok(self.output_root.join(relative))
    }
}

enum PageOutcome {
    Created,
    Updated,
    Unchanged,
}

// An unreadable file is treated as absent so that it gets rewritten.
fn read_existing(path: &Path) -> Option<String> {
    match fs::read_to_string(path) {
        Ok(content) => Some(content),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Existing page unreadable, rewriting it");
            None
        }
    }
}

fn write_atomic(target: &Path, content: &str) -> io::Result<()> {
    let dir = target.parent().unwrap_or_else(|| Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(target).map_err(|e| e.error)?;
    Ok(())
}
