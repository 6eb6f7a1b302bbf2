//! Live reload of a model file
//!
//! The reloader remembers the file's modification time and rebuilds the
//! whole document when it changes. A rebuild never reuses anything from the
//! previous one.

use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{info, warn};

use crate::document::{DocumentReport, ModelDocument};
use crate::driver::{self, DriverError};

/// What a poll observed
#[derive(Debug)]
pub enum ReloadEvent {
    /// Modification time unchanged since the last build
    Unchanged,
    /// The document was rebuilt and validated
    Rebuilt(DocumentReport),
    /// The rebuild failed; the previous document has been dropped
    Failed(DriverError),
    /// The file is gone; monitoring should stop
    FileGone,
}

/// Watches one model file
#[derive(Debug)]
pub struct Reloader {
    path: PathBuf,
    kernel: Option<String>,
    last_modified: Option<SystemTime>,
    document: Option<ModelDocument>,
}

impl Reloader {
    pub fn new(path: impl Into<PathBuf>, kernel: Option<&str>) -> Self {
        Self {
            path: path.into(),
            kernel: kernel.map(str::to_string),
            last_modified: None,
            document: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Last successfully built document
    pub fn document(&self) -> Option<&ModelDocument> {
        self.document.as_ref()
    }

    /// Check the file and rebuild if it changed
    ///
    /// The first poll always builds.
    pub fn poll(&mut self) -> ReloadEvent {
        let modified = match std::fs::metadata(&self.path).and_then(|m| m.modified()) {
            Ok(modified) => modified,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!(path = %self.path.display(), "model file removed, stopping");
                self.document = None;
                return ReloadEvent::FileGone;
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "cannot stat model file");
                return ReloadEvent::Unchanged;
            }
        };
        if self.last_modified == Some(modified) {
            return ReloadEvent::Unchanged;
        }
        self.last_modified = Some(modified);
        self.rebuild()
    }

    /// Rebuild unconditionally
    pub fn rebuild(&mut self) -> ReloadEvent {
        self.document = None;
        let built = driver::build_document(&self.path, self.kernel.as_deref())
            .and_then(|doc| driver::validate(&doc).map(|report| (doc, report)));
        match built {
            Ok((doc, report)) => {
                info!(model = %report.model, solids = report.solids.len(), "rebuilt");
                self.document = Some(doc);
                ReloadEvent::Rebuilt(report)
            }
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "rebuild failed");
                ReloadEvent::Failed(e)
            }
        }
    }
}
