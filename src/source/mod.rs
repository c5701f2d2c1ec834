// src/source/mod.rs

//! Source enumeration.
//!
//! A scan lists the regular files of the watched directory (non-recursive),
//! applies the [`SourceFilter`] and returns them as [`Source`]s in path
//! order. Scans are read-only; identifiers are derived later when the
//! supervisor plans the job set, so an unusable name only drops that one
//! source instead of failing the scan.

pub mod filter;
pub mod identifier;

use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, trace};

use crate::errors::{Result, StreamvisorError};

pub use filter::SourceFilter;
pub use identifier::{derive_identifier, Identifier};

/// One discovered input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub path: PathBuf,
    pub discovered_at: SystemTime,
}

impl Source {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            discovered_at: SystemTime::now(),
        }
    }

    /// Base name of the source as text (lossy for non-UTF-8 names).
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Identifier this source maps to.
    pub fn identifier(&self) -> Result<Identifier> {
        derive_identifier(&self.file_name())
    }
}

/// Scan `dir` with the default filter (all non-hidden regular files).
pub fn scan(dir: &Path) -> Result<Vec<Source>> {
    scan_with(dir, &SourceFilter::default())
}

/// Scan `dir`, keeping the regular files accepted by `filter`.
///
/// Fails with [`StreamvisorError::Io`] when the directory itself cannot be
/// read. Entries whose metadata cannot be read (e.g. dangling symlinks) are
/// skipped. Symlinks are followed, so a link to a regular file counts as one.
pub fn scan_with(dir: &Path, filter: &SourceFilter) -> Result<Vec<Source>> {
    let entries = fs::read_dir(dir).map_err(|e| StreamvisorError::io(dir, e))?;
    let discovered_at = SystemTime::now();
    let mut sources = Vec::new();

    for entry in entries {
        let entry = entry.map_err(|e| StreamvisorError::io(dir, e))?;
        let path = entry.path();

        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) => {
                debug!(path = ?path, error = %e, "skipping unreadable entry");
                continue;
            }
        };

        if !metadata.is_file() {
            trace!(path = ?path, "skipping non-regular entry");
            continue;
        }

        let name = entry.file_name().to_string_lossy().into_owned();
        if !filter.accepts(&name) {
            trace!(path = ?path, "entry rejected by source filter");
            continue;
        }

        sources.push(Source {
            path,
            discovered_at,
        });
    }

    sources.sort_by(|a, b| a.path.cmp(&b.path));
    debug!(dir = ?dir, count = sources.len(), "scanned source directory");
    Ok(sources)
}
