// src/errors.rs

//! Crate-wide error type and `Result` alias.
//!
//! Per-job errors (`Spawn`, `RuntimeExit`, `ShutdownTimeout`) never abort the
//! supervisor; they are attached to the job's status instead. Only `Io` and
//! `DuplicateIdentifier` affect a whole reconcile pass, and even then the
//! previous job set is kept.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum StreamvisorError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error reading {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid source name {0:?}: nothing left after sanitizing")]
    InvalidName(String),

    #[error("Duplicate identifier '{id}': {first:?} and {second:?} map to the same stream")]
    DuplicateIdentifier {
        id: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Failed to spawn transcoder for job '{id}': {source}")]
    Spawn {
        id: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Transcoder for job '{id}' exited unexpectedly ({status}){}", detail_suffix(.detail))]
    RuntimeExit {
        id: String,
        status: String,
        detail: Option<String>,
    },

    #[error("Job '{id}' ignored termination for {timeout:?}; process was killed")]
    ShutdownTimeout { id: String, timeout: Duration },

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

fn detail_suffix(detail: &Option<String>) -> String {
    match detail {
        Some(d) => format!(": {d}"),
        None => String::new(),
    }
}

impl StreamvisorError {
    /// Convenience constructor for directory/file IO failures.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        StreamvisorError::Io {
            path: path.into(),
            source,
        }
    }

    pub fn is_shutdown_timeout(&self) -> bool {
        matches!(self, StreamvisorError::ShutdownTimeout { .. })
    }
}

pub type Result<T> = std::result::Result<T, StreamvisorError>;
