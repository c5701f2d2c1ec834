// src/job.rs

//! Job descriptors and job-set planning.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::path::PathBuf;

use tracing::warn;

use crate::errors::{Result, StreamvisorError};
use crate::source::{Identifier, Source};

/// Lowercased scheme of `url` (`rtsp`, `rtmp`, `srt`, ...), if it has one.
pub fn url_scheme(url: &str) -> Option<String> {
    match url.split_once("://") {
        Some((scheme, rest)) if !scheme.is_empty() && !rest.is_empty() => {
            Some(scheme.to_ascii_lowercase())
        }
        _ => None,
    }
}

/// Where a job's stream is published: `scheme://host:port[/prefix]/<identifier>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DestinationTemplate {
    base_url: String,
    prefix: Option<String>,
}

impl DestinationTemplate {
    /// Build a template from a base URL (`rtsp://mediamtx:8554`) and an
    /// optional path prefix (`live`, `channels/vod`).
    pub fn new(base_url: impl Into<String>, prefix: Option<String>) -> Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();

        if url_scheme(&base_url).is_none() {
            return Err(StreamvisorError::ConfigError(format!(
                "destination base url '{base_url}' must look like scheme://host:port"
            )));
        }

        let prefix = prefix
            .map(|p| p.trim_matches('/').to_string())
            .filter(|p| !p.is_empty());

        if let Some(p) = &prefix {
            let valid = p
                .split('/')
                .all(|seg| {
                    !seg.is_empty()
                        && seg
                            .chars()
                            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
                });
            if !valid {
                return Err(StreamvisorError::ConfigError(format!(
                    "destination prefix '{p}' may only contain [A-Za-z0-9_-] segments separated by '/'"
                )));
            }
        }

        Ok(Self { base_url, prefix })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn resolve(&self, id: &Identifier) -> String {
        match &self.prefix {
            Some(prefix) => format!("{}/{}/{}", self.base_url, prefix, id),
            None => format!("{}/{}", self.base_url, id),
        }
    }
}

/// One identifier bound to one source file and one destination URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    pub id: Identifier,
    pub source: PathBuf,
    pub destination: String,
}

impl Job {
    /// Scheme of the destination URL; picks the output container format.
    pub fn scheme(&self) -> Option<String> {
        url_scheme(&self.destination)
    }
}

/// Desired jobs keyed by identifier.
pub type JobSet = BTreeMap<Identifier, Job>;

/// Result of turning one scan into a job set.
#[derive(Debug, Clone, Default)]
pub struct JobPlan {
    pub jobs: JobSet,
    /// Sources dropped because their name sanitized to nothing.
    pub skipped: Vec<PathBuf>,
}

/// Derive the desired job set for a scan.
///
/// Sources with unusable names are skipped (and logged). If two sources
/// derive the same identifier the whole plan is rejected with
/// [`StreamvisorError::DuplicateIdentifier`]: picking one would make stream
/// routing depend on directory order.
pub fn plan_jobs(sources: &[Source], destination: &DestinationTemplate) -> Result<JobPlan> {
    let mut plan = JobPlan::default();

    for source in sources {
        let id = match source.identifier() {
            Ok(id) => id,
            Err(err) => {
                warn!(path = ?source.path, error = %err, "skipping source");
                plan.skipped.push(source.path.clone());
                continue;
            }
        };

        match plan.jobs.entry(id) {
            Entry::Occupied(existing) => {
                return Err(StreamvisorError::DuplicateIdentifier {
                    id: existing.key().to_string(),
                    first: existing.get().source.clone(),
                    second: source.path.clone(),
                });
            }
            Entry::Vacant(slot) => {
                let job = Job {
                    id: slot.key().clone(),
                    source: source.path.clone(),
                    destination: destination.resolve(slot.key()),
                };
                slot.insert(job);
            }
        }
    }

    Ok(plan)
}
