// src/source/filter.rs

use std::fmt;

use globset::{Glob, GlobSet, GlobSetBuilder};

use crate::errors::{Result, StreamvisorError};

/// Include/exclude globs applied to source file names.
///
/// Patterns match the base name only (`"*.mp4"`, `"trailer_*"`), never the
/// full path. An empty include list means "everything".
#[derive(Clone, Default)]
pub struct SourceFilter {
    include: Option<GlobSet>,
    exclude: Option<GlobSet>,
    include_patterns: Vec<String>,
    exclude_patterns: Vec<String>,
    include_hidden: bool,
}

/// Shows the patterns as written; compiled sets are not printable.
impl fmt::Debug for SourceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceFilter")
            .field("include", &self.include_patterns)
            .field("exclude", &self.exclude_patterns)
            .field("include_hidden", &self.include_hidden)
            .finish()
    }
}

impl SourceFilter {
    pub fn new(include: &[String], exclude: &[String], include_hidden: bool) -> Result<Self> {
        Ok(Self {
            include: build_globset(include)?,
            exclude: build_globset(exclude)?,
            include_patterns: include.to_vec(),
            exclude_patterns: exclude.to_vec(),
            include_hidden,
        })
    }

    pub fn include_patterns(&self) -> &[String] {
        &self.include_patterns
    }

    pub fn exclude_patterns(&self) -> &[String] {
        &self.exclude_patterns
    }

    /// Returns true if a file with this base name should become a source.
    pub fn accepts(&self, file_name: &str) -> bool {
        if !self.include_hidden && file_name.starts_with('.') {
            return false;
        }
        if let Some(include) = &self.include {
            if !include.is_match(file_name) {
                return false;
            }
        }
        if let Some(exclude) = &self.exclude {
            if exclude.is_match(file_name) {
                return false;
            }
        }
        true
    }
}

/// Build a GlobSet from simple string patterns; `None` for an empty list.
fn build_globset(patterns: &[String]) -> Result<Option<GlobSet>> {
    if patterns.is_empty() {
        return Ok(None);
    }

    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = Glob::new(pat).map_err(|e| {
            StreamvisorError::ConfigError(format!("invalid glob pattern '{pat}': {e}"))
        })?;
        builder.add(glob);
    }
    let set = builder
        .build()
        .map_err(|e| StreamvisorError::ConfigError(format!("building glob set: {e}")))?;
    Ok(Some(set))
}
