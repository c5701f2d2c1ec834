// src/source/identifier.rs

//! Stable, sanitized stream identifiers derived from file names.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::{Result, StreamvisorError};

static NOT_PERMITTED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"[^A-Za-z0-9_-]").expect("identifier character class is a valid regex")
});

/// Routing key of a job: unique within one scan, safe to splice into a URL
/// path segment.
///
/// Only [`derive_identifier`] (and `TryFrom<&str>`, which goes through the
/// same normalization) can build one, so every `Identifier` in the system
/// contains only `[A-Za-z0-9_-]` and is never empty.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Identifier(String);

impl Identifier {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<&str> for Identifier {
    type Error = StreamvisorError;

    fn try_from(name: &str) -> Result<Self> {
        derive_identifier(name)
    }
}

/// Derive an identifier from a file base name.
///
/// Drops the last extension segment (everything from the final `.`), then
/// replaces every character outside `[A-Za-z0-9_-]` with `_`.
///
/// - `"Big Buck Bunny.mp4"` -> `"Big_Buck_Bunny"`
/// - `"show.s01e02.mkv"` -> `"show_s01e02"`
/// - `"noext"` -> `"noext"`
/// - `".mp4"` -> error (nothing left)
pub fn derive_identifier(base_name: &str) -> Result<Identifier> {
    let stem = match base_name.rsplit_once('.') {
        Some((stem, _ext)) => stem,
        None => base_name,
    };

    if stem.is_empty() {
        return Err(StreamvisorError::InvalidName(base_name.to_string()));
    }

    let sanitized = NOT_PERMITTED.replace_all(stem, "_");
    Ok(Identifier(sanitized.into_owned()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(name: &str) -> String {
        derive_identifier(name).unwrap().to_string()
    }

    #[test]
    fn strips_only_the_last_extension() {
        assert_eq!(id("a.mp4"), "a");
        assert_eq!(id("archive.tar.gz"), "archive_tar");
        assert_eq!(id("noext"), "noext");
    }

    #[test]
    fn replaces_non_permitted_characters() {
        assert_eq!(id("Big Buck Bunny.mp4"), "Big_Buck_Bunny");
        assert_eq!(id("clip-01_final.mkv"), "clip-01_final");
        assert_eq!(id("café (1).mov"), "caf___1_");
    }

    #[test]
    fn empty_stem_is_invalid() {
        for name in ["", ".mp4", ".hidden"] {
            match derive_identifier(name) {
                Err(StreamvisorError::InvalidName(n)) => assert_eq!(n, name),
                other => panic!("expected InvalidName for {name:?}, got {other:?}"),
            }
        }
    }

    #[test]
    fn trailing_dot_keeps_stem() {
        assert_eq!(id("name."), "name");
    }

    #[test]
    fn derivation_is_a_fixed_point_on_identifiers() {
        let first = derive_identifier("my movie.v2.mp4").unwrap();
        let second = derive_identifier(first.as_str()).unwrap();
        assert_eq!(first, second);
    }
}
