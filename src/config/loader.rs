// src/config/loader.rs

use std::fs;
use std::path::Path;

use crate::cli::CliArgs;
use crate::config::model::{RawConfigFile, Settings};
use crate::errors::{Result, StreamvisorError};

/// Load a settings file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** perform semantic
/// validation. Use [`load_settings`] for the full pipeline.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| StreamvisorError::io(path, e))?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Overlay CLI flags (and their env vars) on top of the file contents.
pub fn apply_cli_overrides(mut raw: RawConfigFile, args: &CliArgs) -> RawConfigFile {
    if let Some(dir) = &args.source_dir {
        raw.source.dir = Some(dir.clone());
    }
    if let Some(interval) = &args.poll_interval {
        raw.source.poll_interval = Some(interval.clone());
    }
    if let Some(url) = &args.destination {
        raw.destination.base_url = Some(url.clone());
    }
    if let Some(prefix) = &args.prefix {
        raw.destination.prefix = Some(prefix.clone());
    }
    if let Some(timeout) = &args.stop_timeout {
        raw.runner.stop_timeout = Some(timeout.clone());
    }
    if let Some(codec) = args.codec {
        raw.transcoder.codec = Some(codec);
    }
    if args.no_watch {
        raw.source.watch = Some(false);
    }
    raw
}

/// Defaults, then the optional file, then CLI/env, then validation.
///
/// This is the recommended entry point for the rest of the application. A
/// missing `--config` is fine; a `--config` that points nowhere is an error.
pub fn load_settings(args: &CliArgs) -> Result<Settings> {
    let raw = match &args.config {
        Some(path) => load_from_path(path)?,
        None => RawConfigFile::default(),
    };
    Settings::try_from(apply_cli_overrides(raw, args))
}

/// Load a file and validate it without any CLI layer.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Settings> {
    let raw_config = load_from_path(&path)?;
    Settings::try_from(raw_config)
}
