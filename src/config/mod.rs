// src/config/mod.rs

//! Settings: built-in defaults, an optional TOML file and CLI/env overrides.
//!
//! [`model`] holds the raw and validated shapes, [`validate`] the
//! `TryFrom<RawConfigFile> for Settings` conversion and [`loader`] the
//! file/CLI layering.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{apply_cli_overrides, load_and_validate, load_from_path, load_settings};
pub use model::{RawConfigFile, Settings, SourceSettings};
