// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::job::DestinationTemplate;
use crate::runner::{RunnerOptions, TranscoderSettings};
use crate::source::SourceFilter;
use crate::types::CodecMode;

pub const DEFAULT_SOURCE_DIR: &str = "/media";
pub const DEFAULT_POLL_INTERVAL: &str = "5s";
pub const DEFAULT_BASE_URL: &str = "rtsp://localhost:8554";
pub const DEFAULT_TRANSCODER: &str = "ffmpeg";
pub const DEFAULT_TRANSCODER_LOG_LEVEL: &str = "warning";
pub const DEFAULT_BACKOFF_INITIAL: &str = "1s";
pub const DEFAULT_BACKOFF_MAX: &str = "30s";
pub const DEFAULT_BACKOFF_MULTIPLIER: u32 = 2;
pub const DEFAULT_STABILITY_THRESHOLD: &str = "10s";
pub const DEFAULT_STOP_TIMEOUT: &str = "5s";

/// Settings file as read from TOML, before validation.
///
/// Every field is optional; anything missing falls back to the defaults
/// above. Example:
///
/// ```toml
/// [source]
/// dir = "/media"
/// include = ["*.mp4", "*.mkv"]
/// poll_interval = "5s"
///
/// [destination]
/// base_url = "rtsp://mediamtx:8554"
/// prefix = "live"
///
/// [transcoder]
/// codec = "copy"
/// loop_forever = true
///
/// [runner]
/// backoff_initial = "1s"
/// backoff_max = "30s"
/// stop_timeout = "5s"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RawConfigFile {
    #[serde(default)]
    pub source: SourceSection,
    #[serde(default)]
    pub destination: DestinationSection,
    #[serde(default)]
    pub transcoder: TranscoderSection,
    #[serde(default)]
    pub runner: RunnerSection,
}

/// `[source]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SourceSection {
    pub dir: Option<PathBuf>,
    /// File name globs to include; empty means all files.
    #[serde(default)]
    pub include: Vec<String>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub include_hidden: bool,
    pub poll_interval: Option<String>,
    /// Use a filesystem watcher to rescan early on changes.
    pub watch: Option<bool>,
}

/// `[destination]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DestinationSection {
    pub base_url: Option<String>,
    pub prefix: Option<String>,
}

/// `[transcoder]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TranscoderSection {
    pub program: Option<PathBuf>,
    pub loop_forever: Option<bool>,
    pub realtime: Option<bool>,
    pub codec: Option<CodecMode>,
    pub log_level: Option<String>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

/// `[runner]` section.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunnerSection {
    pub backoff_initial: Option<String>,
    pub backoff_max: Option<String>,
    pub backoff_multiplier: Option<u32>,
    pub stability_threshold: Option<String>,
    pub max_restarts: Option<u32>,
    pub stop_timeout: Option<String>,
}

/// Validated settings the rest of the application runs on.
///
/// Only obtainable through `Settings::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub source: SourceSettings,
    pub destination: DestinationTemplate,
    pub transcoder: TranscoderSettings,
    pub runner: RunnerOptions,
}

#[derive(Debug, Clone)]
pub struct SourceSettings {
    pub dir: PathBuf,
    pub filter: SourceFilter,
    pub poll_interval: Duration,
    pub watch: bool,
}
