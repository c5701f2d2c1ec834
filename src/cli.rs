// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every flag that maps onto a setting can also be given through a
//! `STREAMVISOR_*` environment variable, which is how the container image
//! configures it.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::types::CodecMode;

/// Command-line arguments for `streamvisor`.
#[derive(Debug, Clone, Default, Parser)]
#[command(
    name = "streamvisor",
    version,
    about = "Supervise one streaming transcoder per media file in a directory.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to an optional settings file (TOML).
    #[arg(long, value_name = "PATH", env = "STREAMVISOR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Directory holding the media files to stream.
    #[arg(long, value_name = "DIR", env = "STREAMVISOR_SOURCE_DIR")]
    pub source_dir: Option<PathBuf>,

    /// Base URL of the media server, e.g. `rtsp://mediamtx:8554`.
    #[arg(long, value_name = "URL", env = "STREAMVISOR_DESTINATION")]
    pub destination: Option<String>,

    /// Path prefix inserted between the base URL and the identifier.
    #[arg(long, value_name = "PREFIX", env = "STREAMVISOR_PREFIX")]
    pub prefix: Option<String>,

    /// Rescan interval, e.g. `5s` or `500ms`.
    #[arg(long, value_name = "DURATION", env = "STREAMVISOR_POLL_INTERVAL")]
    pub poll_interval: Option<String>,

    /// Grace period per job between SIGTERM and SIGKILL.
    #[arg(long, value_name = "DURATION", env = "STREAMVISOR_STOP_TIMEOUT")]
    pub stop_timeout: Option<String>,

    /// Stream copy (`copy`) or re-encode to H.264/AAC (`transcode`).
    #[arg(long, value_name = "MODE", env = "STREAMVISOR_CODEC")]
    pub codec: Option<CodecMode>,

    /// Scan once and keep the resulting jobs running; no rescans.
    #[arg(long)]
    pub once: bool,

    /// Disable the directory watcher and rely on polling only.
    #[arg(long)]
    pub no_watch: bool,

    /// Scan and print the planned jobs and commands, but start nothing.
    #[arg(long)]
    pub dry_run: bool,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `STREAMVISOR_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, PartialEq, Eq, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
