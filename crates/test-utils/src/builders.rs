#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tempfile::TempDir;

use streamvisor::job::{DestinationTemplate, Job};
use streamvisor::runner::{BackoffPolicy, RunnerOptions};
use streamvisor::source::{derive_identifier, scan, Source};

/// Destination used throughout the tests.
pub const TEST_BASE_URL: &str = "rtsp://127.0.0.1:8554";

pub fn destination() -> DestinationTemplate {
    DestinationTemplate::new(TEST_BASE_URL, None).expect("valid test destination")
}

/// Build a `Job` for a file name as the planner would.
pub fn job(file_name: &str) -> Job {
    let id = derive_identifier(file_name).expect("valid test file name");
    let destination = destination().resolve(&id);
    Job {
        id,
        source: PathBuf::from("/media").join(file_name),
        destination,
    }
}

/// Builder for `RunnerOptions` with short, test-friendly timings.
pub struct RunnerOptionsBuilder {
    options: RunnerOptions,
}

impl RunnerOptionsBuilder {
    pub fn new() -> Self {
        Self {
            options: RunnerOptions {
                loop_forever: true,
                backoff: BackoffPolicy {
                    initial: Duration::from_millis(50),
                    max: Duration::from_millis(200),
                    multiplier: 2,
                    stability_threshold: Duration::from_secs(5),
                    max_restarts: None,
                },
                stop_timeout: Duration::from_secs(1),
            },
        }
    }

    pub fn loop_forever(mut self, val: bool) -> Self {
        self.options.loop_forever = val;
        self
    }

    pub fn backoff(mut self, initial_ms: u64, max_ms: u64) -> Self {
        self.options.backoff.initial = Duration::from_millis(initial_ms);
        self.options.backoff.max = Duration::from_millis(max_ms);
        self
    }

    pub fn stability_threshold(mut self, threshold: Duration) -> Self {
        self.options.backoff.stability_threshold = threshold;
        self
    }

    pub fn max_restarts(mut self, cap: u32) -> Self {
        self.options.backoff.max_restarts = Some(cap);
        self
    }

    pub fn stop_timeout(mut self, timeout: Duration) -> Self {
        self.options.stop_timeout = timeout;
        self
    }

    pub fn build(self) -> RunnerOptions {
        self.options
    }
}

impl Default for RunnerOptionsBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Scratch media directory backed by a `TempDir`.
pub struct MediaDir {
    dir: TempDir,
}

impl MediaDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("create temp media dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Create an (empty) media file and return its path.
    pub fn touch(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, b"").expect("create media file");
        path
    }

    pub fn remove(&self, name: &str) {
        fs::remove_file(self.dir.path().join(name)).expect("remove media file");
    }

    pub fn mkdir(&self, name: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::create_dir(&path).expect("create sub directory");
        path
    }

    pub fn scan(&self) -> Vec<Source> {
        scan(self.dir.path()).expect("scan temp media dir")
    }
}

impl Default for MediaDir {
    fn default() -> Self {
        Self::new()
    }
}
