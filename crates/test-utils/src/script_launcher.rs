use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use streamvisor::job::Job;
use streamvisor::runner::{CommandSpec, Launcher};

/// Keeps running until signalled.
pub const RUN_FOREVER: &str = "while :; do sleep 0.1; done";
/// Ignores SIGTERM; only SIGKILL gets rid of it.
pub const IGNORE_TERM: &str = "trap '' TERM; while :; do sleep 0.1; done";
/// Dies right away with a failure status.
pub const FAIL_FAST: &str = "echo 'boom: no such stream' >&2; exit 3";
/// Exits cleanly right away, like a transcoder reaching the end of its input.
pub const FINISH: &str = "exit 0";

const MISSING_PROGRAM: &str = "/nonexistent/streamvisor-test-transcoder";

/// A launcher that runs `sh -c <script>` instead of the transcoder.
///
/// Scripts are picked per job identifier, falling back to a default. Inside
/// the script `$1` is the source path and `$2` the destination URL.
#[derive(Debug, Clone)]
pub struct ScriptLauncher {
    shell: PathBuf,
    default_script: String,
    scripts: BTreeMap<String, String>,
    unspawnable: BTreeSet<String>,
}

impl ScriptLauncher {
    pub fn new(default_script: &str) -> Self {
        Self {
            shell: PathBuf::from("sh"),
            default_script: default_script.to_string(),
            scripts: BTreeMap::new(),
            unspawnable: BTreeSet::new(),
        }
    }

    /// Use `script` for the job whose identifier is `id`.
    pub fn with_script(mut self, id: &str, script: &str) -> Self {
        self.scripts.insert(id.to_string(), script.to_string());
        self
    }

    /// Point the job `id` at a program that does not exist, so its spawn
    /// fails.
    pub fn with_unspawnable(mut self, id: &str) -> Self {
        self.unspawnable.insert(id.to_string());
        self
    }

    fn script_for(&self, id: &str) -> &str {
        self.scripts
            .get(id)
            .map(String::as_str)
            .unwrap_or(&self.default_script)
    }
}

impl Launcher for ScriptLauncher {
    fn command_for(&self, job: &Job, _loop_forever: bool) -> CommandSpec {
        let id = job.id.as_str();
        if self.unspawnable.contains(id) {
            return CommandSpec::new(MISSING_PROGRAM);
        }

        CommandSpec::new(&self.shell)
            .arg("-c")
            .arg(self.script_for(id))
            .arg("streamvisor-test")
            .arg(job.source.display().to_string())
            .arg(job.destination.clone())
    }
}
