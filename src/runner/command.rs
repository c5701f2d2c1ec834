// src/runner/command.rs

//! Pluggable transcoder command construction.
//!
//! Runners do not know anything about ffmpeg: they ask a [`Launcher`] for
//! the argv of a job and spawn it.
//!
//! - [`FfmpegLauncher`] is the production implementation.
//! - Tests provide their own `Launcher` that maps jobs to small shell
//!   scripts (see the `streamvisor-test-utils` crate).

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::process::Command;

use crate::job::Job;
use crate::types::CodecMode;

/// A fully resolved program invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Build the tokio command with the stdio and lifetime settings every
    /// runner child uses.
    ///
    /// `kill_on_drop` ties the subprocess to its handle: if a runner task is
    /// aborted or the runtime goes away, the child is killed rather than
    /// orphaned. On Unix the child gets its own process group so a terminal
    /// Ctrl-C reaches only the supervisor, which then stops children itself.
    pub fn to_command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        #[cfg(unix)]
        cmd.process_group(0);

        cmd
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program.display())?;
        for arg in &self.args {
            if arg.is_empty() || arg.contains(char::is_whitespace) {
                write!(f, " '{}'", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        Ok(())
    }
}

/// Trait abstracting how a job becomes a subprocess invocation.
pub trait Launcher: Send + Sync + fmt::Debug {
    /// Build the command for `job`. When `loop_forever` is set the process
    /// must loop its input indefinitely on its own.
    fn command_for(&self, job: &Job, loop_forever: bool) -> CommandSpec;
}

/// Transcoder invocation settings (`[transcoder]` in the config).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscoderSettings {
    pub program: PathBuf,
    pub codec: CodecMode,
    /// Read input at its native frame rate (`-re`), as a live source would.
    pub realtime: bool,
    /// Value for `-loglevel`.
    pub log_level: String,
    /// Appended after the codec arguments, before the output.
    pub extra_args: Vec<String>,
}

impl Default for TranscoderSettings {
    fn default() -> Self {
        Self {
            program: PathBuf::from("ffmpeg"),
            codec: CodecMode::Copy,
            realtime: true,
            log_level: "warning".to_string(),
            extra_args: Vec::new(),
        }
    }
}

/// Production launcher: one ffmpeg process per job.
#[derive(Debug, Clone, Default)]
pub struct FfmpegLauncher {
    settings: TranscoderSettings,
}

impl FfmpegLauncher {
    pub fn new(settings: TranscoderSettings) -> Self {
        Self { settings }
    }
}

impl Launcher for FfmpegLauncher {
    fn command_for(&self, job: &Job, loop_forever: bool) -> CommandSpec {
        let s = &self.settings;
        let mut spec = CommandSpec::new(&s.program).args([
            "-hide_banner",
            "-loglevel",
            s.log_level.as_str(),
            "-nostdin",
        ]);

        if s.realtime {
            spec = spec.arg("-re");
        }
        if loop_forever {
            spec = spec.args(["-stream_loop", "-1"]);
        }

        spec = spec
            .arg("-i")
            .arg(job.source.to_string_lossy())
            .args(codec_args(s.codec))
            .args(s.extra_args.iter().cloned())
            .args(output_format_args(job))
            .arg(job.destination.as_str());

        spec
    }
}

fn codec_args(codec: CodecMode) -> Vec<&'static str> {
    match codec {
        CodecMode::Copy => vec!["-c", "copy"],
        CodecMode::Transcode => vec![
            "-c:v", "libx264", "-preset", "veryfast", "-b:v", "2M", "-maxrate", "2.5M",
            "-bufsize", "4M", "-g", "50", "-keyint_min", "25", "-c:a", "aac",
        ],
    }
}

/// Container format flags implied by the destination URL scheme.
fn output_format_args(job: &Job) -> Vec<&'static str> {
    match job.scheme().as_deref().unwrap_or_default() {
        "rtsp" | "rtsps" => vec!["-f", "rtsp", "-rtsp_transport", "tcp"],
        "rtmp" | "rtmps" => vec!["-f", "flv"],
        "srt" | "udp" => vec!["-f", "mpegts"],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::Identifier;

    fn job(destination: &str) -> Job {
        Job {
            id: Identifier::try_from("a").unwrap(),
            source: PathBuf::from("/media/a.mp4"),
            destination: destination.to_string(),
        }
    }

    #[test]
    fn default_ffmpeg_command_copies_and_loops_to_rtsp() {
        let spec = FfmpegLauncher::default().command_for(&job("rtsp://mediamtx:8554/a"), true);

        assert_eq!(spec.program, PathBuf::from("ffmpeg"));
        assert_eq!(
            spec.args,
            vec![
                "-hide_banner", "-loglevel", "warning", "-nostdin", "-re", "-stream_loop", "-1",
                "-i", "/media/a.mp4", "-c", "copy", "-f", "rtsp", "-rtsp_transport", "tcp",
                "rtsp://mediamtx:8554/a",
            ]
        );
    }

    #[test]
    fn transcode_mode_and_extra_args_without_loop() {
        let launcher = FfmpegLauncher::new(TranscoderSettings {
            codec: CodecMode::Transcode,
            realtime: false,
            extra_args: vec!["-an".into()],
            ..TranscoderSettings::default()
        });
        let spec = launcher.command_for(&job("rtmp://host/live/a"), false);

        assert!(!spec.args.contains(&"-stream_loop".to_string()));
        assert!(!spec.args.contains(&"-re".to_string()));
        let joined = spec.args.join(" ");
        assert!(joined.contains("-c:v libx264 -preset veryfast"));
        assert!(joined.ends_with("-an -f flv rtmp://host/live/a"));
    }

    #[test]
    fn unknown_scheme_lets_the_transcoder_guess_the_format() {
        let spec = FfmpegLauncher::default().command_for(&job("http://host/a"), false);
        assert!(!spec.args.contains(&"-f".to_string()));

        let spec = FfmpegLauncher::default().command_for(&job("SRT://host:9000/a"), false);
        assert!(spec.args.join(" ").contains("-f mpegts SRT://host:9000/a"));
    }

    #[test]
    fn display_quotes_arguments_with_spaces() {
        let spec = CommandSpec::new("ffmpeg").args(["-i", "/media/my clip.mp4"]);
        assert_eq!(spec.to_string(), "ffmpeg -i '/media/my clip.mp4'");
    }
}
