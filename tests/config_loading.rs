// tests/config_loading.rs

use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

use tempfile::NamedTempFile;

use streamvisor::cli::CliArgs;
use streamvisor::config::{load_and_validate, load_settings};
use streamvisor::errors::StreamvisorError;
use streamvisor::job::url_scheme;
use streamvisor::types::CodecMode;

fn settings_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    write!(file, "{contents}").unwrap();
    file
}

#[test]
fn file_values_override_defaults() {
    let file = settings_file(
        r#"
[source]
dir = "/srv/media"
include = ["*.mp4"]
poll_interval = "250ms"

[destination]
base_url = "rtmp://live.local:1935"
prefix = "channels"

[transcoder]
codec = "transcode"
loop_forever = false
extra_args = ["-an"]

[runner]
backoff_initial = "2s"
backoff_max = "1m"
max_restarts = 10
"#,
    );

    let settings = load_and_validate(file.path()).unwrap();

    assert_eq!(settings.source.dir, PathBuf::from("/srv/media"));
    assert_eq!(settings.source.poll_interval, Duration::from_millis(250));
    assert!(settings.source.filter.accepts("clip.mp4"));
    assert!(!settings.source.filter.accepts("clip.mkv"));
    assert_eq!(settings.destination.base_url(), "rtmp://live.local:1935");
    assert_eq!(settings.transcoder.codec, CodecMode::Transcode);
    assert_eq!(settings.transcoder.extra_args, vec!["-an".to_string()]);
    assert!(!settings.runner.loop_forever);
    assert_eq!(settings.runner.backoff.initial, Duration::from_secs(2));
    assert_eq!(settings.runner.backoff.max, Duration::from_secs(60));
    assert_eq!(settings.runner.backoff.max_restarts, Some(10));
    assert_eq!(settings.runner.stop_timeout, Duration::from_secs(5));
}

#[test]
fn cli_flags_win_over_the_file() {
    let file = settings_file(
        r#"
[source]
dir = "/from/file"
poll_interval = "10s"
"#,
    );

    let args = CliArgs {
        config: Some(file.path().to_path_buf()),
        source_dir: Some(PathBuf::from("/from/cli")),
        destination: Some("srt://relay:9000".to_string()),
        stop_timeout: Some("3s".to_string()),
        no_watch: true,
        ..CliArgs::default()
    };

    let settings = load_settings(&args).unwrap();

    assert_eq!(settings.source.dir, PathBuf::from("/from/cli"));
    assert_eq!(settings.source.poll_interval, Duration::from_secs(10));
    assert!(!settings.source.watch);
    assert_eq!(url_scheme(settings.destination.base_url()).as_deref(), Some("srt"));
    assert_eq!(settings.runner.stop_timeout, Duration::from_secs(3));
}

#[test]
fn no_config_file_means_defaults() {
    let settings = load_settings(&CliArgs::default()).unwrap();

    assert_eq!(settings.source.dir, PathBuf::from("/media"));
    assert_eq!(settings.destination.base_url(), "rtsp://localhost:8554");
    assert_eq!(settings.runner.backoff.multiplier, 2);
}

#[test]
fn missing_config_file_is_an_io_error() {
    let args = CliArgs {
        config: Some(PathBuf::from("/definitely/not/here.toml")),
        ..CliArgs::default()
    };

    assert!(matches!(load_settings(&args), Err(StreamvisorError::Io { .. })));
}

#[test]
fn malformed_and_unknown_keys_are_rejected() {
    let broken = settings_file("[source\ndir = 1");
    assert!(matches!(
        load_and_validate(broken.path()),
        Err(StreamvisorError::TomlError(_))
    ));

    let unknown = settings_file("[source]\ndirectory = \"/media\"\n");
    assert!(matches!(
        load_and_validate(unknown.path()),
        Err(StreamvisorError::TomlError(_))
    ));
}

#[test]
fn invalid_values_are_config_errors() {
    let cases = [
        "[source]\npoll_interval = \"soon\"\n",
        "[destination]\nbase_url = \"mediamtx:8554\"\n",
        "[destination]\nprefix = \"live stream\"\n",
        "[source]\ninclude = [\"[\"]\n",
        "[runner]\nstop_timeout = \"0ms\"\n",
        "[runner]\nstop_timeout = \"99999999999999999h\"\n",
    ];

    for case in cases {
        let file = settings_file(case);
        match load_and_validate(file.path()) {
            Err(StreamvisorError::ConfigError(_)) => {}
            other => panic!("expected ConfigError for {case:?}, got {other:?}"),
        }
    }
}
