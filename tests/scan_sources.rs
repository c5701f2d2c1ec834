// tests/scan_sources.rs

mod common;
use crate::common::builders::{destination, MediaDir};
use crate::common::init_tracing;

use std::path::Path;

use streamvisor::errors::StreamvisorError;
use streamvisor::job::plan_jobs;
use streamvisor::source::{scan, scan_with, SourceFilter};

fn names(sources: &[streamvisor::source::Source]) -> Vec<String> {
    sources.iter().map(|s| s.file_name()).collect()
}

#[test]
fn scan_returns_regular_files_in_path_order() {
    init_tracing();
    let media = MediaDir::new();
    media.touch("b.mkv");
    media.touch("a.mp4");
    media.touch("c d.ts");
    media.mkdir("subdir");

    let sources = media.scan();

    assert_eq!(names(&sources), vec!["a.mp4", "b.mkv", "c d.ts"]);
}

#[cfg(unix)]
#[test]
fn scan_ignores_sockets_and_follows_file_symlinks() {
    init_tracing();
    let media = MediaDir::new();
    let target = media.touch("real.mp4");
    std::os::unix::fs::symlink(&target, media.path().join("alias.mp4")).unwrap();
    std::os::unix::fs::symlink(media.path().join("gone.mp4"), media.path().join("dangling.mp4"))
        .unwrap();
    let _socket = std::os::unix::net::UnixListener::bind(media.path().join("control.sock")).unwrap();

    let sources = media.scan();

    assert_eq!(names(&sources), vec!["alias.mp4", "real.mp4"]);
}

#[test]
fn unreadable_directory_is_an_io_error() {
    init_tracing();
    let media = MediaDir::new();
    let missing = media.path().join("does-not-exist");

    match scan(&missing) {
        Err(StreamvisorError::Io { path, .. }) => assert_eq!(path, missing),
        other => panic!("expected Io error, got {other:?}"),
    }
}

#[test]
fn two_scans_of_an_unchanged_directory_plan_the_same_jobs() {
    init_tracing();
    let media = MediaDir::new();
    media.touch("lobby cam.mp4");
    media.touch("intro.mkv");

    let first = plan_jobs(&media.scan(), &destination()).unwrap();
    let second = plan_jobs(&media.scan(), &destination()).unwrap();

    assert_eq!(first.jobs, second.jobs);
    let ids: Vec<_> = first.jobs.keys().map(|id| id.to_string()).collect();
    assert_eq!(ids, vec!["intro", "lobby_cam"]);
    assert_eq!(
        first.jobs.values().next().unwrap().destination,
        "rtsp://127.0.0.1:8554/intro"
    );
}

#[test]
fn filter_applies_globs_and_hidden_rule() {
    init_tracing();
    let media = MediaDir::new();
    media.touch("keep.mp4");
    media.touch("notes.txt");
    media.touch(".partial.mp4");

    let filter = SourceFilter::new(&["*.mp4".to_string()], &[], false).unwrap();
    let sources = scan_with(media.path(), &filter).unwrap();
    assert_eq!(names(&sources), vec!["keep.mp4"]);

    let with_hidden = SourceFilter::new(&["*.mp4".to_string()], &[], true).unwrap();
    let sources = scan_with(media.path(), &with_hidden).unwrap();
    assert_eq!(names(&sources), vec![".partial.mp4", "keep.mp4"]);
}

#[test]
fn unnamed_sources_are_skipped_not_fatal() {
    init_tracing();
    let media = MediaDir::new();
    media.touch("ok.mp4");
    media.touch(".mp4");

    let with_hidden = SourceFilter::new(&[], &[], true).unwrap();
    let sources = scan_with(media.path(), &with_hidden).unwrap();
    let plan = plan_jobs(&sources, &destination()).unwrap();

    assert_eq!(plan.jobs.len(), 1);
    assert_eq!(plan.skipped.len(), 1);
    assert_eq!(plan.skipped[0].file_name(), Some(Path::new(".mp4").as_os_str()));
}
