// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::*;
use crate::errors::{Result, StreamvisorError};
use crate::job::DestinationTemplate;
use crate::runner::{BackoffPolicy, RunnerOptions, TranscoderSettings};
use crate::source::SourceFilter;
use crate::types::parse_duration;

impl TryFrom<RawConfigFile> for Settings {
    type Error = StreamvisorError;

    fn try_from(raw: RawConfigFile) -> Result<Self> {
        let source = validate_source(&raw.source)?;
        let destination = DestinationTemplate::new(
            raw.destination
                .base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            raw.destination.prefix.clone(),
        )?;
        let transcoder = validate_transcoder(&raw.transcoder)?;
        let runner = validate_runner(&raw.runner, raw.transcoder.loop_forever.unwrap_or(true))?;

        Ok(Settings {
            source,
            destination,
            transcoder,
            runner,
        })
    }
}

fn validate_source(section: &SourceSection) -> Result<SourceSettings> {
    let poll_interval = positive_duration(
        "[source].poll_interval",
        section.poll_interval.as_deref(),
        DEFAULT_POLL_INTERVAL,
    )?;

    let filter = SourceFilter::new(&section.include, &section.exclude, section.include_hidden)?;

    Ok(SourceSettings {
        dir: section
            .dir
            .clone()
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SOURCE_DIR)),
        filter,
        poll_interval,
        watch: section.watch.unwrap_or(true),
    })
}

fn validate_transcoder(section: &TranscoderSection) -> Result<TranscoderSettings> {
    let program = section
        .program
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_TRANSCODER));
    if program.as_os_str().is_empty() {
        return Err(StreamvisorError::ConfigError(
            "[transcoder].program must not be empty".to_string(),
        ));
    }

    let log_level = section
        .log_level
        .clone()
        .unwrap_or_else(|| DEFAULT_TRANSCODER_LOG_LEVEL.to_string());
    if log_level.trim().is_empty() {
        return Err(StreamvisorError::ConfigError(
            "[transcoder].log_level must not be empty".to_string(),
        ));
    }

    Ok(TranscoderSettings {
        program,
        codec: section.codec.unwrap_or_default(),
        realtime: section.realtime.unwrap_or(true),
        log_level,
        extra_args: section.extra_args.clone(),
    })
}

fn validate_runner(section: &RunnerSection, loop_forever: bool) -> Result<RunnerOptions> {
    let initial = positive_duration(
        "[runner].backoff_initial",
        section.backoff_initial.as_deref(),
        DEFAULT_BACKOFF_INITIAL,
    )?;
    let max = positive_duration(
        "[runner].backoff_max",
        section.backoff_max.as_deref(),
        DEFAULT_BACKOFF_MAX,
    )?;
    if max < initial {
        return Err(StreamvisorError::ConfigError(format!(
            "[runner].backoff_max ({max:?}) must be >= backoff_initial ({initial:?})"
        )));
    }

    let multiplier = section
        .backoff_multiplier
        .unwrap_or(DEFAULT_BACKOFF_MULTIPLIER);
    if multiplier == 0 {
        return Err(StreamvisorError::ConfigError(
            "[runner].backoff_multiplier must be >= 1 (got 0)".to_string(),
        ));
    }

    let stability_threshold = positive_duration(
        "[runner].stability_threshold",
        section.stability_threshold.as_deref(),
        DEFAULT_STABILITY_THRESHOLD,
    )?;
    let stop_timeout = positive_duration(
        "[runner].stop_timeout",
        section.stop_timeout.as_deref(),
        DEFAULT_STOP_TIMEOUT,
    )?;

    Ok(RunnerOptions {
        loop_forever,
        backoff: BackoffPolicy {
            initial,
            max,
            multiplier,
            stability_threshold,
            max_restarts: section.max_restarts,
        },
        stop_timeout,
    })
}

fn positive_duration(field: &str, value: Option<&str>, default: &str) -> Result<Duration> {
    let raw = value.unwrap_or(default);
    let duration = parse_duration(raw)
        .map_err(|e| StreamvisorError::ConfigError(format!("{field}: {e}")))?;
    if duration.is_zero() {
        return Err(StreamvisorError::ConfigError(format!(
            "{field} must be greater than zero"
        )));
    }
    Ok(duration)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CodecMode;

    #[test]
    fn empty_file_yields_documented_defaults() {
        let settings = Settings::try_from(RawConfigFile::default()).unwrap();

        assert_eq!(settings.source.dir, PathBuf::from("/media"));
        assert_eq!(settings.source.poll_interval, Duration::from_secs(5));
        assert!(settings.source.watch);
        assert_eq!(settings.transcoder, TranscoderSettings::default());
        assert_eq!(settings.runner, RunnerOptions::default());
        assert_eq!(settings.transcoder.codec, CodecMode::Copy);
    }

    #[test]
    fn backoff_max_below_initial_is_rejected() {
        let mut raw = RawConfigFile::default();
        raw.runner.backoff_initial = Some("10s".into());
        raw.runner.backoff_max = Some("5s".into());

        let err = Settings::try_from(raw).unwrap_err();
        assert!(matches!(err, StreamvisorError::ConfigError(msg) if msg.contains("backoff_max")));
    }

    #[test]
    fn zero_durations_and_multiplier_are_rejected() {
        let mut raw = RawConfigFile::default();
        raw.source.poll_interval = Some("0s".into());
        assert!(Settings::try_from(raw).is_err());

        let mut raw = RawConfigFile::default();
        raw.runner.backoff_multiplier = Some(0);
        assert!(Settings::try_from(raw).is_err());
    }

    #[test]
    fn loop_forever_flows_into_runner_options() {
        let mut raw = RawConfigFile::default();
        raw.transcoder.loop_forever = Some(false);
        let settings = Settings::try_from(raw).unwrap();
        assert!(!settings.runner.loop_forever);
    }
}
