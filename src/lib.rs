// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod job;
pub mod logging;
pub mod runner;
pub mod source;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::sync::Arc;

use anyhow::Result;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_settings, Settings};
use crate::job::plan_jobs;
use crate::runner::{FfmpegLauncher, Launcher};
use crate::source::scan_with;
use crate::supervisor::daemon::{run_daemon, shutdown_signal, DaemonOptions};
use crate::supervisor::Supervisor;

/// How the daemon ended; maps onto the process exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Every job stopped within its timeout.
    Clean,
    /// At least one job had to be force-killed.
    ForcedKill,
}

impl Outcome {
    pub fn code(self) -> i32 {
        match self {
            Outcome::Clean => 0,
            Outcome::ForcedKill => 2,
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - settings loading (defaults, file, CLI/env)
/// - the transcoder launcher
/// - the supervisor and its daemon loop
/// - SIGINT/SIGTERM handling
pub async fn run(args: CliArgs) -> Result<Outcome> {
    let settings = load_settings(&args)?;
    let launcher = FfmpegLauncher::new(settings.transcoder.clone());

    if args.dry_run {
        print_dry_run(&settings, &launcher)?;
        return Ok(Outcome::Clean);
    }

    info!(
        dir = ?settings.source.dir,
        destination = %settings.destination.base_url(),
        "starting streamvisor"
    );

    let supervisor = Supervisor::new(
        settings.destination.clone(),
        settings.runner.clone(),
        Arc::new(launcher),
    );

    let options = DaemonOptions {
        source_dir: settings.source.dir.clone(),
        filter: settings.source.filter.clone(),
        poll_interval: settings.source.poll_interval,
        once: args.once,
        watch: settings.source.watch,
        stop_timeout: settings.runner.stop_timeout,
    };

    let report = run_daemon(&supervisor, &options, shutdown_signal()).await?;

    if report.forced_kills() > 0 {
        warn!(
            forced = report.forced_kills(),
            stopped = report.stopped.len(),
            "shutdown finished with force-killed jobs"
        );
        Ok(Outcome::ForcedKill)
    } else {
        info!(stopped = report.stopped.len(), "shutdown complete");
        Ok(Outcome::Clean)
    }
}

/// Scan once and print the settings, planned jobs and their commands.
fn print_dry_run(settings: &Settings, launcher: &dyn Launcher) -> Result<()> {
    let sources = scan_with(&settings.source.dir, &settings.source.filter)?;
    let plan = plan_jobs(&sources, &settings.destination)?;

    println!("streamvisor dry-run");
    println!("  source.dir = {}", settings.source.dir.display());
    println!("  source.filter = {:?}", settings.source.filter);
    println!("  source.poll_interval = {:?}", settings.source.poll_interval);
    println!("  destination = {}", settings.destination.base_url());
    println!("  runner.loop_forever = {}", settings.runner.loop_forever);
    println!("  runner.stop_timeout = {:?}", settings.runner.stop_timeout);
    println!();

    println!("jobs ({}):", plan.jobs.len());
    for (id, job) in plan.jobs.iter() {
        println!("  - {id}");
        println!("      source: {}", job.source.display());
        println!("      destination: {}", job.destination);
        println!(
            "      cmd: {}",
            launcher.command_for(job, settings.runner.loop_forever)
        );
    }

    if !plan.skipped.is_empty() {
        println!();
        println!("skipped ({}):", plan.skipped.len());
        for path in &plan.skipped {
            println!("  - {}", path.display());
        }
    }

    debug!("dry-run complete (no execution)");
    Ok(())
}
