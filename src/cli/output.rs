//! Output formatting and progress indicators
//!
//! This module provides utilities for displaying progress bars,
//! status messages and errors to the user.

use indicatif::{ProgressBar, ProgressStyle};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};

use crate::core::observer::{BuildObserver, TracingObserver};
use crate::core::package::{BuildId, BuildResult, BuildWave};
use crate::core::status::BuildStatus;
use crate::error::RebuildError;

static QUIET: AtomicBool = AtomicBool::new(false);
static JSON: AtomicBool = AtomicBool::new(false);
static VERBOSE: AtomicU8 = AtomicU8::new(0);

/// Output settings taken from the global flags
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OutputConfig {
    /// Suppress everything except errors
    pub quiet: bool,
    /// Machine-readable output
    pub json: bool,
    /// Verbosity level (-v count)
    pub verbose: u8,
}

impl OutputConfig {
    /// Create output settings from the CLI flags
    pub fn new(quiet: bool, json: bool, verbose: u8) -> Self {
        Self {
            quiet,
            json,
            verbose,
        }
    }

    /// Make these settings visible to the print helpers
    pub fn apply_global(&self) {
        QUIET.store(self.quiet, Ordering::Relaxed);
        JSON.store(self.json, Ordering::Relaxed);
        VERBOSE.store(self.verbose, Ordering::Relaxed);
    }

    /// Default tracing filter directive for these settings
    pub fn log_level(&self) -> tracing::Level {
        if self.quiet {
            return tracing::Level::ERROR;
        }
        match self.verbose {
            0 => tracing::Level::WARN,
            1 => tracing::Level::INFO,
            _ => tracing::Level::DEBUG,
        }
    }
}

/// Check if `--quiet` is active
pub fn is_quiet() -> bool {
    QUIET.load(Ordering::Relaxed)
}

/// Check if `--json` is active
pub fn is_json() -> bool {
    JSON.load(Ordering::Relaxed)
}

/// Current verbosity level
pub fn verbosity() -> u8 {
    VERBOSE.load(Ordering::Relaxed)
}

fn human_output() -> bool {
    !is_quiet() && !is_json()
}

/// Print a success line
pub fn print_success(message: &str) {
    if human_output() {
        println!("{} {message}", status::SUCCESS);
    }
}

/// Print an informational line
pub fn print_info(message: &str) {
    if human_output() {
        println!("{} {message}", status::INFO);
    }
}

/// Print a warning line to stderr
pub fn print_warning(message: &str) {
    if !is_quiet() {
        eprintln!("{} {message}", status::WARNING);
    }
}

/// Print an indented detail line
pub fn print_detail(message: &str) {
    if human_output() {
        println!("  {message}");
    }
}

/// Print an error with its cause chain to stderr
///
/// Failed external commands also get their output and command line.
pub fn display_error(error: &anyhow::Error) {
    eprintln!("{} Error: {error}", status::ERROR);
    for cause in error.chain().skip(1) {
        eprintln!("  caused by: {cause}");
    }

    let submission = error
        .chain()
        .find_map(|cause| cause.downcast_ref::<RebuildError>())
        .and_then(RebuildError::submission);
    if let Some(failed) = submission {
        if !failed.stderr.trim().is_empty() {
            eprintln!("  stderr: {}", failed.stderr.trim());
        }
        if !failed.stdout.trim().is_empty() {
            eprintln!("  stdout: {}", failed.stdout.trim());
        }
        eprintln!("  command: {}", failed.command.join(" "));
    }
}

/// Create a spinner for operations with unknown duration
pub fn create_spinner(message: &str) -> ProgressBar {
    if !human_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::default_spinner()
        .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏")
        .template("{spinner:.blue} {msg}")
    {
        pb.set_style(style);
    }
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(80));
    pb
}

/// Create a progress bar counting finished builds
pub fn create_build_bar(total: u64) -> ProgressBar {
    if !human_output() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} builds ({msg})")
    {
        pb.set_style(style.progress_chars("█▓▒░"));
    }
    pb.enable_steady_tick(std::time::Duration::from_millis(120));
    pb
}

/// Observer that drives a progress bar and forwards to the log
pub struct ProgressObserver {
    bar: ProgressBar,
    log: TracingObserver,
}

impl ProgressObserver {
    /// Track `total` builds
    pub fn new(total: usize) -> Self {
        Self {
            bar: create_build_bar(total as u64),
            log: TracingObserver,
        }
    }

    /// Stop drawing the bar
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl BuildObserver for ProgressObserver {
    fn wave_submitted(&self, wave: &BuildWave, build_ids: &[BuildId]) {
        self.log.wave_submitted(wave, build_ids);
        let ids: Vec<String> = build_ids.iter().map(ToString::to_string).collect();
        self.bar.println(format!(
            "{} Wave {}: {} submitted as {}",
            status::INFO,
            wave.index,
            wave.packages.join(", "),
            ids.join(", ")
        ));
    }

    fn build_status(&self, package: &str, build_id: BuildId, build_status: &BuildStatus) {
        self.log.build_status(package, build_id, build_status);
        self.bar.set_message(format!("{package} #{build_id}: {build_status}"));
    }

    fn build_finished(&self, result: &BuildResult) {
        self.log.build_finished(result);
        self.bar.inc(1);
        self.bar.println(format!(
            "{} {} #{} {}",
            status::SUCCESS,
            result.package_name,
            result.build_id,
            result.status
        ));
    }

    fn wave_finished(&self, wave: &BuildWave) {
        self.log.wave_finished(wave);
        self.bar
            .println(format!("{} Wave {} complete", status::SUCCESS, wave.index));
    }

    fn run_failed(&self, reason: &str, outstanding: &[(BuildId, Option<BuildStatus>)]) {
        self.log.run_failed(reason, outstanding);
        self.bar.abandon_with_message(reason.to_string());
        if !outstanding.is_empty() && !is_quiet() {
            eprintln!("{} Builds still outstanding:", status::WARNING);
            for (build_id, build_status) in outstanding {
                let state = build_status
                    .as_ref()
                    .map_or_else(|| "unknown".to_string(), ToString::to_string);
                eprintln!("  {build_id}: {state}");
            }
        }
    }
}

/// Status message prefixes
pub mod status {
    /// Success prefix (green checkmark)
    pub const SUCCESS: &str = "✓";

    /// Error prefix (red X)
    pub const ERROR: &str = "✗";

    /// Warning prefix (yellow triangle)
    pub const WARNING: &str = "⚠";

    /// Info prefix (blue circle)
    pub const INFO: &str = "ℹ";
}
