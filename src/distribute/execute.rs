use std::fmt;
use std::fs;
use std::io;
use std::path::Path;

use super::plan::{self, DistributionInput, DistributionPlan};
use super::{CancellationToken, DistributeError, RetryPolicy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionStatus {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DistributionState {
    Idle,
    Planning,
    Applying,
    Completed(DistributionStatus),
    Cancelled,
}

/// Receives everything a run wants to show: state changes, progress, log lines.
pub trait DistributionReporter {
    fn set_state(&mut self, state: DistributionState);
    fn report_progress(&mut self, percent: u8, status: &str);
    fn append_log(&mut self, level: LogLevel, message: &str);
    fn mark_completed(&mut self, state: DistributionState, summary: &str);
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DistributionSummary {
    pub copied: u64,
    pub deleted: u64,
    pub skipped: u64,
    pub warnings: u64,
    pub errors: u64,
    pub cancelled: bool,
}

impl DistributionSummary {
    /// Errors outrank warnings, which outrank success.
    pub fn status(&self) -> DistributionStatus {
        if self.errors > 0 {
            DistributionStatus::Error
        } else if self.warnings > 0 {
            DistributionStatus::Warning
        } else {
            DistributionStatus::Success
        }
    }

    pub fn state(&self) -> DistributionState {
        if self.cancelled {
            DistributionState::Cancelled
        } else {
            DistributionState::Completed(self.status())
        }
    }
}

impl fmt::Display for DistributionSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Summary: copied={}, deleted={}, skipped={}, warnings={}, errors={}",
            self.copied, self.deleted, self.skipped, self.warnings, self.errors
        )
    }
}

/// `done / total` as a percentage, rounded half away from zero, within 0..=100.
pub fn progress_percent(done: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let percent = (done as f64 * 100.0 / total as f64).round();
    percent.clamp(0.0, 100.0) as u8
}

struct Progress {
    done: usize,
    total: usize,
}

impl Progress {
    fn step(&mut self, reporter: &mut dyn DistributionReporter, status: &str) {
        self.done += 1;
        reporter.report_progress(progress_percent(self.done, self.total), status);
    }
}

/// Plan against `root` and apply the plan.
///
/// Only a root that cannot be created is an `Err`; every other failure is
/// counted in the summary and the run goes on.
pub fn distribute(
    root: &Path,
    input: &DistributionInput,
    retry: RetryPolicy,
    reporter: &mut dyn DistributionReporter,
    cancel: &CancellationToken,
) -> Result<DistributionSummary, DistributeError> {
    reporter.set_state(DistributionState::Planning);
    reporter.report_progress(0, "Preparing...");

    if let Err(source) = fs::create_dir_all(root) {
        let message = format!("Cannot create {}: {}", root.display(), source);
        reporter.append_log(LogLevel::Error, &message);
        let state = DistributionState::Completed(DistributionStatus::Error);
        reporter.set_state(state);
        reporter.mark_completed(state, &message);
        return Err(DistributeError::Setup {
            path: root.display().to_string(),
            source,
        });
    }

    if cancel.is_cancelled() {
        return Ok(finish_cancelled(reporter, DistributionSummary::default()));
    }

    reporter.report_progress(0, "Planning...");
    let plan = plan::plan(root, input);
    log::info!(
        "Distribution plan: {} dirs, {} copies, {} unchanged, {} deletions, {} dir cleanups",
        plan.directories_to_create.len(),
        plan.files_to_ensure.len(),
        plan.files_unchanged.len(),
        plan.files_to_delete.len(),
        plan.directories_to_delete_if_empty.len()
    );

    Ok(apply(&plan, retry, reporter, cancel))
}

/// Execute a plan: mkdir, copy, delete files, remove empty directories, then
/// report missing assignments.
pub fn apply(
    plan: &DistributionPlan,
    retry: RetryPolicy,
    reporter: &mut dyn DistributionReporter,
    cancel: &CancellationToken,
) -> DistributionSummary {
    reporter.set_state(DistributionState::Applying);

    let mut summary = DistributionSummary {
        skipped: plan.files_unchanged.len() as u64,
        ..Default::default()
    };
    let mut progress = Progress {
        done: 0,
        total: plan.step_count().max(1),
    };

    for directory in &plan.directories_to_create {
        if cancel.is_cancelled() {
            return finish_cancelled(reporter, summary);
        }
        progress.step(reporter, &format!("Ensuring directory: {}", directory.display()));
        if directory.is_dir() {
            continue;
        }
        reporter.append_log(LogLevel::Info, &format!("CREATE DIR  {}", directory.display()));
        if let Err(e) = fs::create_dir_all(directory) {
            summary.errors += 1;
            reporter.append_log(
                LogLevel::Error,
                &format!("Creating dir failed: {} :: {}", directory.display(), e),
            );
        }
    }

    for copy in &plan.files_to_ensure {
        if cancel.is_cancelled() {
            return finish_cancelled(reporter, summary);
        }
        progress.step(reporter, &format!("Copying: {}", file_label(&copy.destination)));

        if let Some(parent) = copy.destination.parent() {
            if let Err(e) = fs::create_dir_all(parent) {
                summary.errors += 1;
                reporter.append_log(
                    LogLevel::Error,
                    &format!("Ensuring directory failed: {} :: {}", parent.display(), e),
                );
                continue;
            }
        }

        reporter.append_log(LogLevel::Info, &format!("COPY FILE {}", copy.destination.display()));
        match retry.run(|| fs::copy(&copy.source, &copy.destination)) {
            Ok(_) => summary.copied += 1,
            Err(e) => {
                summary.errors += 1;
                reporter.append_log(
                    LogLevel::Error,
                    &format!(
                        "Copy file failed: {} -> {} :: {}",
                        copy.source.display(),
                        copy.destination.display(),
                        e
                    ),
                );
            }
        }
    }

    for file in &plan.files_to_delete {
        if cancel.is_cancelled() {
            return finish_cancelled(reporter, summary);
        }
        progress.step(reporter, &format!("Deleting: {}", file_label(file)));
        if !file.exists() {
            continue;
        }

        reporter.append_log(LogLevel::Info, &format!("DELETE FILE {}", file.display()));
        match retry.run(|| remove_file_if_exists(file)) {
            Ok(()) => summary.deleted += 1,
            Err(e) => {
                summary.errors += 1;
                reporter.append_log(
                    LogLevel::Error,
                    &format!("Delete file failed: {} :: {}", file.display(), e),
                );
            }
        }
    }

    for directory in &plan.directories_to_delete_if_empty {
        if cancel.is_cancelled() {
            return finish_cancelled(reporter, summary);
        }
        progress.step(reporter, &format!("Cleaning directory: {}", directory.display()));
        if !is_empty_dir(directory) {
            continue;
        }

        reporter.append_log(LogLevel::Info, &format!("RMDIR {}", directory.display()));
        if let Err(e) = retry.run(|| fs::remove_dir(directory)) {
            summary.errors += 1;
            reporter.append_log(
                LogLevel::Error,
                &format!("Remove directory failed: {} :: {}", directory.display(), e),
            );
        }
    }

    for missing in &plan.missing_assignments {
        if cancel.is_cancelled() {
            return finish_cancelled(reporter, summary);
        }
        summary.warnings += 1;
        reporter.append_log(LogLevel::Warning, &missing.message());
    }

    let line = summary.to_string();
    reporter.append_log(LogLevel::Info, &line);
    let state = summary.state();
    reporter.set_state(state);
    reporter.mark_completed(state, &line);
    summary
}

fn finish_cancelled(
    reporter: &mut dyn DistributionReporter,
    mut summary: DistributionSummary,
) -> DistributionSummary {
    summary.cancelled = true;
    reporter.append_log(LogLevel::Warning, "Operation cancelled");
    reporter.set_state(DistributionState::Cancelled);
    reporter.mark_completed(DistributionState::Cancelled, "Distribution cancelled by user");
    summary
}

fn file_label(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn remove_file_if_exists(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Missing or unreadable directories count as non-empty: nothing to remove.
fn is_empty_dir(path: &Path) -> bool {
    fs::read_dir(path)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
