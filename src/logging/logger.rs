//! Structured logger with dry-run awareness, keyed progress and summary
//! collection.
use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{Log, TaskEntry, TaskStatus};
use super::utils::{log_file_path, render_progress_line, terminal_columns};

/// Implement the display methods of [`Log`] by delegating to inherent methods
/// of the same name on the implementing type.
macro_rules! forward_log_methods {
    ($($method:ident),+ $(,)?) => {
        $(
            fn $method(&self, msg: &str) {
                self.$method(msg);
            }
        )+
    };
}

/// Structured logger with dry-run awareness and summary collection.
///
/// All messages flow through [`tracing`]; the subscriber installed by
/// [`init_subscriber`](super::subscriber::init_subscriber) writes them to the
/// console and to `$XDG_CACHE_HOME/moddeploy/<command>.log`.
#[derive(Debug)]
pub struct Logger {
    tasks: Mutex<Vec<TaskEntry>>,
    log_file: Option<PathBuf>,
    /// Serializes console writes of the progress line.
    flush_lock: Mutex<()>,
    /// Latest `(text, percent)` per progress key.
    progress: Mutex<BTreeMap<String, (String, u8)>>,
    /// Whether a progress line is currently displayed (`0` or `1`).
    ///
    /// The progress line is always truncated to a single terminal row so
    /// clearing it never needs cursor-up movement.
    progress_rows: Mutex<u16>,
    /// Suppresses the console progress line (tests, non-interactive runs).
    quiet_progress: bool,
}

impl Logger {
    /// Create a new logger for `command`.
    ///
    /// Only remembers the log file path for the summary; the file itself is
    /// created by the subscriber.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            tasks: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
            flush_lock: Mutex::new(()),
            progress: Mutex::new(BTreeMap::new()),
            progress_rows: Mutex::new(0),
            quiet_progress: false,
        }
    }

    /// Create a logger that never draws the console progress line.
    #[must_use]
    pub fn quiet(command: &str) -> Self {
        Self {
            quiet_progress: true,
            ..Self::new(command)
        }
    }

    /// Return the log file path, if available.
    #[must_use]
    pub const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Return a clone of all recorded entries.
    #[must_use]
    pub fn task_entries(&self) -> Vec<TaskEntry> {
        self.tasks.lock().map_or_else(|_| vec![], |g| g.clone())
    }

    /// Return a snapshot of the active progress entries.
    #[must_use]
    pub fn progress_snapshot(&self) -> BTreeMap<String, (String, u8)> {
        self.progress
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Log an error message.
    pub fn error(&self, msg: &str) {
        self.with_progress_cleared(|| tracing::error!("{msg}"));
    }

    /// Log a warning message.
    pub fn warn(&self, msg: &str) {
        self.with_progress_cleared(|| tracing::warn!("{msg}"));
    }

    /// Log a stage header (major section).
    pub fn stage(&self, msg: &str) {
        self.with_progress_cleared(|| tracing::info!(target: STAGE_TARGET, "{msg}"));
    }

    /// Log an informational message.
    pub fn info(&self, msg: &str) {
        self.with_progress_cleared(|| tracing::info!("{msg}"));
    }

    /// Log a debug message (console only when verbose; always in the file).
    pub fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    /// Log a dry-run action message.
    pub fn dry_run(&self, msg: &str) {
        self.with_progress_cleared(|| tracing::info!(target: DRY_RUN_TARGET, "{msg}"));
    }

    /// Record a result for the summary.
    pub fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        if let Ok(mut guard) = self.tasks.lock() {
            guard.push(TaskEntry {
                name: name.to_string(),
                status,
                message: message.map(String::from),
            });
        }
    }

    /// Return `true` if any recorded entry has failed.
    #[must_use]
    pub fn has_failures(&self) -> bool {
        self.failure_count() > 0
    }

    /// Count the failed entries.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.tasks.lock().map_or(0, |guard| {
            guard
                .iter()
                .filter(|t| t.status == TaskStatus::Failed)
                .count()
        })
    }

    /// Print the summary of all recorded entries.
    pub fn print_summary(&self) {
        let tasks = self.task_entries();
        if tasks.is_empty() {
            return;
        }

        self.stage("Summary");

        let mut ok = 0u32;
        let mut not_applicable = 0u32;
        let mut skipped = 0u32;
        let mut dry_run = 0u32;
        let mut failed = 0u32;

        for task in &tasks {
            let (icon, color) = match task.status {
                TaskStatus::Ok => {
                    ok += 1;
                    ("✓", "\x1b[32m")
                }
                TaskStatus::NotApplicable => {
                    not_applicable += 1;
                    ("·", "\x1b[2m")
                }
                TaskStatus::Skipped => {
                    skipped += 1;
                    ("○", "\x1b[33m")
                }
                TaskStatus::DryRun => {
                    dry_run += 1;
                    ("~", "\x1b[37m")
                }
                TaskStatus::Failed => {
                    failed += 1;
                    ("✗", "\x1b[31m")
                }
            };

            let suffix = task
                .message
                .as_ref()
                .map_or_else(String::new, |msg| format!(" ({msg})"));

            self.info(&format!("{color}{icon} {}{suffix}\x1b[0m", task.name));
        }

        let total = ok + not_applicable + skipped + dry_run + failed;
        self.info(&format!(
            "{total} targets: \x1b[32m{ok} ok\x1b[0m, \x1b[2m{not_applicable} n/a\x1b[0m, \x1b[33m{skipped} skipped\x1b[0m, \x1b[37m{dry_run} dry-run\x1b[0m, \x1b[31m{failed} failed\x1b[0m"
        ));

        if let Some(path) = &self.log_file {
            self.info(&format!("\x1b[2mlog: {}\x1b[0m", path.display()));
        }
    }

    /// Store `(text, percent)` under `key` and redraw the progress line.
    pub fn progress(&self, key: &str, text: &str, percent: u8) {
        tracing::debug!(key, percent, "{text}");
        let line = {
            let mut guard = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
            guard.insert(key.to_string(), (text.to_string(), percent.min(100)));
            render_progress_line(
                guard.values().map(|(t, p)| (t.as_str(), *p)),
                terminal_columns(),
            )
        };
        if self.quiet_progress {
            return;
        }
        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.clear_progress();
        self.draw_progress(&line);
    }

    /// Remove the progress entry for `key`, redrawing the remaining ones.
    pub fn finish_progress(&self, key: &str) {
        let line = {
            let mut guard = self.progress.lock().unwrap_or_else(PoisonError::into_inner);
            guard.remove(key);
            if guard.is_empty() {
                None
            } else {
                Some(render_progress_line(
                    guard.values().map(|(t, p)| (t.as_str(), *p)),
                    terminal_columns(),
                ))
            }
        };
        if self.quiet_progress {
            return;
        }
        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.clear_progress();
        if let Some(line) = line {
            self.draw_progress(&line);
        }
    }

    /// Run `emit` with the progress line erased, then restore it.
    fn with_progress_cleared(&self, emit: impl FnOnce()) {
        if self.quiet_progress {
            emit();
            return;
        }
        let _guard = self.flush_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let shown = *self.progress_rows.lock().unwrap_or_else(PoisonError::into_inner) > 0;
        self.clear_progress();
        emit();
        if shown {
            let line = render_progress_line(
                self.progress
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner)
                    .values()
                    .map(|(t, p)| (t.as_str(), *p)),
                terminal_columns(),
            );
            self.draw_progress(&line);
        }
    }

    /// Erase the progress line. Must be called while holding `flush_lock`.
    fn clear_progress(&self) {
        let mut guard = self
            .progress_rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if *guard > 0 {
            let mut out = std::io::stdout().lock();
            write!(out, "\r\x1b[K").ok();
            out.flush().ok();
            *guard = 0;
        }
    }

    /// Draw the progress line. Must be called while holding `flush_lock`.
    fn draw_progress(&self, line: &str) {
        let mut out = std::io::stdout().lock();
        write!(out, "  \x1b[2m▹ {line}\x1b[0m").ok();
        out.flush().ok();
        let mut guard = self
            .progress_rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *guard = 1;
    }

    /// Return the current value of `progress_rows`.
    #[cfg(test)]
    pub(crate) fn progress_rows_count(&self) -> u16 {
        *self
            .progress_rows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl Log for Logger {
    forward_log_methods!(stage, info, debug, warn, error, dry_run);

    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>) {
        self.record_task(name, status, message);
    }

    fn progress(&self, key: &str, text: &str, percent: u8) {
        self.progress(key, text, percent);
    }

    fn finish_progress(&self, key: &str) {
        self.finish_progress(key);
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::isolated_logger;
    use std::fs;

    #[test]
    fn logger_new() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(log.task_entries().is_empty(), "expected empty task list");
    }

    #[test]
    fn record_task_with_message() {
        let (log, _tmp, _guard) = isolated_logger();
        log.record_task("skyrim/default", TaskStatus::Skipped, Some("no manifest"));
        let tasks = log.task_entries();
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].message, Some("no manifest".to_string()));
    }

    #[test]
    fn failure_count_returns_correct_count() {
        let (log, _tmp, _guard) = isolated_logger();
        assert!(!log.has_failures());
        log.record_task("a", TaskStatus::Ok, None);
        log.record_task("b", TaskStatus::Failed, Some("error 1"));
        log.record_task("c", TaskStatus::Failed, Some("error 2"));
        log.record_task("d", TaskStatus::Skipped, None);
        assert_eq!(log.failure_count(), 2);
        assert!(log.has_failures());
    }

    #[test]
    fn log_trait_delegates_to_logger() {
        let (log, _tmp, _guard) = isolated_logger();
        let log_ref: &dyn Log = &log;
        log_ref.record_task("via-trait", TaskStatus::Ok, None);
        assert_eq!(log.task_entries().len(), 1);
    }

    #[test]
    fn progress_is_keyed() {
        let (log, _tmp, _guard) = isolated_logger();
        log.progress("purge-skyrim", "Removing links", 40);
        log.progress("purge-fallout", "Saving manifest", 80);
        log.progress("purge-skyrim", "Saving manifest", 75);
        let snapshot = log.progress_snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(
            snapshot["purge-skyrim"],
            ("Saving manifest".to_string(), 75)
        );
        assert_eq!(
            snapshot["purge-fallout"],
            ("Saving manifest".to_string(), 80)
        );
    }

    #[test]
    fn finish_progress_removes_only_its_key() {
        let (log, _tmp, _guard) = isolated_logger();
        log.progress("a", "one", 10);
        log.progress("b", "two", 20);
        log.finish_progress("a");
        let snapshot = log.progress_snapshot();
        assert!(!snapshot.contains_key("a"));
        assert!(snapshot.contains_key("b"));
    }

    #[test]
    fn progress_percent_is_clamped() {
        let (log, _tmp, _guard) = isolated_logger();
        log.progress("k", "overflow", 250);
        assert_eq!(log.progress_snapshot()["k"].1, 100);
    }

    #[test]
    fn quiet_logger_never_draws() {
        let (log, _tmp, _guard) = isolated_logger();
        log.progress("k", "working", 50);
        assert_eq!(log.progress_rows_count(), 0);
    }

    #[test]
    fn debug_always_written_to_file() {
        let (log, tmp, _guard) = isolated_logger();
        let marker = format!("debug-marker-{}", std::process::id());
        log.debug(&marker);
        let contents = fs::read_to_string(tmp.path().join("moddeploy/test.log")).unwrap();
        assert!(contents.contains(&marker));
    }

    #[test]
    fn warn_written_to_file() {
        let (log, tmp, _guard) = isolated_logger();
        let marker = format!("warn-marker-{}", std::process::id());
        log.warn(&marker);
        let contents = fs::read_to_string(tmp.path().join("moddeploy/test.log")).unwrap();
        assert!(contents.contains("[warn]"));
        assert!(contents.contains(&marker));
    }

    #[test]
    fn stage_written_to_file_with_arrow() {
        let (log, tmp, _guard) = isolated_logger();
        let marker = format!("stage-marker-{}", std::process::id());
        log.stage(&marker);
        let contents = fs::read_to_string(tmp.path().join("moddeploy/test.log")).unwrap();
        assert!(contents.contains("==>"));
        assert!(contents.contains(&marker));
    }

    #[test]
    fn dry_run_written_to_file() {
        let (log, tmp, _guard) = isolated_logger();
        let marker = format!("dryrun-marker-{}", std::process::id());
        log.dry_run(&marker);
        let contents = fs::read_to_string(tmp.path().join("moddeploy/test.log")).unwrap();
        assert!(contents.contains("[dry run]"));
        assert!(contents.contains(&marker));
    }
}
