//! Core logging types: summary entries, status, and the [`Log`] trait.

/// Outcome of one unit of work (one game / mod-type pair) for the summary.
#[derive(Debug, Clone)]
pub struct TaskEntry {
    /// Human-readable name, e.g. `skyrim/default`.
    pub name: String,
    /// Final status.
    pub status: TaskStatus,
    /// Optional detail message (skip reason, error description).
    pub message: Option<String>,
}

/// Status of a completed unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Completed successfully.
    Ok,
    /// Nothing to do, e.g. the mod type has no destination path.
    NotApplicable,
    /// Explicitly skipped.
    Skipped,
    /// Ran in dry-run mode; nothing was changed.
    DryRun,
    /// Failed.
    Failed,
}

/// Abstraction over logging backends.
///
/// [`Logger`](super::logger::Logger) implements this for console and file
/// output. The orchestrator and commands only see the trait so tests can
/// substitute a silent implementation.
pub trait Log: Send + Sync {
    /// Log a stage header (major section).
    fn stage(&self, msg: &str);
    /// Log an informational message.
    fn info(&self, msg: &str);
    /// Log a debug message (may be suppressed on console).
    fn debug(&self, msg: &str);
    /// Log a warning message.
    fn warn(&self, msg: &str);
    /// Log an error message.
    fn error(&self, msg: &str);
    /// Log a dry-run action message.
    fn dry_run(&self, msg: &str);
    /// Record a result for the summary.
    fn record_task(&self, name: &str, status: TaskStatus, message: Option<&str>);
    /// Update the progress entry stored under `key`.
    ///
    /// Each key owns exactly one entry, so concurrent operations reporting
    /// under different keys never overwrite each other.
    fn progress(&self, key: &str, text: &str, percent: u8);
    /// Drop the progress entry stored under `key`.
    fn finish_progress(&self, key: &str);
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[test]
    fn task_status_equality() {
        assert_eq!(TaskStatus::Ok, TaskStatus::Ok);
        assert_ne!(TaskStatus::Ok, TaskStatus::Failed);
        assert_ne!(TaskStatus::Skipped, TaskStatus::DryRun);
        assert_ne!(TaskStatus::NotApplicable, TaskStatus::Ok);
    }

    #[test]
    fn task_entry_clone() {
        let entry = TaskEntry {
            name: "skyrim/default".to_string(),
            status: TaskStatus::Ok,
            message: Some("12 files".to_string()),
        };
        let cloned = entry.clone();
        assert_eq!(cloned.name, entry.name);
        assert_eq!(cloned.status, entry.status);
        assert_eq!(cloned.message, entry.message);
    }
}
