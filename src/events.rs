//! Notifications emitted to the surrounding application.
//!
//! The orchestrator and reconciler report through an [`EventSink`]; the
//! CLI installs [`TracingEvents`], tests use [`RecordingEvents`].
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use crate::logging::Log;

/// Paths per mod id, as passed to
/// [`EventSink::check_file_override_redundancies`].
pub type ModPaths = BTreeMap<String, Vec<String>>;

/// Receiver of deployment notifications.
#[cfg_attr(test, mockall::automock)]
pub trait EventSink: Send + Sync + std::fmt::Debug {
    /// The staged content of `mod_id` changed outside a deployment.
    fn mod_content_changed(&self, game_id: &str, mod_id: &str);

    /// Staged files were removed; overrides naming them may now be stale.
    fn check_file_override_redundancies(&self, game_id: &str, files: &ModPaths);

    /// Keyed progress: one entry per `key`, `percent` in `0..=100`.
    fn progress(&self, key: &str, text: &str, percent: u8);

    /// The operation reporting under `key` finished.
    fn progress_done(&self, key: &str);
}

/// [`EventSink`] that logs notifications through [`tracing`] and forwards
/// progress to a [`Log`].
pub struct TracingEvents {
    log: Arc<dyn Log>,
}

impl std::fmt::Debug for TracingEvents {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TracingEvents").finish_non_exhaustive()
    }
}

impl TracingEvents {
    /// Forward progress to `log`.
    #[must_use]
    pub const fn new(log: Arc<dyn Log>) -> Self {
        Self { log }
    }
}

impl EventSink for TracingEvents {
    fn mod_content_changed(&self, game_id: &str, mod_id: &str) {
        tracing::info!(game = game_id, "content of mod '{mod_id}' changed");
    }

    fn check_file_override_redundancies(&self, game_id: &str, files: &ModPaths) {
        for (mod_id, paths) in files {
            tracing::info!(
                game = game_id,
                files = paths.len(),
                "staged files of '{mod_id}' were removed, checking overrides"
            );
        }
    }

    fn progress(&self, key: &str, text: &str, percent: u8) {
        self.log.progress(key, text, percent);
    }

    fn progress_done(&self, key: &str) {
        self.log.finish_progress(key);
    }
}

/// A single notification captured by [`RecordingEvents`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordedEvent {
    /// See [`EventSink::mod_content_changed`].
    ModContentChanged {
        /// Game id.
        game_id: String,
        /// Mod id.
        mod_id: String,
    },
    /// See [`EventSink::check_file_override_redundancies`].
    CheckOverrides {
        /// Game id.
        game_id: String,
        /// Removed paths per mod.
        files: ModPaths,
    },
    /// See [`EventSink::progress`].
    Progress {
        /// Progress key.
        key: String,
        /// Phase description.
        text: String,
        /// Percentage.
        percent: u8,
    },
    /// See [`EventSink::progress_done`].
    ProgressDone {
        /// Progress key.
        key: String,
    },
}

/// [`EventSink`] that records everything, for tests and embedders that
/// want to inspect notifications after the fact.
#[derive(Debug, Default)]
pub struct RecordingEvents {
    events: Mutex<Vec<RecordedEvent>>,
}

impl RecordingEvents {
    /// Create an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications received so far.
    #[must_use]
    pub fn events(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Mod ids passed to `mod_content_changed`, in order.
    #[must_use]
    pub fn changed_mods(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::ModContentChanged { mod_id, .. } => Some(mod_id),
                _ => None,
            })
            .collect()
    }

    /// Percentages reported under `key`, in order.
    #[must_use]
    pub fn progress_for(&self, key: &str) -> Vec<u8> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                RecordedEvent::Progress {
                    key: k, percent, ..
                } if k == key => Some(percent),
                _ => None,
            })
            .collect()
    }

    fn push(&self, event: RecordedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }
}

impl EventSink for RecordingEvents {
    fn mod_content_changed(&self, game_id: &str, mod_id: &str) {
        self.push(RecordedEvent::ModContentChanged {
            game_id: game_id.to_string(),
            mod_id: mod_id.to_string(),
        });
    }

    fn check_file_override_redundancies(&self, game_id: &str, files: &ModPaths) {
        self.push(RecordedEvent::CheckOverrides {
            game_id: game_id.to_string(),
            files: files.clone(),
        });
    }

    fn progress(&self, key: &str, text: &str, percent: u8) {
        self.push(RecordedEvent::Progress {
            key: key.to_string(),
            text: text.to_string(),
            percent,
        });
    }

    fn progress_done(&self, key: &str) {
        self.push(RecordedEvent::ProgressDone {
            key: key.to_string(),
        });
    }
}
