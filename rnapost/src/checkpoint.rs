//! On-disk checkpoint store for resumable runs.
//!
//! One JSON file per output directory records which stages have completed.
//! A missing or corrupt file means "nothing completed yet" — the store is
//! never a fatal dependency of the controller, and write failures are
//! logged and swallowed.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Name of the checkpoint file inside the output directory.
pub const CHECKPOINT_FILE: &str = ".pipeline_checkpoint.json";

/// Recorded status of a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckpointStatus {
    /// The stage was started but has not finished.
    Running,
    /// The stage completed successfully; it will be skipped on resume.
    Completed,
    /// The stage failed; it will be retried on resume.
    Failed,
}

/// Per-stage checkpoint record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    /// Recorded status.
    pub status: CheckpointStatus,
    /// When the record was written.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CheckpointState {
    last_completed_step: Option<String>,
    #[serde(default)]
    steps: BTreeMap<String, CheckpointRecord>,
    last_updated: Option<DateTime<Utc>>,
}

/// Persistent step-completion index for one output directory.
#[derive(Debug)]
pub struct CheckpointStore {
    file: PathBuf,
    state: CheckpointState,
}

impl CheckpointStore {
    /// Opens (or initializes) the checkpoint store for an output directory.
    ///
    /// A missing or unreadable file yields an empty state.
    #[must_use]
    pub fn open(dir: impl AsRef<Path>) -> Self {
        let file = dir.as_ref().join(CHECKPOINT_FILE);
        let state = match std::fs::read_to_string(&file) {
            Ok(raw) => match serde_json::from_str(&raw) {
                Ok(state) => state,
                Err(err) => {
                    warn!(
                        file = %file.display(),
                        error = %err,
                        "corrupt checkpoint file, starting fresh"
                    );
                    CheckpointState::default()
                }
            },
            Err(_) => {
                debug!(file = %file.display(), "no checkpoint file, starting fresh");
                CheckpointState::default()
            }
        };
        Self { file, state }
    }

    /// True iff a completed record exists for `step`.
    #[must_use]
    pub fn should_skip_step(&self, step: &str) -> bool {
        self.state
            .steps
            .get(step)
            .is_some_and(|record| record.status == CheckpointStatus::Completed)
    }

    /// The most recently completed step, if any.
    #[must_use]
    pub fn last_completed_step(&self) -> Option<&str> {
        self.state.last_completed_step.as_deref()
    }

    /// Idempotently records `status` for `step`; last write wins.
    ///
    /// The state is persisted immediately. Persistence failures are logged
    /// and swallowed — losing a checkpoint only costs a re-run of the step.
    pub fn save_checkpoint(&mut self, step: &str, status: CheckpointStatus) {
        let now = Utc::now();
        self.state.steps.insert(
            step.to_string(),
            CheckpointRecord {
                status,
                timestamp: now,
            },
        );
        if status == CheckpointStatus::Completed {
            self.state.last_completed_step = Some(step.to_string());
        }
        self.state.last_updated = Some(now);
        self.persist();
    }

    /// Removes the checkpoint file and resets the in-memory state.
    pub fn clear(&mut self) {
        if self.file.exists() {
            if let Err(err) = std::fs::remove_file(&self.file) {
                warn!(file = %self.file.display(), error = %err, "failed to remove checkpoint file");
            }
        }
        self.state = CheckpointState::default();
    }

    fn persist(&self) {
        if let Some(parent) = self.file.parent() {
            if let Err(err) = std::fs::create_dir_all(parent) {
                warn!(dir = %parent.display(), error = %err, "failed to create checkpoint directory");
                return;
            }
        }
        let json = match serde_json::to_string_pretty(&self.state) {
            Ok(json) => json,
            Err(err) => {
                warn!(error = %err, "failed to serialize checkpoint state");
                return;
            }
        };
        if let Err(err) = std::fs::write(&self.file, json) {
            warn!(file = %self.file.display(), error = %err, "failed to write checkpoint file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::tempdir;

    #[test]
    fn test_fresh_store_skips_nothing() {
        let dir = tempdir().unwrap();
        let store = CheckpointStore::open(dir.path());
        assert!(!store.should_skip_step("exploratory"));
        assert!(store.last_completed_step().is_none());
    }

    #[test]
    fn test_completed_record_survives_restart() {
        let dir = tempdir().unwrap();
        {
            let mut store = CheckpointStore::open(dir.path());
            store.save_checkpoint("exploratory", CheckpointStatus::Completed);
            store.save_checkpoint("quality", CheckpointStatus::Running);
        }
        let store = CheckpointStore::open(dir.path());
        assert!(store.should_skip_step("exploratory"));
        assert!(!store.should_skip_step("quality"));
        assert_eq!(store.last_completed_step(), Some("exploratory"));
    }

    #[test]
    fn test_last_write_wins() {
        let dir = tempdir().unwrap();
        let mut store = CheckpointStore::open(dir.path());
        store.save_checkpoint("quality", CheckpointStatus::Failed);
        assert!(!store.should_skip_step("quality"));
        store.save_checkpoint("quality", CheckpointStatus::Completed);
        assert!(store.should_skip_step("quality"));
    }

    #[test]
    fn test_corrupt_file_treated_as_empty() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join(CHECKPOINT_FILE), "{not json").unwrap();
        let store = CheckpointStore::open(dir.path());
        assert!(!store.should_skip_step("exploratory"));
    }

    #[test]
    fn test_clear_removes_file_and_state() {
        let dir = tempdir().unwrap();
        let mut store = CheckpointStore::open(dir.path());
        store.save_checkpoint("enrichment", CheckpointStatus::Completed);
        assert!(dir.path().join(CHECKPOINT_FILE).exists());

        store.clear();
        assert!(!dir.path().join(CHECKPOINT_FILE).exists());
        assert!(!store.should_skip_step("enrichment"));

        let reopened = CheckpointStore::open(dir.path());
        assert!(!reopened.should_skip_step("enrichment"));
    }

    #[test]
    fn test_missing_directory_is_not_fatal() {
        let dir = tempdir().unwrap();
        let nested = dir.path().join("does/not/exist");
        let mut store = CheckpointStore::open(&nested);
        // persist() creates the directory on demand
        store.save_checkpoint("quality", CheckpointStatus::Completed);
        assert!(nested.join(CHECKPOINT_FILE).exists());
    }
}
