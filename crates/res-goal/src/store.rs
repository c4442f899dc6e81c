// store.rs - StateStore: atomic persistence for the state document.
//
// The whole state lives in one JSON file (default `~/.resolutions/data.json`).
// Writes go to `<file>.tmp`, are fsynced, and then renamed over the real
// file, so a crash mid-write leaves the previous document in place. A stale
// temp file from such a crash is never read and is overwritten by the next
// save.
//
// Loading is strict: anything that doesn't parse, carries unknown fields,
// or breaks a document invariant is reported as CorruptState. The store
// never rewrites or deletes a corrupt file on its own.

use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use crate::error::GoalError;
use crate::state::StateDocument;

/// Persistent store for the single state document.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Create a store backed by the given file. Nothing is touched on disk
    /// until the first save.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the document. A missing file means first run: empty state.
    pub fn load(&self) -> Result<StateDocument, GoalError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!(path = %self.path.display(), "no state file yet, starting empty");
                return Ok(StateDocument::default());
            }
            Err(source) => {
                return Err(GoalError::Io {
                    path: self.path.clone(),
                    source,
                })
            }
        };

        // Check the version first so an unsupported document gets a useful
        // message instead of a field-level parse error.
        let value: serde_json::Value =
            serde_json::from_str(&json).map_err(|e| self.corrupt(e.to_string()))?;
        if value.get("schema_version").and_then(|v| v.as_u64()).is_none() {
            return Err(self.corrupt("missing or non-integer schema_version"));
        }

        let doc: StateDocument =
            serde_json::from_value(value).map_err(|e| self.corrupt(e.to_string()))?;
        doc.validate().map_err(|reason| self.corrupt(reason))?;

        tracing::debug!(
            path = %self.path.display(),
            goals = doc.goals.len(),
            entries = doc.log_entries.len(),
            "state loaded"
        );
        Ok(doc)
    }

    /// Atomically replace the document on disk.
    ///
    /// On error the previous file is untouched and the caller must treat the
    /// write as not having happened.
    pub fn save(&self, doc: &StateDocument) -> Result<(), GoalError> {
        let json = serde_json::to_string_pretty(doc)?;
        let tmp = self.temp_path();

        let write = || -> std::io::Result<()> {
            if let Some(parent) = self.path.parent() {
                if !parent.as_os_str().is_empty() {
                    fs::create_dir_all(parent)?;
                }
            }
            let mut file = File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.sync_all()?;
            fs::rename(&tmp, &self.path)?;
            Ok(())
        };

        write().map_err(|source| {
            // Best effort: a half-written temp file is harmless but untidy.
            let _ = fs::remove_file(&tmp);
            GoalError::Write {
                path: self.path.clone(),
                source,
            }
        })?;
        self.sync_parent();

        tracing::debug!(path = %self.path.display(), "state saved");
        Ok(())
    }

    /// Flush the rename itself. The new file is already in place, so a
    /// failure here is reported but does not fail the save.
    #[cfg(unix)]
    fn sync_parent(&self) {
        let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) else {
            return;
        };
        if let Err(e) = File::open(parent).and_then(|dir| dir.sync_all()) {
            tracing::warn!(path = %parent.display(), error = %e, "could not sync state directory");
        }
    }

    #[cfg(not(unix))]
    fn sync_parent(&self) {}

    /// Path of the temp file used during save.
    pub fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn corrupt(&self, reason: impl Into<String>) -> GoalError {
        GoalError::CorruptState {
            path: self.path.clone(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::NewGoal;
    use crate::log_entry::{Delta, LogSource, NewEntry, Sentiment};
    use chrono::Utc;
    use tempfile::tempdir;

    fn populated() -> StateDocument {
        let mut doc = StateDocument::default();
        let books = doc
            .create_goal(NewGoal::titled("Read 24 books").with_target(24.0, Some("books")))
            .unwrap();
        let floss = doc.create_goal(NewGoal::titled("Floss")).unwrap();
        doc.append_entry(NewEntry {
            goal_id: books.id,
            raw_text: "finished book 3".to_string(),
            parsed_update: "Finished a book".to_string(),
            delta: Some(Delta::quantity(1.0, Some("books")).unwrap()),
            sentiment: Sentiment::Positive,
            timestamp: Utc::now(),
            source: LogSource::AiMatched,
        })
        .unwrap();
        doc.append_entry(NewEntry {
            goal_id: floss.id,
            raw_text: "flossed".to_string(),
            parsed_update: String::new(),
            delta: None,
            sentiment: Sentiment::Neutral,
            timestamp: Utc::now(),
            source: LogSource::Manual,
        })
        .unwrap();
        doc.archive_goal(floss.id).unwrap();
        doc
    }

    #[test]
    fn first_run_returns_empty_state() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("data.json"));
        let doc = store.load().unwrap();
        assert!(doc.goals.is_empty());
        assert!(doc.log_entries.is_empty());
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("nested/data.json"));
        let doc = populated();

        store.save(&doc).unwrap();
        let loaded = store.load().unwrap();
        assert_eq!(loaded, doc);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn crash_between_temp_write_and_rename_keeps_prior_document() {
        let dir = tempdir().unwrap();
        let store = StateStore::new(dir.path().join("data.json"));
        let doc = populated();
        store.save(&doc).unwrap();

        // Simulate a crash: the temp file was (partially) written, the rename
        // never happened.
        fs::write(store.temp_path(), "{\"schema_version\": 1, \"goals\": [").unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded, doc);

        // The next save overwrites the stale temp file.
        let mut next = loaded.clone();
        next.create_goal(NewGoal::titled("Stretch")).unwrap();
        store.save(&next).unwrap();
        assert_eq!(store.load().unwrap(), next);
        assert!(!store.temp_path().exists());
    }

    #[test]
    fn failed_write_leaves_prior_state_intact() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = StateStore::new(&path);
        let doc = populated();
        store.save(&doc).unwrap();

        // A directory squatting on the temp path makes File::create fail.
        fs::create_dir(store.temp_path()).unwrap();

        let mut next = doc.clone();
        next.create_goal(NewGoal::titled("Stretch")).unwrap();
        let result = store.save(&next);
        assert!(matches!(result, Err(GoalError::Write { .. })));

        assert_eq!(store.load().unwrap(), doc);
    }

    #[test]
    fn unparseable_document_is_corrupt_and_kept() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, "not json at all").unwrap();
        let store = StateStore::new(&path);

        let result = store.load();
        assert!(matches!(result, Err(GoalError::CorruptState { .. })));
        assert_eq!(fs::read_to_string(&path).unwrap(), "not json at all");
    }

    #[test]
    fn missing_schema_version_is_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"{"goals": [], "log_entries": [], "next_log_seq": 1}"#).unwrap();
        let result = StateStore::new(&path).load();
        match result {
            Err(GoalError::CorruptState { reason, .. }) => {
                assert!(reason.contains("schema_version"))
            }
            other => panic!("expected CorruptState, got {:?}", other),
        }
    }

    #[test]
    fn unknown_fields_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"{"schema_version": 1, "goals": [], "log_entries": [], "next_log_seq": 1, "config": {}}"#,
        )
        .unwrap();
        assert!(matches!(
            StateStore::new(&path).load(),
            Err(GoalError::CorruptState { .. })
        ));
    }

    #[test]
    fn missing_required_fields_are_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"{"schema_version": 1, "goals": []}"#).unwrap();
        assert!(matches!(
            StateStore::new(&path).load(),
            Err(GoalError::CorruptState { .. })
        ));
    }

    #[test]
    fn future_schema_version_is_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"{"schema_version": 99, "goals": [], "log_entries": [], "next_log_seq": 1}"#,
        )
        .unwrap();
        assert!(matches!(
            StateStore::new(&path).load(),
            Err(GoalError::CorruptState { .. })
        ));
    }

    #[test]
    fn invariant_violations_are_corrupt() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let store = StateStore::new(&path);
        let mut doc = populated();
        doc.goals[0].target = Some(0.0);
        // Bypass save-side checks by writing the JSON directly.
        fs::write(&path, serde_json::to_string(&doc).unwrap()).unwrap();
        assert!(matches!(store.load(), Err(GoalError::CorruptState { .. })));
    }

    #[test]
    fn store_survives_reopen() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("data.json");
        let doc = populated();
        {
            let store = StateStore::new(&path);
            store.save(&doc).unwrap();
        }
        {
            let store = StateStore::new(&path);
            assert_eq!(store.load().unwrap(), doc);
        }
    }
}
