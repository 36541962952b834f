//! Persistence of finished and in-progress interviews.
//!
//! All sessions live as one JSON array under a single key of a string
//! key-value store. Storage problems never interrupt an interview: failed
//! reads fall back to an empty history and failed writes are only logged.

use crate::model::InterviewSession;
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

pub const HISTORY_KEY: &str = "interviewHistory";

pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        (**self).set(key, value)
    }
}

/// Stores each key as `<dir>/<key>.json`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        fs::read_to_string(&path)
            .map(Some)
            .with_context(|| format!("Failed to read {}", path.display()))
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;
        let final_path = self.path(key);
        let tmp_path = self.dir.join(format!("{key}.json.tmp"));

        fs::write(&tmp_path, value)
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        if let Err(rename_err) = fs::rename(&tmp_path, &final_path) {
            if !final_path.exists() {
                return Err(rename_err)
                    .with_context(|| format!("Failed to replace {}", final_path.display()));
            }
            fs::remove_file(&final_path)?;
            fs::rename(&tmp_path, &final_path)?;
        }
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("memory store lock poisoned"))?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

pub struct SessionHistory<S> {
    store: S,
}

impl<S: KeyValueStore> SessionHistory<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Every stored session, in storage order.
    pub fn load(&self) -> Vec<InterviewSession> {
        match self.try_load() {
            Ok(sessions) => sessions,
            Err(e) => {
                tracing::error!("Failed to load interview history: {:#}", e);
                Vec::new()
            }
        }
    }

    fn try_load(&self) -> Result<Vec<InterviewSession>> {
        let Some(raw) = self.store.get(HISTORY_KEY)? else {
            return Ok(Vec::new());
        };
        serde_json::from_str(&raw).context("Stored interview history is not valid JSON")
    }

    /// Inserts or replaces the session with the same id.
    pub fn save(&self, session: &InterviewSession) {
        let mut sessions = self.load();
        match sessions.iter_mut().find(|s| s.id == session.id) {
            Some(existing) if existing == session => return,
            Some(existing) => *existing = session.clone(),
            None => sessions.push(session.clone()),
        }

        let written = serde_json::to_string(&sessions)
            .context("Failed to serialize interview history")
            .and_then(|json| self.store.set(HISTORY_KEY, &json));
        if let Err(e) = written {
            tracing::error!("Failed to save interview {}: {:#}", session.id, e);
        }
    }

    pub fn find(&self, id: &str) -> Option<InterviewSession> {
        self.load().into_iter().find(|s| s.id == id)
    }

    /// Newest first.
    pub fn list(&self) -> Vec<InterviewSession> {
        let mut sessions = self.load();
        sessions.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        sessions
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::ChatMessage;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::tempdir;

    fn session(id: &str, start_time: i64) -> InterviewSession {
        let mut session = InterviewSession::new(id, "Backend Engineer", start_time);
        session.messages.push(ChatMessage::assistant("Describe a REST API you built."));
        session
    }

    /// Counts writes and can be told to fail them.
    #[derive(Default)]
    struct CountingStore {
        inner: MemoryStore,
        writes: AtomicUsize,
        fail_writes: bool,
    }

    impl KeyValueStore for CountingStore {
        fn get(&self, key: &str) -> Result<Option<String>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &str) -> Result<()> {
            self.writes.fetch_add(1, Ordering::SeqCst);
            if self.fail_writes {
                anyhow::bail!("quota exceeded");
            }
            self.inner.set(key, value)
        }
    }

    #[test]
    fn test_save_upserts_by_id() {
        let history = SessionHistory::new(MemoryStore::default());
        let mut first = session("a", 1);
        history.save(&first);
        history.save(&session("b", 2));

        first.messages.push(ChatMessage::user("I built a billing service."));
        history.save(&first);

        let sessions = history.load();
        assert_eq!(sessions.len(), 2);
        assert_eq!(history.find("a").unwrap().messages.len(), 2);
    }

    #[test]
    fn test_unchanged_session_is_not_rewritten() {
        let history = SessionHistory::new(CountingStore::default());
        let s = session("a", 1);

        history.save(&s);
        history.save(&s);

        assert_eq!(history.store.writes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_write_failure_is_swallowed() {
        let history = SessionHistory::new(CountingStore {
            fail_writes: true,
            ..Default::default()
        });

        history.save(&session("a", 1));

        assert!(history.load().is_empty());
    }

    #[test]
    fn test_corrupt_history_loads_as_empty() {
        let store = MemoryStore::default();
        store.set(HISTORY_KEY, "{not json").unwrap();
        let history = SessionHistory::new(store);

        assert!(history.load().is_empty());
        assert!(history.find("a").is_none());
    }

    #[test]
    fn test_list_is_newest_first() {
        let history = SessionHistory::new(MemoryStore::default());
        history.save(&session("old", 100));
        history.save(&session("new", 300));
        history.save(&session("mid", 200));

        let ids: Vec<String> = history.list().into_iter().map(|s| s.id).collect();
        assert_eq!(ids, vec!["new", "mid", "old"]);
    }

    #[test]
    fn test_finished_session_reloads_unchanged() -> Result<()> {
        let dir = tempdir()?;
        let mut finished = session("done", 42);
        finished.messages.push(ChatMessage::user("Mostly Rust and Postgres."));
        finished.end_time = Some(99);
        finished.feedback = Some(crate::model::InterviewFeedback {
            communication_skills: "Clear.".to_string(),
            technical_knowledge: "Deep.".to_string(),
            areas_for_improvement: "Pace.".to_string(),
            overall_feedback: "Hire.".to_string(),
        });

        SessionHistory::new(FileStore::new(dir.path())).save(&finished);
        let reloaded = SessionHistory::new(FileStore::new(dir.path())).find("done");

        assert_eq!(reloaded, Some(finished));
        Ok(())
    }

    #[test]
    fn test_file_store_round_trip() -> Result<()> {
        let dir = tempdir()?;
        let store = FileStore::new(dir.path().join("data"));

        assert_eq!(store.get(HISTORY_KEY)?, None);
        store.set(HISTORY_KEY, "[]")?;
        store.set(HISTORY_KEY, "[1]")?;

        assert_eq!(store.get(HISTORY_KEY)?.as_deref(), Some("[1]"));
        assert!(dir.path().join("data/interviewHistory.json").exists());
        assert!(!dir.path().join("data/interviewHistory.json.tmp").exists());
        Ok(())
    }
}
