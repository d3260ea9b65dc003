//! Durable and session snapshots of an in-progress questionnaire.

use std::{collections::HashMap, fs, io, path::PathBuf, sync::Arc};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{info, warn};

use super::steps::TOTAL_STEPS;
use crate::models::AnswerAggregate;

pub const ANSWERS_KEY: &str = "ai_dress_designer_questionnaire_answers";
pub const STEP_KEY: &str = "ai_dress_designer_current_step";
/// Session-scoped; present only while an authentication redirect is in flight.
pub const AUTH_REDIRECT_KEY: &str = "ai_dress_designer_oauth_redirect";

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")] Io(#[from] io::Error),
    #[error("corrupt snapshot: {0}")] Serde(#[from] serde_json::Error),
    #[error("invalid storage key '{0}'")] InvalidKey(String),
}

/// String key/value storage that outlives a single wizard instance.
pub trait SnapshotStore: Send + Sync {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

impl<T: SnapshotStore + ?Sized> SnapshotStore for Arc<T> {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> { (**self).read(key) }
    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> { (**self).write(key, value) }
    fn remove(&self, key: &str) -> Result<(), StorageError> { (**self).remove(key) }
}

/// In-process store; suitable as the session scope.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub fn contains(&self, key: &str) -> bool { self.entries.lock().contains_key(key) }
}

impl SnapshotStore for MemoryStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.entries.lock().get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries.lock().remove(key);
        Ok(())
    }
}

/// One JSON file per key under a directory; survives process restarts.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StorageError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path(&self, key: &str) -> Result<PathBuf, StorageError> {
        if key.is_empty() || !key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') {
            return Err(StorageError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

impl SnapshotStore for FileStore {
    fn read(&self, key: &str) -> Result<Option<String>, StorageError> {
        match fs::read_to_string(self.path(key)?) {
            Ok(v) => Ok(Some(v)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let path = self.path(key)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, value)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(key)?) {
            Err(e) if e.kind() != io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

pub fn save_answers(store: &dyn SnapshotStore, answers: &AnswerAggregate) -> Result<(), StorageError> {
    store.write(ANSWERS_KEY, &serde_json::to_string(answers)?)
}

pub fn load_answers(store: &dyn SnapshotStore) -> Result<Option<AnswerAggregate>, StorageError> {
    match store.read(ANSWERS_KEY)? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub fn save_step(store: &dyn SnapshotStore, step: usize) -> Result<(), StorageError> {
    store.write(STEP_KEY, &step.to_string())
}

/// The saved cursor, if it is a valid in-progress value.
pub fn load_step(store: &dyn SnapshotStore) -> Result<Option<usize>, StorageError> {
    let step = store.read(STEP_KEY)?.and_then(|raw| raw.trim().parse::<usize>().ok());
    Ok(step.filter(|s| (1..=TOTAL_STEPS).contains(s)))
}

/// Drops both the answers and the cursor snapshots.
pub fn clear(store: &dyn SnapshotStore) -> Result<(), StorageError> {
    store.remove(ANSWERS_KEY)?;
    store.remove(STEP_KEY)?;
    info!("✅ Cleared saved answers and step");
    Ok(())
}

pub fn auth_redirect_pending(session: &dyn SnapshotStore) -> Result<bool, StorageError> {
    Ok(session.read(AUTH_REDIRECT_KEY)?.is_some())
}

/// Stashes `answers` durably and flags that an authentication redirect is in flight.
pub fn begin_auth_redirect(durable: &dyn SnapshotStore, session: &dyn SnapshotStore, answers: &AnswerAggregate) -> Result<(), StorageError> {
    save_answers(durable, answers)?;
    session.write(AUTH_REDIRECT_KEY, "true")?;
    info!("Set auth redirect flag with answers saved for recovery");
    Ok(())
}

/// Consumes the redirect flag. When it was set, the stored answers are
/// returned as pending submission; otherwise `None`.
pub fn resume_after_auth(durable: &dyn SnapshotStore, session: &dyn SnapshotStore) -> Result<Option<AnswerAggregate>, StorageError> {
    if !auth_redirect_pending(session)? {
        return Ok(None);
    }
    session.remove(AUTH_REDIRECT_KEY)?;
    let pending = load_answers(durable)?;
    if pending.is_none() {
        warn!("Auth redirect flag was set but no answers were saved");
    }
    Ok(pending)
}

pub fn abandon_auth_redirect(session: &dyn SnapshotStore) -> Result<(), StorageError> {
    session.remove(AUTH_REDIRECT_KEY)
}
