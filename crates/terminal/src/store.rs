//! Persistence for the two session histories.
//!
//! The command history and the AI conversation are stored separately and
//! written through on every change. A missing file reads as empty.

use foliobot_core::conversation::ConversationMessage;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

const HISTORY_FILE: &str = "command_history.json";
const CONVERSATION_FILE: &str = "ai_conversation.json";

#[derive(Debug, thiserror::Error)]
pub enum SessionStoreError {
    #[error("Session storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Session file {file} is corrupt: {reason}")]
    Corrupt { file: String, reason: String },
}

pub trait SessionStore: Send + Sync {
    fn load_history(&self) -> Result<Vec<String>, SessionStoreError>;
    fn save_history(&self, entries: &[String]) -> Result<(), SessionStoreError>;
    fn load_conversation(&self) -> Result<Vec<ConversationMessage>, SessionStoreError>;
    fn save_conversation(&self, messages: &[ConversationMessage]) -> Result<(), SessionStoreError>;
}

/// JSON files in one directory.
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned + Default>(&self, file: &str) -> Result<T, SessionStoreError> {
        let path = self.dir.join(file);
        let data = match std::fs::read_to_string(&path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(T::default()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_str(&data).map_err(|e| SessionStoreError::Corrupt {
            file: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), SessionStoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let data = serde_json::to_string_pretty(value).map_err(|e| SessionStoreError::Corrupt {
            file: file.to_string(),
            reason: e.to_string(),
        })?;

        // Write beside the target, then rename over it
        let tmp = self.dir.join(format!("{file}.tmp"));
        let target = self.dir.join(file);
        blocking(|| {
            std::fs::write(&tmp, data)?;
            std::fs::rename(&tmp, target)
        })?;
        Ok(())
    }
}

/// Run blocking file I/O without stalling other tasks on a multi-threaded
/// runtime. Elsewhere (no runtime, or a current-thread one) it runs inline.
fn blocking<R>(f: impl FnOnce() -> R) -> R {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(f)
        }
        _ => f(),
    }
}

impl SessionStore for JsonFileStore {
    fn load_history(&self) -> Result<Vec<String>, SessionStoreError> {
        self.read(HISTORY_FILE)
    }

    fn save_history(&self, entries: &[String]) -> Result<(), SessionStoreError> {
        self.write(HISTORY_FILE, entries)
    }

    fn load_conversation(&self) -> Result<Vec<ConversationMessage>, SessionStoreError> {
        self.read(CONVERSATION_FILE)
    }

    fn save_conversation(&self, messages: &[ConversationMessage]) -> Result<(), SessionStoreError> {
        self.write(CONVERSATION_FILE, messages)
    }
}

/// In-process store, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemorySessionStore {
    history: Mutex<Vec<String>>,
    conversation: Mutex<Vec<ConversationMessage>>,
    writes: Mutex<usize>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_conversation(messages: Vec<ConversationMessage>) -> Self {
        Self {
            conversation: Mutex::new(messages),
            ..Self::default()
        }
    }

    /// Number of saves so far.
    pub fn write_count(&self) -> usize {
        *lock(&self.writes)
    }

    fn count_write(&self) {
        *lock(&self.writes) += 1;
    }
}

/// Lock a mutex, recovering the data if a previous holder panicked.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl SessionStore for MemorySessionStore {
    fn load_history(&self) -> Result<Vec<String>, SessionStoreError> {
        Ok(lock(&self.history).clone())
    }

    fn save_history(&self, entries: &[String]) -> Result<(), SessionStoreError> {
        *lock(&self.history) = entries.to_vec();
        self.count_write();
        Ok(())
    }

    fn load_conversation(&self) -> Result<Vec<ConversationMessage>, SessionStoreError> {
        Ok(lock(&self.conversation).clone())
    }

    fn save_conversation(&self, messages: &[ConversationMessage]) -> Result<(), SessionStoreError> {
        *lock(&self.conversation) = messages.to_vec();
        self.count_write();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_files_read_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("nested"));
        assert!(store.load_history().unwrap().is_empty());
        assert!(store.load_conversation().unwrap().is_empty());
    }

    #[test]
    fn histories_persist_independently() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        store.save_history(&["help".into(), "ai".into()]).unwrap();
        let conversation = vec![
            ConversationMessage::user("what do you do?"),
            ConversationMessage::assistant("I build things."),
        ];
        store.save_conversation(&conversation).unwrap();

        let reopened = JsonFileStore::new(dir.path());
        assert_eq!(reopened.load_history().unwrap(), vec!["help", "ai"]);
        assert_eq!(reopened.load_conversation().unwrap(), conversation);

        reopened.save_conversation(&[]).unwrap();
        assert_eq!(reopened.load_history().unwrap().len(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn writes_inside_multi_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());

        for n in 0..20 {
            store.save_history(&[format!("cmd {n}")]).unwrap();
        }

        assert_eq!(store.load_history().unwrap(), vec!["cmd 19"]);
    }

    #[tokio::test]
    async fn writes_inside_current_thread_runtime() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        store.save_conversation(&[ConversationMessage::user("hi")]).unwrap();
        assert_eq!(store.load_conversation().unwrap().len(), 1);
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(HISTORY_FILE), "{oops").unwrap();
        let err = JsonFileStore::new(dir.path()).load_history().unwrap_err();
        assert!(matches!(err, SessionStoreError::Corrupt { .. }));
    }
}
