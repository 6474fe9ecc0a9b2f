//! File-based conversation store — one JSON record per conversation.
//!
//! Storage location: `~/.parley/memory/<conversation>.json`
//!
//! Records are rewritten wholesale on every save. A save writes a uniquely
//! named temporary file next to the target and renames it over the target,
//! so a reader sees either the old record or the new one, never a torn write.

use async_trait::async_trait;
use parley_core::error::MemoryError;
use parley_core::memory::{ConversationMemory, ConversationStore};
use parley_core::message::ConversationId;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use uuid::Uuid;

/// A directory of per-conversation JSON files.
pub struct FileConversationStore {
    dir: PathBuf,
}

impl FileConversationStore {
    /// Create a store rooted at `dir`. The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Default directory: `~/.parley/memory`
    pub fn default_dir() -> PathBuf {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(".parley").join("memory")
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the record for `id`.
    pub fn record_path(&self, id: &ConversationId) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(id.as_str())))
    }
}

/// Map a conversation id onto a safe file stem.
///
/// Bytes outside `[A-Za-z0-9._@-]` are percent-encoded, `%` included, so
/// distinct ids always get distinct stems. WhatsApp-style ids
/// (`254700000000@s.whatsapp.net`) pass through unchanged.
fn file_stem(id: &str) -> String {
    // "." and ".." must not resolve to directories.
    let all_dots = id.bytes().all(|b| b == b'.');

    let mut stem = String::with_capacity(id.len());
    for b in id.bytes() {
        let keep = b.is_ascii_alphanumeric()
            || matches!(b, b'_' | b'@' | b'-')
            || (b == b'.' && !all_dots);
        if keep {
            stem.push(char::from(b));
        } else {
            stem.push_str(&format!("%{b:02X}"));
        }
    }
    stem
}

#[async_trait]
impl ConversationStore for FileConversationStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, id: &ConversationId) -> ConversationMemory {
        let path = self.record_path(id);

        let content = match tokio::fs::read_to_string(&path).await {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(conversation = %id, "No memory record yet, starting fresh");
                return ConversationMemory::default();
            }
            Err(e) => {
                warn!(conversation = %id, error = %e, "Failed to read memory record, starting fresh");
                return ConversationMemory::default();
            }
        };

        match serde_json::from_str::<ConversationMemory>(&content) {
            Ok(memory) => memory,
            Err(e) => {
                let err = MemoryError::Corrupt {
                    conversation_id: id.to_string(),
                    reason: e.to_string(),
                };
                warn!(path = %path.display(), error = %err, "Discarding corrupt memory record");
                ConversationMemory::default()
            }
        }
    }

    async fn save(
        &self,
        id: &ConversationId,
        memory: &ConversationMemory,
    ) -> Result<(), MemoryError> {
        tokio::fs::create_dir_all(&self.dir).await.map_err(|e| {
            MemoryError::Storage(format!("Failed to create memory directory: {e}"))
        })?;

        let content = serde_json::to_string_pretty(memory).map_err(|e| {
            MemoryError::Storage(format!("Failed to serialize memory record: {e}"))
        })?;

        let target = self.record_path(id);
        let tmp = self
            .dir
            .join(format!("{}.{}.tmp", file_stem(id.as_str()), Uuid::new_v4()));

        if let Err(e) = tokio::fs::write(&tmp, content).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(MemoryError::Storage(format!(
                "Failed to write memory record: {e}"
            )));
        }

        if let Err(e) = tokio::fs::rename(&tmp, &target).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(MemoryError::Storage(format!(
                "Failed to replace memory record: {e}"
            )));
        }

        debug!(conversation = %id, turns = memory.history.len(), "Memory record saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use parley_core::message::{Message, Topic};

    fn sample() -> ConversationMemory {
        let mut memory = ConversationMemory {
            topic: Topic::Shop,
            last_interaction_at: Some(Utc::now()),
            ..ConversationMemory::default()
        };
        memory.push(Message::user("price of honey?"), 10);
        memory.push(Message::assistant("KSh 500 per jar"), 10);
        memory
    }

    #[test]
    fn file_stem_is_safe() {
        assert_eq!(
            file_stem("254700000000@s.whatsapp.net"),
            "254700000000@s.whatsapp.net"
        );
        assert_eq!(file_stem("../../etc/passwd"), "..%2F..%2Fetc%2Fpasswd");
        assert_eq!(file_stem(".."), "%2E%2E");
        assert_eq!(file_stem("a b/c"), "a%20b%2Fc");
        assert_eq!(file_stem("bei-ñ"), "bei-%C3%B1");
    }

    #[test]
    fn file_stem_is_injective() {
        let ids = ["team:1", "team/1", "team_1", "team%3A1", "team%253A1", "..", "%2E%2E"];
        let stems: std::collections::HashSet<String> =
            ids.iter().map(|id| file_stem(id)).collect();
        assert_eq!(stems.len(), ids.len());
    }

    #[tokio::test]
    async fn similar_ids_get_separate_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let mut secret = ConversationMemory::default();
        secret.push(Message::user("secret from team:1"), 10);

        store.save(&ConversationId::from("team:1"), &secret).await.unwrap();

        assert_eq!(store.load(&ConversationId::from("team:1")).await, secret);
        for other in ["team/1", "team_1", "team%3A1"] {
            assert!(store.load(&ConversationId::from(other)).await.history.is_empty());
        }
    }

    #[tokio::test]
    async fn missing_record_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path().join("memory"));
        let memory = store.load(&ConversationId::from("nobody")).await;
        assert_eq!(memory, ConversationMemory::default());
    }

    #[tokio::test]
    async fn save_then_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path().join("memory"));
        let id = ConversationId::from("254700000000@s.whatsapp.net");
        let memory = sample();

        store.save(&id, &memory).await.unwrap();
        let loaded = store.load(&id).await;

        assert_eq!(loaded, memory);
        assert!(store.record_path(&id).exists());
    }

    #[tokio::test]
    async fn save_overwrites_and_leaves_no_temp_files() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let id = ConversationId::from("chat");

        store.save(&id, &sample()).await.unwrap();
        store.save(&id, &ConversationMemory::default()).await.unwrap();

        assert_eq!(store.load(&id).await, ConversationMemory::default());
        let names: Vec<String> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["chat.json"]);
    }

    #[tokio::test]
    async fn corrupt_record_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let id = ConversationId::from("broken");
        std::fs::write(store.record_path(&id), "{ not json").unwrap();

        assert_eq!(store.load(&id).await, ConversationMemory::default());
    }

    #[tokio::test]
    async fn conversations_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let a = ConversationId::from("a");
        let b = ConversationId::from("b");

        store.save(&a, &sample()).await.unwrap();

        assert_eq!(store.load(&a).await.history.len(), 2);
        assert!(store.load(&b).await.history.is_empty());
    }

    #[tokio::test]
    async fn record_without_optional_fields_loads() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileConversationStore::new(dir.path());
        let id = ConversationId::from("legacy");
        std::fs::write(
            store.record_path(&id),
            r#"{"history":[{"role":"user","content":"hi"}]}"#,
        )
        .unwrap();

        let memory = store.load(&id).await;
        assert_eq!(memory.history, vec![Message::user("hi")]);
        assert_eq!(memory.topic, Topic::General);
        assert!(memory.last_interaction_at.is_none());
    }
}
