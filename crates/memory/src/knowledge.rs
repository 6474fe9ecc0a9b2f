//! Knowledge index — a load-once cache over a knowledge source.
//!
//! The knowledge store is static reference text keyed by topic. It is read
//! wholesale on first use and kept for the life of the process; `invalidate`
//! forces the next `load` to read the source again.

use async_trait::async_trait;
use parley_core::error::KnowledgeError;
use parley_core::knowledge::{KnowledgeBase, KnowledgeSource};
use parley_core::message::Topic;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Reads `*.txt`, `*.md` and `*.json` files from a directory, in file-name order.
///
/// - Text files: topic = file stem, text = contents.
/// - JSON files: an object of `topic -> string`, or an array of
///   `{ "title": ..., "content": ... }` records. Any other JSON shape is kept
///   as raw text under the file stem.
pub struct DirectoryKnowledgeSource {
    dir: PathBuf,
}

impl DirectoryKnowledgeSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[derive(Deserialize)]
struct KnowledgeRecord {
    title: String,
    content: String,
}

/// Add `text` under `topic`, appending when the topic already has text.
fn merge(kb: &mut KnowledgeBase, topic: &str, text: &str) {
    let text = text.trim();
    if topic.is_empty() || text.is_empty() {
        return;
    }
    let merged = match kb.get(topic) {
        Some(existing) => format!("{existing}\n\n{text}"),
        None => text.to_string(),
    };
    kb.insert(topic, merged);
}

fn ingest_json(kb: &mut KnowledgeBase, stem: &str, raw: &str) {
    match serde_json::from_str::<serde_json::Value>(raw) {
        Ok(serde_json::Value::Object(map))
            if !map.is_empty() && map.values().all(|v| v.is_string()) =>
        {
            for (topic, text) in &map {
                merge(kb, topic, text.as_str().unwrap_or_default());
            }
        }
        Ok(value @ serde_json::Value::Array(_)) => {
            match serde_json::from_value::<Vec<KnowledgeRecord>>(value) {
                Ok(records) => {
                    for record in &records {
                        merge(kb, &record.title, &record.content);
                    }
                }
                Err(_) => merge(kb, stem, raw),
            }
        }
        _ => merge(kb, stem, raw),
    }
}

#[async_trait]
impl KnowledgeSource for DirectoryKnowledgeSource {
    async fn load_all(&self) -> Result<KnowledgeBase, KnowledgeError> {
        let mut reader = tokio::fs::read_dir(&self.dir).await.map_err(|e| {
            KnowledgeError::Unavailable(format!("{}: {e}", self.dir.display()))
        })?;

        let mut files = Vec::new();
        while let Some(entry) = reader.next_entry().await.map_err(|e| {
            KnowledgeError::Unavailable(format!("{}: {e}", self.dir.display()))
        })? {
            let path = entry.path();
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();

        let mut kb = KnowledgeBase::new();
        for path in files {
            let ext = path
                .extension()
                .and_then(|e| e.to_str())
                .map(|e| e.to_ascii_lowercase());
            let Some(ext) = ext.filter(|e| matches!(e.as_str(), "txt" | "md" | "json")) else {
                continue;
            };
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string();

            let raw = match tokio::fs::read_to_string(&path).await {
                Ok(raw) => raw,
                Err(e) => {
                    let err = KnowledgeError::ReadFailed {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    };
                    warn!(error = %err, "Skipping knowledge file");
                    continue;
                }
            };

            if ext == "json" {
                ingest_json(&mut kb, &stem, &raw);
            } else {
                merge(&mut kb, &stem, &raw);
            }
        }

        debug!(dir = %self.dir.display(), topics = kb.len(), "Knowledge directory read");
        Ok(kb)
    }
}

#[derive(Default)]
struct IndexState {
    current: Option<Arc<KnowledgeBase>>,
    last_good: Option<Arc<KnowledgeBase>>,
}

/// Process-lifetime cache in front of a `KnowledgeSource`.
pub struct KnowledgeIndex {
    source: Arc<dyn KnowledgeSource>,
    state: Mutex<IndexState>,
}

impl KnowledgeIndex {
    pub fn new(source: Arc<dyn KnowledgeSource>) -> Self {
        Self {
            source,
            state: Mutex::new(IndexState::default()),
        }
    }

    /// The cached knowledge base, reading the source on first use.
    ///
    /// Never fails. When the source errors, the last successful snapshot is
    /// returned (or an empty base if there is none) and the next call retries.
    /// Concurrent first calls share a single read.
    pub async fn load(&self) -> Arc<KnowledgeBase> {
        let mut state = self.state.lock().await;
        if let Some(kb) = &state.current {
            return kb.clone();
        }

        match self.source.load_all().await {
            Ok(kb) => {
                info!(topics = kb.len(), "Knowledge loaded");
                let kb = Arc::new(kb);
                state.current = Some(kb.clone());
                state.last_good = Some(kb.clone());
                kb
            }
            Err(e) => {
                warn!(error = %e, "Knowledge source unavailable, using fallback");
                state.last_good.clone().unwrap_or_default()
            }
        }
    }

    /// Drop the cached snapshot so the next `load` reads the source again.
    pub async fn invalidate(&self) {
        self.state.lock().await.current = None;
    }

    /// Pick the text for `topic`, or the first two entries when the topic has none.
    pub fn select(topic: Topic, kb: &KnowledgeBase) -> String {
        match kb.get(topic.as_str()) {
            Some(text) => text.to_string(),
            None => kb
                .iter()
                .take(2)
                .map(|(_, text)| text)
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// Keep at most `max_chars` characters of `text`, cutting on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}
