//! Chat history persistence.
//!
//! Two logical stores are kept per workspace:
//! ```text
//! .kiln/history/
//! ├── display/<appId>.jsonl   # What users see, one entry per turn
//! └── replay/<appId>.jsonl    # Granular entries used to rebuild model memory
//! ```
//! Both are append-only. History is never deleted by the chat layer.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use kiln_core::AppId;

use crate::error::{ChatError, ChatResult};
use crate::types::HistoryEntry;

/// Append-only store of chat entries keyed by application.
#[async_trait]
pub trait ChatHistory: Send + Sync {
    async fn append(&self, entry: HistoryEntry) -> ChatResult<()>;

    /// Append several entries, in order.
    async fn append_batch(&self, entries: Vec<HistoryEntry>) -> ChatResult<()> {
        for entry in entries {
            self.append(entry).await?;
        }
        Ok(())
    }

    /// The newest `max` entries, oldest first.
    async fn load_recent(&self, app_id: AppId, max: usize) -> ChatResult<Vec<HistoryEntry>>;
}

/// The display and replay stores.
#[derive(Clone)]
pub struct HistoryStores {
    pub display: Arc<dyn ChatHistory>,
    pub replay: Arc<dyn ChatHistory>,
}

impl HistoryStores {
    pub fn new(display: Arc<dyn ChatHistory>, replay: Arc<dyn ChatHistory>) -> Self {
        Self { display, replay }
    }

    /// JSON-lines stores below `history_dir`.
    pub fn jsonl(history_dir: impl AsRef<Path>) -> Self {
        let root = history_dir.as_ref();
        Self::new(
            Arc::new(JsonlChatHistory::new(root.join("display"))),
            Arc::new(JsonlChatHistory::new(root.join("replay"))),
        )
    }

    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryChatHistory::new()),
            Arc::new(InMemoryChatHistory::new()),
        )
    }

    /// Record the same entry in both stores.
    pub async fn append_both(&self, entry: HistoryEntry) -> ChatResult<()> {
        self.display.append(entry.clone()).await?;
        self.replay.append(entry).await
    }
}

/// One JSON-lines file per application.
#[derive(Debug, Clone)]
pub struct JsonlChatHistory {
    dir: PathBuf,
}

impl JsonlChatHistory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(dir: &Path, app_id: AppId) -> PathBuf {
        dir.join(format!("{}.jsonl", app_id))
    }

    fn write_lines(dir: &Path, app_id: AppId, entries: &[HistoryEntry]) -> ChatResult<()> {
        fs::create_dir_all(dir)?;

        let mut buf = String::new();
        for entry in entries {
            buf.push_str(&serde_json::to_string(entry)?);
            buf.push('\n');
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(Self::path_for(dir, app_id))?;
        file.write_all(buf.as_bytes())?;
        Ok(())
    }

    fn read_lines(dir: &Path, app_id: AppId) -> ChatResult<Vec<HistoryEntry>> {
        let path = Self::path_for(dir, app_id);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let reader = BufReader::new(File::open(&path)?);
        let mut entries = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<HistoryEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!("Skipping unreadable history line {} in {:?}: {}", n + 1, path, e),
            }
        }
        Ok(entries)
    }

    async fn write_blocking(&self, app_id: AppId, entries: Vec<HistoryEntry>) -> ChatResult<()> {
        let dir = self.dir.clone();
        tokio::task::spawn_blocking(move || Self::write_lines(&dir, app_id, &entries))
            .await
            .map_err(|e| ChatError::History(e.to_string()))?
    }
}

#[async_trait]
impl ChatHistory for JsonlChatHistory {
    async fn append(&self, entry: HistoryEntry) -> ChatResult<()> {
        self.write_blocking(entry.app_id, vec![entry]).await
    }

    async fn append_batch(&self, entries: Vec<HistoryEntry>) -> ChatResult<()> {
        let mut by_app: HashMap<AppId, Vec<HistoryEntry>> = HashMap::new();
        for entry in entries {
            by_app.entry(entry.app_id).or_default().push(entry);
        }
        for (app_id, entries) in by_app {
            debug!("Appending {} history entries for app {}", entries.len(), app_id);
            self.write_blocking(app_id, entries).await?;
        }
        Ok(())
    }

    async fn load_recent(&self, app_id: AppId, max: usize) -> ChatResult<Vec<HistoryEntry>> {
        let dir = self.dir.clone();
        let mut entries = tokio::task::spawn_blocking(move || Self::read_lines(&dir, app_id))
            .await
            .map_err(|e| ChatError::History(e.to_string()))??;

        let skip = entries.len().saturating_sub(max);
        entries.drain(..skip);
        Ok(entries)
    }
}

/// Process-local store for tests and throwaway sessions.
#[derive(Debug, Default)]
pub struct InMemoryChatHistory {
    entries: Mutex<HashMap<AppId, Vec<HistoryEntry>>>,
}

impl InMemoryChatHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every entry for an application, oldest first.
    pub fn entries(&self, app_id: AppId) -> Vec<HistoryEntry> {
        self.entries.lock().get(&app_id).cloned().unwrap_or_default()
    }
}

#[async_trait]
impl ChatHistory for InMemoryChatHistory {
    async fn append(&self, entry: HistoryEntry) -> ChatResult<()> {
        self.entries.lock().entry(entry.app_id).or_default().push(entry);
        Ok(())
    }

    async fn load_recent(&self, app_id: AppId, max: usize) -> ChatResult<Vec<HistoryEntry>> {
        let guard = self.entries.lock();
        let all = guard.get(&app_id).map(Vec::as_slice).unwrap_or_default();
        let skip = all.len().saturating_sub(max);
        Ok(all[skip..].to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Actor, EntryKind};
    use kiln_core::RequestContext;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_jsonl_append_and_load_recent() {
        let temp = tempdir().unwrap();
        let history = JsonlChatHistory::new(temp.path().join("display"));
        let ctx = RequestContext::new(1, 5);

        for i in 0..5 {
            history.append(HistoryEntry::user(&ctx, format!("msg {}", i))).await.unwrap();
        }

        let recent = history.load_recent(5, 3).await.unwrap();
        let texts: Vec<_> = recent.iter().map(|e| e.text.as_str()).collect();
        assert_eq!(texts, vec!["msg 2", "msg 3", "msg 4"]);

        assert!(history.load_recent(6, 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_jsonl_batch_keeps_order_and_skips_bad_lines() {
        let temp = tempdir().unwrap();
        let dir = temp.path().join("replay");
        let history = JsonlChatHistory::new(&dir);
        let ctx = RequestContext::new(1, 8);

        history
            .append_batch(vec![
                HistoryEntry::assistant(&ctx, "a"),
                HistoryEntry::new(&ctx, Actor::Assistant, EntryKind::ToolRequest, "{}"),
            ])
            .await
            .unwrap();
        let mut file = OpenOptions::new().append(true).open(dir.join("8.jsonl")).unwrap();
        writeln!(file, "not json").unwrap();
        history.append(HistoryEntry::assistant(&ctx, "b")).await.unwrap();

        let entries = history.load_recent(8, 10).await.unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[1].kind, EntryKind::ToolRequest);
        assert_eq!(entries[2].text, "b");
    }

    #[test]
    fn test_in_memory_is_per_app() {
        let history = InMemoryChatHistory::new();
        tokio_test::block_on(async {
            tokio_test::assert_ok!(history.append(HistoryEntry::user(&RequestContext::new(1, 1), "one")).await);
            tokio_test::assert_ok!(history.append(HistoryEntry::user(&RequestContext::new(1, 2), "two")).await);

            assert_eq!(history.entries(1).len(), 1);
            assert_eq!(history.load_recent(2, 5).await.unwrap()[0].text, "two");
            assert!(history.load_recent(2, 0).await.unwrap().is_empty());
        });
    }
}
