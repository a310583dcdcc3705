//! Append-only event log backends

use super::events::{CacheEvent, CacheEventType};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::warn;

#[derive(Debug, Error)]
pub enum EventLogError {
    #[error("Event log I/O error on '{path}': {error}")]
    Io { path: String, error: String },

    #[error("Event log serialization error: {0}")]
    Serialization(String),
}

impl EventLogError {
    fn io(path: &Path, error: impl std::fmt::Display) -> Self {
        Self::Io {
            path: path.display().to_string(),
            error: error.to_string(),
        }
    }
}

/// Append-only store of [`CacheEvent`]s
///
/// Events are never updated or deleted through this interface.
#[async_trait]
pub trait EventLog: Send + Sync + std::fmt::Debug {
    async fn append(&self, event: &CacheEvent) -> Result<(), EventLogError>;

    /// Most recent events of the given types, newest first, at most `limit`
    async fn recent(
        &self,
        types: &[CacheEventType],
        limit: usize,
    ) -> Result<Vec<CacheEvent>, EventLogError>;

    fn backend_name(&self) -> &'static str;
}

/// Process-local event log
#[derive(Debug, Default)]
pub struct MemoryEventLog {
    events: RwLock<Vec<CacheEvent>>,
}

impl MemoryEventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.events.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.read().is_empty()
    }

    /// All events of one type, oldest first
    pub fn events_of(&self, event_type: CacheEventType) -> Vec<CacheEvent> {
        self.events
            .read()
            .iter()
            .filter(|e| e.event_type == event_type)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventLog for MemoryEventLog {
    async fn append(&self, event: &CacheEvent) -> Result<(), EventLogError> {
        self.events.write().push(event.clone());
        Ok(())
    }

    async fn recent(
        &self,
        types: &[CacheEventType],
        limit: usize,
    ) -> Result<Vec<CacheEvent>, EventLogError> {
        Ok(self
            .events
            .read()
            .iter()
            .rev()
            .filter(|e| types.contains(&e.event_type))
            .take(limit)
            .cloned()
            .collect())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

/// JSON-lines file event log, one event per line
#[derive(Debug)]
pub struct FileEventLog {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileEventLog {
    /// Open (creating parent directories as needed) a file-backed log
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, EventLogError> {
        let path = path.into();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| EventLogError::io(parent, e))?;
            }
        }
        Ok(Self {
            path,
            write_lock: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn append(&self, event: &CacheEvent) -> Result<(), EventLogError> {
        let mut line = serde_json::to_string(event)
            .map_err(|e| EventLogError::Serialization(e.to_string()))?;
        line.push('\n');

        let _guard = self.write_lock.lock().await;
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| EventLogError::io(&self.path, e))?;
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| EventLogError::io(&self.path, e))?;
        file.flush()
            .await
            .map_err(|e| EventLogError::io(&self.path, e))
    }

    async fn recent(
        &self,
        types: &[CacheEventType],
        limit: usize,
    ) -> Result<Vec<CacheEvent>, EventLogError> {
        let content = match tokio::fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(EventLogError::io(&self.path, e)),
        };

        let mut events = Vec::new();
        for line in content.lines().rev() {
            if events.len() >= limit {
                break;
            }
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<CacheEvent>(line) {
                Ok(event) if types.contains(&event.event_type) => events.push(event),
                Ok(_) => {}
                Err(e) => warn!(
                    path = %self.path.display(),
                    error = %e,
                    "Skipping malformed event log line"
                ),
            }
        }
        Ok(events)
    }

    fn backend_name(&self) -> &'static str {
        "file"
    }
}
