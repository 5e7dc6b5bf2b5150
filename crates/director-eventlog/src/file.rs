//! A file-backed [`EventLog`] that appends newline-delimited canonical JSON
//! to a single segment file, with an in-memory index rebuilt at open time.

use crate::{validate_structure, EventLog, RetryPolicy, SeqRange};
use async_trait::async_trait;
use director_core::{DirectorError, Event};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::Mutex;
use tracing::warn;
use uuid::Uuid;

struct Inner {
    file: File,
    events: Vec<(u64, Event)>,
    index: HashMap<Uuid, u64>,
}

/// Durable, file-backed event log. One JSON object per line; the whole file
/// is replayed into memory at open time to build the id index and cache the
/// event list for `range`/`tail_from` reads.
pub struct FileEventLog {
    path: PathBuf,
    inner: Mutex<Inner>,
    retry: RetryPolicy,
}

impl FileEventLog {
    /// Opens (creating if absent) a log file at `path`, replaying any
    /// existing contents into memory.
    ///
    /// # Errors
    /// Returns [`DirectorError::Io`] if the file cannot be opened, or
    /// [`DirectorError::Serialization`] if an existing line is corrupt.
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, DirectorError> {
        let path = path.as_ref().to_path_buf();
        let read_file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .await?;

        let mut events = Vec::new();
        let mut index = HashMap::new();
        let mut lines = BufReader::new(read_file.try_clone().await?).lines();
        let mut seq = 0u64;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let event: Event = serde_json::from_str(&line).map_err(DirectorError::Serialization)?;
            seq += 1;
            index.insert(event.id, seq);
            events.push((seq, event));
        }

        let file = OpenOptions::new().append(true).open(&path).await?;

        Ok(Self {
            path,
            inner: Mutex::new(Inner { file, events, index }),
            retry: RetryPolicy::default(),
        })
    }

    /// The path this log is backed by.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn append(&self, event: Event) -> Result<u64, DirectorError> {
        validate_structure(&event)?;

        let mut inner = self.inner.lock().await;
        if let Some(&seq) = inner.index.get(&event.id) {
            return Ok(seq);
        }

        let mut line = director_core::canonical_json(&event)?;
        line.push('\n');
        let bytes = line.into_bytes();

        let mut attempt = 0;
        loop {
            let write_result: Result<(), DirectorError> = async {
                inner.file.write_all(&bytes).await.map_err(DirectorError::Io)?;
                inner.file.flush().await.map_err(DirectorError::Io)
            }
            .await;

            match write_result {
                Ok(()) => break,
                Err(e) if attempt + 1 < self.retry.max_attempts && e.is_retryable() => {
                    tokio::time::sleep(self.retry.delay_for(attempt)).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }

        let seq = inner.events.len() as u64 + 1;
        inner.index.insert(event.id, seq);
        inner.events.push((seq, event));
        Ok(seq)
    }

    async fn range(&self, range: SeqRange) -> Result<Vec<(u64, Event)>, DirectorError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .filter(|(seq, _)| *seq >= range.from && *seq <= range.to)
            .cloned()
            .collect())
    }

    async fn tail_from(&self, from_seq: u64) -> Result<Vec<(u64, Event)>, DirectorError> {
        let inner = self.inner.lock().await;
        Ok(inner
            .events
            .iter()
            .filter(|(seq, _)| *seq >= from_seq)
            .cloned()
            .collect())
    }

    async fn last_seq(&self) -> u64 {
        let inner = self.inner.lock().await;
        inner.events.last().map_or(0, |(seq, _)| *seq)
    }

    async fn seq_for_id(&self, event_id: Uuid) -> Option<u64> {
        let inner = self.inner.lock().await;
        inner.index.get(&event_id).copied()
    }
}

impl Drop for FileEventLog {
    fn drop(&mut self) {
        if let Ok(inner) = self.inner.try_lock() {
            if inner.events.is_empty() {
                warn!(path = %self.path.display(), "closing empty file event log");
            }
        }
    }
}
