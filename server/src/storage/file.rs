//! Single-file JSON backend.
//!
//! The whole store lives in memory as a [`Document`] and is persisted to one
//! JSON file. Writers queue on a fair (FIFO) async mutex: each one computes
//! the next document, normalizes it, writes it atomically and only then
//! publishes it. Once a writer has computed its document, persisting and
//! publishing run on a spawned task that owns the queue turn, so a caller
//! dropping its future cannot leave the file and the published document
//! apart. Readers never touch the queue; they clone the currently published
//! document handle.

use super::atomic::{backup_corrupt, remove_stale_temps, write_json_atomic};
use super::{new_record_id, now_millis, Backend, BackendError, BackendKind};
use async_trait::async_trait;
use parking_lot::RwLock;
use roster_engine::{Document, Error, Fields, Record, Schema, Timestamp};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;

/// File-backed store adapter.
#[derive(Debug)]
pub struct FileAdapter {
    path: PathBuf,
    schema: Arc<Schema>,
    /// Last successfully persisted document.
    document: Arc<RwLock<Arc<Document>>>,
    /// FIFO write queue; held across compute + persist.
    write_lock: Arc<Mutex<()>>,
    /// Writers waiting for or holding `write_lock`.
    pending: AtomicUsize,
    queue_limit: usize,
}

/// Holds one place in the write queue until dropped.
struct QueueSlot<'a>(&'a AtomicUsize);

impl Drop for QueueSlot<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl FileAdapter {
    /// Open (or create) the store file at `path`.
    ///
    /// A missing file is created with the default structure. An unparsable
    /// file is moved aside and replaced by the default structure instead of
    /// failing startup.
    pub async fn open(
        path: impl Into<PathBuf>,
        schema: Arc<Schema>,
        queue_limit: usize,
    ) -> Result<Self, Error> {
        let path = path.into();
        remove_stale_temps(&path).await;
        let document = load(&path, &schema).await?;

        tracing::info!(
            path = %path.display(),
            records = document.record_count(),
            "File store opened"
        );

        Ok(Self {
            path,
            schema,
            document: Arc::new(RwLock::new(Arc::new(document))),
            write_lock: Arc::new(Mutex::new(())),
            pending: AtomicUsize::new(0),
            queue_limit: queue_limit.max(1),
        })
    }

    /// Path of the canonical store file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The currently published document.
    pub fn snapshot(&self) -> Arc<Document> {
        self.document.read().clone()
    }

    /// Run one serialized read-modify-write cycle.
    async fn mutate<T>(
        &self,
        apply: impl FnOnce(&mut Document) -> Result<T, Error>,
    ) -> Result<T, Error> {
        let _slot = self.reserve_slot()?;
        let turn = self.write_lock.clone().lock_owned().await;

        let current = self.snapshot();
        let mut next = current.as_ref().clone();
        let out = apply(&mut next)?;

        if next == *current {
            return Ok(out);
        }

        let next = self
            .schema
            .normalize_document(&next, now_millis(), new_record_id)?;

        let path = self.path.clone();
        let document = self.document.clone();
        let commit = tokio::spawn(async move {
            let _turn = turn;
            write_json_atomic(&path, &next).await?;
            *document.write() = Arc::new(next);
            Ok::<_, Error>(())
        });
        commit
            .await
            .map_err(|err| Error::Storage(format!("store write task failed: {}", err)))??;

        Ok(out)
    }

    fn reserve_slot(&self) -> Result<QueueSlot<'_>, Error> {
        let ahead = self.pending.fetch_add(1, Ordering::SeqCst);
        let slot = QueueSlot(&self.pending);
        if ahead >= self.queue_limit {
            tracing::error!(
                limit = self.queue_limit,
                "File store write queue overflow"
            );
            return Err(Error::WriteQueueOverflow {
                limit: self.queue_limit,
            });
        }
        Ok(slot)
    }
}

async fn load(path: &Path, schema: &Schema) -> Result<Document, Error> {
    let now = now_millis();

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == ErrorKind::NotFound => {
            tracing::info!(path = %path.display(), "No store file yet; creating default structure");
            return reset(path, schema).await;
        }
        Err(err) => return Err(Error::Storage(format!("{}: {}", path.display(), err))),
    };

    match serde_json::from_slice(&bytes) {
        Ok(raw) => {
            let normalized = schema.normalize(raw, now, new_record_id);
            if normalized.repaired {
                tracing::info!(path = %path.display(), "Store file repaired during load");
                write_json_atomic(path, &normalized.document).await?;
            }
            Ok(normalized.document)
        }
        Err(parse) => {
            let corruption = Error::PersistenceCorruption(parse.to_string());
            let backup = backup_corrupt(path, now).await;
            tracing::warn!(
                path = %path.display(),
                backup = ?backup,
                error = %corruption,
                "Store file unreadable; resetting to default structure"
            );
            reset(path, schema).await
        }
    }
}

async fn reset(path: &Path, schema: &Schema) -> Result<Document, Error> {
    let document = schema.default_document();
    write_json_atomic(path, &document).await?;
    Ok(document)
}

#[async_trait]
impl Backend for FileAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::File
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, BackendError> {
        Ok(self.snapshot().records(collection)?.to_vec())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, BackendError> {
        Ok(self.snapshot().get(collection, id)?.cloned())
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record, BackendError> {
        Ok(self.mutate(|doc| doc.insert(collection, record)).await?)
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        timestamp: Timestamp,
    ) -> Result<Record, BackendError> {
        Ok(self
            .mutate(|doc| doc.update(collection, id, patch, timestamp))
            .await?)
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, BackendError> {
        Ok(self.mutate(|doc| doc.delete(collection, id)).await?)
    }

    async fn settings(&self) -> Result<Option<Fields>, BackendError> {
        Ok(Some(self.snapshot().settings().clone()))
    }

    async fn merge_settings(&self, patch: Fields) -> Result<Fields, BackendError> {
        Ok(self.mutate(|doc| Ok(doc.merge_settings(patch))).await?)
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}
