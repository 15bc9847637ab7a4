//! Persistence backends and the failover policy between them.
//!
//! Two adapters implement [`Backend`]: the PostgreSQL-backed
//! [`RemoteAdapter`] and the single-file [`FileAdapter`]. The
//! [`FailoverController`] decides which one serves each call.

mod atomic;
mod classify;
mod failover;
mod file;
mod remote;

pub use atomic::write_json_atomic;
pub use classify::classify;
pub use failover::{Access, BackendStatus, BackoffPolicy, FailoverController, Mode};
pub use file::FileAdapter;
pub use remote::RemoteAdapter;

use async_trait::async_trait;
use roster_engine::{Error, Fields, Record, RecordId, Timestamp};
use serde::Serialize;
use std::fmt;

/// Which adapter served (or would serve) a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    Remote,
    File,
}

/// Failure classes that are expected to heal on their own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TransientClass {
    /// Connection reset, refused, unreachable network
    Network,
    /// Pool acquisition or operation exceeded its bound
    Timeout,
    /// Host name could not be resolved
    NameResolution,
    /// Pool or topology already closed
    Closed,
}

impl fmt::Display for TransientClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransientClass::Network => write!(f, "network"),
            TransientClass::Timeout => write!(f, "timeout"),
            TransientClass::NameResolution => write!(f, "name resolution"),
            TransientClass::Closed => write!(f, "closed"),
        }
    }
}

/// Error raised by an adapter, already classified.
#[derive(Debug, Clone, thiserror::Error)]
pub enum BackendError {
    #[error("transient {class} failure: {message}")]
    Transient {
        class: TransientClass,
        message: String,
    },

    #[error(transparent)]
    Fatal(#[from] Error),
}

impl BackendError {
    /// Build a transient error.
    pub fn transient(class: TransientClass, message: impl Into<String>) -> Self {
        BackendError::Transient {
            class,
            message: message.into(),
        }
    }

    /// Collapse into the store-level taxonomy.
    pub fn into_store_error(self) -> Error {
        match self {
            BackendError::Transient { class, message } => {
                Error::TransientBackend(format!("{}: {}", class, message))
            }
            BackendError::Fatal(err) => err,
        }
    }
}

/// A storage backend the record store can delegate to.
///
/// Implementations never stamp or assign ids on insert; the facade does that
/// once so a retried call writes exactly the same record.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Which adapter this is.
    fn kind(&self) -> BackendKind;

    /// All records of a list collection.
    async fn list(&self, collection: &str) -> Result<Vec<Record>, BackendError>;

    /// One record, if present.
    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, BackendError>;

    /// Insert a fully stamped record. Duplicate ids are a fatal `ValidationFailed`.
    async fn insert(&self, collection: &str, record: Record) -> Result<Record, BackendError>;

    /// Merge-patch a record, creating it when absent.
    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        timestamp: Timestamp,
    ) -> Result<Record, BackendError>;

    /// Remove a record. `false` when it did not exist.
    async fn delete(&self, collection: &str, id: &str) -> Result<bool, BackendError>;

    /// The stored settings object, if any was ever persisted.
    async fn settings(&self) -> Result<Option<Fields>, BackendError>;

    /// Overlay `patch` onto the stored settings and return the result.
    async fn merge_settings(&self, patch: Fields) -> Result<Fields, BackendError>;

    /// Cheap liveness check used by reconnect attempts.
    async fn ping(&self) -> Result<(), BackendError>;
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> Timestamp {
    chrono::Utc::now().timestamp_millis().max(0) as Timestamp
}

/// Fresh record id.
pub fn new_record_id() -> RecordId {
    uuid::Uuid::new_v4().to_string()
}
