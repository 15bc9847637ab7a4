//! Error types for the Roster record store.

use crate::{CollectionName, RecordId};
use thiserror::Error;

/// All possible errors from the record store.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    // Caller errors
    #[error("record not found: {collection}/{id}")]
    NotFound {
        collection: CollectionName,
        id: RecordId,
    },

    #[error("invalid collection: {0}")]
    InvalidCollection(CollectionName),

    /// A backend rejected the mutation (uniqueness, malformed payload).
    #[error("validation failed: {0}")]
    ValidationFailed(String),

    // Recovered inside the storage layer
    #[error("transient backend error: {0}")]
    TransientBackend(String),

    #[error("persisted store is corrupt: {0}")]
    PersistenceCorruption(String),

    // Logic and local IO errors
    #[error("write queue overflow: more than {limit} pending writers")]
    WriteQueueOverflow { limit: usize },

    #[error("storage error: {0}")]
    Storage(String),
}

impl Error {
    /// Shorthand for a missing record.
    pub fn not_found(collection: impl Into<CollectionName>, id: impl Into<RecordId>) -> Self {
        Error::NotFound {
            collection: collection.into(),
            id: id.into(),
        }
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = Error::not_found("students", "s1");
        assert_eq!(err.to_string(), "record not found: students/s1");

        let err = Error::InvalidCollection("widgets".into());
        assert_eq!(err.to_string(), "invalid collection: widgets");

        let err = Error::WriteQueueOverflow { limit: 8 };
        assert_eq!(
            err.to_string(),
            "write queue overflow: more than 8 pending writers"
        );
    }
}
