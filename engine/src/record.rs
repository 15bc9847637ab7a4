//! Record types for storing data.

use crate::{RecordId, Timestamp};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Fields owned by the store. Callers can never overwrite them through a patch.
pub const RESERVED_FIELDS: [&str; 3] = ["id", "createdAt", "updatedAt"];

/// Free-form record fields.
pub type Fields = Map<String, Value>;

/// A data record in a list collection.
///
/// Serializes flat: `{"id": .., "createdAt": .., "updatedAt": .., ...fields}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    /// Unique identifier within the collection
    pub id: RecordId,
    /// When the record was first created (milliseconds since epoch)
    #[serde(default)]
    pub created_at: Timestamp,
    /// When the record was last updated (milliseconds since epoch)
    #[serde(default)]
    pub updated_at: Timestamp,
    /// Everything else the caller stored
    #[serde(flatten)]
    pub fields: Fields,
}

impl Record {
    /// Create a new record stamped at `timestamp`.
    pub fn new(id: impl Into<RecordId>, fields: Fields, timestamp: Timestamp) -> Self {
        let mut record = Self {
            id: id.into(),
            created_at: timestamp,
            updated_at: timestamp,
            fields: Fields::new(),
        };
        record.overlay(fields);
        record
    }

    /// Build a record from caller-supplied fields.
    ///
    /// Keeps the caller's `id` when it is a non-empty string or a number,
    /// otherwise asks `next_id` for a fresh one. Caller-supplied timestamps
    /// are discarded.
    pub fn from_fields(
        fields: Fields,
        timestamp: Timestamp,
        next_id: impl FnOnce() -> RecordId,
    ) -> Self {
        let id = fields.get("id").and_then(id_from_value).unwrap_or_else(next_id);
        Self::new(id, fields, timestamp)
    }

    /// Merge-patch this record: overlay the provided fields, keep the rest.
    ///
    /// `updatedAt` never moves backwards, even when the caller's clock does.
    pub fn merge_patch(&mut self, patch: Fields, timestamp: Timestamp) {
        self.overlay(patch);
        self.updated_at = self.updated_at.max(timestamp).max(self.created_at);
    }

    fn overlay(&mut self, patch: Fields) {
        for (key, value) in patch {
            if RESERVED_FIELDS.contains(&key.as_str()) {
                continue;
            }
            self.fields.insert(key, value);
        }
    }
}

/// Interpret a JSON value as a record id.
pub fn id_from_value(value: &Value) -> Option<RecordId> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
