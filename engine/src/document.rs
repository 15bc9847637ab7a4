//! The persisted document - one array per list collection plus settings.
//!
//! This is what the file backend keeps in memory and writes to disk. All
//! mutations take their timestamp as an argument so the document stays
//! deterministic.

use crate::{error::Result, CollectionName, Error, Fields, Record, Timestamp};
use serde::Serialize;
use std::collections::BTreeMap;

/// In-memory image of the file store.
///
/// Built only through [`Schema::normalize`](crate::Schema::normalize), so
/// every declared list collection is present.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Document {
    #[serde(flatten)]
    collections: BTreeMap<CollectionName, Vec<Record>>,
    settings: Fields,
    /// Top-level keys no collection claims; carried through writes untouched.
    #[serde(flatten)]
    extra: Fields,
}

impl Document {
    pub(crate) fn from_parts(
        collections: BTreeMap<CollectionName, Vec<Record>>,
        settings: Fields,
        extra: Fields,
    ) -> Self {
        Self {
            collections,
            settings,
            extra,
        }
    }

    /// All records of a collection, in insertion order.
    pub fn records(&self, collection: &str) -> Result<&[Record]> {
        self.collections
            .get(collection)
            .map(Vec::as_slice)
            .ok_or_else(|| Error::InvalidCollection(collection.to_string()))
    }

    /// Get a record by id.
    pub fn get(&self, collection: &str, id: &str) -> Result<Option<&Record>> {
        Ok(self.records(collection)?.iter().find(|r| r.id == id))
    }

    /// Insert a new record, rejecting duplicate ids.
    pub fn insert(&mut self, collection: &str, record: Record) -> Result<Record> {
        let records = self.records_mut(collection)?;
        if records.iter().any(|r| r.id == record.id) {
            return Err(Error::ValidationFailed(format!(
                "duplicate id '{}' in {}",
                record.id, collection
            )));
        }
        records.push(record.clone());
        Ok(record)
    }

    /// Merge-patch a record, creating it with the given id if absent.
    pub fn update(
        &mut self,
        collection: &str,
        id: &str,
        patch: Fields,
        timestamp: Timestamp,
    ) -> Result<Record> {
        let records = self.records_mut(collection)?;
        match records.iter_mut().find(|r| r.id == id) {
            Some(existing) => {
                existing.merge_patch(patch, timestamp);
                Ok(existing.clone())
            }
            None => {
                let record = Record::new(id, patch, timestamp);
                records.push(record.clone());
                Ok(record)
            }
        }
    }

    /// Remove a record. Returns `false` when there was nothing to remove.
    pub fn delete(&mut self, collection: &str, id: &str) -> Result<bool> {
        let records = self.records_mut(collection)?;
        let before = records.len();
        records.retain(|r| r.id != id);
        Ok(records.len() != before)
    }

    /// The settings singleton.
    pub fn settings(&self) -> &Fields {
        &self.settings
    }

    /// Overlay `patch` onto settings and return the result.
    pub fn merge_settings(&mut self, patch: Fields) -> Fields {
        self.settings.extend(patch);
        self.settings.clone()
    }

    /// Count records across all collections.
    pub fn record_count(&self) -> usize {
        self.collections.values().map(Vec::len).sum()
    }

    fn records_mut(&mut self, collection: &str) -> Result<&mut Vec<Record>> {
        self.collections
            .get_mut(collection)
            .ok_or_else(|| Error::InvalidCollection(collection.to_string()))
    }
}
