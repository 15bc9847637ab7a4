//! Schema definition and normalization.
//!
//! The schema declares every collection the store knows about and whether it
//! is a list of records or a singleton object. [`Schema::normalize`] turns
//! any loaded JSON value into a well-formed [`Document`]; it runs after every
//! file load and before every file write.

use crate::{
    error::Result, record::id_from_value, CollectionName, Document, Error, Fields, Record,
    RecordId, Timestamp,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::{BTreeMap, HashSet};

/// Name of the singleton settings collection.
pub const SETTINGS: &str = "settings";

/// Shape of a collection in the persisted document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// An array of records addressed by id
    List,
    /// A single object, never id-addressed
    Singleton,
}

/// Schema for a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionSchema {
    /// Collection name
    pub name: CollectionName,
    /// List or singleton
    pub shape: Shape,
}

impl CollectionSchema {
    /// Declare a list collection.
    pub fn list(name: impl Into<CollectionName>) -> Self {
        Self {
            name: name.into(),
            shape: Shape::List,
        }
    }

    /// Declare a singleton collection.
    pub fn singleton(name: impl Into<CollectionName>) -> Self {
        Self {
            name: name.into(),
            shape: Shape::Singleton,
        }
    }
}

/// Schema for the entire store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Collection schemas by name
    pub collections: BTreeMap<CollectionName, CollectionSchema>,
    /// Values backfilled into settings when missing
    pub settings_defaults: Fields,
}

/// Output of [`Schema::normalize`].
#[derive(Debug, Clone, PartialEq)]
pub struct Normalized {
    /// The well-formed document
    pub document: Document,
    /// Whether anything had to change to get there
    pub repaired: bool,
}

impl Schema {
    /// Create a schema with only the settings singleton.
    pub fn new(settings_defaults: Fields) -> Self {
        let mut schema = Self {
            collections: BTreeMap::new(),
            settings_defaults,
        };
        schema.add_collection(CollectionSchema::singleton(SETTINGS));
        schema
    }

    /// The CRM's collections.
    pub fn crm() -> Self {
        let defaults = json!({
            "organizationName": "",
            "timezone": "UTC",
            "notificationsEnabled": true,
            "defaultStudentStatus": "Prospective",
        });
        let defaults = match defaults {
            Value::Object(map) => map,
            _ => Fields::new(),
        };

        [
            "students",
            "forms",
            "documents",
            "uploads",
            "messages",
            "users",
            "presence",
        ]
        .into_iter()
        .fold(Self::new(defaults), |schema, name| {
            schema.with_collection(CollectionSchema::list(name))
        })
    }

    /// Add a collection to the schema.
    pub fn add_collection(&mut self, collection: CollectionSchema) -> &mut Self {
        self.collections.insert(collection.name.clone(), collection);
        self
    }

    /// Builder-style method to add a collection.
    pub fn with_collection(mut self, collection: CollectionSchema) -> Self {
        self.add_collection(collection);
        self
    }

    /// Get a collection schema by name.
    pub fn get_collection(&self, name: &str) -> Option<&CollectionSchema> {
        self.collections.get(name)
    }

    /// Resolve an id-addressable collection, rejecting unknown names and singletons.
    pub fn list_collection(&self, name: &str) -> Result<&CollectionSchema> {
        match self.collections.get(name) {
            Some(collection) if collection.shape == Shape::List => Ok(collection),
            _ => Err(Error::InvalidCollection(name.to_string())),
        }
    }

    /// Names of all list collections, in order.
    pub fn list_names(&self) -> impl Iterator<Item = &CollectionName> {
        self.collections
            .values()
            .filter(|c| c.shape == Shape::List)
            .map(|c| &c.name)
    }

    /// Settings with every default backfilled.
    pub fn settings_with_defaults(&self, stored: Option<Fields>) -> Fields {
        let mut settings = stored.unwrap_or_default();
        for (key, value) in &self.settings_defaults {
            settings
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
        settings
    }

    /// A document with every collection empty and default settings.
    pub fn default_document(&self) -> Document {
        self.normalize(Value::Null, 0, RecordId::new).document
    }

    /// Normalize a raw loaded structure.
    ///
    /// Every declared list collection becomes an array of records with
    /// unique string ids and numeric timestamps, settings becomes an object
    /// with defaults backfilled, and unknown top-level keys are carried
    /// through untouched. Idempotent: normalizing the output again reports
    /// `repaired == false`.
    pub fn normalize(
        &self,
        raw: Value,
        now: Timestamp,
        mut next_id: impl FnMut() -> RecordId,
    ) -> Normalized {
        let original = raw.clone();
        let mut top = match raw {
            Value::Object(map) => map,
            _ => Fields::new(),
        };

        let mut collections = BTreeMap::new();
        for name in self.list_names() {
            let items = match top.remove(name.as_str()) {
                Some(Value::Array(items)) => items,
                _ => Vec::new(),
            };

            let mut seen = HashSet::new();
            let records = items
                .into_iter()
                .filter_map(|item| match item {
                    Value::Object(obj) => Some(normalize_record(obj, now, &mut seen, &mut next_id)),
                    _ => None,
                })
                .collect();
            collections.insert(name.clone(), records);
        }

        let stored = match top.remove(SETTINGS) {
            Some(Value::Object(map)) => Some(map),
            _ => None,
        };
        let settings = self.settings_with_defaults(stored);

        let document = Document::from_parts(collections, settings, top);
        let repaired = serde_json::to_value(&document)
            .map(|value| value != original)
            .unwrap_or(true);

        Normalized { document, repaired }
    }

    /// Re-run normalization over an in-memory document before it is written.
    pub fn normalize_document(
        &self,
        document: &Document,
        now: Timestamp,
        next_id: impl FnMut() -> RecordId,
    ) -> Result<Document> {
        let raw = serde_json::to_value(document).map_err(|e| Error::Storage(e.to_string()))?;
        Ok(self.normalize(raw, now, next_id).document)
    }
}

fn normalize_record(
    mut obj: Fields,
    now: Timestamp,
    seen: &mut HashSet<RecordId>,
    next_id: &mut impl FnMut() -> RecordId,
) -> Record {
    let mut id = obj.get("id").and_then(id_from_value);
    while id.as_ref().map_or(true, |id| seen.contains(id)) {
        id = Some(next_id());
    }
    let id = id.unwrap_or_default();
    seen.insert(id.clone());

    let created_at = obj
        .get("createdAt")
        .and_then(Value::as_u64)
        .unwrap_or(now);
    let updated_at = obj
        .get("updatedAt")
        .and_then(Value::as_u64)
        .unwrap_or(created_at)
        .max(created_at);

    obj.remove("id");
    obj.remove("createdAt");
    obj.remove("updatedAt");

    Record {
        id,
        created_at,
        updated_at,
        fields: obj,
    }
}
