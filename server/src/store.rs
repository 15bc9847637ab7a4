//! The CRUD and settings contract consumed by every route.

use crate::storage::{
    new_record_id, now_millis, Access, BackendStatus, FailoverController,
};
use futures::FutureExt;
use roster_engine::{Error, Fields, Record, RecordId, Schema, SETTINGS};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;

/// What a committed mutation did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
    Settings,
}

/// A mutation that has been persisted.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitEvent {
    pub collection: String,
    pub kind: ChangeKind,
    /// `None` for settings changes
    pub id: Option<RecordId>,
}

/// Failure reported by a commit hook. Logged, never propagated.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);

/// Post-commit notification.
pub trait CommitHook: Send + Sync {
    fn on_commit(&self, event: &CommitEvent) -> Result<(), HookError>;
}

struct HookEntry {
    collections: HashSet<String>,
    hook: Arc<dyn CommitHook>,
}

/// Uniform record store delegating to the failover controller.
///
/// Ids and timestamps are assigned here, once per call, so a call retried on
/// the file backend writes the same record the remote attempt would have.
pub struct RecordStore {
    schema: Arc<Schema>,
    controller: FailoverController,
    hooks: Vec<HookEntry>,
}

impl RecordStore {
    pub fn new(schema: Arc<Schema>, controller: FailoverController) -> Self {
        Self {
            schema,
            controller,
            hooks: Vec::new(),
        }
    }

    /// Register `hook` for mutations on `collections`.
    pub fn with_hook(mut self, collections: &[&str], hook: Arc<dyn CommitHook>) -> Self {
        self.hooks.push(HookEntry {
            collections: collections.iter().map(|c| c.to_string()).collect(),
            hook,
        });
        self
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn controller(&self) -> &FailoverController {
        &self.controller
    }

    pub fn status(&self) -> BackendStatus {
        self.controller.status()
    }

    /// All records of a collection.
    pub async fn list(&self, collection: &str) -> Result<Vec<Record>, Error> {
        self.schema.list_collection(collection)?;
        self.controller
            .run("list", Access::Read, |backend| {
                async move { backend.list(collection).await }.boxed()
            })
            .await
    }

    /// One record; `NotFound` when absent.
    pub async fn get(&self, collection: &str, id: &str) -> Result<Record, Error> {
        self.schema.list_collection(collection)?;
        self.controller
            .run("get", Access::Read, |backend| {
                async move { backend.get(collection, id).await }.boxed()
            })
            .await?
            .ok_or_else(|| Error::not_found(collection, id))
    }

    /// Insert a record, assigning an id when the caller gave none.
    pub async fn insert(&self, collection: &str, fields: Fields) -> Result<Record, Error> {
        self.schema.list_collection(collection)?;
        let record = Record::from_fields(fields, now_millis(), new_record_id);

        let stored = self
            .controller
            .run("insert", Access::Write, |backend| {
                let record = record.clone();
                async move { backend.insert(collection, record).await }.boxed()
            })
            .await?;

        tracing::debug!(collection, id = %stored.id, "Record inserted");
        self.notify(CommitEvent {
            collection: collection.to_string(),
            kind: ChangeKind::Inserted,
            id: Some(stored.id.clone()),
        });
        Ok(stored)
    }

    /// Merge-patch a record, upserting it when absent.
    pub async fn update(&self, collection: &str, id: &str, patch: Fields) -> Result<Record, Error> {
        self.schema.list_collection(collection)?;
        if id.trim().is_empty() {
            return Err(Error::ValidationFailed("record id must not be empty".into()));
        }
        let timestamp = now_millis();

        let stored = self
            .controller
            .run("update", Access::Write, |backend| {
                let patch = patch.clone();
                async move { backend.update(collection, id, patch, timestamp).await }.boxed()
            })
            .await?;

        tracing::debug!(collection, id, "Record updated");
        self.notify(CommitEvent {
            collection: collection.to_string(),
            kind: ChangeKind::Updated,
            id: Some(stored.id.clone()),
        });
        Ok(stored)
    }

    /// Remove a record. `false` when it did not exist.
    pub async fn delete(&self, collection: &str, id: &str) -> Result<bool, Error> {
        self.schema.list_collection(collection)?;

        let deleted = self
            .controller
            .run("delete", Access::Write, |backend| {
                async move { backend.delete(collection, id).await }.boxed()
            })
            .await?;

        if deleted {
            tracing::debug!(collection, id, "Record deleted");
            self.notify(CommitEvent {
                collection: collection.to_string(),
                kind: ChangeKind::Deleted,
                id: Some(id.to_string()),
            });
        }
        Ok(deleted)
    }

    /// Settings with defaults filled in. Never empty.
    pub async fn settings(&self) -> Result<Fields, Error> {
        let stored = self
            .controller
            .run("settings", Access::Read, |backend| {
                async move { backend.settings().await }.boxed()
            })
            .await?;
        Ok(self.schema.settings_with_defaults(stored))
    }

    /// Overlay `patch` onto the settings.
    pub async fn set_settings(&self, patch: Fields) -> Result<Fields, Error> {
        let merged = self
            .controller
            .run("set_settings", Access::Write, |backend| {
                let patch = patch.clone();
                async move { backend.merge_settings(patch).await }.boxed()
            })
            .await?;

        self.notify(CommitEvent {
            collection: SETTINGS.to_string(),
            kind: ChangeKind::Settings,
            id: None,
        });
        Ok(self.schema.settings_with_defaults(Some(merged)))
    }

    fn notify(&self, event: CommitEvent) {
        for entry in &self.hooks {
            if !entry.collections.contains(&event.collection) {
                continue;
            }
            if let Err(err) = entry.hook.on_commit(&event) {
                tracing::warn!(
                    collection = %event.collection,
                    kind = ?event.kind,
                    error = %err,
                    "Post-commit hook failed"
                );
            }
        }
    }
}
