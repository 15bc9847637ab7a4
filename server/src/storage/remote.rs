//! PostgreSQL-backed document adapter.

use super::{classify, Backend, BackendError, BackendKind, TransientClass};
use crate::db::{self, Pool};
use async_trait::async_trait;
use roster_engine::{Error, Fields, Record, Timestamp};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Remote adapter over a pooled database connection.
///
/// Every call is bounded by `timeout`; running out of time is reported as a
/// transient failure so the controller can fail over instead of hanging the
/// caller.
#[derive(Debug)]
pub struct RemoteAdapter {
    pool: Pool,
    timeout: Duration,
    migrated: AtomicBool,
}

impl RemoteAdapter {
    /// Build an adapter without connecting.
    pub fn connect_lazy(database_url: &str, timeout: Duration) -> Result<Self, Error> {
        let pool = db::create_lazy_pool(database_url, timeout)
            .map_err(|e| Error::Storage(format!("invalid database configuration: {}", e)))?;

        Ok(Self {
            pool,
            timeout,
            migrated: AtomicBool::new(false),
        })
    }

    /// Await `fut` within the timeout and classify whatever goes wrong.
    async fn bounded<T>(
        &self,
        fut: impl Future<Output = Result<T, sqlx::Error>>,
    ) -> Result<T, BackendError> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| classify(&e)),
            Err(_) => Err(BackendError::transient(
                TransientClass::Timeout,
                format!("remote call exceeded {}ms", self.timeout.as_millis()),
            )),
        }
    }

    /// Apply migrations once per process, on first successful contact.
    async fn ensure_schema(&self) -> Result<(), BackendError> {
        if self.migrated.load(Ordering::Acquire) {
            return Ok(());
        }

        let outcome = tokio::time::timeout(self.timeout, db::run_migrations(&self.pool)).await;
        match outcome {
            Ok(Ok(())) => {
                self.migrated.store(true, Ordering::Release);
                tracing::info!("Remote store migrations applied");
                Ok(())
            }
            Ok(Err(sqlx::migrate::MigrateError::Execute(err))) => Err(classify(&err)),
            Ok(Err(err)) => Err(Error::Storage(format!("migration failed: {}", err)).into()),
            Err(_) => Err(BackendError::transient(
                TransientClass::Timeout,
                "migrations exceeded remote timeout",
            )),
        }
    }
}

#[async_trait]
impl Backend for RemoteAdapter {
    fn kind(&self) -> BackendKind {
        BackendKind::Remote
    }

    async fn list(&self, collection: &str) -> Result<Vec<Record>, BackendError> {
        self.ensure_schema().await?;
        let rows = self
            .bounded(db::get_records_in_collection(&self.pool, collection))
            .await?;
        Ok(rows.into_iter().map(db::StoredRecord::into_record).collect())
    }

    async fn get(&self, collection: &str, id: &str) -> Result<Option<Record>, BackendError> {
        self.ensure_schema().await?;
        let row = self
            .bounded(db::get_record(&self.pool, collection, id))
            .await?;
        Ok(row.map(db::StoredRecord::into_record))
    }

    async fn insert(&self, collection: &str, record: Record) -> Result<Record, BackendError> {
        self.ensure_schema().await?;
        match self
            .bounded(db::insert_record(&self.pool, collection, &record))
            .await
        {
            Ok(()) => Ok(record),
            Err(BackendError::Fatal(Error::ValidationFailed(reason))) => Err(Error::ValidationFailed(
                format!("cannot insert '{}' into {}: {}", record.id, collection, reason),
            )
            .into()),
            Err(err) => Err(err),
        }
    }

    async fn update(
        &self,
        collection: &str,
        id: &str,
        patch: Fields,
        timestamp: Timestamp,
    ) -> Result<Record, BackendError> {
        self.ensure_schema().await?;
        // Reserved fields never reach the payload column
        let patch = serde_json::Value::Object(Record::new(id, patch, timestamp).fields);
        let row = self
            .bounded(db::merge_record(
                &self.pool,
                collection,
                id,
                &patch,
                timestamp as i64,
            ))
            .await?;
        Ok(row.into_record())
    }

    async fn delete(&self, collection: &str, id: &str) -> Result<bool, BackendError> {
        self.ensure_schema().await?;
        self.bounded(db::delete_record(&self.pool, collection, id))
            .await
    }

    async fn settings(&self) -> Result<Option<Fields>, BackendError> {
        self.ensure_schema().await?;
        let stored = self.bounded(db::get_settings(&self.pool)).await?;
        Ok(stored.and_then(|value| match value {
            serde_json::Value::Object(map) => Some(map),
            _ => None,
        }))
    }

    async fn merge_settings(&self, patch: Fields) -> Result<Fields, BackendError> {
        self.ensure_schema().await?;
        let merged = self
            .bounded(db::merge_settings(
                &self.pool,
                &serde_json::Value::Object(patch),
                super::now_millis() as i64,
            ))
            .await?;
        match merged {
            serde_json::Value::Object(map) => Ok(map),
            _ => Ok(Fields::new()),
        }
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.bounded(db::ping(&self.pool)).await?;
        self.ensure_schema().await
    }
}
