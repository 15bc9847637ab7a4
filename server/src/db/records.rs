//! Database operations for the records table.

use roster_engine::{Fields, Record, Timestamp};
use sqlx::{PgPool, Row};

/// A stored record row from the database.
#[derive(Debug)]
pub struct StoredRecord {
    pub record_id: String,
    pub payload: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for StoredRecord {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> Result<Self, sqlx::Error> {
        Ok(StoredRecord {
            record_id: row.try_get("record_id")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl StoredRecord {
    /// Convert database row to an engine Record.
    pub fn into_record(self) -> Record {
        let fields = match self.payload {
            serde_json::Value::Object(map) => map,
            _ => Fields::new(),
        };

        Record {
            id: self.record_id,
            created_at: self.created_at.max(0) as Timestamp,
            updated_at: self.updated_at.max(self.created_at).max(0) as Timestamp,
            fields,
        }
    }
}

/// Insert a new record. A duplicate id violates the primary key (23505).
pub async fn insert_record(
    pool: &PgPool,
    collection: &str,
    record: &Record,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO records (collection, record_id, payload, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $5)
        "#,
    )
    .bind(collection)
    .bind(&record.id)
    .bind(serde_json::Value::Object(record.fields.clone()))
    .bind(record.created_at as i64)
    .bind(record.updated_at as i64)
    .execute(pool)
    .await?;

    Ok(())
}

/// Merge-patch a record in one statement, creating it when absent.
///
/// `updated_at` only moves forward.
pub async fn merge_record(
    pool: &PgPool,
    collection: &str,
    record_id: &str,
    patch: &serde_json::Value,
    timestamp: i64,
) -> Result<StoredRecord, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        INSERT INTO records (collection, record_id, payload, created_at, updated_at)
        VALUES ($1, $2, $3, $4, $4)
        ON CONFLICT (collection, record_id) DO UPDATE SET
            payload = records.payload || EXCLUDED.payload,
            updated_at = GREATEST(records.updated_at, EXCLUDED.updated_at)
        RETURNING record_id, payload, created_at, updated_at
        "#,
    )
    .bind(collection)
    .bind(record_id)
    .bind(patch)
    .bind(timestamp)
    .fetch_one(pool)
    .await
}

/// Get a record by collection and ID.
pub async fn get_record(
    pool: &PgPool,
    collection: &str,
    record_id: &str,
) -> Result<Option<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT record_id, payload, created_at, updated_at
        FROM records
        WHERE collection = $1 AND record_id = $2
        "#,
    )
    .bind(collection)
    .bind(record_id)
    .fetch_optional(pool)
    .await
}

/// Get all records in a collection, oldest first.
pub async fn get_records_in_collection(
    pool: &PgPool,
    collection: &str,
) -> Result<Vec<StoredRecord>, sqlx::Error> {
    sqlx::query_as::<_, StoredRecord>(
        r#"
        SELECT record_id, payload, created_at, updated_at
        FROM records
        WHERE collection = $1
        ORDER BY created_at ASC, record_id ASC
        "#,
    )
    .bind(collection)
    .fetch_all(pool)
    .await
}

/// Delete a record. Returns whether a row was removed.
pub async fn delete_record(
    pool: &PgPool,
    collection: &str,
    record_id: &str,
) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(r#"DELETE FROM records WHERE collection = $1 AND record_id = $2"#)
        .bind(collection)
        .bind(record_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}
