//! Database operations for the settings singleton.

use sqlx::PgPool;

/// Fetch the stored settings document, if any.
pub async fn get_settings(pool: &PgPool) -> Result<Option<serde_json::Value>, sqlx::Error> {
    let row: Option<(serde_json::Value,)> =
        sqlx::query_as(r#"SELECT payload FROM settings WHERE id = 1"#)
            .fetch_optional(pool)
            .await?;

    Ok(row.map(|(payload,)| payload))
}

/// Overlay `patch` onto the stored settings and return the merged document.
pub async fn merge_settings(
    pool: &PgPool,
    patch: &serde_json::Value,
    timestamp: i64,
) -> Result<serde_json::Value, sqlx::Error> {
    let row: (serde_json::Value,) = sqlx::query_as(
        r#"
        INSERT INTO settings (id, payload, updated_at)
        VALUES (1, $1, $2)
        ON CONFLICT (id) DO UPDATE SET
            payload = settings.payload || EXCLUDED.payload,
            updated_at = EXCLUDED.updated_at
        RETURNING payload
        "#,
    )
    .bind(patch)
    .bind(timestamp)
    .fetch_one(pool)
    .await?;

    Ok(row.0)
}
