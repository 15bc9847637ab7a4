//! Integration tests for the record store contract on the file backend.

use roster_engine::{Error, Fields, Schema};
use roster_server::storage::{BackoffPolicy, FailoverController, FileAdapter};
use roster_server::store::RecordStore;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

async fn open_store(path: &Path) -> RecordStore {
    let schema = Arc::new(Schema::crm());
    let file = FileAdapter::open(path, schema.clone(), 1024).await.unwrap();
    let policy = BackoffPolicy {
        base: Duration::from_secs(5),
        name_resolution: Duration::from_secs(60),
        max: Duration::from_secs(300),
    };
    RecordStore::new(
        schema,
        FailoverController::new(None, Arc::new(file), policy, false),
    )
}

#[cfg(test)]
mod crud_tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_update_get_scenario() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.json")).await;

        let inserted = store
            .insert("students", fields(json!({"id": "s1", "firstName": "Ann"})))
            .await
            .unwrap();
        store
            .update("students", "s1", fields(json!({"status": "Current"})))
            .await
            .unwrap();

        let record = store.get("students", "s1").await.unwrap();
        assert_eq!(record.id, "s1");
        assert_eq!(record.fields, fields(json!({"firstName": "Ann", "status": "Current"})));
        assert_eq!(record.created_at, inserted.created_at);
        assert!(record.updated_at >= record.created_at);

        let value = serde_json::to_value(&record).unwrap();
        assert_eq!(value["id"], "s1");
        assert!(value["createdAt"].is_u64());
        assert!(value["updatedAt"].is_u64());
    }

    #[tokio::test]
    async fn test_get_returns_inserted_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.json")).await;

        let inserted = store
            .insert("forms", fields(json!({"title": "Intake", "fields": [1, 2]})))
            .await
            .unwrap();

        assert!(!inserted.id.is_empty());
        assert_eq!(inserted.created_at, inserted.updated_at);
        assert_eq!(store.get("forms", &inserted.id).await.unwrap(), inserted);
    }

    #[tokio::test]
    async fn test_caller_timestamps_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.json")).await;

        let record = store
            .insert("students", fields(json!({"id": 7, "createdAt": 1, "updatedAt": 2})))
            .await
            .unwrap();

        assert_eq!(record.id, "7");
        assert!(record.created_at > 2);
        assert!(!record.fields.contains_key("createdAt"));
    }

    #[tokio::test]
    async fn test_update_upserts_missing_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.json")).await;

        let record = store
            .update("users", "u1", fields(json!({"email": "a@example.com"})))
            .await
            .unwrap();

        assert_eq!(record.id, "u1");
        assert_eq!(store.list("users").await.unwrap(), vec![record]);
    }

    #[tokio::test]
    async fn test_delete_unknown_returns_false_and_keeps_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.json")).await;
        store
            .insert("students", fields(json!({"id": "s1"})))
            .await
            .unwrap();

        assert!(!store.delete("students", "nope").await.unwrap());
        assert_eq!(store.list("students").await.unwrap().len(), 1);

        assert!(store.delete("students", "s1").await.unwrap());
        assert!(store.list("students").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.json")).await;

        let err = store.get("students", "ghost").await.unwrap_err();
        assert_eq!(err, Error::not_found("students", "ghost"));
    }

    #[tokio::test]
    async fn test_unknown_collections_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.json")).await;

        assert!(matches!(
            store.list("pets").await,
            Err(Error::InvalidCollection(_))
        ));
        assert!(matches!(
            store.insert("pets", Fields::new()).await,
            Err(Error::InvalidCollection(_))
        ));
        assert!(matches!(
            store.delete("settings", "x").await,
            Err(Error::InvalidCollection(_))
        ));
    }
}

#[cfg(test)]
mod settings_tests {
    use super::*;

    #[tokio::test]
    async fn test_settings_default_when_nothing_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(&dir.path().join("store.json")).await;

        let settings = store.settings().await.unwrap();
        assert_eq!(settings["organizationName"], "");
        assert_eq!(settings["timezone"], "UTC");
        assert_eq!(settings["notificationsEnabled"], true);
        assert_eq!(settings["defaultStudentStatus"], "Prospective");
    }

    #[tokio::test]
    async fn test_set_settings_merges_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let store = open_store(&path).await;
            let merged = store
                .set_settings(fields(json!({"organizationName": "Northside", "logo": "n.png"})))
                .await
                .unwrap();
            assert_eq!(merged["organizationName"], "Northside");
            assert_eq!(merged["timezone"], "UTC");
        }

        let store = open_store(&path).await;
        let settings = store.settings().await.unwrap();
        assert_eq!(settings["organizationName"], "Northside");
        assert_eq!(settings["logo"], "n.png");
        assert_eq!(settings["notificationsEnabled"], true);
    }
}
