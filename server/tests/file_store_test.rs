//! Integration tests for the single-file backend.
//!
//! These exercise real files in a temporary directory.

use futures::future::join_all;
use roster_engine::{Fields, Record, Schema};
use roster_server::storage::{Backend, FileAdapter};
use serde_json::{json, Value};
use std::path::Path;
use std::sync::Arc;

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

async fn open(path: &Path) -> FileAdapter {
    FileAdapter::open(path, Arc::new(Schema::crm()), 1024)
        .await
        .unwrap()
}

fn read_raw(path: &Path) -> Value {
    serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap()
}

fn assert_default_shape(raw: &Value) {
    for name in Schema::crm().list_names() {
        assert!(raw[name.as_str()].is_array(), "{} should be an array", name);
    }
    assert!(raw["settings"].is_object());
    assert_eq!(raw["settings"]["timezone"], "UTC");
}

#[cfg(test)]
mod lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_file_is_created_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data/store.json");

        let adapter = open(&path).await;

        assert!(path.exists());
        assert_default_shape(&read_raw(&path));
        assert_eq!(adapter.snapshot().record_count(), 0);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_backed_up_and_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(&path, b"{\"students\": [ {\"id\": \"s1\"").unwrap();

        let adapter = open(&path).await;

        assert_eq!(adapter.snapshot().record_count(), 0);
        assert_default_shape(&read_raw(&path));

        let backups: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .map(|e| e.file_name().to_string_lossy().to_string())
            .filter(|name| name.starts_with("store.json.corrupt-"))
            .collect();
        assert_eq!(backups.len(), 1);
        assert_eq!(
            std::fs::read(dir.path().join(&backups[0])).unwrap(),
            b"{\"students\": [ {\"id\": \"s1\""
        );
    }

    #[tokio::test]
    async fn test_crash_before_rename_leaves_committed_file_intact() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");

        {
            let adapter = open(&path).await;
            let record = Record::new("s1", fields(json!({"firstName": "Ann"})), 10);
            adapter.insert("students", record).await.unwrap();
        }

        // A writer died after starting its temp file
        let temp = dir.path().join(".store.json.0123456789abcdef.tmp");
        std::fs::write(&temp, b"{\"students\": [").unwrap();

        let adapter = open(&path).await;
        let record = adapter.get("students", "s1").await.unwrap().unwrap();
        assert_eq!(record.fields["firstName"], "Ann");
        assert!(!temp.exists());
        assert_eq!(read_raw(&path)["students"][0]["id"], "s1");
    }

    #[tokio::test]
    async fn test_loaded_file_is_repaired_and_rewritten() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        std::fs::write(
            &path,
            serde_json::to_vec(&json!({
                "students": [{"firstName": "NoId"}, "not a record"],
                "settings": {"timezone": "Europe/Oslo"},
                "legacy": {"kept": true}
            }))
            .unwrap(),
        )
        .unwrap();

        let adapter = open(&path).await;
        let students = adapter.list("students").await.unwrap();
        assert_eq!(students.len(), 1);
        assert!(!students[0].id.is_empty());

        let raw = read_raw(&path);
        assert_eq!(raw["students"][0]["id"], students[0].id.as_str());
        assert_eq!(raw["settings"]["timezone"], "Europe/Oslo");
        assert_eq!(raw["settings"]["defaultStudentStatus"], "Prospective");
        assert_eq!(raw["legacy"], json!({"kept": true}));
        assert!(raw["messages"].is_array());
    }
}

#[cfg(test)]
mod concurrency_tests {
    use super::*;

    #[tokio::test]
    async fn test_concurrent_inserts_are_all_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let adapter = Arc::new(open(&path).await);

        let handles: Vec<_> = (0..50)
            .map(|i| {
                let adapter = adapter.clone();
                tokio::spawn(async move {
                    let record = Record::new(format!("s{}", i), fields(json!({"n": i})), 1000);
                    adapter.insert("students", record).await
                })
            })
            .collect();

        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        drop(adapter);

        let reopened = open(&path).await;
        let students = reopened.list("students").await.unwrap();
        assert_eq!(students.len(), 50);
        for i in 0..50 {
            let id = format!("s{}", i);
            assert!(students.iter().any(|r| r.id == id), "missing {}", id);
        }
    }

    #[tokio::test]
    async fn test_writes_apply_in_arrival_order() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let adapter = open(&path).await;

        let updates = (0..20).map(|i| {
            adapter.update("students", "s1", fields(json!({"step": i})), 1000 + i as u64)
        });
        let results = join_all(updates).await;

        let steps: Vec<_> = results
            .into_iter()
            .map(|r| r.unwrap().fields["step"].as_i64().unwrap())
            .collect();
        assert_eq!(steps, (0..20).collect::<Vec<_>>());

        let record = adapter.get("students", "s1").await.unwrap().unwrap();
        assert_eq!(record.fields["step"], 19);
        assert_eq!(read_raw(&path)["students"][0]["step"], 19);
    }

    #[tokio::test]
    async fn test_started_write_completes_after_caller_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.json");
        let adapter = open(&path).await;

        // One poll takes the queue turn and hands the write to the commit task
        let mut first = adapter.insert("students", Record::new("s1", Fields::new(), 1));
        assert!(futures::poll!(first.as_mut()).is_pending());
        drop(first);

        adapter
            .insert("students", Record::new("s2", Fields::new(), 2))
            .await
            .unwrap();

        let in_memory: Vec<_> = adapter
            .list("students")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        let on_disk: Vec<_> = read_raw(&path)["students"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["id"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(in_memory, vec!["s1", "s2"]);
        assert_eq!(on_disk, in_memory);
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let adapter = open(&dir.path().join("store.json")).await;

        let record = Record::new("s1", Fields::new(), 1);
        adapter.insert("students", record.clone()).await.unwrap();
        let err = adapter.insert("students", record).await.unwrap_err();

        assert!(matches!(
            err.into_store_error(),
            roster_engine::Error::ValidationFailed(_)
        ));
        assert_eq!(adapter.list("students").await.unwrap().len(), 1);
    }
}
