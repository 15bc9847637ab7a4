//! Edge case tests for roster-engine
//!
//! These tests cover boundary conditions and unusual inputs.

use roster_engine::{CollectionSchema, Document, Error, Fields, Record, Schema};
use serde_json::{json, Value};

fn create_test_schema() -> Schema {
    Schema::new(fields(json!({"timezone": "UTC", "notificationsEnabled": true})))
        .with_collection(CollectionSchema::list("students"))
        .with_collection(CollectionSchema::list("messages"))
}

fn fields(value: Value) -> Fields {
    value.as_object().cloned().unwrap()
}

fn empty_document() -> Document {
    create_test_schema().default_document()
}

// ============================================================================
// String Edge Cases
// ============================================================================

#[test]
fn unicode_field_values() {
    let mut doc = empty_document();

    let names = vec![
        "日本語テスト",
        "Привет мир",
        "مرحبا بالعالم",
        "🎉🚀💯",
        "Hello\nWorld\tTab",
        "Null\0Test",
    ];

    for (i, name) in names.iter().enumerate() {
        let id = format!("s_{}", i);
        doc.insert(
            "students",
            Record::new(id.clone(), fields(json!({"firstName": name})), 1000),
        )
        .unwrap();

        let record = doc.get("students", &id).unwrap().unwrap();
        assert_eq!(record.fields["firstName"], *name);
    }
}

#[test]
fn ids_with_special_characters() {
    let mut doc = empty_document();

    for id in ["with space", "slash/inside", "dots.and-dashes", "ünïcödé"] {
        doc.insert("students", Record::new(id, Fields::new(), 1))
            .unwrap();
        assert!(doc.get("students", id).unwrap().is_some());
    }
}

#[test]
fn empty_patch_only_touches_updated_at() {
    let mut doc = empty_document();
    doc.insert(
        "students",
        Record::new("s1", fields(json!({"firstName": "Ann"})), 1000),
    )
    .unwrap();

    let updated = doc.update("students", "s1", Fields::new(), 2000).unwrap();
    assert_eq!(updated.fields, fields(json!({"firstName": "Ann"})));
    assert_eq!(updated.updated_at, 2000);
}

// ============================================================================
// Timestamp Edge Cases
// ============================================================================

#[test]
fn rapid_updates_same_record() {
    let mut doc = empty_document();
    doc.insert("students", Record::new("s1", Fields::new(), 1000))
        .unwrap();

    let mut last = 0;
    for i in 0..100u64 {
        // Clock jitters backwards every other step
        let ts = if i % 2 == 0 { 1000 + i } else { 900 };
        let record = doc
            .update("students", "s1", fields(json!({"n": i})), ts)
            .unwrap();
        assert!(record.updated_at >= last);
        last = record.updated_at;
    }

    let record = doc.get("students", "s1").unwrap().unwrap();
    assert_eq!(record.fields["n"], 99);
}

#[test]
fn timestamp_boundaries() {
    let mut doc = empty_document();
    doc.insert("students", Record::new("s1", Fields::new(), u64::MAX))
        .unwrap();
    let record = doc.update("students", "s1", Fields::new(), 0).unwrap();
    assert_eq!(record.updated_at, u64::MAX);
}

// ============================================================================
// Payload Edge Cases
// ============================================================================

#[test]
fn deeply_nested_json() {
    let mut nested = json!({"value": "deep"});
    for _ in 0..50 {
        nested = json!({"nested": nested});
    }

    let mut doc = empty_document();
    doc.insert(
        "messages",
        Record::new("m1", fields(json!({"body": nested.clone()})), 1),
    )
    .unwrap();

    let record = doc.get("messages", "m1").unwrap().unwrap();
    assert_eq!(record.fields["body"], nested);
}

#[test]
fn json_with_all_types() {
    let payload = json!({
        "string": "hello",
        "int": 42,
        "negative": -7,
        "float": 2.5,
        "bool": true,
        "null": null,
        "array": [1, "two", false],
        "object": {"k": "v"},
    });

    let mut doc = empty_document();
    doc.insert("students", Record::new("s1", fields(payload.clone()), 1))
        .unwrap();

    let stored = doc.get("students", "s1").unwrap().unwrap();
    assert_eq!(Value::Object(stored.fields.clone()), payload);
}

// ============================================================================
// Normalization Edge Cases
// ============================================================================

#[test]
fn normalize_truncated_json_falls_back_to_defaults() {
    let schema = create_test_schema();

    // What a half-written file parses to once the caller gives up on it
    let out = schema.normalize(Value::Null, 5, || "gen".to_string());
    assert!(out.repaired);
    assert_eq!(out.document, schema.default_document());
}

#[test]
fn normalize_keeps_valid_records_next_to_broken_ones() {
    let schema = create_test_schema();
    let raw = json!({
        "students": [
            {"id": "s1", "createdAt": 1, "updatedAt": 1},
            null,
            42,
            {"id": "s2", "createdAt": "yesterday"},
        ],
        "messages": "oops",
    });

    let out = schema.normalize(raw, 77, || "gen".to_string());
    let students = out.document.records("students").unwrap();
    assert_eq!(students.len(), 2);
    assert_eq!(students[1].created_at, 77);
    assert!(out.document.records("messages").unwrap().is_empty());
}

#[test]
fn normalize_document_backfills_new_defaults() {
    let schema = create_test_schema();
    let raw = json!({"students": [], "messages": [], "settings": {"timezone": "CET"}});
    let document = schema.normalize(raw, 1, || "gen".to_string()).document;

    let extended = Schema {
        settings_defaults: fields(json!({"timezone": "UTC", "locale": "en"})),
        ..schema
    };
    let document = extended
        .normalize_document(&document, 1, || "gen".to_string())
        .unwrap();

    assert_eq!(document.settings()["timezone"], "CET");
    assert_eq!(document.settings()["locale"], "en");
}

// ============================================================================
// Collection Edge Cases
// ============================================================================

#[test]
fn schema_with_many_collections() {
    let mut schema = Schema::new(Fields::new());
    for i in 0..100 {
        schema.add_collection(CollectionSchema::list(format!("collection_{}", i)));
    }

    let mut doc = schema.default_document();
    for i in 0..100 {
        let name = format!("collection_{}", i);
        doc.insert(&name, Record::new("r", Fields::new(), 1))
            .unwrap();
    }
    assert_eq!(doc.record_count(), 100);
}

#[test]
fn settings_is_not_a_list() {
    let schema = create_test_schema();
    let doc = schema.default_document();

    assert!(matches!(
        doc.records("settings"),
        Err(Error::InvalidCollection(_))
    ));
    assert!(matches!(
        schema.list_collection("settings"),
        Err(Error::InvalidCollection(_))
    ));
}

#[test]
fn many_records_stay_in_insertion_order() {
    let mut doc = empty_document();
    for i in 0..500 {
        doc.insert(
            "students",
            Record::new(format!("s{:04}", 499 - i), Fields::new(), i),
        )
        .unwrap();
    }

    let ids: Vec<_> = doc
        .records("students")
        .unwrap()
        .iter()
        .map(|r| r.id.clone())
        .collect();
    assert_eq!(ids.first().map(String::as_str), Some("s0499"));
    assert_eq!(ids.last().map(String::as_str), Some("s0000"));
}
