//! # Roster Engine
//!
//! The data model behind the Roster CRM record store.
//!
//! This crate holds everything about records and the persisted document that
//! does not touch a disk, a socket or a clock: record stamping, merge patch,
//! the collection schema, the normalizer that repairs whatever was loaded
//! from disk, and the error taxonomy shared by every backend.
//!
//! ## Design Principles
//!
//! - **No IO**: the engine has no knowledge of files, network, or time
//! - **Deterministic**: timestamps and id generation are passed in
//! - **Testable**: pure logic, no mocks needed
//!
//! ## Core Concepts
//!
//! ### Records
//!
//! A [`Record`] is a JSON object with a unique `id` inside its collection plus
//! `createdAt`/`updatedAt` stamps (epoch millis) owned by the store. Updates
//! are merge patches: provided fields overlay, everything else is kept.
//!
//! ### Schema
//!
//! The [`Schema`] declares the fixed set of collections. All of them are
//! lists of records except `settings`, a singleton object that always has
//! its defaults backfilled.
//!
//! ### Document
//!
//! A [`Document`] is the single JSON object the file backend persists: one
//! array per list collection plus the `settings` object.
//!
//! ## Quick Start
//!
//! ```rust
//! use roster_engine::{Fields, Record, Schema};
//! use serde_json::json;
//!
//! let schema = Schema::crm();
//! let mut doc = schema.default_document();
//!
//! let fields: Fields = json!({"firstName": "Ann"}).as_object().cloned().unwrap();
//! let record = Record::from_fields(fields, 1_706_745_600_000, || "s1".to_string());
//! doc.insert("students", record).unwrap();
//!
//! let patch: Fields = json!({"status": "Current"}).as_object().cloned().unwrap();
//! let updated = doc.update("students", "s1", patch, 1_706_745_601_000).unwrap();
//! assert_eq!(updated.fields["firstName"], "Ann");
//! assert!(updated.updated_at >= updated.created_at);
//! ```

pub mod document;
pub mod error;
pub mod record;
pub mod schema;

// Re-export main types at crate root
pub use document::Document;
pub use error::Error;
pub use record::{id_from_value, Fields, Record, RESERVED_FIELDS};
pub use schema::{CollectionSchema, Normalized, Schema, Shape, SETTINGS};

/// Type aliases for clarity
pub type RecordId = String;
pub type CollectionName = String;
pub type Timestamp = u64;
