//! SQLite backend.
//!
//! Holds journals, entries and their tags, and answers searches for journals
//! that have no search index. It is also the read source for index
//! synchronization.
//!
//! # Schema
//!
//! ```sql
//! CREATE TABLE journals (
//!     id TEXT PRIMARY KEY,
//!     name TEXT NOT NULL,
//!     search_index TEXT,
//!     deleted INTEGER NOT NULL DEFAULT 0,
//!     created_at TEXT NOT NULL,
//!     updated_at TEXT NOT NULL
//! );
//!
//! CREATE TABLE journal_entries (
//!     id TEXT PRIMARY KEY,
//!     journal_id TEXT NOT NULL REFERENCES journals(id) ON DELETE CASCADE,
//!     title TEXT,
//!     content TEXT NOT NULL DEFAULT '',
//!     context_type TEXT,
//!     context_id TEXT,
//!     context_url TEXT,
//!     created_at TEXT NOT NULL,
//!     updated_at TEXT NOT NULL
//! );
//!
//! CREATE TABLE journal_entry_tags (
//!     journal_entry_id TEXT NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
//!     tag TEXT NOT NULL,
//!     PRIMARY KEY (journal_entry_id, tag)
//! );
//! ```
//!
//! Timestamps are fixed-width RFC 3339 UTC strings, so text comparison is
//! chronological comparison.

mod backend;
pub mod query_builder;
mod schema;
mod search_impl;
mod storage;

pub use backend::{SqliteBackend, SqliteBackendConfig};
pub use schema::SCHEMA_VERSION;
pub use storage::{format_timestamp, parse_timestamp};
