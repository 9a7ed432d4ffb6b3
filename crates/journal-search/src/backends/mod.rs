//! Storage backend implementations.
//!
//! | Backend | Role |
//! |---------|------|
//! | SQLite | System of record for journals, entries and tags; relational search path |
//! | Elasticsearch | Disposable per-entry projection; ranked search path |
//!
//! # Example
//!
//! ```no_run
//! use helios_journal_search::backends::sqlite::SqliteBackend;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let backend = SqliteBackend::open("./data/journals.db")?;
//! backend.init_schema()?;
//! # Ok(())
//! # }
//! ```

pub mod elasticsearch;
pub mod sqlite;
