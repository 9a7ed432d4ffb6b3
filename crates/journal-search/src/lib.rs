//! Helios Journal Search
//!
//! Query engine for journal entries. A free-text query plus a list of
//! structured filters is normalized into a [`SearchQuery`], which is then
//! executed against one of two backends:
//!
//! - the relational store (SQLite), the system of record for journals,
//!   entries and tags;
//! - an Elasticsearch index holding a denormalized projection of the entries
//!   of every journal configured for it.
//!
//! A journal with a `search_index` is searched through the index; a journal
//! without one is searched relationally. Both paths return the same result
//! shape. The index is kept in line with the relational store by mirroring
//! live mutations ([`sync::IndexMirror`]) and can always be rebuilt from it
//! ([`sync::Synchronizer`]).
//!
//! # Filters
//!
//! | Filter | Meaning |
//! |--------|---------|
//! | `tag:x`, `#x` | entry must carry `x` |
//! | `!tag:x`, `!#x` | entry must not carry `x` |
//! | `?tag:x`, `?#x` | entry must carry at least one optional tag |
//! | `created_at:>=T`, `updated_at:<T` | time bounds (`>=`, `<=`, `>`, `<`) |
//! | `context_type:v`, `context_id:v`, `context_url:v` | exact context match |
//!
//! Malformed filters are dropped with a warning, never rejected.
//!
//! # Architecture
//!
//! - [`query`] - Filter normalization and the backend-neutral predicate tree
//! - [`types`] - Journals, entries, queries and results
//! - [`error`] - Error types for all operations
//! - [`core`] - Backend and executor traits
//! - [`backends`] - SQLite and Elasticsearch implementations
//! - [`sync`] - Index mirroring and rebuilds
//! - [`facade`] - Per-journal routing and the uniform result shape
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use helios_journal_search::backends::sqlite::SqliteBackend;
//! use helios_journal_search::types::{Journal, JournalEntry};
//! use helios_journal_search::{SearchRequest, SearchService};
//! use uuid::Uuid;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let store = Arc::new(SqliteBackend::in_memory()?);
//! store.init_schema()?;
//!
//! let journal = Journal::new(Uuid::new_v4(), "operations");
//! store.put_journal(&journal)?;
//! store.put_entry(&JournalEntry::new(journal.id, "deploy", "v2 rolled out").with_tags(["release"]))?;
//!
//! let service = SearchService::new(store);
//! let request = SearchRequest::for_journal(&journal).with_query("rolled #release");
//! let response = service.search(&request).await?;
//! assert_eq!(response.total_results, 1);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod backends;
pub mod core;
pub mod error;
pub mod facade;
pub mod query;
pub mod sync;
pub mod types;

pub use error::{StorageError, StorageResult};
pub use facade::{Route, SearchRequest, SearchResponse, SearchResultItem, SearchService};
pub use query::normalize;
pub use types::{Pagination, ResultsOrder, SearchQuery};

pub use core::{Backend, BackendKind, SearchExecutor};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name.
pub const NAME: &str = env!("CARGO_PKG_NAME");
