//! Elasticsearch backend.
//!
//! Holds a disposable, rebuildable projection of journal entries, one index
//! per `search_index` name. Documents are keyed by entry id so upserts and
//! deletes are idempotent. The relational store stays authoritative; see
//! [`crate::sync`] for the rebuild procedure.
//!
//! # Document shape
//!
//! | Field | Mapping |
//! |-------|---------|
//! | `journal_id` | keyword |
//! | `title`, `content` | text, standard analyzer with English stopwords |
//! | `tag` | keyword (one value or a list) |
//! | `created_at`, `updated_at` | date, numeric epoch seconds |
//! | `context_type`, `context_id`, `context_url` | keyword |
//!
//! # Example
//!
//! ```ignore
//! use helios_journal_search::backends::elasticsearch::{ElasticsearchBackend, ElasticsearchConfig};
//!
//! let backend = ElasticsearchBackend::new(ElasticsearchConfig::default())?;
//! backend.create_index("journals-main", false).await?;
//! ```

mod backend;
mod document;
pub mod query_builder;
mod schema;
mod search_impl;
mod storage;

pub use backend::{ElasticsearchAuth, ElasticsearchBackend, ElasticsearchConfig};
pub use document::IndexedDocument;
pub use query_builder::{EsQuery, EsQueryBuilder};
pub use schema::create_index_mapping;
pub use search_impl::IndexedSearch;
pub use storage::BulkSummary;
