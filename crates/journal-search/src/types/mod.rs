//! Core types for the search engine.
//!
//! - [`SearchQuery`], [`Bound`], [`TimeBounds`] - the normalized, backend-agnostic query
//! - [`Journal`], [`JournalEntry`] - records read from the relational store
//! - [`Pagination`], [`ResultsOrder`] - offset pagination and sort direction
//! - [`PageResult`], [`EntryHit`] - one page of executor output

mod entry;
mod pagination;
mod query;
mod results;

pub use entry::{Journal, JournalEntry};
pub use pagination::{Pagination, ResultsOrder};
pub use query::{Bound, ContextField, SearchQuery, TimeBounds, TimeField};
pub use results::{EntryHit, PageResult};
