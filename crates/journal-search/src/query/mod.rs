//! Query parsing and the backend-neutral predicate tree.
//!
//! [`normalize`] turns a raw query string and filter tokens into a
//! [`SearchQuery`](crate::types::SearchQuery). [`Predicate::from_query`] turns
//! that into a conjunction of boolean sub-predicates which each backend
//! compiles on its own.

mod normalizer;
mod predicate;

pub use normalizer::{FILTER_PREFIXES, normalize};
pub use predicate::{Predicate, RangeEnd, TimeRange};
