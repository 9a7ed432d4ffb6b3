//! Core traits shared by the storage backends.
//!
//! - [`Backend`] - driver abstraction (identity, health, schema setup)
//! - [`SearchExecutor`] - executes a normalized query for one page of results

mod backend;
mod executor;

pub use backend::{Backend, BackendKind};
pub use executor::SearchExecutor;
