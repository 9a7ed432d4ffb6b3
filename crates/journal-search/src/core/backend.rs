//! Backend abstraction.

use std::fmt::Debug;

use async_trait::async_trait;

use crate::error::BackendError;

/// Identifies a storage backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendKind {
    /// SQLite database, the relational system of record.
    Sqlite,
    /// Elasticsearch, the inverted-index projection.
    Elasticsearch,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Sqlite => write!(f, "sqlite"),
            BackendKind::Elasticsearch => write!(f, "elasticsearch"),
        }
    }
}

/// A storage backend the engine talks to.
#[async_trait]
pub trait Backend: Send + Sync + Debug {
    /// Returns the kind of backend.
    fn kind(&self) -> BackendKind;

    /// Returns a human-readable name for this backend.
    fn name(&self) -> &'static str;

    /// Checks if the backend is healthy and accepting connections.
    async fn health_check(&self) -> Result<(), BackendError>;

    /// Prepares the backend for use (schema creation, connectivity checks).
    async fn initialize(&self) -> Result<(), BackendError>;
}
