//! Error types for the journal search engine.
//!
//! Errors are grouped by category: index lifecycle errors, backend errors and
//! search routing errors. Malformed filters are never errors; the normalizer
//! drops them with a warning.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// The primary error type for all engine operations.
#[derive(Error, Debug)]
pub enum StorageError {
    /// Index lifecycle errors
    #[error(transparent)]
    Index(#[from] IndexError),

    /// Search routing errors
    #[error(transparent)]
    Search(#[from] SearchError),

    /// Backend-specific errors
    #[error(transparent)]
    Backend(#[from] BackendError),
}

/// Errors raised by index lifecycle operations.
#[derive(Error, Debug)]
pub enum IndexError {
    /// The index exists and the caller did not ask for recreation.
    #[error("index already exists: {index}")]
    AlreadyExists { index: String },

    /// The index does not exist.
    #[error("index not found: {index}")]
    NotFound { index: String },

    /// A bulk chunk could not be submitted. Earlier chunks stay applied.
    #[error("bulk chunk {chunk} failed for index {index} after {indexed} documents: {message}")]
    BulkChunkFailed {
        index: String,
        chunk: usize,
        indexed: usize,
        message: String,
    },
}

/// Errors raised while routing or scoping a search.
#[derive(Error, Debug)]
pub enum SearchError {
    /// The journal routes to an index but no index backend is configured.
    #[error("journal is indexed in {index} but no index backend is configured")]
    IndexBackendMissing { index: String },

    /// A synchronization scope that is neither `any` nor a journal id.
    #[error("invalid synchronization scope: {value}")]
    InvalidScope { value: String },

    /// The journal does not exist in the relational store.
    #[error("journal not found: {journal_id}")]
    JournalNotFound { journal_id: String },
}

/// Errors from the storage backends.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The backend is currently unavailable.
    #[error("backend unavailable: {backend_name}")]
    Unavailable {
        backend_name: String,
        message: String,
    },

    /// Connection to the backend failed.
    #[error("connection failed to {backend_name}: {message}")]
    ConnectionFailed {
        backend_name: String,
        message: String,
    },

    /// Connection pool exhausted.
    #[error("connection pool exhausted for {backend_name}")]
    PoolExhausted { backend_name: String },

    /// Internal backend error.
    #[error("internal error in {backend_name}: {message}")]
    Internal {
        backend_name: String,
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Query execution error.
    #[error("query execution failed in {backend_name}: {message}")]
    QueryError {
        backend_name: String,
        message: String,
    },

    /// Serialization/deserialization error.
    #[error("serialization error: {message}")]
    SerializationError { message: String },
}

/// Result type alias for engine operations.
pub type StorageResult<T> = Result<T, StorageError>;

impl From<serde_json::Error> for StorageError {
    fn from(err: serde_json::Error) -> Self {
        StorageError::Backend(BackendError::SerializationError {
            message: err.to_string(),
        })
    }
}

impl From<rusqlite::Error> for StorageError {
    fn from(err: rusqlite::Error) -> Self {
        StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: err.to_string(),
            source: Some(Box::new(err)),
        })
    }
}

impl From<r2d2::Error> for StorageError {
    fn from(_err: r2d2::Error) -> Self {
        StorageError::Backend(BackendError::PoolExhausted {
            backend_name: "sqlite".to_string(),
        })
    }
}

impl From<elasticsearch::Error> for StorageError {
    fn from(err: elasticsearch::Error) -> Self {
        StorageError::Backend(BackendError::Unavailable {
            backend_name: "elasticsearch".to_string(),
            message: err.to_string(),
        })
    }
}
