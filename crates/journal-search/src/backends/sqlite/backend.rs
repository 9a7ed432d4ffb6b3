//! SQLite backend implementation.

use std::fmt::Debug;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use r2d2::{Pool, PooledConnection};
use r2d2_sqlite::SqliteConnectionManager;
use serde::{Deserialize, Serialize};

use crate::core::{Backend, BackendKind};
use crate::error::{BackendError, StorageError, StorageResult};

use super::schema;

/// SQLite backend for journals, entries and tags.
pub struct SqliteBackend {
    pool: Pool<SqliteConnectionManager>,
    config: SqliteBackendConfig,
    is_memory: bool,
}

impl Debug for SqliteBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteBackend")
            .field("config", &self.config)
            .field("is_memory", &self.is_memory)
            .finish_non_exhaustive()
    }
}

/// Configuration for the SQLite backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SqliteBackendConfig {
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Minimum number of idle connections.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    /// Connection timeout in milliseconds.
    #[serde(default = "default_connection_timeout_ms")]
    pub connection_timeout_ms: u64,

    /// SQLite busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u32,

    /// Enable WAL mode for better concurrency.
    #[serde(default = "default_true")]
    pub enable_wal: bool,

    /// Enable foreign key constraints.
    #[serde(default = "default_true")]
    pub enable_foreign_keys: bool,
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    1
}

fn default_connection_timeout_ms() -> u64 {
    30000
}

fn default_busy_timeout_ms() -> u32 {
    5000
}

fn default_true() -> bool {
    true
}

impl Default for SqliteBackendConfig {
    fn default() -> Self {
        Self {
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            connection_timeout_ms: default_connection_timeout_ms(),
            busy_timeout_ms: default_busy_timeout_ms(),
            enable_wal: true,
            enable_foreign_keys: true,
        }
    }
}

/// Applies per-connection pragmas as the pool opens connections.
#[derive(Debug, Clone, Copy)]
struct ConnectionCustomizer {
    busy_timeout_ms: u32,
    enable_foreign_keys: bool,
}

impl r2d2::CustomizeConnection<rusqlite::Connection, rusqlite::Error> for ConnectionCustomizer {
    fn on_acquire(&self, conn: &mut rusqlite::Connection) -> Result<(), rusqlite::Error> {
        conn.busy_timeout(Duration::from_millis(self.busy_timeout_ms as u64))?;
        if self.enable_foreign_keys {
            conn.execute_batch("PRAGMA foreign_keys = ON")?;
        }
        Ok(())
    }
}

impl SqliteBackend {
    /// Creates a new in-memory SQLite backend.
    pub fn in_memory() -> StorageResult<Self> {
        Self::with_config(":memory:", SqliteBackendConfig::default())
    }

    /// Opens or creates a file-based SQLite database.
    pub fn open<P: AsRef<Path>>(path: P) -> StorageResult<Self> {
        Self::with_config(path, SqliteBackendConfig::default())
    }

    /// Creates a backend with custom configuration.
    ///
    /// An in-memory database lives only as long as its connection, so it is
    /// served by a single pooled connection that is never recycled.
    pub fn with_config<P: AsRef<Path>>(
        path: P,
        config: SqliteBackendConfig,
    ) -> StorageResult<Self> {
        let path_str = path.as_ref().to_string_lossy();
        let is_memory = path_str == ":memory:";

        let manager = if is_memory {
            SqliteConnectionManager::memory()
        } else {
            SqliteConnectionManager::file(path.as_ref())
        };

        let customizer = ConnectionCustomizer {
            busy_timeout_ms: config.busy_timeout_ms,
            enable_foreign_keys: config.enable_foreign_keys,
        };

        let mut builder = Pool::<SqliteConnectionManager>::builder()
            .connection_timeout(Duration::from_millis(config.connection_timeout_ms))
            .connection_customizer(Box::new(customizer));
        builder = if is_memory {
            builder
                .max_size(1)
                .min_idle(Some(1))
                .max_lifetime(None)
                .idle_timeout(None)
        } else {
            builder
                .max_size(config.max_connections)
                .min_idle(Some(config.min_connections))
        };

        let pool = builder.build(manager).map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })?;

        let backend = Self {
            pool,
            config,
            is_memory,
        };

        backend.configure_database()?;

        Ok(backend)
    }

    /// Initialize the database schema.
    pub fn init_schema(&self) -> StorageResult<()> {
        let conn = self.get_connection()?;
        schema::initialize_schema(&conn)
    }

    /// Get a connection from the pool.
    pub(crate) fn get_connection(
        &self,
    ) -> StorageResult<PooledConnection<SqliteConnectionManager>> {
        self.pool.get().map_err(|e| {
            StorageError::Backend(BackendError::ConnectionFailed {
                backend_name: "sqlite".to_string(),
                message: e.to_string(),
            })
        })
    }

    /// Database-wide settings.
    fn configure_database(&self) -> StorageResult<()> {
        if self.config.enable_wal && !self.is_memory {
            let conn = self.get_connection()?;
            conn.query_row("PRAGMA journal_mode = WAL", [], |_| Ok(()))
                .map_err(|e| {
                    StorageError::Backend(BackendError::Internal {
                        backend_name: "sqlite".to_string(),
                        message: format!("Failed to enable WAL mode: {}", e),
                        source: None,
                    })
                })?;
        }

        Ok(())
    }

    /// Returns whether this is an in-memory database.
    pub fn is_memory(&self) -> bool {
        self.is_memory
    }

    /// Returns the backend configuration.
    pub fn config(&self) -> &SqliteBackendConfig {
        &self.config
    }
}

#[async_trait]
impl Backend for SqliteBackend {
    fn kind(&self) -> BackendKind {
        BackendKind::Sqlite
    }

    fn name(&self) -> &'static str {
        "sqlite"
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let conn = self
            .get_connection()
            .map_err(|_| BackendError::Unavailable {
                backend_name: "sqlite".to_string(),
                message: "Failed to get connection".to_string(),
            })?;
        conn.query_row("SELECT 1", [], |_| Ok(()))
            .map_err(|e| BackendError::Internal {
                backend_name: "sqlite".to_string(),
                message: format!("Health check failed: {}", e),
                source: None,
            })?;
        Ok(())
    }

    async fn initialize(&self) -> Result<(), BackendError> {
        self.init_schema().map_err(|e| BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: format!("Failed to initialize schema: {}", e),
            source: None,
        })
    }
}
