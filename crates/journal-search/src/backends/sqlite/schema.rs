//! SQLite schema definitions.

use rusqlite::Connection;

use crate::error::{BackendError, StorageError, StorageResult};

/// Current schema version.
pub const SCHEMA_VERSION: i32 = 1;

fn schema_error(context: &str, e: rusqlite::Error) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message: format!("{}: {}", context, e),
        source: None,
    })
}

/// Initialize the database schema.
pub fn initialize_schema(conn: &Connection) -> StorageResult<()> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        create_schema_v1(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version > SCHEMA_VERSION {
        return Err(StorageError::Backend(BackendError::Internal {
            backend_name: "sqlite".to_string(),
            message: format!(
                "Database schema version {} is newer than supported version {}",
                current_version, SCHEMA_VERSION
            ),
            source: None,
        }));
    }

    Ok(())
}

/// Get the current schema version.
fn get_schema_version(conn: &Connection) -> StorageResult<i32> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error("Failed to create schema_version table", e))?;

    let version: Option<i32> = conn
        .query_row("SELECT version FROM schema_version LIMIT 1", [], |row| {
            row.get(0)
        })
        .ok();

    Ok(version.unwrap_or(0))
}

/// Set the schema version.
fn set_schema_version(conn: &Connection, version: i32) -> StorageResult<()> {
    conn.execute("DELETE FROM schema_version", [])
        .map_err(|e| schema_error("Failed to clear schema_version", e))?;
    conn.execute("INSERT INTO schema_version (version) VALUES (?1)", [version])
        .map_err(|e| schema_error("Failed to set schema_version", e))?;
    Ok(())
}

/// Create the initial schema (version 1).
fn create_schema_v1(conn: &Connection) -> StorageResult<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS journals (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            search_index TEXT,
            deleted INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error("Failed to create journals table", e))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS journal_entries (
            id TEXT PRIMARY KEY,
            journal_id TEXT NOT NULL REFERENCES journals(id) ON DELETE CASCADE,
            title TEXT,
            content TEXT NOT NULL DEFAULT '',
            context_type TEXT,
            context_id TEXT,
            context_url TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )
    .map_err(|e| schema_error("Failed to create journal_entries table", e))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS journal_entry_tags (
            journal_entry_id TEXT NOT NULL REFERENCES journal_entries(id) ON DELETE CASCADE,
            tag TEXT NOT NULL,
            PRIMARY KEY (journal_entry_id, tag)
        )",
        [],
    )
    .map_err(|e| schema_error("Failed to create journal_entry_tags table", e))?;

    create_indexes(conn)
}

/// Create indexes for efficient queries.
fn create_indexes(conn: &Connection) -> StorageResult<()> {
    let indexes = [
        "CREATE INDEX IF NOT EXISTS idx_journals_search_index ON journals(search_index)",
        "CREATE INDEX IF NOT EXISTS idx_entries_journal_created ON journal_entries(journal_id, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_entry_tags_tag ON journal_entry_tags(tag)",
    ];

    for index_sql in &indexes {
        conn.execute(index_sql, [])
            .map_err(|e| schema_error("Failed to create index", e))?;
    }

    Ok(())
}
