//! Journal and entry records in SQLite.
//!
//! The full CRUD surface lives outside this crate. What is here is the read
//! side used by synchronization and the handful of writes the admin surface
//! and tests need.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{OptionalExtension, Row, params};
use uuid::Uuid;

use crate::error::{BackendError, SearchError, StorageError, StorageResult};
use crate::types::{Journal, JournalEntry};

use super::SqliteBackend;

pub(super) fn internal_error(message: String) -> StorageError {
    StorageError::Backend(BackendError::Internal {
        backend_name: "sqlite".to_string(),
        message,
        source: None,
    })
}

/// Fixed-width RFC 3339 form used for every stored timestamp.
pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a stored timestamp.
pub fn parse_timestamp(raw: &str) -> StorageResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| internal_error(format!("Invalid stored timestamp '{}': {}", raw, e)))
}

fn parse_uuid(raw: &str) -> StorageResult<Uuid> {
    Uuid::parse_str(raw).map_err(|e| internal_error(format!("Invalid stored id '{}': {}", raw, e)))
}

/// Entry columns selected by every entry query, in this order, followed by
/// the tag set as a JSON array.
pub(super) const ENTRY_COLUMNS: &str = "id, journal_id, title, content, context_type, \
     context_id, context_url, created_at, updated_at";

/// An entry row as read from SQLite, before conversion.
pub(super) struct EntryRow {
    id: String,
    journal_id: String,
    title: Option<String>,
    content: String,
    context_type: Option<String>,
    context_id: Option<String>,
    context_url: Option<String>,
    created_at: String,
    updated_at: String,
    tags: String,
}

impl EntryRow {
    pub(super) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            journal_id: row.get(1)?,
            title: row.get(2)?,
            content: row.get(3)?,
            context_type: row.get(4)?,
            context_id: row.get(5)?,
            context_url: row.get(6)?,
            created_at: row.get(7)?,
            updated_at: row.get(8)?,
            tags: row.get(9)?,
        })
    }

    pub(super) fn into_entry(self) -> StorageResult<JournalEntry> {
        let mut tags: Vec<String> = serde_json::from_str(&self.tags)?;
        tags.sort();
        tags.dedup();

        Ok(JournalEntry {
            id: parse_uuid(&self.id)?,
            journal_id: parse_uuid(&self.journal_id)?,
            title: self.title,
            content: self.content,
            tags,
            context_type: self.context_type,
            context_id: self.context_id,
            context_url: self.context_url,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

struct JournalRow {
    id: String,
    name: String,
    search_index: Option<String>,
    deleted: bool,
    created_at: String,
    updated_at: String,
}

impl JournalRow {
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            name: row.get(1)?,
            search_index: row.get(2)?,
            deleted: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_journal(self) -> StorageResult<Journal> {
        Ok(Journal {
            id: parse_uuid(&self.id)?,
            name: self.name,
            search_index: self.search_index,
            deleted: self.deleted,
            created_at: parse_timestamp(&self.created_at)?,
            updated_at: parse_timestamp(&self.updated_at)?,
        })
    }
}

const JOURNAL_COLUMNS: &str = "id, name, search_index, deleted, created_at, updated_at";

impl SqliteBackend {
    /// Inserts or replaces a journal.
    pub fn put_journal(&self, journal: &Journal) -> StorageResult<()> {
        let conn = self.get_connection()?;
        conn.execute(
            "INSERT INTO journals (id, name, search_index, deleted, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                name = excluded.name,
                search_index = excluded.search_index,
                deleted = excluded.deleted,
                updated_at = excluded.updated_at",
            params![
                journal.id.to_string(),
                journal.name,
                journal.search_index,
                journal.deleted,
                format_timestamp(&journal.created_at),
                format_timestamp(&journal.updated_at),
            ],
        )
        .map_err(|e| internal_error(format!("Failed to store journal: {}", e)))?;
        Ok(())
    }

    /// Reads a journal, deleted or not.
    pub fn get_journal(&self, id: Uuid) -> StorageResult<Option<Journal>> {
        let conn = self.get_connection()?;
        let sql = format!("SELECT {} FROM journals WHERE id = ?1", JOURNAL_COLUMNS);
        let row = conn
            .query_row(&sql, params![id.to_string()], JournalRow::from_row)
            .optional()
            .map_err(|e| internal_error(format!("Failed to read journal: {}", e)))?;
        row.map(JournalRow::into_journal).transpose()
    }

    /// Points a journal at a search index, or detaches it with `None`.
    pub fn set_search_index(&self, id: Uuid, index: Option<&str>) -> StorageResult<Journal> {
        let conn = self.get_connection()?;
        let updated = conn
            .execute(
                "UPDATE journals SET search_index = ?1, updated_at = ?2 WHERE id = ?3",
                params![index, format_timestamp(&Utc::now()), id.to_string()],
            )
            .map_err(|e| internal_error(format!("Failed to set search index: {}", e)))?;
        drop(conn);

        if updated == 0 {
            return Err(SearchError::JournalNotFound {
                journal_id: id.to_string(),
            }
            .into());
        }
        self.get_journal(id)?.ok_or_else(|| {
            SearchError::JournalNotFound {
                journal_id: id.to_string(),
            }
            .into()
        })
    }

    /// Soft-deletes a journal. Its entries stay but it is no longer synchronized.
    pub fn mark_journal_deleted(&self, id: Uuid) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        let updated = conn
            .execute(
                "UPDATE journals SET deleted = 1, updated_at = ?1 WHERE id = ?2",
                params![format_timestamp(&Utc::now()), id.to_string()],
            )
            .map_err(|e| internal_error(format!("Failed to delete journal: {}", e)))?;
        Ok(updated > 0)
    }

    /// Non-deleted journals configured for `index`, optionally only `journal_id`.
    pub fn journals_for_index(
        &self,
        index: &str,
        journal_id: Option<Uuid>,
    ) -> StorageResult<Vec<Journal>> {
        let conn = self.get_connection()?;
        let mut sql = format!(
            "SELECT {} FROM journals WHERE search_index = ?1 AND deleted = 0",
            JOURNAL_COLUMNS
        );
        let mut params_vec: Vec<Box<dyn rusqlite::ToSql>> = vec![Box::new(index.to_string())];
        if let Some(id) = journal_id {
            sql.push_str(" AND id = ?2");
            params_vec.push(Box::new(id.to_string()));
        }
        sql.push_str(" ORDER BY created_at, id");

        let params_slice: Vec<&dyn rusqlite::ToSql> =
            params_vec.iter().map(|p| p.as_ref()).collect();

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare journal query: {}", e)))?;
        let rows = stmt
            .query_map(params_slice.as_slice(), JournalRow::from_row)
            .map_err(|e| internal_error(format!("Failed to query journals: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(JournalRow::into_journal).collect()
    }

    /// Inserts or fully replaces an entry and its tag set.
    pub fn put_entry(&self, entry: &JournalEntry) -> StorageResult<()> {
        let mut conn = self.get_connection()?;
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO journal_entries
                (id, journal_id, title, content, context_type, context_id, context_url, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                journal_id = excluded.journal_id,
                title = excluded.title,
                content = excluded.content,
                context_type = excluded.context_type,
                context_id = excluded.context_id,
                context_url = excluded.context_url,
                created_at = excluded.created_at,
                updated_at = excluded.updated_at",
            params![
                entry.id.to_string(),
                entry.journal_id.to_string(),
                entry.title,
                entry.content,
                entry.context_type,
                entry.context_id,
                entry.context_url,
                format_timestamp(&entry.created_at),
                format_timestamp(&entry.updated_at),
            ],
        )
        .map_err(|e| internal_error(format!("Failed to store entry: {}", e)))?;

        tx.execute(
            "DELETE FROM journal_entry_tags WHERE journal_entry_id = ?1",
            params![entry.id.to_string()],
        )
        .map_err(|e| internal_error(format!("Failed to clear entry tags: {}", e)))?;

        {
            let mut stmt = tx
                .prepare(
                    "INSERT OR IGNORE INTO journal_entry_tags (journal_entry_id, tag) VALUES (?1, ?2)",
                )
                .map_err(|e| internal_error(format!("Failed to prepare tag insert: {}", e)))?;
            for tag in &entry.tags {
                stmt.execute(params![entry.id.to_string(), tag])
                    .map_err(|e| internal_error(format!("Failed to store tag: {}", e)))?;
            }
        }

        tx.commit()?;
        Ok(())
    }

    /// Deletes an entry and its tags. Returns false if it did not exist.
    pub fn delete_entry(&self, id: Uuid) -> StorageResult<bool> {
        let conn = self.get_connection()?;
        let deleted = conn
            .execute(
                "DELETE FROM journal_entries WHERE id = ?1",
                params![id.to_string()],
            )
            .map_err(|e| internal_error(format!("Failed to delete entry: {}", e)))?;
        Ok(deleted > 0)
    }

    /// Reads one entry with its tags.
    pub fn get_entry(&self, id: Uuid) -> StorageResult<Option<JournalEntry>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {}, (SELECT json_group_array(t.tag) FROM journal_entry_tags t
                         WHERE t.journal_entry_id = e.id)
             FROM journal_entries e WHERE e.id = ?1",
            qualified_entry_columns("e")
        );
        let row = conn
            .query_row(&sql, params![id.to_string()], EntryRow::from_row)
            .optional()
            .map_err(|e| internal_error(format!("Failed to read entry: {}", e)))?;
        row.map(EntryRow::into_entry).transpose()
    }

    /// Every entry of a journal with its tags, oldest first.
    pub fn journal_entries(&self, journal_id: Uuid) -> StorageResult<Vec<JournalEntry>> {
        let conn = self.get_connection()?;
        let sql = format!(
            "SELECT {}, (SELECT json_group_array(t.tag) FROM journal_entry_tags t
                         WHERE t.journal_entry_id = e.id)
             FROM journal_entries e
             WHERE e.journal_id = ?1
             ORDER BY e.created_at, e.id",
            qualified_entry_columns("e")
        );

        let mut stmt = conn
            .prepare(&sql)
            .map_err(|e| internal_error(format!("Failed to prepare entry query: {}", e)))?;
        let rows = stmt
            .query_map(params![journal_id.to_string()], EntryRow::from_row)
            .map_err(|e| internal_error(format!("Failed to query entries: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        rows.into_iter().map(EntryRow::into_entry).collect()
    }
}

/// [`ENTRY_COLUMNS`] prefixed with a table alias.
pub(super) fn qualified_entry_columns(alias: &str) -> String {
    ENTRY_COLUMNS
        .split(", ")
        .map(|column| format!("{}.{}", alias, column.trim()))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn backend() -> SqliteBackend {
        let backend = SqliteBackend::in_memory().unwrap();
        backend.init_schema().unwrap();
        backend
    }

    #[test]
    fn test_timestamp_format_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2021, 3, 4, 5, 6, 7).unwrap();
        let formatted = format_timestamp(&whole);
        assert_eq!(formatted, "2021-03-04T05:06:07.000000Z");
        assert_eq!(parse_timestamp(&formatted).unwrap(), whole);
    }

    #[test]
    fn test_qualified_entry_columns() {
        let columns = qualified_entry_columns("p");
        assert!(columns.starts_with("p.id, p.journal_id"));
        assert!(columns.ends_with("p.updated_at"));
    }

    #[test]
    fn test_put_and_read_entry() {
        let backend = backend();
        let journal = Journal::new(Uuid::new_v4(), "ops");
        backend.put_journal(&journal).unwrap();

        let entry = JournalEntry::new(journal.id, "deploy", "rolled out v2")
            .with_tags(["release", "prod"])
            .with_context(Some("github"), Some("42"), None);
        backend.put_entry(&entry).unwrap();

        let read = backend.get_entry(entry.id).unwrap().unwrap();
        assert_eq!(read.tags, vec!["prod".to_string(), "release".to_string()]);
        assert_eq!(read.context_type.as_deref(), Some("github"));
        assert_eq!(read.title.as_deref(), Some("deploy"));
    }

    #[test]
    fn test_put_entry_replaces_tags() {
        let backend = backend();
        let journal = Journal::new(Uuid::new_v4(), "ops");
        backend.put_journal(&journal).unwrap();

        let entry = JournalEntry::new(journal.id, "t", "c").with_tags(["a", "b"]);
        backend.put_entry(&entry).unwrap();
        let entry = entry.with_tags(["c"]);
        backend.put_entry(&entry).unwrap();

        let read = backend.get_entry(entry.id).unwrap().unwrap();
        assert_eq!(read.tags, vec!["c".to_string()]);
    }

    #[test]
    fn test_entry_without_tags_has_empty_tag_set() {
        let backend = backend();
        let journal = Journal::new(Uuid::new_v4(), "ops");
        backend.put_journal(&journal).unwrap();

        let entry = JournalEntry::new(journal.id, "t", "c");
        backend.put_entry(&entry).unwrap();

        let entries = backend.journal_entries(journal.id).unwrap();
        assert_eq!(entries.len(), 1);
        assert!(entries[0].tags.is_empty());
    }

    #[test]
    fn test_delete_entry() {
        let backend = backend();
        let journal = Journal::new(Uuid::new_v4(), "ops");
        backend.put_journal(&journal).unwrap();
        let entry = JournalEntry::new(journal.id, "t", "c").with_tags(["a"]);
        backend.put_entry(&entry).unwrap();

        assert!(backend.delete_entry(entry.id).unwrap());
        assert!(!backend.delete_entry(entry.id).unwrap());
        assert!(backend.get_entry(entry.id).unwrap().is_none());
    }

    #[test]
    fn test_journals_for_index() {
        let backend = backend();
        let indexed = Journal::new(Uuid::new_v4(), "a").with_search_index("main");
        let other = Journal::new(Uuid::new_v4(), "b").with_search_index("other");
        let plain = Journal::new(Uuid::new_v4(), "c");
        let deleted = Journal::new(Uuid::new_v4(), "d").with_search_index("main");
        for journal in [&indexed, &other, &plain, &deleted] {
            backend.put_journal(journal).unwrap();
        }
        assert!(backend.mark_journal_deleted(deleted.id).unwrap());

        let journals = backend.journals_for_index("main", None).unwrap();
        assert_eq!(journals.len(), 1);
        assert_eq!(journals[0].id, indexed.id);

        let scoped = backend.journals_for_index("main", Some(other.id)).unwrap();
        assert!(scoped.is_empty());
    }

    #[test]
    fn test_set_search_index() {
        let backend = backend();
        let journal = Journal::new(Uuid::new_v4(), "ops");
        backend.put_journal(&journal).unwrap();

        let updated = backend.set_search_index(journal.id, Some("main")).unwrap();
        assert_eq!(updated.search_index.as_deref(), Some("main"));

        let cleared = backend.set_search_index(journal.id, None).unwrap();
        assert_eq!(cleared.search_index, None);

        let missing = backend.set_search_index(Uuid::new_v4(), Some("main"));
        assert!(matches!(
            missing,
            Err(StorageError::Search(SearchError::JournalNotFound { .. }))
        ));
    }
}
