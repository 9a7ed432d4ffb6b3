//! Relational to index replication.
//!
//! Replication is one-way and lossy: live mutations are mirrored
//! best-effort through [`IndexMirror`], and [`Synchronizer::synchronize`]
//! rebuilds an index (or one journal's share of it) from the relational
//! store. Rebuilding is erase-then-load, so it can be rerun at any time.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::backends::elasticsearch::ElasticsearchBackend;
use crate::backends::sqlite::SqliteBackend;
use crate::error::{SearchError, StorageError, StorageResult};
use crate::types::JournalEntry;

/// Which journals a lifecycle operation covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SyncScope {
    /// Every journal configured for the index.
    Any,
    /// One journal.
    Journal(Uuid),
}

impl SyncScope {
    /// The journal id, or `None` for [`SyncScope::Any`].
    pub fn journal_id(&self) -> Option<Uuid> {
        match self {
            SyncScope::Any => None,
            SyncScope::Journal(id) => Some(*id),
        }
    }
}

impl FromStr for SyncScope {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("any") {
            return Ok(SyncScope::Any);
        }
        Uuid::parse_str(trimmed)
            .map(SyncScope::Journal)
            .map_err(|_| {
                SearchError::InvalidScope {
                    value: s.to_string(),
                }
                .into()
            })
    }
}

impl fmt::Display for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncScope::Any => write!(f, "any"),
            SyncScope::Journal(id) => write!(f, "{}", id),
        }
    }
}

/// Summary of one synchronization run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncReport {
    /// Index rebuilt.
    pub index: String,
    /// Journals whose entries were loaded.
    pub journals_synced: Vec<Uuid>,
    /// Journals skipped because loading failed.
    pub journals_failed: Vec<Uuid>,
    /// Documents the index accepted.
    pub documents_indexed: usize,
    /// Documents the index rejected individually.
    pub documents_failed: usize,
}

/// Rebuilds indices from the relational store.
#[derive(Debug, Clone)]
pub struct Synchronizer {
    store: Arc<SqliteBackend>,
    index: Arc<ElasticsearchBackend>,
}

impl Synchronizer {
    /// Creates a synchronizer over both stores.
    pub fn new(store: Arc<SqliteBackend>, index: Arc<ElasticsearchBackend>) -> Self {
        Self { store, index }
    }

    /// Removes the documents in scope. A missing index is left alone.
    ///
    /// For [`SyncScope::Any`] the whole index is dropped.
    pub async fn erase(&self, index_name: &str, scope: SyncScope) -> StorageResult<()> {
        if !self.index.index_exists(index_name).await? {
            info!(index = %index_name, %scope, "Nothing to erase, index does not exist");
            return Ok(());
        }
        match scope {
            SyncScope::Journal(journal_id) => {
                self.index
                    .delete_journal_documents(index_name, journal_id)
                    .await?;
            }
            SyncScope::Any => self.index.drop_index(index_name).await?,
        }
        Ok(())
    }

    /// Erases the scope, then reloads every non-deleted journal in scope that
    /// is configured for `index_name`.
    ///
    /// A journal that fails to load is logged and skipped; the others are
    /// still loaded.
    pub async fn synchronize(&self, index_name: &str, scope: SyncScope) -> StorageResult<SyncReport> {
        self.erase(index_name, scope).await?;
        self.index.ensure_index(index_name).await?;

        let journals = self
            .store
            .journals_for_index(index_name, scope.journal_id())?;

        let mut report = SyncReport {
            index: index_name.to_string(),
            ..Default::default()
        };

        for journal in journals {
            let loaded = match self.store.journal_entries(journal.id) {
                Ok(entries) => self.index.bulk_upsert(index_name, &entries).await,
                Err(e) => Err(e),
            };
            match loaded {
                Ok(summary) => {
                    info!(
                        index = %index_name,
                        journal_id = %journal.id,
                        documents = summary.succeeded,
                        rejected = summary.failed,
                        "Synchronized journal"
                    );
                    report.documents_indexed += summary.succeeded;
                    report.documents_failed += summary.failed;
                    report.journals_synced.push(journal.id);
                }
                Err(e) => {
                    error!(
                        index = %index_name,
                        journal_id = %journal.id,
                        error = %e,
                        "Failed to synchronize journal"
                    );
                    report.journals_failed.push(journal.id);
                }
            }
        }

        self.index.refresh_index(index_name).await?;
        Ok(report)
    }

    /// Points a journal at `index` (or at none) and brings the indices in line.
    ///
    /// Documents in a previously configured index are removed. When an index
    /// is set, the journal is synchronized into it and the report returned.
    pub async fn set_search_index(
        &self,
        journal_id: Uuid,
        index: Option<&str>,
    ) -> StorageResult<Option<SyncReport>> {
        let journal = self
            .store
            .get_journal(journal_id)?
            .ok_or_else(|| SearchError::JournalNotFound {
                journal_id: journal_id.to_string(),
            })?;

        if let Some(previous) = journal.search_index.as_deref()
            && Some(previous) != index
        {
            self.erase(previous, SyncScope::Journal(journal_id)).await?;
        }

        self.store.set_search_index(journal_id, index)?;

        match index {
            Some(index) => Ok(Some(
                self.synchronize(index, SyncScope::Journal(journal_id))
                    .await?,
            )),
            None => Ok(None),
        }
    }
}

/// An entry mutation committed to the relational store.
#[derive(Debug, Clone)]
pub enum EntryEvent {
    /// An entry was created or modified.
    Upserted {
        /// Index of the entry's journal.
        index: String,
        /// The entry as committed.
        entry: JournalEntry,
    },
    /// An entry was deleted.
    Deleted {
        /// Index of the entry's journal.
        index: String,
        /// Deleted entry.
        entry_id: Uuid,
    },
    /// Entries were created or modified together.
    BulkUpserted {
        /// Index of the entries' journal.
        index: String,
        /// The entries as committed.
        entries: Vec<JournalEntry>,
    },
    /// Entries were deleted together.
    BulkDeleted {
        /// Index of the entries' journal.
        index: String,
        /// Deleted entries.
        entry_ids: Vec<Uuid>,
    },
    /// A journal was deleted or excluded from indexing.
    JournalPurged {
        /// Index the journal was configured for.
        index: String,
        /// The journal.
        journal_id: Uuid,
    },
}

impl EntryEvent {
    /// Index the event applies to.
    pub fn index(&self) -> &str {
        match self {
            EntryEvent::Upserted { index, .. }
            | EntryEvent::Deleted { index, .. }
            | EntryEvent::BulkUpserted { index, .. }
            | EntryEvent::BulkDeleted { index, .. }
            | EntryEvent::JournalPurged { index, .. } => index,
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            EntryEvent::Upserted { .. } => "upserted",
            EntryEvent::Deleted { .. } => "deleted",
            EntryEvent::BulkUpserted { .. } => "bulk_upserted",
            EntryEvent::BulkDeleted { .. } => "bulk_deleted",
            EntryEvent::JournalPurged { .. } => "journal_purged",
        }
    }
}

/// Mirrors live entry mutations into the index.
///
/// Failures are logged and swallowed; the relational write has already
/// committed and `synchronize` repairs any gap.
#[derive(Debug, Clone)]
pub struct IndexMirror {
    backend: Arc<ElasticsearchBackend>,
}

impl IndexMirror {
    /// Creates a mirror writing to `backend`.
    pub fn new(backend: Arc<ElasticsearchBackend>) -> Self {
        Self { backend }
    }

    /// Applies one event. Returns true if the index accepted it.
    pub async fn apply(&self, event: EntryEvent) -> bool {
        let kind = event.kind();
        let index = event.index().to_string();

        let result = match event {
            EntryEvent::Upserted { index, entry } => {
                self.backend.upsert_document(&index, &entry).await
            }
            EntryEvent::Deleted { index, entry_id } => self
                .backend
                .delete_document(&index, entry_id)
                .await
                .map(|_| ()),
            EntryEvent::BulkUpserted { index, entries } => {
                self.backend.bulk_upsert(&index, &entries).await.map(|summary| {
                    if summary.failed > 0 {
                        warn!(index = %index, failed = summary.failed, "Some entries were not indexed");
                    }
                })
            }
            EntryEvent::BulkDeleted { index, entry_ids } => self
                .backend
                .bulk_delete(&index, &entry_ids)
                .await
                .map(|_| ()),
            EntryEvent::JournalPurged { index, journal_id } => self
                .backend
                .delete_journal_documents(&index, journal_id)
                .await
                .map(|_| ()),
        };

        match result {
            Ok(()) => true,
            Err(e) => {
                error!(index = %index, event = kind, error = %e, "Failed to mirror entry event");
                false
            }
        }
    }

    /// Applies an event in the background.
    ///
    /// Must be called from within a Tokio runtime. The caller does not need
    /// to await the handle.
    pub fn dispatch(&self, event: EntryEvent) -> JoinHandle<bool> {
        let mirror = self.clone();
        tokio::spawn(async move { mirror.apply(event).await })
    }
}
