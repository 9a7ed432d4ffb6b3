//! Records read from the relational store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A journal and the search index it is projected into, if any.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Journal {
    /// Journal id.
    pub id: Uuid,
    /// Display name.
    pub name: String,
    /// `None` means the journal is searched through the relational store only.
    pub search_index: Option<String>,
    /// Soft-delete marker. Deleted journals are never synchronized.
    pub deleted: bool,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl Journal {
    /// Creates a live, unindexed journal stamped with the current time.
    pub fn new(id: Uuid, name: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id,
            name: name.into(),
            search_index: None,
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Sets the search index.
    pub fn with_search_index(mut self, index: impl Into<String>) -> Self {
        self.search_index = Some(index.into());
        self
    }
}

/// A journal entry together with its tag set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Entry id, also the index document id.
    pub id: Uuid,
    /// Owning journal.
    pub journal_id: Uuid,
    /// Title, if any.
    pub title: Option<String>,
    /// Body text.
    pub content: String,
    /// Sorted, without duplicates.
    pub tags: Vec<String>,
    /// Context metadata: kind of the originating object.
    pub context_type: Option<String>,
    /// Context metadata: id of the originating object.
    pub context_id: Option<String>,
    /// Context metadata: link to the originating object.
    pub context_url: Option<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
}

impl JournalEntry {
    /// Creates an entry stamped with the current time.
    pub fn new(journal_id: Uuid, title: impl Into<String>, content: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            journal_id,
            title: Some(title.into()),
            content: content.into(),
            tags: Vec::new(),
            context_type: None,
            context_id: None,
            context_url: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replaces the tag set.
    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut tags: Vec<String> = tags.into_iter().map(Into::into).collect();
        tags.sort();
        tags.dedup();
        self.tags = tags;
        self
    }

    /// Sets both timestamps.
    pub fn with_timestamps(mut self, created_at: DateTime<Utc>, updated_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = updated_at;
        self
    }

    /// Sets the context fields.
    pub fn with_context(
        mut self,
        context_type: Option<&str>,
        context_id: Option<&str>,
        context_url: Option<&str>,
    ) -> Self {
        self.context_type = context_type.map(str::to_string);
        self.context_id = context_id.map(str::to_string);
        self.context_url = context_url.map(str::to_string);
        self
    }
}
