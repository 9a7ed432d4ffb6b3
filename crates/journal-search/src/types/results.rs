//! Executor output.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::JournalEntry;

/// One matching entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryHit {
    /// Entry id.
    pub id: Uuid,
    /// Title, if any.
    pub title: Option<String>,
    /// Body text, when the backend returned it.
    pub content: Option<String>,
    /// Tag set.
    pub tags: Vec<String>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last modification time.
    pub updated_at: DateTime<Utc>,
    /// Relevance score. The index may omit it when sorting by time.
    pub score: Option<f64>,
    /// Context type.
    pub context_type: Option<String>,
    /// Context id.
    pub context_id: Option<String>,
    /// Context URL.
    pub context_url: Option<String>,
}

impl EntryHit {
    /// Builds a hit from a relational row with a fixed score.
    pub fn from_entry(entry: JournalEntry, score: f64) -> Self {
        Self {
            id: entry.id,
            title: entry.title,
            content: Some(entry.content),
            tags: entry.tags,
            created_at: entry.created_at,
            updated_at: entry.updated_at,
            score: Some(score),
            context_type: entry.context_type,
            context_id: entry.context_id,
            context_url: entry.context_url,
        }
    }
}

/// One page of results plus the size of the whole result set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageResult {
    /// Number of matches before pagination.
    pub total: u64,
    /// Highest score on the page, when the backend reports one.
    pub max_score: Option<f64>,
    /// The page itself.
    pub hits: Vec<EntryHit>,
}

impl PageResult {
    /// Ids of the hits, in page order.
    pub fn ids(&self) -> Vec<Uuid> {
        self.hits.iter().map(|hit| hit.id).collect()
    }
}
