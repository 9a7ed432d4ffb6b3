//! Index document projection of a journal entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::types::{EntryHit, JournalEntry};

/// One indexed entry. The document id is the entry id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedDocument {
    /// Owning journal.
    pub journal_id: Uuid,
    /// Title, if any.
    #[serde(default)]
    pub title: Option<String>,
    /// Body text.
    #[serde(default)]
    pub content: String,
    /// Tags. Accepts a single string or a list when read back.
    #[serde(default, deserialize_with = "one_or_many")]
    pub tag: Vec<String>,
    /// Creation time in epoch seconds.
    pub created_at: f64,
    /// Modification time in epoch seconds.
    pub updated_at: f64,
    /// Context type.
    #[serde(default)]
    pub context_type: Option<String>,
    /// Context id.
    #[serde(default)]
    pub context_id: Option<String>,
    /// Context URL.
    #[serde(default)]
    pub context_url: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<OneOrMany>::deserialize(deserializer)? {
        None => Vec::new(),
        Some(OneOrMany::One(tag)) => vec![tag],
        Some(OneOrMany::Many(tags)) => tags,
    })
}

/// Epoch seconds with millisecond precision.
pub(crate) fn epoch_seconds(at: &DateTime<Utc>) -> f64 {
    at.timestamp_millis() as f64 / 1000.0
}

pub(crate) fn from_epoch_seconds(seconds: f64) -> Option<DateTime<Utc>> {
    DateTime::from_timestamp_millis((seconds * 1000.0).round() as i64)
}

impl IndexedDocument {
    /// Projects an entry.
    pub fn from_entry(entry: &JournalEntry) -> Self {
        Self {
            journal_id: entry.journal_id,
            title: entry.title.clone(),
            content: entry.content.clone(),
            tag: entry.tags.clone(),
            created_at: epoch_seconds(&entry.created_at),
            updated_at: epoch_seconds(&entry.updated_at),
            context_type: entry.context_type.clone(),
            context_id: entry.context_id.clone(),
            context_url: entry.context_url.clone(),
        }
    }

    /// Converts a search hit back to the uniform hit shape.
    ///
    /// Returns `None` when a timestamp is out of range.
    pub fn into_hit(self, id: Uuid, score: Option<f64>) -> Option<EntryHit> {
        let mut tags = self.tag;
        tags.sort();
        tags.dedup();
        Some(EntryHit {
            id,
            title: self.title,
            content: Some(self.content),
            tags,
            created_at: from_epoch_seconds(self.created_at)?,
            updated_at: from_epoch_seconds(self.updated_at)?,
            score,
            context_type: self.context_type,
            context_id: self.context_id,
            context_url: self.context_url,
        })
    }
}
