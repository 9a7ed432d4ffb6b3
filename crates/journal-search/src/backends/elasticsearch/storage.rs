//! Document writes: single, bulk and by journal.

use elasticsearch::http::request::JsonBody;
use elasticsearch::{BulkParts, CreateParts, DeleteByQueryParts, DeleteParts};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::{IndexError, StorageResult};
use crate::types::JournalEntry;

use super::backend::{ElasticsearchBackend, internal_error};
use super::document::IndexedDocument;

/// Outcome of a chunked bulk operation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkSummary {
    /// Bulk requests sent.
    pub chunks: usize,
    /// Items the index accepted.
    pub succeeded: usize,
    /// Items the index rejected individually.
    pub failed: usize,
}

impl BulkSummary {
    fn merge(&mut self, other: BulkSummary) {
        self.chunks += other.chunks;
        self.succeeded += other.succeeded;
        self.failed += other.failed;
    }
}

/// Counts item outcomes in a bulk response. A delete of a missing document
/// counts as success.
fn tally_items(response: &Value) -> BulkSummary {
    let mut summary = BulkSummary {
        chunks: 1,
        ..Default::default()
    };
    let Some(items) = response.get("items").and_then(Value::as_array) else {
        return summary;
    };

    for item in items {
        let Some((op, result)) = item.as_object().and_then(|o| o.iter().next()) else {
            continue;
        };
        let status = result.get("status").and_then(Value::as_u64).unwrap_or(0);
        let ok = (200..300).contains(&status) || (op == "delete" && status == 404);
        if ok {
            summary.succeeded += 1;
        } else {
            summary.failed += 1;
            let id = result.get("_id").and_then(Value::as_str).unwrap_or("");
            let error = result.get("error").cloned().unwrap_or(Value::Null);
            warn!(op = %op, id, status, error = %error, "Bulk item rejected");
        }
    }
    summary
}

impl ElasticsearchBackend {
    /// Writes one entry, replacing any previous document with the same id.
    ///
    /// The old document is deleted first so no field of a previous version
    /// survives.
    pub async fn upsert_document(&self, index: &str, entry: &JournalEntry) -> StorageResult<()> {
        self.delete_document(index, entry.id).await?;

        let id = entry.id.to_string();
        let document = serde_json::to_value(IndexedDocument::from_entry(entry))?;
        let response = self
            .client()
            .create(CreateParts::IndexId(index, &id))
            .body(document)
            .send()
            .await
            .map_err(|e| internal_error(format!("Failed to index entry {}: {}", id, e)))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(internal_error(format!(
                "Failed to index entry {} (status {}): {}",
                id, status, body
            )));
        }

        debug!(index = %index, entry_id = %id, "Indexed entry");
        Ok(())
    }

    /// Removes one document. Returns false if it was not there.
    pub async fn delete_document(&self, index: &str, entry_id: Uuid) -> StorageResult<bool> {
        let id = entry_id.to_string();
        let response = self
            .client()
            .delete(DeleteParts::IndexId(index, &id))
            .send()
            .await
            .map_err(|e| internal_error(format!("Failed to delete entry {}: {}", id, e)))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Ok(false);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(internal_error(format!(
                "Failed to delete entry {} (status {}): {}",
                id, status, body
            )));
        }
        Ok(true)
    }

    /// Indexes entries in chunks of `bulk_chunk_size`.
    ///
    /// Chunks already sent stay applied when a later chunk fails.
    pub async fn bulk_upsert(
        &self,
        index: &str,
        entries: &[JournalEntry],
    ) -> StorageResult<BulkSummary> {
        let mut operations = Vec::with_capacity(entries.len());
        for entry in entries {
            operations.push(vec![
                json!({ "index": { "_id": entry.id.to_string() } }),
                serde_json::to_value(IndexedDocument::from_entry(entry))?,
            ]);
        }
        self.run_bulk(index, operations).await
    }

    /// Deletes documents in chunks of `bulk_chunk_size`.
    pub async fn bulk_delete(&self, index: &str, entry_ids: &[Uuid]) -> StorageResult<BulkSummary> {
        let operations = entry_ids
            .iter()
            .map(|id| vec![json!({ "delete": { "_id": id.to_string() } })])
            .collect();
        self.run_bulk(index, operations).await
    }

    async fn run_bulk(&self, index: &str, operations: Vec<Vec<Value>>) -> StorageResult<BulkSummary> {
        let chunk_size = self.config().bulk_chunk_size.max(1);
        let mut summary = BulkSummary::default();

        for (chunk, operations) in operations.chunks(chunk_size).enumerate() {
            let chunk_failed = |message: String, indexed: usize| IndexError::BulkChunkFailed {
                index: index.to_string(),
                chunk,
                indexed,
                message,
            };

            let body: Vec<JsonBody<Value>> = operations
                .iter()
                .flatten()
                .cloned()
                .map(JsonBody::new)
                .collect();

            let response = self
                .client()
                .bulk(BulkParts::Index(index))
                .body(body)
                .send()
                .await
                .map_err(|e| chunk_failed(e.to_string(), summary.succeeded))?;

            let status = response.status_code();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(
                    chunk_failed(format!("status {}: {}", status, body), summary.succeeded).into(),
                );
            }

            let result: Value = response
                .json()
                .await
                .map_err(|e| chunk_failed(e.to_string(), summary.succeeded))?;
            let tally = tally_items(&result);
            debug!(
                index = %index,
                chunk,
                succeeded = tally.succeeded,
                failed = tally.failed,
                "Bulk chunk applied"
            );
            summary.merge(tally);
        }

        Ok(summary)
    }

    /// Deletes every document of a journal. Returns the number deleted.
    pub async fn delete_journal_documents(
        &self,
        index: &str,
        journal_id: Uuid,
    ) -> StorageResult<u64> {
        let response = self
            .client()
            .delete_by_query(DeleteByQueryParts::Index(&[index]))
            .refresh(true)
            .body(json!({
                "query": { "terms": { "journal_id": [journal_id.to_string()] } }
            }))
            .send()
            .await
            .map_err(|e| {
                internal_error(format!(
                    "Failed to delete documents of journal {}: {}",
                    journal_id, e
                ))
            })?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(internal_error(format!(
                "Failed to delete documents of journal {} (status {}): {}",
                journal_id, status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| internal_error(format!("Failed to parse delete response: {}", e)))?;
        let deleted = body.get("deleted").and_then(Value::as_u64).unwrap_or(0);
        info!(index = %index, journal_id = %journal_id, deleted, "Deleted journal documents");
        Ok(deleted)
    }
}
