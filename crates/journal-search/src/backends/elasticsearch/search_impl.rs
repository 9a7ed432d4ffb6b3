//! Index-backed search.

use async_trait::async_trait;
use elasticsearch::SearchParts;
use serde_json::Value;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::SearchExecutor;
use crate::error::{BackendError, StorageError, StorageResult};
use crate::types::{EntryHit, PageResult, Pagination, SearchQuery};

use super::backend::{ElasticsearchBackend, internal_error};
use super::document::IndexedDocument;
use super::query_builder::EsQueryBuilder;

/// Searches one index through a shared backend.
#[derive(Debug, Clone, Copy)]
pub struct IndexedSearch<'a> {
    backend: &'a ElasticsearchBackend,
    index: &'a str,
}

impl<'a> IndexedSearch<'a> {
    /// Binds the backend to an index.
    pub fn new(backend: &'a ElasticsearchBackend, index: &'a str) -> Self {
        Self { backend, index }
    }

    /// The index searched.
    pub fn index(&self) -> &str {
        self.index
    }
}

/// Reads the native response envelope.
fn parse_response(body: &Value) -> PageResult {
    let envelope = body.get("hits");
    let total = envelope
        .and_then(|h| h.get("total"))
        .and_then(|t| t.get("value").or(Some(t)))
        .and_then(Value::as_u64)
        .unwrap_or(0);
    let max_score = envelope
        .and_then(|h| h.get("max_score"))
        .and_then(Value::as_f64);

    let hits = envelope
        .and_then(|h| h.get("hits"))
        .and_then(Value::as_array)
        .map(|hits| hits.iter().filter_map(parse_hit).collect())
        .unwrap_or_default();

    PageResult {
        total,
        max_score,
        hits,
    }
}

fn parse_hit(hit: &Value) -> Option<EntryHit> {
    let raw_id = hit.get("_id").and_then(Value::as_str)?;
    let Ok(id) = Uuid::parse_str(raw_id) else {
        warn!(id = %raw_id, "Skipping document with a non-entry id");
        return None;
    };
    let source = hit.get("_source")?.clone();
    let document: IndexedDocument = match serde_json::from_value(source) {
        Ok(document) => document,
        Err(e) => {
            warn!(id = %raw_id, error = %e, "Skipping unreadable document");
            return None;
        }
    };
    let score = hit.get("_score").and_then(Value::as_f64);
    document.into_hit(id, score)
}

#[async_trait]
impl SearchExecutor for IndexedSearch<'_> {
    async fn execute(
        &self,
        journal_id: Uuid,
        query: &SearchQuery,
        pagination: &Pagination,
    ) -> StorageResult<PageResult> {
        let es_query = EsQueryBuilder::new(self.index).build(journal_id, query, pagination);

        debug!(
            index = %self.index,
            journal_id = %journal_id,
            body = %es_query.body,
            "Executing index search"
        );

        let response = self
            .backend
            .client()
            .search(SearchParts::Index(&[es_query.index.as_str()]))
            .body(es_query.body)
            .send()
            .await
            .map_err(|e| internal_error(format!("Search request failed: {}", e)))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(StorageError::Backend(BackendError::QueryError {
                backend_name: "elasticsearch".to_string(),
                message: format!("Search failed (status {}): {}", status, body),
            }));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| internal_error(format!("Failed to parse search response: {}", e)))?;

        Ok(parse_response(&body))
    }
}
