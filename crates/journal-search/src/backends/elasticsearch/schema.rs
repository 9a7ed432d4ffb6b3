//! Index mapping and index lifecycle.

use elasticsearch::CountParts;
use elasticsearch::indices::{IndicesCreateParts, IndicesDeleteParts, IndicesExistsParts};
use serde_json::{Value, json};
use tracing::{debug, info};

use crate::error::{IndexError, StorageResult};

use super::backend::{ElasticsearchBackend, ElasticsearchConfig, internal_error};

/// Creates the index settings and mapping for journal entries.
///
/// `title` and `content` are analyzed with the standard tokenizer and English
/// stopwords. `tag` and the context fields are keywords so matches are exact.
pub fn create_index_mapping(config: &ElasticsearchConfig) -> Value {
    json!({
        "settings": {
            "number_of_shards": config.number_of_shards,
            "number_of_replicas": config.number_of_replicas,
            "index.max_result_window": config.max_result_window,
            "refresh_interval": config.refresh_interval,
            "analysis": {
                "analyzer": {
                    "default": {
                        "type": "standard",
                        "stopwords": "_english_"
                    },
                    "default_search": {
                        "type": "standard",
                        "stopwords": "_english_"
                    }
                }
            }
        },
        "mappings": {
            "properties": {
                "journal_id": { "type": "keyword" },
                "title": { "type": "text" },
                "content": { "type": "text" },
                "tag": { "type": "keyword" },
                "created_at": { "type": "date", "format": "epoch_second" },
                "updated_at": { "type": "date", "format": "epoch_second" },
                "context_type": { "type": "keyword" },
                "context_id": { "type": "keyword" },
                "context_url": { "type": "keyword" }
            }
        }
    })
}

/// Only 404 means absent; auth and server failures are errors.
fn existence_from_status(index: &str, status: u16) -> StorageResult<bool> {
    match status {
        200..=299 => Ok(true),
        404 => Ok(false),
        other => Err(internal_error(format!(
            "Failed to check existence of index {} (status {})",
            index, other
        ))),
    }
}

impl ElasticsearchBackend {
    /// Returns true if `index` exists.
    pub async fn index_exists(&self, index: &str) -> StorageResult<bool> {
        let response = self
            .client()
            .indices()
            .exists(IndicesExistsParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| internal_error(format!("Failed to check index existence: {}", e)))?;

        existence_from_status(index, response.status_code().as_u16())
    }

    /// Creates `index` with the journal entry mapping.
    ///
    /// An existing index is an error unless `force` is set, in which case it
    /// is dropped and recreated empty.
    pub async fn create_index(&self, index: &str, force: bool) -> StorageResult<()> {
        if self.index_exists(index).await? {
            if !force {
                return Err(IndexError::AlreadyExists {
                    index: index.to_string(),
                }
                .into());
            }
            self.drop_index(index).await?;
        }

        let response = self
            .client()
            .indices()
            .create(IndicesCreateParts::Index(index))
            .body(create_index_mapping(self.config()))
            .send()
            .await
            .map_err(|e| internal_error(format!("Failed to create index {}: {}", index, e)))?;

        let status = response.status_code();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if body.contains("resource_already_exists_exception") {
                return Err(IndexError::AlreadyExists {
                    index: index.to_string(),
                }
                .into());
            }
            return Err(internal_error(format!(
                "Failed to create index {} (status {}): {}",
                index, status, body
            )));
        }

        info!(index = %index, force, "Created search index");
        Ok(())
    }

    /// Creates `index` if it does not exist. Returns true if it was created.
    pub async fn ensure_index(&self, index: &str) -> StorageResult<bool> {
        if self.index_exists(index).await? {
            return Ok(false);
        }
        match self.create_index(index, false).await {
            Ok(()) => Ok(true),
            // Lost a race with another creator.
            Err(crate::error::StorageError::Index(IndexError::AlreadyExists { .. })) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Deletes `index` and every document in it.
    ///
    /// A missing index is reported as [`IndexError::NotFound`].
    pub async fn drop_index(&self, index: &str) -> StorageResult<()> {
        let response = self
            .client()
            .indices()
            .delete(IndicesDeleteParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| internal_error(format!("Failed to delete index {}: {}", index, e)))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(IndexError::NotFound {
                index: index.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(internal_error(format!(
                "Failed to delete index {} (status {}): {}",
                index, status, body
            )));
        }

        info!(index = %index, "Dropped search index");
        Ok(())
    }

    /// Number of documents in `index`.
    pub async fn docs_count(&self, index: &str) -> StorageResult<u64> {
        let response = self
            .client()
            .count(CountParts::Index(&[index]))
            .send()
            .await
            .map_err(|e| internal_error(format!("Failed to count documents in {}: {}", index, e)))?;

        let status = response.status_code();
        if status.as_u16() == 404 {
            return Err(IndexError::NotFound {
                index: index.to_string(),
            }
            .into());
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(internal_error(format!(
                "Failed to count documents in {} (status {}): {}",
                index, status, body
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| internal_error(format!("Failed to parse count response: {}", e)))?;
        let count = body.get("count").and_then(Value::as_u64).unwrap_or(0);
        debug!(index = %index, count, "Counted documents");
        Ok(count)
    }
}
