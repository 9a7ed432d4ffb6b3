use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StorageResult;
use crate::types::{PageResult, Pagination, SearchQuery};

/// Executes a normalized search query against one backend.
///
/// Both the relational store and the search index implement this, so the
/// façade can dispatch without knowing which one it holds.
#[async_trait]
pub trait SearchExecutor: Send + Sync {
    /// Returns one page of entries of `journal_id` matching `query`.
    async fn execute(
        &self,
        journal_id: Uuid,
        query: &SearchQuery,
        pagination: &Pagination,
    ) -> StorageResult<PageResult>;
}
