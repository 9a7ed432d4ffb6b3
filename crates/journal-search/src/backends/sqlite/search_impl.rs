//! Relational search over entries and tags.

use async_trait::async_trait;
use tracing::debug;
use uuid::Uuid;

use crate::core::SearchExecutor;
use crate::error::StorageResult;
use crate::query::Predicate;
use crate::types::{EntryHit, PageResult, Pagination, SearchQuery};

use super::SqliteBackend;
use super::query_builder::{SqlParam, compile};
use super::storage::{EntryRow, internal_error, qualified_entry_columns};

/// Every relational match scores the same; order is by recency alone.
const RELATIONAL_SCORE: f64 = 1.0;

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[async_trait]
impl SearchExecutor for SqliteBackend {
    async fn execute(
        &self,
        journal_id: Uuid,
        query: &SearchQuery,
        pagination: &Pagination,
    ) -> StorageResult<PageResult> {
        let predicate = Predicate::from_query(journal_id, query);
        let filter = compile(&predicate);
        let direction = pagination.order.sql_keyword();

        debug!(
            journal_id = %journal_id,
            where_clause = %filter.sql,
            size = pagination.size,
            start = pagination.start,
            "Executing relational search"
        );

        let conn = self.get_connection()?;

        let count_sql = format!(
            "SELECT COUNT(*) FROM journal_entries e WHERE {}",
            filter.sql
        );
        let total: i64 = conn
            .query_row(&count_sql, filter.param_refs().as_slice(), |row| row.get(0))
            .map_err(|e| internal_error(format!("Failed to count matches: {}", e)))?;

        // Tags are aggregated for the page only, after LIMIT/OFFSET.
        let page_sql = format!(
            "WITH page AS (
                SELECT {columns} FROM journal_entries e
                WHERE {filter}
                ORDER BY e.created_at {dir}, e.id {dir}
                LIMIT ? OFFSET ?
            )
            SELECT {page_columns}, COALESCE(agg.tags, '[]')
            FROM page
            LEFT JOIN (
                SELECT journal_entry_id, json_group_array(tag) AS tags
                FROM journal_entry_tags
                WHERE journal_entry_id IN (SELECT id FROM page)
                GROUP BY journal_entry_id
            ) agg ON agg.journal_entry_id = page.id
            ORDER BY page.created_at {dir}, page.id {dir}",
            columns = qualified_entry_columns("e"),
            filter = filter.sql,
            page_columns = qualified_entry_columns("page"),
            dir = direction,
        );

        let mut params = filter.params.clone();
        params.push(SqlParam::integer(to_i64(pagination.size)));
        params.push(SqlParam::integer(to_i64(pagination.start)));
        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = conn
            .prepare(&page_sql)
            .map_err(|e| internal_error(format!("Failed to prepare search: {}", e)))?;
        let rows = stmt
            .query_map(param_refs.as_slice(), EntryRow::from_row)
            .map_err(|e| internal_error(format!("Failed to execute search: {}", e)))?
            .collect::<rusqlite::Result<Vec<_>>>()?;

        let hits = rows
            .into_iter()
            .map(|row| {
                row.into_entry()
                    .map(|entry| EntryHit::from_entry(entry, RELATIONAL_SCORE))
            })
            .collect::<StorageResult<Vec<_>>>()?;

        Ok(PageResult {
            total: u64::try_from(total).unwrap_or(0),
            max_score: Some(RELATIONAL_SCORE),
            hits,
        })
    }
}
