//! Search façade: routing, pagination metadata and the uniform result shape.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::backends::elasticsearch::{ElasticsearchBackend, IndexedSearch};
use crate::backends::sqlite::SqliteBackend;
use crate::core::SearchExecutor;
use crate::error::{SearchError, StorageResult};
use crate::query::normalize;
use crate::types::{EntryHit, Journal, Pagination, ResultsOrder};

/// Where a journal's searches go, resolved once per request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Route {
    /// The journal has no search index.
    Relational,
    /// The journal is indexed under this name.
    Indexed(String),
}

impl Route {
    /// Route for a journal's configured index name.
    pub fn for_index(search_index: Option<&str>) -> Self {
        match search_index {
            Some(index) if !index.trim().is_empty() => Route::Indexed(index.to_string()),
            _ => Route::Relational,
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Route::Relational => write!(f, "relational"),
            Route::Indexed(index) => write!(f, "index:{}", index),
        }
    }
}

/// One search request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Journal to search.
    pub journal_id: Uuid,
    /// The journal's configured index, if any.
    pub search_index: Option<String>,
    /// Base URL of the journal, used to build result links.
    pub journal_url: String,
    /// Raw query string.
    pub query: String,
    /// Filter strings.
    pub filters: Vec<String>,
    /// Page size.
    pub limit: u64,
    /// Offset of the page.
    pub offset: u64,
    /// Whether results carry the entry body.
    pub include_content: bool,
    /// Sort direction by creation time.
    pub order: ResultsOrder,
    /// When false, filters embedded in `query` are extracted.
    pub strict: bool,
}

impl SearchRequest {
    /// A request with the default page, order and mode.
    pub fn new(journal_id: Uuid) -> Self {
        let defaults = Pagination::default();
        Self {
            journal_id,
            search_index: None,
            journal_url: format!("/journals/{}", journal_id),
            query: String::new(),
            filters: Vec::new(),
            limit: defaults.size,
            offset: defaults.start,
            include_content: false,
            order: defaults.order,
            strict: false,
        }
    }

    /// A request routed by the journal's configured index.
    pub fn for_journal(journal: &Journal) -> Self {
        Self {
            search_index: journal.search_index.clone(),
            ..Self::new(journal.id)
        }
    }

    /// Sets the raw query string.
    pub fn with_query(mut self, query: impl Into<String>) -> Self {
        self.query = query.into();
        self
    }

    /// Sets the filter list.
    pub fn with_filters<I, S>(mut self, filters: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.filters = filters.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the page.
    pub fn with_page(mut self, limit: u64, offset: u64) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }

    /// Sets the sort direction.
    pub fn with_order(mut self, order: ResultsOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets whether results carry the entry body.
    pub fn with_content(mut self, include_content: bool) -> Self {
        self.include_content = include_content;
        self
    }

    /// Sets strict mode.
    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict = strict;
        self
    }

    /// Sets the journal URL used for result links.
    pub fn with_journal_url(mut self, journal_url: impl Into<String>) -> Self {
        self.journal_url = journal_url.into();
        self
    }

    /// The route this request resolves to.
    pub fn route(&self) -> Route {
        Route::for_index(self.search_index.as_deref())
    }

    fn pagination(&self) -> Pagination {
        Pagination::new(self.limit, self.offset).with_order(self.order)
    }
}

/// One result in the uniform shape shared by both routes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResultItem {
    /// Entry id.
    pub id: Uuid,
    /// Link to the entry.
    pub entry_url: String,
    /// Link to the entry body.
    pub content_url: String,
    /// Title, empty when the entry has none.
    pub title: String,
    /// Entry body, only when requested.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Tag set.
    pub tags: Vec<String>,
    /// Creation time, ISO 8601.
    pub created_at: String,
    /// Last modification time, ISO 8601.
    pub updated_at: String,
    /// Relevance score.
    pub score: Option<f64>,
    /// Context type.
    pub context_type: Option<String>,
    /// Context id.
    pub context_id: Option<String>,
    /// Context URL.
    pub context_url: Option<String>,
}

fn iso(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

impl SearchResultItem {
    fn from_hit(hit: EntryHit, journal_url: &str, include_content: bool) -> Self {
        let entry_url = format!("{}/entries/{}", journal_url.trim_end_matches('/'), hit.id);
        Self {
            id: hit.id,
            content_url: format!("{}/content", entry_url),
            entry_url,
            title: hit.title.unwrap_or_default(),
            content: if include_content { hit.content } else { None },
            tags: hit.tags,
            created_at: iso(&hit.created_at),
            updated_at: iso(&hit.updated_at),
            score: hit.score,
            context_type: hit.context_type,
            context_id: hit.context_id,
            context_url: hit.context_url,
        }
    }
}

/// A page of results with pagination metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Matches before pagination.
    pub total_results: u64,
    /// Offset of this page.
    pub offset: u64,
    /// Offset of the next page, `None` at the end.
    pub next_offset: Option<u64>,
    /// Highest score on the page.
    pub max_score: f64,
    /// The page.
    pub results: Vec<SearchResultItem>,
}

/// Routes searches to the relational store or the index.
#[derive(Debug, Clone)]
pub struct SearchService {
    store: Arc<SqliteBackend>,
    index: Option<Arc<ElasticsearchBackend>>,
}

impl SearchService {
    /// A service without an index backend. Indexed journals fail to route.
    pub fn new(store: Arc<SqliteBackend>) -> Self {
        Self { store, index: None }
    }

    /// Adds the index backend.
    pub fn with_index_backend(mut self, index: Arc<ElasticsearchBackend>) -> Self {
        self.index = Some(index);
        self
    }

    /// The relational store.
    pub fn store(&self) -> &Arc<SqliteBackend> {
        &self.store
    }

    /// Builds a request for a stored journal.
    pub fn request_for(&self, journal_id: Uuid) -> StorageResult<SearchRequest> {
        match self.store.get_journal(journal_id)? {
            Some(journal) if !journal.deleted => Ok(SearchRequest::for_journal(&journal)),
            _ => Err(SearchError::JournalNotFound {
                journal_id: journal_id.to_string(),
            }
            .into()),
        }
    }

    /// Runs a search.
    ///
    /// Index failures are returned as errors; there is no fallback to the
    /// relational store for an indexed journal.
    pub async fn search(&self, request: &SearchRequest) -> StorageResult<SearchResponse> {
        let query = normalize(&request.query, request.filters.as_slice(), request.strict);
        let pagination = request.pagination();
        let route = request.route();

        let page = match &route {
            Route::Relational => {
                self.store
                    .execute(request.journal_id, &query, &pagination)
                    .await?
            }
            Route::Indexed(index) => {
                let backend = self
                    .index
                    .as_deref()
                    .ok_or_else(|| SearchError::IndexBackendMissing {
                        index: index.clone(),
                    })?;
                IndexedSearch::new(backend, index)
                    .execute(request.journal_id, &query, &pagination)
                    .await?
            }
        };

        info!(
            target: "journal_search::audit",
            journal_id = %request.journal_id,
            route = %route,
            query = %request.query,
            filters = ?request.filters,
            total = page.total,
            "Journal search"
        );

        let next_offset = pagination.next_offset(page.total);
        Ok(SearchResponse {
            total_results: page.total,
            offset: request.offset,
            next_offset,
            max_score: page.max_score.unwrap_or(0.0),
            results: page
                .hits
                .into_iter()
                .map(|hit| SearchResultItem::from_hit(hit, &request.journal_url, request.include_content))
                .collect(),
        })
    }
}
