//! Command execution. Every command yields a JSON value for printing.

use std::sync::Arc;

use anyhow::Context;
use serde_json::{Value, json};
use tracing::info;

use helios_journal_search::backends::elasticsearch::ElasticsearchBackend;
use helios_journal_search::backends::sqlite::SqliteBackend;
use helios_journal_search::error::BackendError;
use helios_journal_search::sync::Synchronizer;
use helios_journal_search::{Backend, SearchRequest, SearchService};

use crate::config::{AdminConfig, Command, SearchArgs};

/// Opens the relational store and makes sure its schema exists.
pub fn open_store(config: &AdminConfig) -> anyhow::Result<Arc<SqliteBackend>> {
    let backend = if config.database_url == ":memory:" {
        SqliteBackend::in_memory()
    } else {
        SqliteBackend::open(&config.database_url)
    }
    .with_context(|| format!("failed to open database {}", config.database_url))?;
    backend.init_schema()?;
    Ok(Arc::new(backend))
}

/// Creates the index client. No request is made until a command runs.
pub fn open_index(config: &AdminConfig) -> anyhow::Result<Arc<ElasticsearchBackend>> {
    let backend = ElasticsearchBackend::new(config.elasticsearch_config())
        .context("failed to create Elasticsearch client")?;
    Ok(Arc::new(backend))
}

fn build_request(args: &SearchArgs, index: Option<String>) -> SearchRequest {
    let mut request = SearchRequest::new(args.journal)
        .with_query(args.query.clone())
        .with_filters(args.filters.iter().cloned())
        .with_page(args.limit, args.offset)
        .with_order(args.order)
        .with_content(args.content)
        .with_strict(args.strict);
    request.search_index = index;
    request
}

/// Runs the configured command.
pub async fn run(config: &AdminConfig) -> anyhow::Result<Value> {
    match &config.command {
        Command::CreateIndex { index, force } => {
            let index = config.index_or_default(index.as_deref());
            open_index(config)?.create_index(&index, *force).await?;
            info!(index = %index, force = *force, "Created index");
            Ok(json!({ "index": index, "created": true }))
        }
        Command::DropIndex { index } => {
            let index = config.index_or_default(index.as_deref());
            open_index(config)?.drop_index(&index).await?;
            info!(index = %index, "Dropped index");
            Ok(json!({ "index": index, "dropped": true }))
        }
        Command::IndexExists { index } => {
            let index = config.index_or_default(index.as_deref());
            let exists = open_index(config)?.index_exists(&index).await?;
            Ok(json!({ "index": index, "exists": exists }))
        }
        Command::DocsCount { index } => {
            let index = config.index_or_default(index.as_deref());
            let count = open_index(config)?.docs_count(&index).await?;
            Ok(json!({ "index": index, "count": count }))
        }
        Command::Search { index, args } => {
            let index = config.index_or_default(index.as_deref());
            let service = SearchService::new(open_store(config)?)
                .with_index_backend(open_index(config)?);
            let response = service.search(&build_request(args, Some(index))).await?;
            Ok(serde_json::to_value(response)?)
        }
        Command::SearchDb { args } => {
            let service = SearchService::new(open_store(config)?);
            let response = service.search(&build_request(args, None)).await?;
            Ok(serde_json::to_value(response)?)
        }
        Command::Erase { journal, index } => {
            let index = config.index_or_default(index.as_deref());
            let synchronizer = Synchronizer::new(open_store(config)?, open_index(config)?);
            synchronizer.erase(&index, *journal).await?;
            Ok(json!({ "index": index, "scope": journal.to_string(), "erased": true }))
        }
        Command::Synchronize { journal, index } => {
            let index = config.index_or_default(index.as_deref());
            let synchronizer = Synchronizer::new(open_store(config)?, open_index(config)?);
            let report = synchronizer.synchronize(&index, *journal).await?;
            Ok(serde_json::to_value(report)?)
        }
        Command::SetIndex { journal, index } => {
            let synchronizer = Synchronizer::new(open_store(config)?, open_index(config)?);
            let report = synchronizer
                .set_search_index(*journal, index.as_deref())
                .await?;
            Ok(json!({
                "journal_id": journal,
                "search_index": index,
                "report": report,
            }))
        }
        Command::Health => {
            let store = open_store(config)?;
            let index = open_index(config)?;
            Ok(json!({
                "sqlite": health_status(store.health_check().await),
                "elasticsearch": health_status(index.health_check().await),
            }))
        }
    }
}

fn health_status(result: Result<(), BackendError>) -> Value {
    match result {
        Ok(()) => Value::from("ok"),
        Err(e) => Value::from(e.to_string()),
    }
}
