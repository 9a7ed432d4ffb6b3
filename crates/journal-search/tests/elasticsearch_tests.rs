//! Elasticsearch backend tests.
//!
//! The first half needs no cluster. The `es_integration` module starts a real
//! Elasticsearch in Docker through testcontainers.
//!
//! Run with:
//!   cargo test -p helios-journal-search --features es-integration -- es_integration

use serde_json::json;
use uuid::Uuid;

use helios_journal_search::backends::elasticsearch::{
    ElasticsearchAuth, ElasticsearchBackend, ElasticsearchConfig, EsQueryBuilder, IndexedDocument,
    create_index_mapping,
};
use helios_journal_search::core::{Backend, BackendKind};
use helios_journal_search::types::{JournalEntry, Pagination};
use helios_journal_search::normalize;

// ============================================================================
// Backend Configuration Tests (no ES instance required)
// ============================================================================

#[test]
fn test_elasticsearch_config_serialization() {
    let config = ElasticsearchConfig {
        nodes: vec!["http://es1:9200".to_string()],
        auth: Some(ElasticsearchAuth::Basic {
            username: "elastic".to_string(),
            password: "changeme".to_string(),
        }),
        bulk_chunk_size: 250,
        ..Default::default()
    };

    let json = serde_json::to_string(&config).unwrap();
    let deserialized: ElasticsearchConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(deserialized.nodes, config.nodes);
    assert_eq!(deserialized.bulk_chunk_size, 250);
    assert!(matches!(
        deserialized.auth,
        Some(ElasticsearchAuth::Basic { .. })
    ));
}

#[test]
fn test_backend_creation() {
    // Builds the client only; no request is made.
    let backend = ElasticsearchBackend::new(ElasticsearchConfig::default()).unwrap();
    assert_eq!(backend.kind(), BackendKind::Elasticsearch);
    assert_eq!(backend.config().bulk_chunk_size, 1000);
}

#[test]
fn test_mapping_keeps_tags_exact() {
    let mapping = create_index_mapping(&ElasticsearchConfig::default());
    assert_eq!(mapping["mappings"]["properties"]["tag"]["type"], "keyword");
    assert_eq!(mapping["mappings"]["properties"]["title"]["type"], "text");
}

#[test]
fn test_document_projection() {
    let entry = JournalEntry::new(Uuid::new_v4(), "title", "content").with_tags(["one"]);
    let value = serde_json::to_value(IndexedDocument::from_entry(&entry)).unwrap();
    assert_eq!(value["tag"], json!(["one"]));
    assert_eq!(value["title"], "title");
    assert!(value["updated_at"].is_f64());
}

// ============================================================================
// Query Builder Tests (no ES instance required)
// ============================================================================

mod query_builder_tests {
    use super::*;
    use helios_journal_search::types::ResultsOrder;

    #[test]
    fn test_full_query_shape() {
        let journal_id = Uuid::new_v4();
        let query = normalize(
            "outage #db !#test ?#p1 context_type:pagerduty",
            &["created_at:>=2024-01-01"],
            false,
        );
        let es = EsQueryBuilder::new("journals-main").build(
            journal_id,
            &query,
            &Pagination::new(25, 50),
        );
        let bool_query = &es.body["query"]["bool"];

        assert_eq!(bool_query["should"][0]["match"]["title"]["query"], "outage");
        assert_eq!(bool_query["should"][0]["match"]["title"]["boost"], 2);
        assert_eq!(bool_query["should"][2], json!({ "terms": { "tag": ["p1"] } }));

        let must = bool_query["must"].as_array().unwrap();
        assert!(must.contains(&json!({ "terms": { "journal_id": [journal_id.to_string()] } })));
        assert!(must.contains(&json!({ "terms": { "tag": ["db"] } })));
        assert!(must.contains(&json!({ "terms": { "context_type": ["pagerduty"] } })));

        assert_eq!(bool_query["must_not"], json!([{ "terms": { "tag": ["test"] } }]));
        assert_eq!(es.body["from"], 50);
        assert_eq!(es.body["size"], 25);
        assert_eq!(es.body["track_total_hits"], true);
    }

    #[test]
    fn test_descending_created_at_sort_without_text() {
        let query = normalize::<&str>("", &[], false);
        let es = EsQueryBuilder::new("journals-main").build(
            Uuid::nil(),
            &query,
            &Pagination::default().with_order(ResultsOrder::Descending),
        );
        assert_eq!(
            es.body["sort"],
            json!([{ "created_at": { "order": "desc" } }, "_score"])
        );
    }
}

// ============================================================================
// Integration Tests (requires Docker for testcontainers)
// ============================================================================

/// Integration tests against a real Elasticsearch instance.
///
/// Run with:
///   cargo test -p helios-journal-search --features es-integration -- es_integration
#[cfg(feature = "es-integration")]
mod es_integration {
    use std::collections::BTreeSet;
    use std::sync::Arc;

    use chrono::{DateTime, TimeZone, Utc};
    use uuid::Uuid;

    use helios_journal_search::backends::elasticsearch::{
        ElasticsearchBackend, ElasticsearchConfig, IndexedSearch,
    };
    use helios_journal_search::backends::sqlite::SqliteBackend;
    use helios_journal_search::core::{Backend, SearchExecutor};
    use helios_journal_search::error::{IndexError, StorageError};
    use helios_journal_search::sync::{EntryEvent, IndexMirror, SyncScope, Synchronizer};
    use helios_journal_search::types::{Journal, JournalEntry, Pagination};
    use helios_journal_search::{SearchRequest, SearchService, normalize};

    use testcontainers::ImageExt;
    use testcontainers::runners::AsyncRunner;
    use testcontainers_modules::elastic_search::ElasticSearch;
    use tokio::sync::OnceCell;

    /// Shared Elasticsearch container reused across all tests in this module.
    struct SharedEs {
        host: String,
        port: u16,
        _container: testcontainers::ContainerAsync<ElasticSearch>,
    }

    static SHARED_ES: OnceCell<SharedEs> = OnceCell::const_new();

    async fn shared_es() -> &'static SharedEs {
        SHARED_ES
            .get_or_init(|| async {
                let container = ElasticSearch::default()
                    .with_env_var("ES_JAVA_OPTS", "-Xms256m -Xmx256m")
                    .with_startup_timeout(std::time::Duration::from_secs(120))
                    .start()
                    .await
                    .expect("Failed to start Elasticsearch container");

                let port = container
                    .get_host_port_ipv4(9200)
                    .await
                    .expect("Failed to get host port");

                let host = container
                    .get_host()
                    .await
                    .expect("Failed to get host")
                    .to_string();

                SharedEs {
                    host,
                    port,
                    _container: container,
                }
            })
            .await
    }

    async fn create_index_backend(bulk_chunk_size: usize) -> Arc<ElasticsearchBackend> {
        let es = shared_es().await;
        let config = ElasticsearchConfig {
            nodes: vec![format!("http://{}:{}", es.host, es.port)],
            number_of_replicas: 0,
            refresh_interval: "1ms".to_string(),
            bulk_chunk_size,
            ..Default::default()
        };
        let backend = ElasticsearchBackend::new(config).expect("Failed to create backend");
        backend.initialize().await.expect("Cluster is not healthy");
        Arc::new(backend)
    }

    fn unique_index() -> String {
        format!("journals-{}", Uuid::new_v4().simple())
    }

    fn create_store() -> Arc<SqliteBackend> {
        let store = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
        store.init_schema().expect("Failed to initialize schema");
        Arc::new(store)
    }

    fn at(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 2, day, 9, 0, 0).unwrap()
    }

    fn seed_entry(store: &SqliteBackend, journal: &Journal, title: &str, day: u32, tags: &[&str]) -> JournalEntry {
        let entry = JournalEntry::new(journal.id, title, format!("{} details", title))
            .with_tags(tags.iter().copied())
            .with_timestamps(at(day), at(day));
        store.put_entry(&entry).unwrap();
        entry
    }

    // ========================================================================
    // Index lifecycle
    // ========================================================================

    #[tokio::test]
    async fn es_integration_create_index_requires_force() {
        let backend = create_index_backend(1000).await;
        let index = unique_index();

        assert!(!backend.index_exists(&index).await.unwrap());
        backend.create_index(&index, false).await.unwrap();
        assert!(backend.index_exists(&index).await.unwrap());

        let err = backend.create_index(&index, false).await.unwrap_err();
        assert!(matches!(err, StorageError::Index(IndexError::AlreadyExists { .. })));

        backend.create_index(&index, true).await.unwrap();
        backend.drop_index(&index).await.unwrap();

        let err = backend.drop_index(&index).await.unwrap_err();
        assert!(matches!(err, StorageError::Index(IndexError::NotFound { .. })));
    }

    #[tokio::test]
    async fn es_integration_upsert_overwrites_whole_document() {
        let backend = create_index_backend(1000).await;
        let index = unique_index();
        backend.create_index(&index, false).await.unwrap();

        let journal_id = Uuid::new_v4();
        let entry = JournalEntry::new(journal_id, "first", "draft")
            .with_tags(["draft", "ops"])
            .with_context(Some("github"), None, None);
        backend.upsert_document(&index, &entry).await.unwrap();

        let mut revised = entry.clone().with_tags(["ops"]);
        revised.title = None;
        revised.context_type = None;
        backend.upsert_document(&index, &revised).await.unwrap();
        backend.refresh_index(&index).await.unwrap();

        assert_eq!(backend.docs_count(&index).await.unwrap(), 1);
        let page = IndexedSearch::new(&backend, &index)
            .execute(journal_id, &normalize::<&str>("", &[], true), &Pagination::default())
            .await
            .unwrap();
        assert_eq!(page.hits.len(), 1);
        assert_eq!(page.hits[0].tags, vec!["ops"]);
        assert!(page.hits[0].title.is_none());
        assert!(page.hits[0].context_type.is_none());

        assert!(backend.delete_document(&index, entry.id).await.unwrap());
        assert!(!backend.delete_document(&index, entry.id).await.unwrap());
    }

    #[tokio::test]
    async fn es_integration_bulk_upsert_chunks() {
        let backend = create_index_backend(3).await;
        let index = unique_index();
        backend.create_index(&index, false).await.unwrap();

        let journal_id = Uuid::new_v4();
        let entries: Vec<JournalEntry> = (0..10)
            .map(|i| JournalEntry::new(journal_id, format!("entry {}", i), "bulk"))
            .collect();

        let summary = backend.bulk_upsert(&index, &entries).await.unwrap();
        assert_eq!(summary.chunks, 4);
        assert_eq!(summary.succeeded, 10);
        assert_eq!(summary.failed, 0);
        backend.refresh_index(&index).await.unwrap();
        assert_eq!(backend.docs_count(&index).await.unwrap(), 10);

        let ids: Vec<Uuid> = entries.iter().take(4).map(|e| e.id).collect();
        let summary = backend.bulk_delete(&index, &ids).await.unwrap();
        assert_eq!(summary.chunks, 2);
        backend.refresh_index(&index).await.unwrap();
        assert_eq!(backend.docs_count(&index).await.unwrap(), 6);
    }

    // ========================================================================
    // Synchronization
    // ========================================================================

    #[tokio::test]
    async fn es_integration_synchronize_is_idempotent() {
        let store = create_store();
        let backend = create_index_backend(2).await;
        let index = unique_index();

        let indexed = Journal::new(Uuid::new_v4(), "indexed").with_search_index(index.clone());
        let deleted = Journal::new(Uuid::new_v4(), "deleted").with_search_index(index.clone());
        let private = Journal::new(Uuid::new_v4(), "private");
        for journal in [&indexed, &deleted, &private] {
            store.put_journal(journal).unwrap();
        }
        store.mark_journal_deleted(deleted.id).unwrap();
        for day in 1..=5 {
            seed_entry(&store, &indexed, &format!("day {}", day), day, &["ops"]);
            seed_entry(&store, &deleted, "gone", day, &[]);
            seed_entry(&store, &private, "secret", day, &[]);
        }

        let synchronizer = Synchronizer::new(store.clone(), backend.clone());
        let first = synchronizer.synchronize(&index, SyncScope::Any).await.unwrap();
        assert_eq!(first.journals_synced, vec![indexed.id]);
        assert_eq!(first.documents_indexed, 5);
        assert!(first.journals_failed.is_empty());
        assert_eq!(backend.docs_count(&index).await.unwrap(), 5);

        let second = synchronizer
            .synchronize(&index, SyncScope::Journal(indexed.id))
            .await
            .unwrap();
        assert_eq!(second.documents_indexed, 5);
        assert_eq!(backend.docs_count(&index).await.unwrap(), 5);

        synchronizer.erase(&index, SyncScope::Journal(indexed.id)).await.unwrap();
        backend.refresh_index(&index).await.unwrap();
        assert_eq!(backend.docs_count(&index).await.unwrap(), 0);

        synchronizer.erase(&index, SyncScope::Any).await.unwrap();
        assert!(!backend.index_exists(&index).await.unwrap());
        // Erasing a missing index is a no-op.
        synchronizer.erase(&index, SyncScope::Any).await.unwrap();
    }

    #[tokio::test]
    async fn es_integration_synchronize_continues_past_failed_journal() {
        let dir = tempfile::tempdir().expect("Failed to create temp dir");
        let path = dir.path().join("journals.db");
        let store = SqliteBackend::open(&path).expect("Failed to open database");
        store.init_schema().expect("Failed to initialize schema");
        let store = Arc::new(store);
        let backend = create_index_backend(1000).await;
        let index = unique_index();

        let broken = Journal::new(Uuid::new_v4(), "broken").with_search_index(index.clone());
        let healthy = Journal::new(Uuid::new_v4(), "healthy").with_search_index(index.clone());
        store.put_journal(&broken).unwrap();
        store.put_journal(&healthy).unwrap();
        let unreadable = seed_entry(&store, &broken, "unreadable", 1, &[]);
        for day in 1..=3 {
            seed_entry(&store, &healthy, &format!("day {}", day), day, &["ops"]);
        }

        let raw = rusqlite::Connection::open(&path).unwrap();
        raw.execute(
            "UPDATE journal_entries SET created_at = 'not a time' WHERE id = ?1",
            [unreadable.id.to_string()],
        )
        .unwrap();

        let synchronizer = Synchronizer::new(store.clone(), backend.clone());
        let report = synchronizer.synchronize(&index, SyncScope::Any).await.unwrap();
        assert_eq!(report.journals_synced, vec![healthy.id]);
        assert_eq!(report.journals_failed, vec![broken.id]);
        assert_eq!(report.documents_indexed, 3);
        assert_eq!(backend.docs_count(&index).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn es_integration_set_search_index_moves_documents() {
        let store = create_store();
        let backend = create_index_backend(1000).await;
        let old_index = unique_index();
        let new_index = unique_index();

        let journal = Journal::new(Uuid::new_v4(), "moving").with_search_index(old_index.clone());
        store.put_journal(&journal).unwrap();
        seed_entry(&store, &journal, "entry", 1, &[]);

        let synchronizer = Synchronizer::new(store.clone(), backend.clone());
        synchronizer.synchronize(&old_index, SyncScope::Any).await.unwrap();
        assert_eq!(backend.docs_count(&old_index).await.unwrap(), 1);

        let report = synchronizer
            .set_search_index(journal.id, Some(&new_index))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(report.documents_indexed, 1);
        backend.refresh_index(&old_index).await.unwrap();
        assert_eq!(backend.docs_count(&old_index).await.unwrap(), 0);
        assert_eq!(backend.docs_count(&new_index).await.unwrap(), 1);

        let report = synchronizer.set_search_index(journal.id, None).await.unwrap();
        assert!(report.is_none());
        backend.refresh_index(&new_index).await.unwrap();
        assert_eq!(backend.docs_count(&new_index).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn es_integration_mirror_applies_events() {
        let backend = create_index_backend(1000).await;
        let index = unique_index();
        backend.create_index(&index, false).await.unwrap();
        let mirror = IndexMirror::new(backend.clone());

        let journal_id = Uuid::new_v4();
        let entries: Vec<JournalEntry> = (0..3)
            .map(|i| JournalEntry::new(journal_id, format!("e{}", i), ""))
            .collect();

        let applied = mirror
            .dispatch(EntryEvent::BulkUpserted {
                index: index.clone(),
                entries: entries.clone(),
            })
            .await
            .unwrap();
        assert!(applied);
        assert!(
            mirror
                .apply(EntryEvent::Deleted {
                    index: index.clone(),
                    entry_id: entries[0].id,
                })
                .await
        );
        backend.refresh_index(&index).await.unwrap();
        assert_eq!(backend.docs_count(&index).await.unwrap(), 2);

        assert!(
            mirror
                .apply(EntryEvent::JournalPurged {
                    index: index.clone(),
                    journal_id,
                })
                .await
        );
        backend.refresh_index(&index).await.unwrap();
        assert_eq!(backend.docs_count(&index).await.unwrap(), 0);
    }

    // ========================================================================
    // Backend parity
    // ========================================================================

    #[tokio::test]
    async fn es_integration_backends_agree_on_filters() {
        let store = create_store();
        let backend = create_index_backend(1000).await;
        let index = unique_index();

        let journal = Journal::new(Uuid::new_v4(), "parity").with_search_index(index.clone());
        store.put_journal(&journal).unwrap();
        seed_entry(&store, &journal, "x z", 1, &["x", "z"]);
        seed_entry(&store, &journal, "x", 2, &["x"]);
        seed_entry(&store, &journal, "x y z", 3, &["x", "y", "z"]);
        seed_entry(&store, &journal, "z", 4, &["z"]);
        seed_entry(&store, &journal, "x w", 5, &["x", "w"]);
        seed_entry(&store, &journal, "none", 6, &[]);

        Synchronizer::new(store.clone(), backend.clone())
            .synchronize(&index, SyncScope::Any)
            .await
            .unwrap();

        let filter_sets: [&[&str]; 5] = [
            &["tag:x", "!tag:y", "?tag:z"],
            &["tag:x", "!tag:y", "?tag:z", "?tag:w"],
            &["!tag:x"],
            &["created_at:>=2024-02-02", "created_at:<2024-02-05"],
            &["created_at:>2024-02-02T09:00:00Z", "created_at:>=2024-02-02T09:00:00Z"],
        ];

        for filters in filter_sets {
            let query = normalize("", filters, true);
            let pagination = Pagination::new(100, 0);

            let relational: BTreeSet<Uuid> = store
                .execute(journal.id, &query, &pagination)
                .await
                .unwrap()
                .ids()
                .into_iter()
                .collect();
            let page = IndexedSearch::new(&backend, &index)
                .execute(journal.id, &query, &pagination)
                .await
                .unwrap();
            let indexed: BTreeSet<Uuid> = page.ids().into_iter().collect();

            assert_eq!(relational, indexed, "filters {:?}", filters);
            assert_eq!(page.total as usize, indexed.len());
        }
    }

    #[tokio::test]
    async fn es_integration_service_routes_to_index() {
        let store = create_store();
        let backend = create_index_backend(1000).await;
        let index = unique_index();

        let journal = Journal::new(Uuid::new_v4(), "routed").with_search_index(index.clone());
        store.put_journal(&journal).unwrap();
        seed_entry(&store, &journal, "database failover", 1, &["db"]);
        seed_entry(&store, &journal, "cache warmup", 2, &["cache"]);

        Synchronizer::new(store.clone(), backend.clone())
            .synchronize(&index, SyncScope::Any)
            .await
            .unwrap();

        let service = SearchService::new(store.clone()).with_index_backend(backend.clone());
        let request = service
            .request_for(journal.id)
            .unwrap()
            .with_query("failover")
            .with_content(true);
        let response = service.search(&request).await.unwrap();

        // Free text ranks but does not filter.
        assert_eq!(response.total_results, 2);
        assert_eq!(response.results[0].title, "database failover");
        assert!(response.max_score > 0.0);
        assert_eq!(
            response.results[0].content.as_deref(),
            Some("database failover details")
        );

        let response = service
            .search(&request.clone().with_query("#cache"))
            .await
            .unwrap();
        assert_eq!(response.total_results, 1);
        assert_eq!(response.results[0].tags, vec!["cache"]);
    }
}
