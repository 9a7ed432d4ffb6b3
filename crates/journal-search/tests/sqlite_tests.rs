//! SQLite backend integration tests.
//!
//! Exercise the relational search path end to end: storage, filter
//! normalization, SQL compilation, pagination and tag aggregation.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use uuid::Uuid;

use helios_journal_search::backends::sqlite::SqliteBackend;
use helios_journal_search::core::{Backend, SearchExecutor};
use helios_journal_search::query::Predicate;
use helios_journal_search::types::{Journal, JournalEntry, Pagination, ResultsOrder};
use helios_journal_search::{SearchRequest, SearchService, normalize};

fn create_backend() -> SqliteBackend {
    let backend = SqliteBackend::in_memory().expect("Failed to create SQLite backend");
    backend.init_schema().expect("Failed to initialize schema");
    backend
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2023, 3, d, 12, 0, 0).unwrap()
}

fn create_journal(backend: &SqliteBackend) -> Journal {
    let journal = Journal::new(Uuid::new_v4(), "operations");
    backend.put_journal(&journal).unwrap();
    journal
}

fn add_entry(backend: &SqliteBackend, journal: &Journal, title: &str, d: u32, tags: &[&str]) -> JournalEntry {
    let entry = JournalEntry::new(journal.id, title, format!("{} body", title))
        .with_tags(tags.iter().copied())
        .with_timestamps(day(d), day(d));
    backend.put_entry(&entry).unwrap();
    entry
}

async fn search_ids(backend: &SqliteBackend, journal: &Journal, filters: &[&str]) -> BTreeSet<Uuid> {
    let query = normalize("", filters, true);
    let page = backend
        .execute(journal.id, &query, &Pagination::new(100, 0))
        .await
        .unwrap();
    page.ids().into_iter().collect()
}

// ============================================================================
// Tag semantics
// ============================================================================

#[tokio::test]
async fn test_required_forbidden_optional_tags() {
    let backend = create_backend();
    let journal = create_journal(&backend);

    let x_z = add_entry(&backend, &journal, "x z", 1, &["x", "z"]);
    let _x_only = add_entry(&backend, &journal, "x only", 2, &["x"]);
    let _x_y_z = add_entry(&backend, &journal, "x y z", 3, &["x", "y", "z"]);
    let _z_only = add_entry(&backend, &journal, "z only", 4, &["z"]);

    let ids = search_ids(&backend, &journal, &["tag:x", "!tag:y", "?tag:z"]).await;
    assert_eq!(ids, BTreeSet::from([x_z.id]));
}

#[tokio::test]
async fn test_every_required_tag_must_be_present() {
    let backend = create_backend();
    let journal = create_journal(&backend);

    let both = add_entry(&backend, &journal, "both", 1, &["a", "b"]);
    add_entry(&backend, &journal, "a", 2, &["a"]);
    add_entry(&backend, &journal, "b", 3, &["b"]);

    let ids = search_ids(&backend, &journal, &["tag:a", "#b"]).await;
    assert_eq!(ids, BTreeSet::from([both.id]));
}

#[tokio::test]
async fn test_any_forbidden_tag_excludes() {
    let backend = create_backend();
    let journal = create_journal(&backend);

    let clean = add_entry(&backend, &journal, "clean", 1, &["ok"]);
    add_entry(&backend, &journal, "noisy", 2, &["noise"]);
    add_entry(&backend, &journal, "spam", 3, &["spam", "ok"]);
    let untagged = add_entry(&backend, &journal, "untagged", 4, &[]);

    let ids = search_ids(&backend, &journal, &["!tag:noise", "!#spam"]).await;
    assert_eq!(ids, BTreeSet::from([clean.id, untagged.id]));
}

#[tokio::test]
async fn test_matches_in_memory_evaluation() {
    let backend = create_backend();
    let journal = create_journal(&backend);
    let entries = vec![
        add_entry(&backend, &journal, "a", 1, &["a"]),
        add_entry(&backend, &journal, "ab", 2, &["a", "b"]),
        add_entry(&backend, &journal, "bc", 3, &["b", "c"]),
        add_entry(&backend, &journal, "none", 4, &[]),
    ];

    let filters = ["?tag:a", "?tag:c", "!tag:b", "created_at:>=2023-03-01"];
    let query = normalize("", &filters, true);
    let predicate = Predicate::from_query(journal.id, &query);
    let expected: BTreeSet<Uuid> = entries
        .iter()
        .filter(|entry| predicate.matches(entry))
        .map(|entry| entry.id)
        .collect();

    assert_eq!(search_ids(&backend, &journal, &filters).await, expected);
    assert_eq!(expected.len(), 1);
}

// ============================================================================
// Time bounds and context
// ============================================================================

#[tokio::test]
async fn test_time_bounds_are_conjunctive() {
    let backend = create_backend();
    let journal = create_journal(&backend);
    for d in 1..=6 {
        add_entry(&backend, &journal, &format!("day {}", d), d, &[]);
    }

    let ids = search_ids(
        &backend,
        &journal,
        &[
            "created_at:>=2023-03-02",
            "created_at:>2023-03-03T00:00:00Z",
            "created_at:<2023-03-06",
            "created_at:<=2023-03-05T12:00:00Z",
        ],
    )
    .await;
    // Noon on days 3, 4 and 5 satisfies every bound.
    assert_eq!(ids.len(), 3);
}

#[tokio::test]
async fn test_epoch_bound_and_unparseable_bound() {
    let backend = create_backend();
    let journal = create_journal(&backend);
    let late = add_entry(&backend, &journal, "late", 10, &[]);
    add_entry(&backend, &journal, "early", 1, &[]);

    let threshold = day(5).timestamp().to_string();
    let gt = format!("created_at:>{}", threshold);
    let ids = search_ids(&backend, &journal, &[gt.as_str(), "updated_at:<yesterday"]).await;
    assert_eq!(ids, BTreeSet::from([late.id]));
}

#[tokio::test]
async fn test_far_future_epoch_bound_agrees_with_predicate() {
    let backend = create_backend();
    let journal = create_journal(&backend);
    let entry = JournalEntry::new(journal.id, "2022", "")
        .with_timestamps(
            Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2022, 5, 1, 0, 0, 0).unwrap(),
        );
    backend.put_entry(&entry).unwrap();

    let filters = ["created_at:<300000000000", "created_at:<9999-12-31T23:59:59Z"];
    let query = normalize("", &filters, true);
    assert_eq!(query.created_at_bounds.len(), 1);
    assert!(Predicate::from_query(journal.id, &query).matches(&entry));

    let ids = search_ids(&backend, &journal, &filters).await;
    assert_eq!(ids, BTreeSet::from([entry.id]));
}

#[tokio::test]
async fn test_context_filters() {
    let backend = create_backend();
    let journal = create_journal(&backend);

    let github = JournalEntry::new(journal.id, "pr merged", "")
        .with_context(Some("github"), Some("42"), Some("https://github.com/o/r/pull/42"));
    let pager = JournalEntry::new(journal.id, "paged", "").with_context(Some("pagerduty"), Some("42"), None);
    backend.put_entry(&github).unwrap();
    backend.put_entry(&pager).unwrap();

    let ids = search_ids(&backend, &journal, &["context_type:github", "context_id:42"]).await;
    assert_eq!(ids, BTreeSet::from([github.id]));

    let ids = search_ids(&backend, &journal, &["context_id:42"]).await;
    assert_eq!(ids.len(), 2);

    let ids = search_ids(&backend, &journal, &["context_url:https://github.com/o/r/pull/42"]).await;
    assert_eq!(ids, BTreeSet::from([github.id]));
}

#[tokio::test]
async fn test_search_is_scoped_to_journal() {
    let backend = create_backend();
    let mine = create_journal(&backend);
    let other = create_journal(&backend);
    let entry = add_entry(&backend, &mine, "mine", 1, &["x"]);
    add_entry(&backend, &other, "theirs", 1, &["x"]);

    let ids = search_ids(&backend, &mine, &["tag:x"]).await;
    assert_eq!(ids, BTreeSet::from([entry.id]));
}

// ============================================================================
// Ordering, pagination and tag aggregation
// ============================================================================

#[tokio::test]
async fn test_order_and_pages() {
    let backend = create_backend();
    let journal = create_journal(&backend);
    for d in 1..=5 {
        add_entry(&backend, &journal, &format!("day {}", d), d, &["t"]);
    }
    let query = normalize::<&str>("", &[], true);

    let first = backend
        .execute(journal.id, &query, &Pagination::new(2, 0).with_order(ResultsOrder::Ascending))
        .await
        .unwrap();
    assert_eq!(first.total, 5);
    let titles: Vec<_> = first.hits.iter().filter_map(|h| h.title.clone()).collect();
    assert_eq!(titles, vec!["day 1", "day 2"]);

    let last = backend
        .execute(journal.id, &query, &Pagination::new(2, 4).with_order(ResultsOrder::Ascending))
        .await
        .unwrap();
    assert_eq!(last.total, 5);
    assert_eq!(last.hits.len(), 1);
    assert_eq!(last.hits[0].title.as_deref(), Some("day 5"));

    let newest = backend
        .execute(journal.id, &query, &Pagination::new(1, 0))
        .await
        .unwrap();
    assert_eq!(newest.hits[0].title.as_deref(), Some("day 5"));
}

#[tokio::test]
async fn test_page_hits_carry_full_tag_sets() {
    let backend = create_backend();
    let journal = create_journal(&backend);
    add_entry(&backend, &journal, "many", 1, &["c", "a", "b"]);

    // Filtering on one tag still returns every tag of the entry.
    let query = normalize("", &["tag:a"], true);
    let page = backend
        .execute(journal.id, &query, &Pagination::default())
        .await
        .unwrap();
    assert_eq!(page.hits[0].tags, vec!["a", "b", "c"]);
    assert_eq!(page.hits[0].score, Some(1.0));
}

// ============================================================================
// Façade over the relational path
// ============================================================================

#[tokio::test]
async fn test_service_extracts_inline_filters() {
    let backend = Arc::new(create_backend());
    let journal = create_journal(&backend);
    let tagged = add_entry(&backend, &journal, "tagged", 1, &["deploy"]);
    add_entry(&backend, &journal, "other", 2, &[]);

    let service = SearchService::new(backend.clone());
    let request = SearchRequest::for_journal(&journal).with_query("rollback #deploy");
    let response = service.search(&request).await.unwrap();
    assert_eq!(response.total_results, 1);
    assert_eq!(response.results[0].id, tagged.id);

    // Strict mode keeps the query verbatim, so "#deploy" is only text.
    let strict = request.with_strict(true);
    let response = service.search(&strict).await.unwrap();
    assert_eq!(response.total_results, 2);
}

// ============================================================================
// File-backed database
// ============================================================================

#[tokio::test]
async fn test_file_backed_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("journals.db");

    let journal = {
        let backend = SqliteBackend::open(&path).unwrap();
        backend.initialize().await.unwrap();
        let journal = create_journal(&backend);
        add_entry(&backend, &journal, "persisted", 1, &["kept"]);
        journal
    };

    let reopened = SqliteBackend::open(&path).unwrap();
    reopened.init_schema().unwrap();
    assert!(reopened.health_check().await.is_ok());
    let ids = search_ids(&reopened, &journal, &["tag:kept"]).await;
    assert_eq!(ids.len(), 1);
}
