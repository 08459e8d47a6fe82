//! Tests for the nightly, weekly, and monthly maintenance pipelines
//! (SPEC_FULL §4.8), using directly-constructed `Item`/`Resource` rows with
//! manually aged `created_at` timestamps to simulate the passage of time
//! without a real clock dependency.

use chrono::{Duration, Utc};
use mnemograph::embedding::{Embedder, LocalEmbedder};
use mnemograph::jobs::{run_monthly, run_nightly, run_weekly};
use mnemograph::llm::{ExtractedFact, LlmProvider};
use mnemograph::models::{GraphEdge, Item, ItemStatus, Resource};
use mnemograph::storage::sqlite::SqliteUnitOfWorkFactory;
use mnemograph::storage::{UnitOfWork, UnitOfWorkFactory};
use mnemograph::Result;

struct FakeLlm;

impl LlmProvider for FakeLlm {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn extract_facts(&self, _text: &str) -> Result<Vec<ExtractedFact>> {
        Ok(Vec::new())
    }

    fn classify(&self, _subject: &str, _predicate: &str, _object: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn check_conflict(
        &self,
        _subject1: &str,
        _predicate1: &str,
        _object1: &str,
        _subject2: &str,
        _predicate2: &str,
        _object2: &str,
    ) -> Result<bool> {
        Ok(false)
    }

    fn summarize_category(&self, category: &str, facts: &[String]) -> Result<String> {
        Ok(format!("{category}: {} facts.", facts.len()))
    }
}

fn aged_item(subject: &str, predicate: &str, object: &str, category: &str, confidence: f32, age_days: i64) -> Item {
    let mut item = Item::new(Some(subject.to_string()), Some(predicate.to_string()), Some(object.to_string()));
    item.category = Some(category.to_string());
    item.confidence = confidence;
    item.created_at = Utc::now() - Duration::days(age_days);
    item
}

fn factory() -> SqliteUnitOfWorkFactory {
    SqliteUnitOfWorkFactory::open(":memory:").expect("open in-memory db")
}

#[test]
fn nightly_archives_exact_duplicates_and_keeps_one_active() {
    let factory = factory();
    let mut uow = factory.begin().expect("begin");

    let older = aged_item("Dana", "works_at", "Acme", "facts", 0.7, 3);
    let newer = aged_item("Dana", "works_at", "Acme", "facts", 0.7, 1);
    uow.create_item(older.clone()).expect("create older");
    uow.create_item(newer.clone()).expect("create newer");

    let llm = FakeLlm;
    let stats = run_nightly(uow.as_mut(), &llm).expect("run nightly");
    assert_eq!(stats.duplicates_archived, 1);

    let older_row = uow.get_item(older.id).expect("get older").expect("exists");
    let newer_row = uow.get_item(newer.id).expect("get newer").expect("exists");
    assert_eq!(older_row.status, ItemStatus::Archived);
    assert_eq!(newer_row.status, ItemStatus::Active);
    assert_eq!(newer_row.supersedes, Some(older.id));
}

#[test]
fn nightly_refreshes_summaries_for_nonempty_categories() {
    let factory = factory();
    let mut uow = factory.begin().expect("begin");

    uow.create_item(aged_item("Eve", "prefers", "tea", "preferences", 0.8, 1)).expect("create item");

    let llm = FakeLlm;
    let stats = run_nightly(uow.as_mut(), &llm).expect("run nightly");
    assert_eq!(stats.categories_summarized, 1);

    let category = uow.get_category_by_name("preferences").expect("get category").expect("category exists");
    assert!(category.summary.as_deref().is_some_and(|s| s.contains("preferences")));
}

#[test]
fn weekly_decays_old_item_confidence_downward() {
    let factory = factory();
    let mut uow = factory.begin().expect("begin");

    let old_item = aged_item("Frank", "likes", "hiking", "preferences", 0.9, 60);
    uow.create_item(old_item.clone()).expect("create item");

    let stats = run_weekly(uow.as_mut()).expect("run weekly");
    assert_eq!(stats.items_decayed, 1);

    let row = uow.get_item(old_item.id).expect("get item").expect("exists");
    assert!(row.confidence < 0.9);
}

#[test]
fn weekly_archives_stale_low_confidence_items() {
    let factory = factory();
    let mut uow = factory.begin().expect("begin");

    let stale = aged_item("Grace", "visited", "Japan", "events", 0.15, 200);
    uow.create_item(stale.clone()).expect("create item");

    let stats = run_weekly(uow.as_mut()).expect("run weekly");
    assert_eq!(stats.items_archived_stale, 1);

    let row = uow.get_item(stale.id).expect("get item").expect("exists");
    assert_eq!(row.status, ItemStatus::Archived);
}

#[test]
fn weekly_compresses_overlapping_near_duplicate_objects() {
    let factory = factory();
    let mut uow = factory.begin().expect("begin");

    let weak = aged_item("Heidi", "enjoys", "dark mode", "preferences", 0.4, 2);
    let strong = aged_item("Heidi", "enjoys", "Dark Mode UI", "preferences", 0.8, 1);
    uow.create_item(weak.clone()).expect("create weak");
    uow.create_item(strong.clone()).expect("create strong");

    let stats = run_weekly(uow.as_mut()).expect("run weekly");
    assert_eq!(stats.items_compressed, 1);

    let weak_row = uow.get_item(weak.id).expect("get weak").expect("exists");
    assert_eq!(weak_row.status, ItemStatus::Archived);
}

#[test]
fn weekly_deletes_orphaned_resources_with_no_items() {
    let factory = factory();
    let mut uow = factory.begin().expect("begin");

    let mut resource = Resource::new("cli", "some content nobody extracted");
    resource.created_at = Utc::now() - Duration::days(200);
    uow.create_resource(resource).expect("create resource");

    let stats = run_weekly(uow.as_mut()).expect("run weekly");
    assert_eq!(stats.orphans_deleted, 1);
    assert_eq!(uow.count_resources().expect("count resources"), 0);
}

#[test]
fn monthly_recomputes_embeddings_and_rebuilds_graph() {
    let factory = factory();
    let mut uow = factory.begin().expect("begin");

    let item = aged_item("Ivan", "works_at", "Initech", "facts", 0.7, 1);
    uow.create_item(item).expect("create item");
    uow.create_edge(GraphEdge::new("stale_subject", "stale_predicate", "stale_object", 0.3)).expect("create stale edge");

    let embedder = LocalEmbedder::new(16);
    let stats = run_monthly(uow.as_mut(), &embedder, embedder.dimensions()).expect("run monthly");

    assert_eq!(stats.embeddings_recomputed, 1);
    assert_eq!(stats.active_items, 1);
    assert_eq!(stats.embedding_count, 1);

    let edges = uow.list_all_edges().expect("list edges");
    assert!(edges.iter().any(|e| e.subject == "ivan" && e.object == "initech"));
    assert!(!edges.iter().any(|e| e.subject == "stale_subject"));
}
