//! End-to-end pipeline tests: ingest/extract/conflict resolution and the
//! data-model invariants from SPEC_FULL §8 (at most one active item per
//! triple; meta-facts excluded from listings).

use std::collections::BTreeMap;

use mnemograph::config::{
    ConflictStrategy, EmbeddingProviderKind, EmbeddingSettings, HttpSettings, LlmSettings,
    PipelineLimits, Settings, StorageBackendKind, StorageSettings,
};
use mnemograph::embedding::{Embedder, LocalEmbedder};
use mnemograph::llm::{ExtractedFact, LlmProvider};
use mnemograph::models::{Item, ItemStatus};
use mnemograph::pipeline::create_item_direct;
use mnemograph::storage::sqlite::SqliteUnitOfWorkFactory;
use mnemograph::storage::UnitOfWorkFactory;
use mnemograph::Result;

/// A deterministic stand-in for an LLM that never calls out over the
/// network: classification always falls through to the rule-based table
/// (via `use_llm = false` in [`test_settings`]), extraction returns a
/// fixed fact, and conflict checks agree whenever the objects differ.
struct FakeLlm;

impl LlmProvider for FakeLlm {
    fn name(&self) -> &'static str {
        "fake"
    }

    fn extract_facts(&self, _text: &str) -> Result<Vec<ExtractedFact>> {
        Ok(vec![ExtractedFact {
            subject: "the user".to_string(),
            predicate: "prefers".to_string(),
            object: "dark mode".to_string(),
            category: None,
            confidence: 0.9,
        }])
    }

    fn classify(&self, _subject: &str, _predicate: &str, _object: &str) -> Result<Option<String>> {
        Ok(None)
    }

    fn check_conflict(
        &self,
        _subject1: &str,
        _predicate1: &str,
        object1: &str,
        _subject2: &str,
        _predicate2: &str,
        object2: &str,
    ) -> Result<bool> {
        Ok(object1 != object2)
    }

    fn summarize_category(&self, category: &str, _facts: &[String]) -> Result<String> {
        Ok(format!("Summary of {category}."))
    }
}

fn test_settings() -> Settings {
    Settings {
        storage: StorageSettings {
            backend: StorageBackendKind::Relational,
            connection_string: ":memory:".to_string(),
            data_dir: std::env::temp_dir(),
        },
        embedding: EmbeddingSettings {
            provider: EmbeddingProviderKind::Local,
            model: "local-hash".to_string(),
            native_dimensions: 32,
            storage_dimensions: 32,
            endpoint: String::new(),
            api_key: None,
            timeout_secs: 30,
        },
        llm: LlmSettings {
            endpoint: String::new(),
            model: String::new(),
            api_key: None,
            timeout_secs: 60,
            use_llm: false,
        },
        conflict_strategy: ConflictStrategy::Recency,
        debug: false,
        log_level: "info".to_string(),
        log_json: false,
        http: HttpSettings { bind_address: "127.0.0.1".to_string(), port: 0 },
        limits: PipelineLimits { max_items_per_run: 10_000, category_access_retention_days: 180 },
        sources: BTreeMap::new(),
    }
}

fn fact_item(subject: &str, predicate: &str, object: &str, confidence: f32) -> Item {
    let mut item = Item::new(Some(subject.to_string()), Some(predicate.to_string()), Some(object.to_string()));
    item.category = Some("facts".to_string());
    item.confidence = confidence;
    item
}

#[test]
fn conflicting_items_leave_exactly_one_active_with_supersession_set() {
    let settings = test_settings();
    let llm = FakeLlm;
    let embedder = LocalEmbedder::new(settings.embedding.native_dimensions);
    let factory = SqliteUnitOfWorkFactory::open(&settings.storage.connection_string).expect("open in-memory db");

    let mut uow = factory.begin().expect("begin");

    let first = create_item_direct(uow.as_mut(), &llm, &embedder, &settings, fact_item("Alice", "works_at", "Acme", 0.6))
        .expect("create first item");

    let second = create_item_direct(uow.as_mut(), &llm, &embedder, &settings, fact_item("Alice", "works_at", "Globex", 0.8))
        .expect("create second item");

    assert_eq!(second.supersedes, Some(first.id));

    let archived = uow.get_item(first.id).expect("get first").expect("first exists");
    assert_eq!(archived.status, ItemStatus::Archived);

    let active_for_subject = uow.list_items_by_subject("alice").expect("list by subject");
    assert_eq!(active_for_subject.len(), 1);
    assert_eq!(active_for_subject[0].id, second.id);
}

#[test]
fn meta_facts_are_excluded_from_listings_and_categories() {
    let settings = test_settings();
    let llm = FakeLlm;
    let embedder = LocalEmbedder::new(settings.embedding.native_dimensions);
    let factory = SqliteUnitOfWorkFactory::open(&settings.storage.connection_string).expect("open in-memory db");

    let mut uow = factory.begin().expect("begin");

    let item = create_item_direct(uow.as_mut(), &llm, &embedder, &settings, fact_item("Bob", "likes", "coffee", 0.9))
        .expect("create item");
    uow.create_meta_fact(item.id, "has_source", "fake", 0.9).expect("create meta fact");

    let items = uow.list_items(None, usize::MAX).expect("list items");
    assert!(items.iter().all(|i| !i.is_meta()));

    let categories = uow.list_distinct_categories(ItemStatus::Active).expect("list categories");
    assert!(!categories.contains(&"meta".to_string()));

    let meta_facts = uow.get_meta_facts(item.id).expect("get meta facts");
    assert_eq!(meta_facts.len(), 1);
    assert_eq!(meta_facts[0].predicate.as_deref(), Some("has_source"));
}

#[test]
fn confidence_strategy_keeps_higher_confidence_item_active() {
    let mut settings = test_settings();
    settings.conflict_strategy = ConflictStrategy::Confidence;
    let llm = FakeLlm;
    let embedder = LocalEmbedder::new(settings.embedding.native_dimensions);
    let factory = SqliteUnitOfWorkFactory::open(&settings.storage.connection_string).expect("open in-memory db");

    let mut uow = factory.begin().expect("begin");

    let strong = create_item_direct(uow.as_mut(), &llm, &embedder, &settings, fact_item("Carol", "role", "engineer", 0.95))
        .expect("create strong item");
    let weak = create_item_direct(uow.as_mut(), &llm, &embedder, &settings, fact_item("Carol", "role", "manager", 0.2))
        .expect("create weak item");

    // The weaker, newer fact loses: the strong item remains active and
    // absorbs the supersedes pointer.
    assert_eq!(weak.status, ItemStatus::Archived);
    let winner = uow.get_item(strong.id).expect("get strong").expect("exists");
    assert_eq!(winner.status, ItemStatus::Active);
    assert_eq!(winner.supersedes, Some(weak.id));
}
