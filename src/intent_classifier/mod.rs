//! Intent classifier and smart-search router (§4.5): rule-based,
//! zero-cost query classification, plus the dispatch logic that turns a
//! classified intent into a result set.

use crate::config::Settings;
use crate::embedding::Embedder;
use crate::entity::resolve;
use crate::models::{Intent, Item, ItemStatus};
use crate::storage::UnitOfWork;
use crate::{Error, Result};
use chrono::{DateTime, Duration, Utc};
use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

/// A single search-result row, as surfaced by [`smart_search`].
#[derive(Debug, Clone, serde::Serialize)]
pub struct SearchResultItem {
    /// The matched item's id.
    pub id: uuid::Uuid,
    /// Raw subject string.
    pub subject: Option<String>,
    /// Predicate string.
    pub predicate: Option<String>,
    /// Raw object string.
    pub object: Option<String>,
    /// Category tag.
    pub category: Option<String>,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Similarity score in [0, 1], nominal for non-semantic intents.
    pub similarity: f32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Lifecycle status.
    pub status: ItemStatus,
}

impl SearchResultItem {
    fn from_item(item: &Item, similarity: f32) -> Self {
        Self {
            id: item.id,
            subject: item.subject.clone(),
            predicate: item.predicate.clone(),
            object: item.object.clone(),
            category: item.category.clone(),
            confidence: item.confidence,
            similarity,
            created_at: item.created_at,
            status: item.status,
        }
    }
}

/// The outcome of [`smart_search`].
#[derive(Debug, Clone)]
pub struct SmartSearchResult {
    /// Machine-readable intent tag, e.g. `EntityLookup` or
    /// `SemanticSearch(fallback)`.
    pub intent: String,
    /// Matched items, already sorted and capped at `limit`.
    pub items: Vec<SearchResultItem>,
    /// `items.len()`.
    pub total: usize,
}

static ENTITY_ABOUT_EN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^(?:what do you know )?about\s+(.+)$").expect("valid regex"));
static ENTITY_ABOUT_ZH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^關於\s*(.+)$").expect("valid regex"));
static ENTITY_SUFFIX_ZH: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+?)(?:是誰|是什麼|的資料)$").expect("valid regex"));

static TEMPORAL_LAST_N_DAYS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\blast\s+(\d+)\s+days?\b").expect("valid regex"));

const TEMPORAL_WEEK_PATTERNS: &[&str] = &["last week", "past week", "這週", "本週"];
const TEMPORAL_MONTH_PATTERNS: &[&str] = &["last month", "past month", "這個月", "本月"];
const TEMPORAL_TODAY_PATTERNS: &[&str] = &["today", "今天"];
const TEMPORAL_YESTERDAY_PATTERNS: &[&str] = &["yesterday", "昨天"];
const TEMPORAL_RECENT_PATTERNS: &[&str] = &["recent", "recently", "最近"];

/// Per-category aspect-filter keyword table (~8 keywords per category,
/// matched case-insensitively against the whole query).
const ASPECT_KEYWORDS: &[(&str, &[&str])] = &[
    (
        "preferences",
        &["preference", "prefer", "like", "favorite", "favourite", "dislike", "喜歡", "偏好"],
    ),
    ("facts", &["fact", "detail", "information", "about", "regarding", "事實", "資訊", "細節"]),
    (
        "events",
        &["event", "schedule", "meeting", "appointment", "calendar", "deadline", "活動", "行程"],
    ),
    (
        "relationships",
        &["friend", "colleague", "family", "relationship", "contact", "acquaintance", "朋友", "同事"],
    ),
    (
        "skills",
        &["skill", "expert", "expertise", "proficient", "learn", "experience", "技能", "專長"],
    ),
    ("goals", &["goal", "plan", "objective", "aim", "ambition", "intend", "目標", "計畫"]),
];

const DAYS_PER_WEEK: u32 = 7;
const DAYS_PER_MONTH: u32 = 30;

/// Classifies a query string into one of the four retrieval intents.
///
/// Classification order is fixed and non-negotiable: entity lookup, then
/// temporal, then aspect filter, then semantic search as the default.
#[must_use]
pub fn classify_intent(query: &str) -> Intent {
    let trimmed = query.trim();

    if let Some(entity) = detect_entity_lookup(trimmed) {
        return Intent::EntityLookup { entity };
    }

    if let Some(days) = detect_temporal(trimmed) {
        return Intent::Temporal { days };
    }

    if let Some(category) = detect_aspect_filter(trimmed) {
        return Intent::AspectFilter { category };
    }

    Intent::SemanticSearch
}

fn detect_entity_lookup(query: &str) -> Option<String> {
    if let Some(captures) = ENTITY_ABOUT_EN.captures(query) {
        return Some(captures.get(1)?.as_str().trim().to_string());
    }
    if let Some(captures) = ENTITY_ABOUT_ZH.captures(query) {
        return Some(captures.get(1)?.as_str().trim().to_string());
    }
    if let Some(captures) = ENTITY_SUFFIX_ZH.captures(query) {
        return Some(captures.get(1)?.as_str().trim().to_string());
    }
    None
}

fn detect_temporal(query: &str) -> Option<u32> {
    let lowered = query.to_lowercase();

    if let Some(captures) = TEMPORAL_LAST_N_DAYS.captures(&lowered) {
        if let Some(n) = captures.get(1).and_then(|m| m.as_str().parse::<u32>().ok()) {
            return Some(n);
        }
    }

    if TEMPORAL_WEEK_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Some(DAYS_PER_WEEK);
    }
    if TEMPORAL_MONTH_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Some(DAYS_PER_MONTH);
    }
    if TEMPORAL_YESTERDAY_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Some(2);
    }
    if TEMPORAL_TODAY_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Some(1);
    }
    if TEMPORAL_RECENT_PATTERNS.iter().any(|p| lowered.contains(p)) {
        return Some(DAYS_PER_WEEK);
    }

    None
}

fn detect_aspect_filter(query: &str) -> Option<String> {
    let lowered = query.to_lowercase();
    ASPECT_KEYWORDS
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lowered.contains(k)))
        .map(|(category, _)| (*category).to_string())
}

/// Dispatches a classified-or-to-be-classified query to the appropriate
/// retrieval strategy.
///
/// # Errors
///
/// Returns an error only if a required storage call fails; a failed
/// embed/vector-search call for `SemanticSearch` is tolerated and falls
/// back to recency, per §4.5.
#[allow(clippy::too_many_arguments)]
pub fn smart_search(
    uow: &mut dyn UnitOfWork,
    embedder: &dyn Embedder,
    settings: &Settings,
    query: &str,
    category: Option<&str>,
    limit: usize,
    min_similarity: f32,
) -> Result<SmartSearchResult> {
    metrics::counter!("mnemograph_retrieve_total").increment(1);
    let intent = classify_intent(query);

    match &intent {
        Intent::EntityLookup { entity } => entity_lookup(uow, entity, category, limit),
        Intent::Temporal { days } => temporal_search(uow, *days, category, limit),
        Intent::AspectFilter { category: aspect_category } => {
            let effective = category.unwrap_or(aspect_category);
            aspect_filter_search(uow, effective, limit)
        },
        Intent::SemanticSearch => semantic_search(uow, embedder, settings, query, category, limit, min_similarity),
    }
}

fn entity_lookup(uow: &mut dyn UnitOfWork, entity: &str, category: Option<&str>, limit: usize) -> Result<SmartSearchResult> {
    let canonical = resolve(entity);

    let mut seen: HashSet<uuid::Uuid> = HashSet::new();
    let mut scored: Vec<(Item, f32)> = Vec::new();

    for item in uow.list_items_by_subject(&canonical)? {
        if seen.insert(item.id) {
            scored.push((item, 1.0));
        }
    }

    let subject_edges = uow.get_edges_by_subject(&canonical)?;
    for edge in &subject_edges {
        for item in uow.list_items_by_subject(&edge.object)? {
            if seen.insert(item.id) {
                scored.push((item, 0.9));
            }
        }
    }

    let object_edges = uow.get_edges_by_object(&canonical)?;
    for edge in &object_edges {
        for item in uow.list_items_by_subject(&edge.subject)? {
            if seen.insert(item.id) {
                scored.push((item, 0.8));
            }
        }
    }

    // Second hop: items touching a further edge off each 1-hop endpoint, always at 0.7
    // regardless of direction, so they never outrank a direct 1-hop match.
    let mut one_hop_neighbors: Vec<String> = subject_edges.iter().map(|edge| edge.object.clone()).collect();
    one_hop_neighbors.extend(object_edges.iter().map(|edge| edge.subject.clone()));

    for neighbor in &one_hop_neighbors {
        for edge in uow.get_edges_by_subject(neighbor)? {
            for item in uow.list_items_by_subject(&edge.object)? {
                if seen.insert(item.id) {
                    scored.push((item, 0.7));
                }
            }
        }
        for edge in uow.get_edges_by_object(neighbor)? {
            for item in uow.list_items_by_subject(&edge.subject)? {
                if seen.insert(item.id) {
                    scored.push((item, 0.7));
                }
            }
        }
    }

    if let Some(category) = category {
        scored.retain(|(item, _)| item.category.as_deref() == Some(category));
    }

    scored.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    scored.truncate(limit);

    let total = scored.len();
    let items = scored.into_iter().map(|(item, sim)| SearchResultItem::from_item(&item, sim)).collect();

    Ok(SmartSearchResult { intent: intent_tag_for_entity_lookup(), items, total })
}

fn intent_tag_for_entity_lookup() -> String {
    Intent::EntityLookup { entity: String::new() }.tag()
}

fn temporal_search(uow: &mut dyn UnitOfWork, days: u32, category: Option<&str>, limit: usize) -> Result<SmartSearchResult> {
    let mut items = uow.list_items(category, usize::MAX)?;
    let cutoff = Utc::now() - Duration::days(i64::from(days));
    items.retain(|item| item.created_at >= cutoff);
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items.truncate(limit);

    let total = items.len();
    let result_items = items.iter().map(|item| SearchResultItem::from_item(item, 0.0)).collect();

    Ok(SmartSearchResult { intent: Intent::Temporal { days }.tag(), items: result_items, total })
}

fn aspect_filter_search(uow: &mut dyn UnitOfWork, category: &str, limit: usize) -> Result<SmartSearchResult> {
    let mut items = uow.list_items(Some(category), limit)?;
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let total = items.len();
    let result_items = items.iter().map(|item| SearchResultItem::from_item(item, 0.0)).collect();

    Ok(SmartSearchResult { intent: Intent::AspectFilter { category: category.to_string() }.tag(), items: result_items, total })
}

fn semantic_search(
    uow: &mut dyn UnitOfWork,
    embedder: &dyn Embedder,
    settings: &Settings,
    query: &str,
    category: Option<&str>,
    limit: usize,
    min_similarity: f32,
) -> Result<SmartSearchResult> {
    let embedded = crate::embedding::generate_embedding(embedder, query, settings.embedding.storage_dimensions)
        .and_then(|vector| uow.search_embeddings(&vector, limit, min_similarity, ItemStatus::Active));

    let mut results = match embedded {
        Ok(results) if !results.is_empty() => {
            let filtered: Vec<(Item, f32)> = match category {
                Some(category) => {
                    results.into_iter().filter(|(item, _)| item.category.as_deref() == Some(category)).collect()
                },
                None => results,
            };
            if filtered.is_empty() {
                return fallback_to_recent(uow, category, limit);
            }
            filtered
        },
        _ => return fallback_to_recent(uow, category, limit),
    };

    results.sort_by(|(_, a), (_, b)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));
    results.truncate(limit);

    let total = results.len();
    let items = results.into_iter().map(|(item, sim)| SearchResultItem::from_item(&item, sim)).collect();

    Ok(SmartSearchResult { intent: Intent::SemanticSearch.tag(), items, total })
}

fn fallback_to_recent(uow: &mut dyn UnitOfWork, category: Option<&str>, limit: usize) -> Result<SmartSearchResult> {
    let mut items = uow.list_items(category, limit)?;
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    let total = items.len();
    let result_items = items.iter().map(|item| SearchResultItem::from_item(item, 0.0)).collect();

    Ok(SmartSearchResult { intent: "SemanticSearch(fallback)".to_string(), items: result_items, total })
}

/// Validates a query is non-empty before classification, used by the
/// HTTP edge to reject empty search requests early.
///
/// # Errors
///
/// Returns [`Error::ValidationError`] for an empty or whitespace-only query.
pub fn validate_query(query: &str) -> Result<()> {
    if query.trim().is_empty() {
        return Err(Error::ValidationError("search query must not be empty".to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classify_entity_lookup_about_prefix() {
        let intent = classify_intent("about Alice");
        assert_eq!(intent, Intent::EntityLookup { entity: "Alice".to_string() });
    }

    #[test]
    fn classify_entity_lookup_what_do_you_know_about() {
        let intent = classify_intent("what do you know about Bob");
        assert_eq!(intent, Intent::EntityLookup { entity: "Bob".to_string() });
    }

    #[test]
    fn classify_entity_lookup_cjk_prefix() {
        let intent = classify_intent("關於 小明");
        assert_eq!(intent, Intent::EntityLookup { entity: "小明".to_string() });
    }

    #[test]
    fn classify_entity_lookup_cjk_suffix() {
        let intent = classify_intent("小明是誰");
        assert_eq!(intent, Intent::EntityLookup { entity: "小明".to_string() });
    }

    #[test]
    fn classify_temporal_last_n_days() {
        assert_eq!(classify_intent("last 5 days"), Intent::Temporal { days: 5 });
    }

    #[test]
    fn classify_temporal_week_month_today_yesterday() {
        assert_eq!(classify_intent("last week"), Intent::Temporal { days: 7 });
        assert_eq!(classify_intent("past month"), Intent::Temporal { days: 30 });
        assert_eq!(classify_intent("today"), Intent::Temporal { days: 1 });
        assert_eq!(classify_intent("yesterday"), Intent::Temporal { days: 2 });
        assert_eq!(classify_intent("最近"), Intent::Temporal { days: 7 });
    }

    #[test]
    fn classify_aspect_filter_by_keyword() {
        assert_eq!(classify_intent("what's my favorite editor"), Intent::AspectFilter { category: "preferences".to_string() });
    }

    #[test]
    fn classify_falls_through_to_semantic_search() {
        assert_eq!(classify_intent("dark mode vim setup"), Intent::SemanticSearch);
    }

    #[test]
    fn classification_order_prefers_entity_over_temporal_and_aspect() {
        // "about" beats the "preference" keyword even if both appear.
        let intent = classify_intent("about my preference");
        assert_eq!(intent, Intent::EntityLookup { entity: "my preference".to_string() });
    }

    #[test]
    fn validate_query_rejects_empty() {
        assert!(validate_query("   ").is_err());
        assert!(validate_query("hello").is_ok());
    }
}
