//! Ingest, extract, classify, and conflict resolution (§4.4).
//!
//! Every entry point here takes an already-open `&mut dyn UnitOfWork` and
//! makes no attempt to commit it — callers own the transaction boundary so
//! a single HTTP request's worth of work (ingest + extract + classify +
//! conflict + embed) shares one atomic unit, per §4.4's atomicity rule.

use crate::config::{ConflictStrategy, Settings};
use crate::embedding::{build_text_for_item, generate_embedding, Embedder};
use crate::llm::LlmProvider;
use crate::models::{GraphEdge, Item, ItemStatus, Resource};
use crate::storage::UnitOfWork;
use crate::Result;
use std::collections::HashMap;
use uuid::Uuid;

/// Appends a new resource to the raw log (§4.4 step 1).
///
/// # Errors
///
/// Returns an error if the underlying storage call fails.
pub fn ingest(uow: &mut dyn UnitOfWork, source: &str, content: &str, metadata: HashMap<String, String>) -> Result<Resource> {
    let resource = Resource::new(source, content).with_metadata(metadata);
    let resource = uow.create_resource(resource)?;
    metrics::counter!("mnemograph_ingest_total").increment(1);
    Ok(resource)
}

/// Extracts facts from a resource via the LLM, stores one `Item` per fact,
/// and runs classify/conflict/embed/meta-fact for each (§4.4 steps 2-6).
///
/// # Errors
///
/// Returns an error if a required storage call fails, or if the LLM call
/// itself fails (a malformed-but-successful LLM response is tolerated and
/// yields an empty fact list, per §4.4 step 2).
pub fn extract(
    uow: &mut dyn UnitOfWork,
    llm: &dyn LlmProvider,
    embedder: &dyn Embedder,
    settings: &Settings,
    resource: &Resource,
) -> Result<Vec<Item>> {
    let facts = llm.extract_facts(&resource.content)?;

    let mut created = Vec::with_capacity(facts.len());
    for fact in facts {
        let mut item = Item::new(Some(fact.subject), Some(fact.predicate), Some(fact.object));
        item.resource_id = Some(resource.id);
        item.category = fact.category;
        item.confidence = fact.confidence.clamp(0.0, 1.0);

        let item = process_new_item(uow, llm, embedder, settings, item, false)?;
        create_extraction_meta_fact(uow, llm, item.id)?;
        created.push(item);
    }

    metrics::counter!("mnemograph_extract_total").increment(1);
    Ok(created)
}

/// Creates an item directly (bypassing extraction), running
/// classify/conflict/embed and a graph edge creation (§4.4 step 5).
///
/// # Errors
///
/// Returns an error if a required storage call fails.
pub fn create_item_direct(
    uow: &mut dyn UnitOfWork,
    llm: &dyn LlmProvider,
    embedder: &dyn Embedder,
    settings: &Settings,
    item: Item,
) -> Result<Item> {
    process_new_item(uow, llm, embedder, settings, item, true)
}

fn process_new_item(
    uow: &mut dyn UnitOfWork,
    llm: &dyn LlmProvider,
    embedder: &dyn Embedder,
    settings: &Settings,
    mut item: Item,
    create_graph_edge: bool,
) -> Result<Item> {
    if item.category.is_none() {
        item.category = Some(classify_item(llm, settings, item.subject.as_deref(), item.predicate.as_deref(), item.object.as_deref()));
    }

    if let Some(category) = item.category.as_deref() {
        uow.upsert_category(category)?;
    }

    let item = uow.create_item(item)?;
    let item = auto_resolve_conflicts(uow, item, settings.conflict_strategy)?;

    if create_graph_edge {
        if let (Some(subject), Some(object)) = (item.canonical_subject.clone(), item.canonical_object.clone()) {
            let predicate = item.predicate.clone().unwrap_or_default();
            let _ = uow.create_edge(GraphEdge::new(subject, predicate, object, 1.0));
        }
    }

    if !item.is_meta() {
        let text = build_text_for_item(
            item.subject.as_deref(),
            item.predicate.as_deref(),
            item.object.as_deref(),
            item.category.as_deref(),
        );
        match generate_embedding(embedder, &text, settings.embedding.storage_dimensions) {
            Ok(vector) => {
                if let Err(err) = uow.upsert_embedding(item.id, vector) {
                    tracing::warn!(item_id = %item.id, error = %err, "failed to persist embedding");
                }
            },
            Err(err) => {
                metrics::counter!("mnemograph_embedding_skipped_total").increment(1);
                tracing::warn!(item_id = %item.id, error = %err, "embedding generation failed, skipping");
            },
        }
    }

    Ok(item)
}

fn create_extraction_meta_fact(uow: &mut dyn UnitOfWork, llm: &dyn LlmProvider, item_id: Uuid) -> Result<()> {
    uow.create_meta_fact(item_id, "has_source", llm.name(), 0.9)?;
    Ok(())
}

/// Classifies a fact into one of the six fixed categories (§4.4 step 3).
///
/// When `settings.llm.use_llm` is set, tries the LLM classifier first and
/// falls back to the rule-based keyword table on an unrecognized or
/// failed response.
#[must_use]
pub fn classify_item(
    llm: &dyn LlmProvider,
    settings: &Settings,
    subject: Option<&str>,
    predicate: Option<&str>,
    object: Option<&str>,
) -> String {
    if settings.llm.use_llm {
        let subject = subject.unwrap_or_default();
        let predicate = predicate.unwrap_or_default();
        let object = object.unwrap_or_default();
        if let Ok(Some(category)) = llm.classify(subject, predicate, object) {
            return category;
        }
    }
    rule_based_classify(predicate.unwrap_or_default())
}

/// The fixed keyword-to-category fallback table (§4.4).
fn rule_based_classify(predicate: &str) -> String {
    let lowered = predicate.to_lowercase();
    const TABLE: &[(&[&str], &str)] = &[
        (&["prefer", "like", "want", "use"], "preferences"),
        (&["know", "met", "friend", "colleague"], "relationships"),
        (&["can", "skill", "expert", "learn"], "skills"),
        (&["plan", "goal", "want to", "will"], "goals"),
        (&["attend", "schedule", "meet", "event"], "events"),
    ];
    TABLE
        .iter()
        .find(|(keywords, _)| keywords.iter().any(|k| lowered.contains(k)))
        .map_or_else(|| "facts".to_string(), |(_, category)| (*category).to_string())
}

/// Finds active candidates that conflict with `(canonical_subject,
/// predicate, canonical_object)` — same subject/predicate, different
/// object (§4.4 step 4).
///
/// # Errors
///
/// Returns an error if the underlying storage call fails.
pub fn find_conflicts(
    uow: &mut dyn UnitOfWork,
    canonical_subject: &str,
    predicate: &str,
    canonical_object: Option<&str>,
    exclude_id: Option<Uuid>,
) -> Result<Vec<Item>> {
    let candidates = uow.find_potential_conflicts(canonical_subject, predicate, exclude_id)?;
    Ok(candidates.into_iter().filter(|c| c.canonical_object.as_deref() != canonical_object).collect())
}

/// Resolves a single conflict between a new/updated item and an existing
/// candidate: archives the loser and sets the winner's `supersedes`
/// pointer.
///
/// # Errors
///
/// Returns an error if a storage call fails.
pub fn resolve_conflict(uow: &mut dyn UnitOfWork, item: Item, candidate: Item, strategy: ConflictStrategy) -> Result<Item> {
    let new_wins = match strategy {
        ConflictStrategy::Recency => true,
        ConflictStrategy::Confidence => item.confidence >= candidate.confidence,
    };

    if new_wins {
        uow.update_item_status(candidate.id, ItemStatus::Archived)?;
        let mut winner = item;
        winner.supersedes = Some(candidate.id);
        uow.update_item(winner)
    } else {
        uow.update_item_status(item.id, ItemStatus::Archived)?;
        let mut winner = candidate;
        winner.supersedes = Some(item.id);
        uow.update_item(winner)?;
        uow.get_item(item.id)?.ok_or_else(|| {
            crate::Error::ValidationError(format!("item {} vanished mid-conflict-resolution", item.id))
        })
    }
}

/// Runs conflict detection and resolution for a freshly created item,
/// returning the item as it stands after resolution (possibly archived,
/// if an existing candidate won).
///
/// # Errors
///
/// Returns an error if a storage call fails.
pub fn auto_resolve_conflicts(uow: &mut dyn UnitOfWork, item: Item, strategy: ConflictStrategy) -> Result<Item> {
    if item.is_meta() {
        return Ok(item);
    }
    let Some(canonical_subject) = item.canonical_subject.clone() else {
        return Ok(item);
    };
    let Some(predicate) = item.predicate.clone() else {
        return Ok(item);
    };

    let conflicts = find_conflicts(uow, &canonical_subject, &predicate, item.canonical_object.as_deref(), Some(item.id))?;

    let Some(candidate) = conflicts.into_iter().next() else {
        return Ok(item);
    };

    metrics::counter!("mnemograph_conflict_resolved_total").increment(1);
    resolve_conflict(uow, item, candidate, strategy)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rule_based_classify_matches_fixed_table() {
        assert_eq!(rule_based_classify("prefers"), "preferences");
        assert_eq!(rule_based_classify("knows"), "relationships");
        assert_eq!(rule_based_classify("has skill in"), "skills");
        assert_eq!(rule_based_classify("plans to"), "goals");
        assert_eq!(rule_based_classify("attends"), "events");
        assert_eq!(rule_based_classify("lives in"), "facts");
    }
}
