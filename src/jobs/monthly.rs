//! Monthly re-index: embedding refresh and graph rebuild from scratch
//! (§4.8).

use super::RunWindow;
use crate::embedding::{adapt_vector, build_text_for_item, Embedder};
use crate::models::{GraphEdge, Item, ItemStatus};
use crate::storage::UnitOfWork;
use crate::Result;
use std::collections::{HashMap, HashSet};

const EMBEDDING_BATCH_SIZE: usize = 50;
const SHARES_EDGE_WEIGHT: f32 = 0.5;
const REWEIGHT_THRESHOLD: f32 = 0.05;

/// Counters produced by a monthly run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct MonthlyStats {
    /// Start/end timestamps.
    pub window: RunWindow,
    /// Stale embeddings deleted.
    pub embeddings_deleted: usize,
    /// Embeddings recomputed.
    pub embeddings_recomputed: usize,
    /// Edges created during the rebuild.
    pub edges_rebuilt: usize,
    /// Edges whose weight was adjusted during reweighting.
    pub edges_reweighted: usize,
    /// Active item count at the end of the run.
    pub active_items: usize,
    /// Embedding count at the end of the run.
    pub embedding_count: usize,
}

/// Runs the monthly re-index pipeline.
///
/// # Errors
///
/// Returns an error if a storage call fails or if batch embedding
/// generation fails outright (a single item's text is never expected to
/// fail once it has passed ingestion, so this is not treated as a
/// per-item-skippable condition here).
pub fn run_monthly(uow: &mut dyn UnitOfWork, embedder: &dyn Embedder, storage_dimensions: usize) -> Result<MonthlyStats> {
    let started_at = RunWindow::open();

    let active_ids = uow.list_all_item_ids(ItemStatus::Active)?;
    let embeddings_deleted = uow.delete_stale_embeddings(&active_ids)?;
    let embeddings_recomputed = recompute_embeddings(uow, embedder, storage_dimensions)?;
    let edges_rebuilt = rebuild_edges(uow)?;
    let edges_reweighted = reweight_edges(uow)?;

    let active_items = uow.count_items(None, ItemStatus::Active)?;
    let embedding_count = uow.count_embeddings()?;

    Ok(MonthlyStats {
        window: RunWindow::close(started_at),
        embeddings_deleted,
        embeddings_recomputed,
        edges_rebuilt,
        edges_reweighted,
        active_items,
        embedding_count,
    })
}

fn recompute_embeddings(uow: &mut dyn UnitOfWork, embedder: &dyn Embedder, storage_dimensions: usize) -> Result<usize> {
    let items: Vec<Item> = uow.list_items(None, usize::MAX)?.into_iter().filter(|i| i.status == ItemStatus::Active && !i.is_meta()).collect();

    let mut recomputed = 0;
    for chunk in items.chunks(EMBEDDING_BATCH_SIZE) {
        let texts: Vec<String> = chunk
            .iter()
            .map(|i| build_text_for_item(i.subject.as_deref(), i.predicate.as_deref(), i.object.as_deref(), i.category.as_deref()))
            .collect();
        let text_refs: Vec<&str> = texts.iter().map(String::as_str).collect();
        let vectors = embedder.embed_batch(&text_refs)?;

        let batch: Vec<(uuid::Uuid, Vec<f32>)> = chunk
            .iter()
            .zip(vectors)
            .map(|(item, vector)| (item.id, adapt_vector(vector, storage_dimensions)))
            .collect();
        recomputed += batch.len();
        uow.batch_upsert_embeddings(batch)?;
    }

    Ok(recomputed)
}

fn rebuild_edges(uow: &mut dyn UnitOfWork) -> Result<usize> {
    uow.delete_all_edges()?;

    let items: Vec<Item> = uow.list_items(None, usize::MAX)?.into_iter().filter(|i| i.status == ItemStatus::Active && !i.is_meta()).collect();

    let mut edges: HashMap<(String, String, String), GraphEdge> = HashMap::new();

    for item in &items {
        if let (Some(subject), Some(object)) = (&item.canonical_subject, &item.canonical_object) {
            let edge = GraphEdge::new(subject.clone(), "relates_to", object.clone(), item.confidence);
            edges.entry(edge.triple_key()).or_insert(edge);
        }
    }

    let mut subjects_by_category: HashMap<String, HashSet<String>> = HashMap::new();
    for item in &items {
        let (Some(category), Some(subject)) = (&item.category, &item.canonical_subject) else { continue };
        subjects_by_category.entry(category.clone()).or_default().insert(subject.clone());
    }

    for (category, subjects) in subjects_by_category {
        if subjects.len() < 2 {
            continue;
        }
        let mut ordered: Vec<&String> = subjects.iter().collect();
        ordered.sort();
        for i in 0..ordered.len() {
            for j in (i + 1)..ordered.len() {
                let predicate = format!("shares_{category}");
                let edge = GraphEdge::new(ordered[i].clone(), predicate, ordered[j].clone(), SHARES_EDGE_WEIGHT);
                edges.entry(edge.triple_key()).or_insert(edge);
            }
        }
    }

    let created: Vec<GraphEdge> = edges.into_values().collect();
    let count = created.len();
    uow.create_edges(created)?;

    Ok(count)
}

fn reweight_edges(uow: &mut dyn UnitOfWork) -> Result<usize> {
    let items: Vec<Item> = uow.list_items(None, usize::MAX)?.into_iter().filter(|i| i.status == ItemStatus::Active && !i.is_meta()).collect();

    let mut sums: HashMap<String, (f32, usize)> = HashMap::new();
    for item in &items {
        let Some(subject) = &item.canonical_subject else { continue };
        let entry = sums.entry(subject.clone()).or_insert((0.0, 0));
        entry.0 += item.confidence;
        entry.1 += 1;
    }
    let avg_confidence: HashMap<String, f32> = sums.into_iter().map(|(k, (sum, count))| (k, sum / count as f32)).collect();

    let mut reweighted = 0;
    for edge in uow.list_all_edges()? {
        let Some(avg) = avg_confidence.get(&edge.subject) else { continue };
        if (avg - edge.weight).abs() > REWEIGHT_THRESHOLD {
            uow.update_edge_weight(&edge.subject, &edge.predicate, &edge.object, *avg)?;
            reweighted += 1;
        }
    }

    Ok(reweighted)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shares_edge_weight_is_fixed_at_half() {
        assert!((SHARES_EDGE_WEIGHT - 0.5).abs() < f32::EPSILON);
    }
}
