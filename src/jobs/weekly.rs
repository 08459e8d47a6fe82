//! Weekly maintenance: time decay, confidence propagation, stale archival,
//! near-duplicate compression, orphan cleanup (§4.8).

use super::RunWindow;
use crate::models::{Item, ItemStatus};
use crate::storage::UnitOfWork;
use crate::Result;
use chrono::Utc;
use std::collections::{HashMap, HashSet};

const DECAY_HALF_LIFE_DAYS: f32 = 30.0;
const DECAY_WRITE_THRESHOLD: f32 = 0.01;
const DECAY_FLOOR: f32 = 0.1;

const PROPAGATION_NEIGHBOR_WEIGHT: f32 = 0.15;
const PROPAGATION_WRITE_THRESHOLD: f32 = 0.01;
const PROPAGATION_MIN: f32 = 0.1;
const PROPAGATION_MAX: f32 = 1.0;
const DISTANCE_DISCOUNT: [f32; 2] = [1.0, 0.5];

const STALE_MAX_AGE_DAYS: i64 = 90;
const STALE_MIN_CONFIDENCE: f32 = 0.2;

const ORPHAN_MAX_AGE_DAYS: i64 = 180;

/// Counters produced by a weekly run.
#[derive(Debug, Clone, serde::Serialize)]
pub struct WeeklyStats {
    /// Start/end timestamps.
    pub window: RunWindow,
    /// Items whose confidence was decayed.
    pub items_decayed: usize,
    /// Items whose confidence was adjusted by graph propagation.
    pub items_propagated: usize,
    /// Items archived for being old and low-confidence.
    pub items_archived_stale: usize,
    /// Near-duplicate pairs compressed (loser archived).
    pub items_compressed: usize,
    /// Orphaned resources deleted.
    pub orphans_deleted: usize,
}

/// Runs the weekly maintenance pipeline.
///
/// # Errors
///
/// Returns an error if a storage call fails.
pub fn run_weekly(uow: &mut dyn UnitOfWork) -> Result<WeeklyStats> {
    let started_at = RunWindow::open();

    let items_decayed = apply_time_decay(uow)?;
    let items_propagated = propagate_confidence(uow)?;
    let items_archived_stale = archive_stale(uow)?;
    let items_compressed = compress_similar(uow)?;
    let orphans_deleted = uow.delete_orphaned_resources(ORPHAN_MAX_AGE_DAYS)?;

    Ok(WeeklyStats {
        window: RunWindow::close(started_at),
        items_decayed,
        items_propagated,
        items_archived_stale,
        items_compressed,
        orphans_deleted,
    })
}

fn apply_time_decay(uow: &mut dyn UnitOfWork) -> Result<usize> {
    let now = Utc::now();
    let mut decayed = 0;

    for item in uow.list_items(None, usize::MAX)? {
        if item.status != ItemStatus::Active || item.is_meta() {
            continue;
        }
        let age_days = (now - item.created_at).num_seconds().max(0) as f32 / 86_400.0;
        let decayed_confidence = (item.confidence * 0.5_f32.powf(age_days / DECAY_HALF_LIFE_DAYS)).max(DECAY_FLOOR);

        if (decayed_confidence - item.confidence).abs() > DECAY_WRITE_THRESHOLD {
            let mut updated = item;
            updated.confidence = decayed_confidence;
            uow.update_item(updated)?;
            decayed += 1;
        }
    }

    Ok(decayed)
}

/// `(neighbor_entity, edge_weight, distance)` adjacency built once from all
/// edges, undirected, deduped so a neighbor is recorded only at its
/// shortest distance.
fn two_hop_neighbors(direct: &HashMap<String, Vec<(String, f32)>>, entity: &str) -> Vec<(String, f32, u8)> {
    let mut visited: HashSet<String> = HashSet::from([entity.to_string()]);
    let mut result = Vec::new();

    let hop1 = direct.get(entity).cloned().unwrap_or_default();
    for (neighbor, weight) in &hop1 {
        if visited.insert(neighbor.clone()) {
            result.push((neighbor.clone(), *weight, 1u8));
        }
    }

    for (hop1_neighbor, _) in &hop1 {
        let Some(hop2) = direct.get(hop1_neighbor) else { continue };
        for (neighbor, weight) in hop2 {
            if visited.insert(neighbor.clone()) {
                result.push((neighbor.clone(), *weight, 2u8));
            }
        }
    }

    result
}

fn build_direct_adjacency(edges: &[crate::models::GraphEdge]) -> HashMap<String, Vec<(String, f32)>> {
    let mut map: HashMap<String, Vec<(String, f32)>> = HashMap::new();
    for edge in edges {
        map.entry(edge.subject.clone()).or_default().push((edge.object.clone(), edge.weight));
        map.entry(edge.object.clone()).or_default().push((edge.subject.clone(), edge.weight));
    }
    map
}

fn canonical_key(item: &Item) -> Option<String> {
    item.canonical_subject.clone().or_else(|| item.canonical_object.clone())
}

fn build_entity_confidence(items: &[Item]) -> HashMap<String, f32> {
    let mut sums: HashMap<String, (f32, usize)> = HashMap::new();
    for item in items {
        if item.status != ItemStatus::Active || item.is_meta() {
            continue;
        }
        for key in [&item.canonical_subject, &item.canonical_object].into_iter().flatten() {
            let entry = sums.entry(key.clone()).or_insert((0.0, 0));
            entry.0 += item.confidence;
            entry.1 += 1;
        }
    }
    sums.into_iter().map(|(k, (sum, count))| (k, sum / count as f32)).collect()
}

fn propagate_confidence(uow: &mut dyn UnitOfWork) -> Result<usize> {
    let edges = uow.list_all_edges()?;
    let direct = build_direct_adjacency(&edges);
    let items = uow.list_items(None, usize::MAX)?;
    let entity_confidence = build_entity_confidence(&items);

    let mut propagated = 0;
    for item in items {
        if item.status != ItemStatus::Active || item.is_meta() {
            continue;
        }
        let Some(key) = canonical_key(&item) else { continue };

        let neighbors = two_hop_neighbors(&direct, &key);
        let mut weighted_sum = 0.0_f32;
        let mut weight_total = 0.0_f32;
        for (neighbor, weight, distance) in &neighbors {
            let Some(confidence) = entity_confidence.get(neighbor) else { continue };
            let discount = DISTANCE_DISCOUNT[(*distance as usize).saturating_sub(1).min(1)];
            weighted_sum += weight * discount * confidence;
            weight_total += weight * discount;
        }

        if weight_total <= 0.0 {
            continue;
        }

        let neighbor_signal = weighted_sum / weight_total;
        let new_confidence =
            (item.confidence * (1.0 - PROPAGATION_NEIGHBOR_WEIGHT) + neighbor_signal * PROPAGATION_NEIGHBOR_WEIGHT)
                .clamp(PROPAGATION_MIN, PROPAGATION_MAX);

        if (new_confidence - item.confidence).abs() >= PROPAGATION_WRITE_THRESHOLD {
            let mut updated = item;
            updated.confidence = new_confidence;
            uow.update_item(updated)?;
            propagated += 1;
        }
    }

    Ok(propagated)
}

fn archive_stale(uow: &mut dyn UnitOfWork) -> Result<usize> {
    let stale = uow.list_old_low_confidence_items(STALE_MAX_AGE_DAYS, STALE_MIN_CONFIDENCE)?;
    let count = stale.len();
    for item in stale {
        uow.update_item_status(item.id, ItemStatus::Archived)?;
    }
    Ok(count)
}

fn objects_overlap(a: &str, b: &str) -> bool {
    let (a, b) = (a.to_lowercase(), b.to_lowercase());
    a == b || a.contains(&b) || b.contains(&a)
}

fn compress_similar(uow: &mut dyn UnitOfWork) -> Result<usize> {
    let items = uow.list_items(None, usize::MAX)?;
    let mut by_subject: HashMap<String, Vec<Item>> = HashMap::new();
    for item in items {
        if item.status != ItemStatus::Active || item.is_meta() {
            continue;
        }
        let Some(subject) = item.canonical_subject.clone() else { continue };
        by_subject.entry(subject).or_default().push(item);
    }

    let mut archived: HashSet<uuid::Uuid> = HashSet::new();
    let mut compressed = 0;

    for group in by_subject.into_values() {
        let mut by_predicate: HashMap<String, Vec<Item>> = HashMap::new();
        for item in group {
            let predicate = item.predicate.clone().unwrap_or_default();
            by_predicate.entry(predicate).or_default().push(item);
        }

        for same_predicate in by_predicate.into_values() {
            for i in 0..same_predicate.len() {
                if archived.contains(&same_predicate[i].id) {
                    continue;
                }
                for j in (i + 1)..same_predicate.len() {
                    if archived.contains(&same_predicate[j].id) {
                        continue;
                    }
                    let (a, b) = (&same_predicate[i], &same_predicate[j]);
                    let (Some(obj_a), Some(obj_b)) = (&a.object, &b.object) else { continue };
                    if !objects_overlap(obj_a, obj_b) {
                        continue;
                    }

                    let (loser, survivor) =
                        if a.confidence <= b.confidence { (a.clone(), b.clone()) } else { (b.clone(), a.clone()) };

                    uow.update_item_status(loser.id, ItemStatus::Archived)?;
                    let mut survivor = survivor;
                    survivor.supersedes = Some(loser.id);
                    uow.update_item(survivor)?;

                    archived.insert(loser.id);
                    compressed += 1;
                }
            }
        }
    }

    Ok(compressed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn objects_overlap_matches_equal_and_containing_strings() {
        assert!(objects_overlap("dark mode", "Dark Mode"));
        assert!(objects_overlap("dark", "dark mode"));
        assert!(!objects_overlap("dark mode", "light mode"));
    }

    #[test]
    fn two_hop_neighbors_does_not_revisit_shorter_distance_entity() {
        let mut direct: HashMap<String, Vec<(String, f32)>> = HashMap::new();
        direct.insert("a".to_string(), vec![("b".to_string(), 0.9), ("c".to_string(), 0.5)]);
        direct.insert("b".to_string(), vec![("a".to_string(), 0.9), ("c".to_string(), 0.3)]);
        direct.insert("c".to_string(), vec![("a".to_string(), 0.5), ("b".to_string(), 0.3)]);

        let neighbors = two_hop_neighbors(&direct, "a");
        let c_entries: Vec<_> = neighbors.iter().filter(|(n, _, _)| n == "c").collect();
        assert_eq!(c_entries.len(), 1);
        assert_eq!(c_entries[0].2, 1);
    }
}
