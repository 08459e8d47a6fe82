//! Priority scoring and the tiered-context builder (§4.7).

use crate::Result;
use crate::models::{GraphEdge, ItemStatus};
use crate::storage::UnitOfWork;
use chrono::{DateTime, Duration, Utc};

const USAGE_NORM: f32 = 10.0;
const USAGE_WEIGHT: f32 = 0.3;
const RECENCY_HALF_LIFE_DAYS: f32 = 14.0;
const RECENCY_WEIGHT: f32 = 0.2;
const USAGE_WINDOW_DAYS: i64 = 30;
const DEFAULT_STATIC_WEIGHT: f32 = 0.5;

const STATIC_WEIGHTS: &[(&str, f32)] =
    &[("preferences", 1.0), ("facts", 0.9), ("goals", 0.7), ("skills", 0.6), ("relationships", 0.5), ("events", 0.4)];

/// Static weight for a category name, falling back to the default for
/// unknown (user-defined) categories.
#[must_use]
pub fn static_weight(category: &str) -> f32 {
    STATIC_WEIGHTS.iter().find(|(name, _)| *name == category).map_or(DEFAULT_STATIC_WEIGHT, |(_, w)| *w)
}

/// Computes a category's priority: `static_weight × dynamic_factor`.
///
/// `last_activity` should be the most recent of the category's
/// `last_item_at` and its `updated_at` timestamp.
#[must_use]
pub fn calculate_priority(category: &str, usage_count: usize, last_activity: Option<DateTime<Utc>>, now: DateTime<Utc>) -> f32 {
    let usage_score = (usage_count as f32 / USAGE_NORM).min(1.0);
    let recency_score = last_activity.map_or(0.0, |ts| {
        let age_days = (now - ts).num_seconds().max(0) as f32 / 86_400.0;
        (-age_days / RECENCY_HALF_LIFE_DAYS).exp()
    });
    let dynamic_factor = 1.0 + USAGE_WEIGHT * usage_score + RECENCY_WEIGHT * recency_score;
    static_weight(category) * dynamic_factor
}

/// Sorts `(category, priority)` pairs by priority descending, breaking ties
/// by category name ascending, in place.
pub fn sort_categories_by_priority(categories: &mut [(String, f32)]) {
    categories.sort_by(|(name_a, prio_a), (name_b, prio_b)| {
        prio_b.partial_cmp(prio_a).unwrap_or(std::cmp::Ordering::Equal).then_with(|| name_a.cmp(name_b))
    });
}

/// Builds the human-readable tiered memory-context block.
///
/// # Errors
///
/// Returns an error if the underlying storage calls fail.
pub fn get_tiered_context(
    uow: &mut dyn UnitOfWork,
    categories: Option<&[String]>,
    max_items_per_category: usize,
    max_chars: Option<usize>,
    record_access: bool,
) -> Result<String> {
    let now = Utc::now();
    let since = now - Duration::days(USAGE_WINDOW_DAYS);

    let all_categories = uow.list_categories()?;
    let names: Vec<String> = match categories {
        Some(names) => names.to_vec(),
        None => {
            let mut distinct = uow.list_distinct_categories(ItemStatus::Active)?;
            distinct.sort();
            distinct
        },
    };

    let all_edges = uow.list_all_edges()?;

    let mut scored: Vec<(String, f32)> = Vec::with_capacity(names.len());
    for name in &names {
        let usage_count = uow.count_category_access(name, Some(since))?;
        let items = uow.list_items(Some(name), usize::MAX)?;
        let last_item_at = items.iter().map(|i| i.created_at).max();
        let category_updated_at = all_categories.iter().find(|c| &c.name == name).map(|c| c.updated_at);
        let last_activity = [last_item_at, category_updated_at].into_iter().flatten().max();
        let priority = calculate_priority(name, usage_count, last_activity, now);
        scored.push((name.clone(), priority));
    }
    sort_categories_by_priority(&mut scored);

    let mut output = String::from("## User Memory Context\n");
    let mut accessed_categories = Vec::new();

    for (name, _priority) in &scored {
        let mut items = uow.list_items(Some(name), max_items_per_category)?;
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        let category_row = all_categories.iter().find(|c| &c.name == name);
        let is_unsummarized = category_row.is_none_or(crate::models::Category::is_unsummarized);

        if items.is_empty() && is_unsummarized {
            continue;
        }

        let mut block = format!("### {name}\n");
        if let Some(cat) = category_row {
            if !cat.is_unsummarized() {
                if let Some(summary) = &cat.summary {
                    block.push_str(summary);
                    block.push('\n');
                }
            }
        }

        block.push_str("**Recent:**\n");
        for item in &items {
            block.push_str(&format_item_line(item));
        }

        let canonical_entities = collect_canonical_entities(&items);
        let listed_triples = collect_listed_triples(&items);
        let related_edges = related_edges_for_category(&all_edges, &canonical_entities, &listed_triples);
        if !related_edges.is_empty() {
            block.push_str("**Related:**\n");
            for edge in &related_edges {
                block.push_str(&format!("- {} {} {}\n", edge.subject, edge.predicate, edge.object));
            }
        }

        if let Some(max_chars) = max_chars {
            if output.len() + block.len() > max_chars {
                break;
            }
        }

        output.push_str(&block);
        accessed_categories.push(name.clone());
    }

    if record_access {
        for name in &accessed_categories {
            uow.record_category_access(crate::models::CategoryAccess::new(name.clone(), "context"))?;
        }
    }

    Ok(output)
}

fn format_item_line(item: &crate::models::Item) -> String {
    let subject = item.subject.as_deref().unwrap_or("");
    let predicate = item.predicate.as_deref().unwrap_or("");
    let object = item.object.as_deref().unwrap_or("");
    format!("- {subject} {predicate} {object}\n")
}

fn collect_canonical_entities(items: &[crate::models::Item]) -> std::collections::HashSet<String> {
    let mut set = std::collections::HashSet::new();
    for item in items {
        if let Some(s) = &item.canonical_subject {
            set.insert(s.clone());
        }
        if let Some(o) = &item.canonical_object {
            set.insert(o.clone());
        }
    }
    set
}

fn collect_listed_triples(items: &[crate::models::Item]) -> std::collections::HashSet<(String, String, String)> {
    items
        .iter()
        .map(|i| {
            (
                i.canonical_subject.clone().unwrap_or_default(),
                i.predicate.clone().unwrap_or_default(),
                i.canonical_object.clone().unwrap_or_default(),
            )
        })
        .collect()
}

fn related_edges_for_category(
    edges: &[GraphEdge],
    entities: &std::collections::HashSet<String>,
    listed_triples: &std::collections::HashSet<(String, String, String)>,
) -> Vec<GraphEdge> {
    edges
        .iter()
        .filter(|edge| entities.contains(&edge.subject) || entities.contains(&edge.object))
        .filter(|edge| !listed_triples.contains(&edge.triple_key()))
        .cloned()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn static_weight_matches_fixed_table() {
        assert!((static_weight("preferences") - 1.0).abs() < f32::EPSILON);
        assert!((static_weight("events") - 0.4).abs() < f32::EPSILON);
        assert!((static_weight("unknown_category") - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn calculate_priority_is_at_least_static_weight() {
        let now = Utc::now();
        let priority = calculate_priority("facts", 0, None, now);
        assert!((priority - static_weight("facts")).abs() < 1e-5);
    }

    #[test]
    fn calculate_priority_increases_with_usage_and_recency() {
        let now = Utc::now();
        let low = calculate_priority("facts", 0, None, now);
        let high = calculate_priority("facts", 10, Some(now), now);
        assert!(high > low);
    }

    #[test]
    fn sort_categories_by_priority_breaks_ties_by_name() {
        let mut categories = vec![("zeta".to_string(), 1.0), ("alpha".to_string(), 1.0)];
        sort_categories_by_priority(&mut categories);
        assert_eq!(categories[0].0, "alpha");
    }

    #[test]
    fn sort_categories_by_priority_orders_desc() {
        let mut categories = vec![("low".to_string(), 0.2), ("high".to_string(), 0.9)];
        sort_categories_by_priority(&mut categories);
        assert_eq!(categories[0].0, "high");
    }
}
