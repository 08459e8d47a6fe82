//! Core data model: Resource, Item, Category, GraphEdge, CategoryAccess, Intent.

mod category;
mod category_access;
mod graph_edge;
mod intent;
mod item;
mod resource;

pub use category::Category;
pub use category_access::CategoryAccess;
pub use graph_edge::GraphEdge;
pub use intent::Intent;
pub use item::{Item, ItemStatus};
pub use resource::Resource;

/// The fixed six built-in categories with their default (pre-summarization)
/// descriptions, used both by the classifier and by the tiered-context
/// builder's "not yet summarized" detection (§4.7).
pub const DEFAULT_CATEGORIES: &[(&str, &str)] = &[
    ("preferences", "Things the user likes, dislikes, or prefers."),
    ("facts", "General facts about the user or their environment."),
    ("events", "Scheduled or past events involving the user."),
    ("relationships", "People the user knows and their relation to them."),
    ("skills", "Skills and expertise the user has or is learning."),
    ("goals", "Goals and plans the user intends to pursue."),
];

/// Returns the default placeholder description for a built-in category name,
/// if it is one of the six fixed categories.
#[must_use]
pub fn default_category_description(name: &str) -> Option<&'static str> {
    DEFAULT_CATEGORIES
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(_, d)| *d)
}
