//! The `Category` entity: an evolving natural-language summary cache.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A cached natural-language summary and access metadata for a category
/// name. Categories are *derived* from the set of distinct `item.category`
/// values currently active; this row caches the summary, it is not the
/// source of truth for membership.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    /// Unique identifier.
    pub id: Uuid,
    /// Unique category name.
    pub name: String,
    /// Cached natural-language summary, or `None` if never summarized.
    pub summary: Option<String>,
    /// Last time the summary was updated.
    pub updated_at: DateTime<Utc>,
}

impl Category {
    /// Creates a new category row with no summary.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            summary: None,
            updated_at: Utc::now(),
        }
    }

    /// Whether this category's summary is still the default placeholder
    /// (or absent), i.e. "not yet summarized" per §4.7.
    #[must_use]
    pub fn is_unsummarized(&self) -> bool {
        match &self.summary {
            None => true,
            Some(text) => crate::models::default_category_description(&self.name)
                .is_some_and(|default| default == text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_category_is_unsummarized() {
        let c = Category::new("preferences");
        assert!(c.is_unsummarized());
    }

    #[test]
    fn category_with_default_description_is_unsummarized() {
        let mut c = Category::new("facts");
        c.summary = crate::models::default_category_description("facts").map(str::to_string);
        assert!(c.is_unsummarized());
    }

    #[test]
    fn category_with_real_summary_is_summarized() {
        let mut c = Category::new("goals");
        c.summary = Some("The user wants to ship mnemograph this quarter.".to_string());
        assert!(!c.is_unsummarized());
    }
}
