//! The `Item` entity: an atomic subject-predicate-object fact.

use crate::entity::resolve;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Lifecycle status of an `Item`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemStatus {
    /// Visible in all user-facing listings.
    Active,
    /// Superseded, decayed past threshold, or compressed; queryable only by
    /// admin endpoints.
    Archived,
    /// Removed by exceptional admin action; never set by any pipeline.
    Deleted,
}

impl std::fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Active => "active",
            Self::Archived => "archived",
            Self::Deleted => "deleted",
        };
        write!(f, "{s}")
    }
}

impl std::str::FromStr for ItemStatus {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "active" => Ok(Self::Active),
            "archived" => Ok(Self::Archived),
            "deleted" => Ok(Self::Deleted),
            other => Err(crate::Error::ValidationError(format!("unknown item status '{other}'"))),
        }
    }
}

/// An atomic subject-predicate-object fact.
///
/// `canonical_subject`/`canonical_object` are written once at create time
/// via [`crate::entity::resolve`] and used for every equality lookup
/// (conflict detection, duplicate detection, graph queries, subject
/// search); the original `subject`/`object` strings are preserved for
/// display.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Item {
    /// Unique identifier.
    pub id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Back-reference to the resource this item was extracted from, if any.
    pub resource_id: Option<Uuid>,
    /// Raw subject string, as extracted or submitted.
    pub subject: Option<String>,
    /// Relationship or property name.
    pub predicate: Option<String>,
    /// Raw object string, as extracted or submitted.
    pub object: Option<String>,
    /// Canonical (normalized + aliased) form of `subject`.
    pub canonical_subject: Option<String>,
    /// Canonical (normalized + aliased) form of `object`.
    pub canonical_object: Option<String>,
    /// Category tag, or `None` if not yet classified.
    pub category: Option<String>,
    /// Confidence in [0, 1].
    pub confidence: f32,
    /// Lifecycle status.
    pub status: ItemStatus,
    /// The item this one replaces after conflict resolution, if any.
    pub supersedes: Option<Uuid>,
    /// When set, this item is a meta-fact describing another item.
    pub meta_about: Option<Uuid>,
    /// Embedding vector, if one has been generated.
    pub embedding: Option<Vec<f32>>,
}

impl Item {
    /// Creates a new active item, computing canonical subject/object from
    /// the raw strings at construction time.
    #[must_use]
    pub fn new(
        subject: Option<String>,
        predicate: Option<String>,
        object: Option<String>,
    ) -> Self {
        let canonical_subject = subject.as_deref().map(resolve);
        let canonical_object = object.as_deref().map(resolve);
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            resource_id: None,
            subject,
            predicate,
            object,
            canonical_subject,
            canonical_object,
            category: None,
            confidence: 1.0,
            status: ItemStatus::Active,
            supersedes: None,
            meta_about: None,
            embedding: None,
        }
    }

    /// Creates a meta-fact describing another item.
    ///
    /// Meta-facts carry `category = "meta"`, have no subject, and are
    /// excluded from all user-facing listings, category aggregation,
    /// embeddings, and graph propagation.
    #[must_use]
    pub fn new_meta(about_item_id: Uuid, predicate: impl Into<String>, object: impl Into<String>, confidence: f32) -> Self {
        let mut item = Self::new(None, Some(predicate.into()), Some(object.into()));
        item.category = Some("meta".to_string());
        item.meta_about = Some(about_item_id);
        item.confidence = confidence.clamp(0.0, 1.0);
        item.canonical_subject = None;
        item
    }

    /// True when this item is a meta-fact.
    #[must_use]
    pub const fn is_meta(&self) -> bool {
        self.meta_about.is_some()
    }

    /// True when this item should appear in user-facing listings:
    /// `status == Active` and it is not a meta-fact.
    #[must_use]
    pub const fn is_user_visible(&self) -> bool {
        matches!(self.status, ItemStatus::Active) && !self.is_meta()
    }

    /// Sets the subject, recomputing `canonical_subject`.
    pub fn set_subject(&mut self, subject: Option<String>) {
        self.canonical_subject = subject.as_deref().map(resolve);
        self.subject = subject;
    }

    /// Sets the object, recomputing `canonical_object`.
    pub fn set_object(&mut self, object: Option<String>) {
        self.canonical_object = object.as_deref().map(resolve);
        self.object = object;
    }

    /// The canonical key used by confidence propagation: canonical subject,
    /// falling back to canonical object.
    #[must_use]
    pub fn canonical_key(&self) -> Option<&str> {
        self.canonical_subject
            .as_deref()
            .or(self.canonical_object.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_item_computes_canonical_forms() {
        let item = Item::new(
            Some("我".to_string()),
            Some("prefers".to_string()),
            Some("Dark Mode".to_string()),
        );
        assert_eq!(item.canonical_subject.as_deref(), Some("user"));
        assert_eq!(item.canonical_object.as_deref(), Some("dark mode"));
        assert_eq!(item.confidence, 1.0);
        assert_eq!(item.status, ItemStatus::Active);
        assert!(item.is_user_visible());
    }

    #[test]
    fn meta_fact_has_no_subject_and_is_not_user_visible() {
        let about = Uuid::new_v4();
        let meta = Item::new_meta(about, "has_source", "gpt-4o-mini", 0.9);
        assert!(meta.is_meta());
        assert!(meta.subject.is_none());
        assert!(meta.canonical_subject.is_none());
        assert_eq!(meta.category.as_deref(), Some("meta"));
        assert!(!meta.is_user_visible());
    }

    #[test]
    fn set_subject_recomputes_canonical() {
        let mut item = Item::new(Some("Alice".to_string()), None, None);
        assert_eq!(item.canonical_subject.as_deref(), Some("alice"));
        item.set_subject(Some("js".to_string()));
        assert_eq!(item.canonical_subject.as_deref(), Some("javascript"));
    }

    #[test]
    fn canonical_key_falls_back_to_object() {
        let item = Item::new(None, Some("p".to_string()), Some("Bob".to_string()));
        assert_eq!(item.canonical_key(), Some("bob"));
    }
}
