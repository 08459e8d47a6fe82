//! The `CategoryAccess` entity: a retrieval-pressure log.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A single recorded access to a category, used only to compute the
/// dynamic factor in priority scoring (§4.7). Maintenance prunes old rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoryAccess {
    /// Unique identifier.
    pub id: Uuid,
    /// The category that was accessed.
    pub category: String,
    /// When the access happened.
    pub accessed_at: DateTime<Utc>,
    /// Where the access originated, e.g. `context`, `recall`, `api`.
    pub source: String,
}

impl CategoryAccess {
    /// Records a new access at the current time.
    #[must_use]
    pub fn new(category: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            category: category.into(),
            accessed_at: Utc::now(),
            source: source.into(),
        }
    }
}
