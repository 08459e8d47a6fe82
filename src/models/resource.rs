//! The `Resource` entity: an append-only raw log entry.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// An append-only raw text log entry fed into the extraction pipeline.
///
/// Resources are created once by ingest and never mutated; they may only be
/// deleted by maintenance when orphaned (no items reference them) and older
/// than an age threshold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resource {
    /// Unique identifier.
    pub id: Uuid,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Free-form source tag, e.g. `project:foo` or `global:user`.
    pub source: String,
    /// Raw text content.
    pub content: String,
    /// Free-form key-value metadata.
    pub metadata: HashMap<String, String>,
}

impl Resource {
    /// Creates a new resource with a fresh id and the current timestamp.
    #[must_use]
    pub fn new(source: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            source: source.into(),
            content: content.into(),
            metadata: HashMap::new(),
        }
    }

    /// Attaches metadata, replacing any existing map.
    #[must_use]
    pub fn with_metadata(mut self, metadata: HashMap<String, String>) -> Self {
        self.metadata = metadata;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_resource_has_fresh_id_and_empty_metadata() {
        let r = Resource::new("project:foo", "some raw text");
        assert_eq!(r.source, "project:foo");
        assert_eq!(r.content, "some raw text");
        assert!(r.metadata.is_empty());
    }

    #[test]
    fn with_metadata_attaches_map() {
        let mut meta = HashMap::new();
        meta.insert("session".to_string(), "abc".to_string());
        let r = Resource::new("global:user", "text").with_metadata(meta.clone());
        assert_eq!(r.metadata, meta);
    }
}
