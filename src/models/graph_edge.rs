//! The `GraphEdge` entity: a directed weighted relation between two
//! canonical entity strings.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directed weighted edge between two canonical entities.
///
/// `subject` and `object` are always canonical (pre-resolved). `weight` is
/// not necessarily normalized across edges; it encodes the strength of
/// that particular relation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GraphEdge {
    /// Unique identifier.
    pub id: Uuid,
    /// Canonical subject entity.
    pub subject: String,
    /// Relationship name.
    pub predicate: String,
    /// Canonical object entity.
    pub object: String,
    /// Strength of the relation, in [0, 1].
    pub weight: f32,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl GraphEdge {
    /// Creates a new edge between two already-canonical entities.
    #[must_use]
    pub fn new(subject: impl Into<String>, predicate: impl Into<String>, object: impl Into<String>, weight: f32) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
            weight: weight.clamp(0.0, 1.0),
            created_at: Utc::now(),
        }
    }

    /// The triple key used for deduplication: `(subject, predicate, object)`.
    #[must_use]
    pub fn triple_key(&self) -> (String, String, String) {
        (self.subject.clone(), self.predicate.clone(), self.object.clone())
    }

    /// Whether this edge touches the given canonical entity on either end.
    #[must_use]
    pub fn touches(&self, entity: &str) -> bool {
        self.subject == entity || self.object == entity
    }

    /// The endpoint of this edge opposite the given entity, if the entity
    /// is one of its endpoints.
    #[must_use]
    pub fn other_end(&self, entity: &str) -> Option<&str> {
        if self.subject == entity {
            Some(&self.object)
        } else if self.object == entity {
            Some(&self.subject)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_edge_clamps_weight() {
        let e = GraphEdge::new("user", "prefers", "dark_mode", 1.5);
        assert!((e.weight - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn touches_and_other_end() {
        let e = GraphEdge::new("user", "uses", "vim", 0.9);
        assert!(e.touches("user"));
        assert!(e.touches("vim"));
        assert!(!e.touches("neovim"));
        assert_eq!(e.other_end("user"), Some("vim"));
        assert_eq!(e.other_end("vim"), Some("user"));
        assert_eq!(e.other_end("neovim"), None);
    }
}
