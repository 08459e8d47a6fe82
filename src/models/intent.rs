//! The `Intent` tagged union: the four retrieval strategies a query can map to.

/// A query's classified retrieval intent.
///
/// Classification order is fixed: entity lookup, then temporal, then
/// aspect filter, then semantic search as the default fallthrough.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// Query asks about a specific entity, e.g. `about Alice`.
    EntityLookup {
        /// The (not yet canonicalized) entity name extracted from the query.
        entity: String,
    },
    /// Query asks for recent activity within a window.
    Temporal {
        /// How many days back to search.
        days: u32,
    },
    /// Query names a fixed category keyword.
    AspectFilter {
        /// The matched category name.
        category: String,
    },
    /// Default: embed the query and run vector similarity search.
    SemanticSearch,
}

impl Intent {
    /// A short machine-readable tag for the intent, as surfaced in API
    /// responses (`intent` field). `SemanticSearch` results reached via the
    /// zero-result fallback are tagged `SemanticSearch(fallback)` by the
    /// caller, not here.
    #[must_use]
    pub fn tag(&self) -> String {
        match self {
            Self::EntityLookup { .. } => "EntityLookup".to_string(),
            Self::Temporal { .. } => "Temporal".to_string(),
            Self::AspectFilter { .. } => "AspectFilter".to_string(),
            Self::SemanticSearch => "SemanticSearch".to_string(),
        }
    }
}
