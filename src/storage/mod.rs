//! Storage abstraction: a polymorphic Unit-of-Work over six repositories.
//!
//! Two concrete backends are supported: [`sqlite`] (the relational backend,
//! standing in for "SQL + vector extension") and, behind the
//! `embedded-backend` feature, [`embedded`] (an in-process, file-backed
//! document/graph store). Call sites never see concrete backend types —
//! only [`UnitOfWork`] and [`UnitOfWorkFactory`] trait objects, constructed
//! via [`build_factory`].

#[cfg(feature = "embedded-backend")]
pub mod embedded;
pub mod sqlite;

use crate::config::StorageBackendKind;
use crate::models::{Category, CategoryAccess, GraphEdge, Item, ItemStatus, Resource};
use crate::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

/// Computes cosine similarity between two vectors of possibly differing
/// lengths (the shorter is treated as zero-padded). Returns 0.0 for a pair
/// of empty vectors.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let len = a.len().max(b.len());
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for i in 0..len {
        let av = a.get(i).copied().unwrap_or(0.0);
        let bv = b.get(i).copied().unwrap_or(0.0);
        dot += av * bv;
        norm_a += av * av;
        norm_b += bv * bv;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// A scoped transaction boundary owning all six repositories for one
/// request. All mutations made through a `UnitOfWork`'s methods share the
/// same underlying transaction; nothing is committed until [`commit`] is
/// called explicitly. Dropping without committing rolls back.
///
/// [`commit`]: UnitOfWork::commit
pub trait UnitOfWork: Send {
    // --- Resources --------------------------------------------------
    /// Inserts a new resource row.
    fn create_resource(&mut self, resource: Resource) -> Result<Resource>;
    /// Fetches a resource by id.
    fn get_resource(&mut self, id: Uuid) -> Result<Option<Resource>>;
    /// Lists resources, optionally filtered by source and creation time,
    /// newest first, capped at `limit`.
    fn list_resources(
        &mut self,
        source: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Resource>>;
    /// Counts all resources.
    fn count_resources(&mut self) -> Result<usize>;
    /// Lists resources that have no items yet (pending extraction).
    fn list_unextracted_resources(&mut self, limit: usize) -> Result<Vec<Resource>>;
    /// Deletes resources with no items older than `max_age_days`, returning
    /// the count deleted.
    fn delete_orphaned_resources(&mut self, max_age_days: i64) -> Result<usize>;

    // --- Items --------------------------------------------------------
    /// Inserts a new item row.
    fn create_item(&mut self, item: Item) -> Result<Item>;
    /// Inserts many item rows in one call.
    fn create_items(&mut self, items: Vec<Item>) -> Result<Vec<Item>>;
    /// Fetches an item by id.
    fn get_item(&mut self, id: Uuid) -> Result<Option<Item>>;
    /// Replaces the mutable fields of an existing item row.
    fn update_item(&mut self, item: Item) -> Result<Item>;
    /// Updates only the status of an item.
    fn update_item_status(&mut self, id: Uuid, status: ItemStatus) -> Result<()>;
    /// Lists active, non-meta items, optionally filtered by category.
    fn list_items(&mut self, category: Option<&str>, limit: usize) -> Result<Vec<Item>>;
    /// Lists items extracted from a given resource.
    fn list_items_by_resource(&mut self, resource_id: Uuid) -> Result<Vec<Item>>;
    /// Lists active, non-meta items by canonical subject.
    fn list_items_by_subject(&mut self, canonical_subject: &str) -> Result<Vec<Item>>;
    /// Counts items, optionally filtered by category, with the given status.
    fn count_items(&mut self, category: Option<&str>, status: ItemStatus) -> Result<usize>;
    /// Finds active items sharing `(canonical_subject, predicate)`,
    /// excluding `exclude_id` if given — candidates for conflict detection.
    fn find_potential_conflicts(
        &mut self,
        canonical_subject: &str,
        predicate: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Item>>;
    /// Lists pairs of active, non-meta items sharing
    /// `(canonical_subject, predicate, canonical_object)`.
    fn list_duplicate_items(&mut self) -> Result<Vec<(Item, Item)>>;
    /// Counts active items with the given canonical subject created within
    /// the last `days` days.
    fn count_items_by_subject_recent(&mut self, canonical_subject: &str, days: i64) -> Result<usize>;
    /// Lists distinct category names among active, non-meta items.
    fn list_distinct_categories(&mut self, status: ItemStatus) -> Result<Vec<String>>;
    /// Lists active items older than `max_age_days` with confidence below
    /// `min_confidence`.
    fn list_old_low_confidence_items(&mut self, max_age_days: i64, min_confidence: f32) -> Result<Vec<Item>>;
    /// Counts items grouped by status.
    fn item_stats_by_status(&mut self) -> Result<HashMap<String, usize>>;
    /// Average confidence across active, non-meta items.
    fn avg_confidence(&mut self) -> Result<f32>;
    /// Lists all item ids with the given status.
    fn list_all_item_ids(&mut self, status: ItemStatus) -> Result<Vec<Uuid>>;
    /// Lists archived items.
    fn list_archived_items(&mut self) -> Result<Vec<Item>>;
    /// Finds the active item whose `supersedes` points at `archived_id`.
    fn get_superseding_item(&mut self, archived_id: Uuid) -> Result<Option<Item>>;
    /// Lists the meta-facts describing the given item.
    fn get_meta_facts(&mut self, item_id: Uuid) -> Result<Vec<Item>>;
    /// Creates a meta-fact describing `about_item_id`.
    fn create_meta_fact(
        &mut self,
        about_item_id: Uuid,
        predicate: &str,
        object: &str,
        confidence: f32,
    ) -> Result<Item>;

    // --- Categories -----------------------------------------------------
    /// Inserts a new category row.
    fn create_category(&mut self, category: Category) -> Result<Category>;
    /// Fetches a category by id.
    fn get_category(&mut self, id: Uuid) -> Result<Option<Category>>;
    /// Fetches a category by name.
    fn get_category_by_name(&mut self, name: &str) -> Result<Option<Category>>;
    /// Lists all categories.
    fn list_categories(&mut self) -> Result<Vec<Category>>;
    /// Updates a category's summary text and `updated_at`.
    fn update_category_summary(&mut self, name: &str, summary: &str) -> Result<()>;
    /// Creates the category row if missing, otherwise returns the existing
    /// one unchanged.
    fn upsert_category(&mut self, name: &str) -> Result<Category>;
    /// Counts active, non-meta items per category.
    fn count_items_per_category(&mut self, status: ItemStatus) -> Result<HashMap<String, usize>>;

    // --- Graph ------------------------------------------------------------
    /// Inserts a new graph edge.
    fn create_edge(&mut self, edge: GraphEdge) -> Result<GraphEdge>;
    /// Inserts many graph edges in one call.
    fn create_edges(&mut self, edges: Vec<GraphEdge>) -> Result<Vec<GraphEdge>>;
    /// Lists edges with the given canonical subject.
    fn get_edges_by_subject(&mut self, subject: &str) -> Result<Vec<GraphEdge>>;
    /// Lists edges with the given canonical object.
    fn get_edges_by_object(&mut self, object: &str) -> Result<Vec<GraphEdge>>;
    /// Lists every edge in the graph.
    fn list_all_edges(&mut self) -> Result<Vec<GraphEdge>>;
    /// Deletes all edges with the given canonical subject, returning the
    /// count deleted.
    fn delete_edges_by_subject(&mut self, subject: &str) -> Result<usize>;
    /// Deletes every edge, returning the count deleted.
    fn delete_all_edges(&mut self) -> Result<usize>;
    /// Updates the weight of the edge identified by `(subject, predicate, object)`.
    fn update_edge_weight(&mut self, subject: &str, predicate: &str, object: &str, weight: f32) -> Result<()>;
    /// Counts all edges.
    fn count_edges(&mut self) -> Result<usize>;

    // --- Embeddings ---------------------------------------------------
    /// Inserts or replaces the embedding for an item.
    fn upsert_embedding(&mut self, item_id: Uuid, vector: Vec<f32>) -> Result<()>;
    /// Fetches the embedding for an item, if one exists.
    fn get_embedding(&mut self, item_id: Uuid) -> Result<Option<Vec<f32>>>;
    /// Deletes the embedding for an item.
    fn delete_embedding(&mut self, item_id: Uuid) -> Result<()>;
    /// Cosine-similarity search over embeddings of items with the given
    /// status, returning the top `limit` results with similarity at least
    /// `min_similarity`.
    fn search_embeddings(
        &mut self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
        status: ItemStatus,
    ) -> Result<Vec<(Item, f32)>>;
    /// Inserts or replaces many embeddings in one call.
    fn batch_upsert_embeddings(&mut self, items: Vec<(Uuid, Vec<f32>)>) -> Result<()>;
    /// Counts all stored embeddings.
    fn count_embeddings(&mut self) -> Result<usize>;
    /// Deletes embeddings whose item id is not present in `active_ids`,
    /// returning the count deleted.
    fn delete_stale_embeddings(&mut self, active_ids: &[Uuid]) -> Result<usize>;

    // --- Category access ------------------------------------------------
    /// Records a category access.
    fn record_category_access(&mut self, access: CategoryAccess) -> Result<()>;
    /// Lists recent category accesses, optionally filtered by category and
    /// time, newest first.
    fn recent_category_access(
        &mut self,
        category: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<CategoryAccess>>;
    /// Counts accesses for a category since a given time.
    fn count_category_access(&mut self, category: &str, since: Option<DateTime<Utc>>) -> Result<usize>;
    /// Deletes access rows older than `before`, returning the count deleted.
    fn cleanup_old_category_access(&mut self, before: DateTime<Utc>) -> Result<usize>;

    /// Commits the transaction. Consumes the box so a dropped-without-commit
    /// `UnitOfWork` can never be mistaken for a committed one.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying commit statement fails.
    fn commit(self: Box<Self>) -> Result<()>;
}

/// Constructs `UnitOfWork` instances for a configured backend.
pub trait UnitOfWorkFactory: Send + Sync {
    /// Begins a new transaction-scoped Unit of Work.
    ///
    /// # Errors
    ///
    /// Returns an error if a transaction could not be started.
    fn begin(&self) -> Result<Box<dyn UnitOfWork>>;
}

/// Constructs the configured storage backend's factory.
///
/// # Errors
///
/// Returns an error if the backend cannot be initialized (e.g. the SQLite
/// file cannot be created, or the embedded backend's data directory is not
/// writable).
pub fn build_factory(settings: &crate::config::Settings) -> Result<Box<dyn UnitOfWorkFactory>> {
    match settings.storage.backend {
        StorageBackendKind::Relational => {
            let factory = sqlite::SqliteUnitOfWorkFactory::open(&settings.storage.connection_string)?;
            Ok(Box::new(factory))
        },
        StorageBackendKind::Embedded => {
            #[cfg(feature = "embedded-backend")]
            {
                let factory = embedded::EmbeddedUnitOfWorkFactory::open(&settings.storage.data_dir)?;
                Ok(Box::new(factory))
            }
            #[cfg(not(feature = "embedded-backend"))]
            {
                Err(crate::Error::Config(
                    "embedded backend selected but the crate was built without the `embedded-backend` feature".to_string(),
                ))
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn cosine_similarity_orthogonal_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_handles_unequal_lengths() {
        let a = vec![1.0, 1.0];
        let b = vec![1.0, 1.0, 0.0, 0.0];
        let sim = cosine_similarity(&a, &b);
        assert!(sim > 0.0);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
