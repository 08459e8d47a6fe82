//! The embedded storage backend: an in-process, file-backed document/graph
//! store with a brute-force nearest-neighbor index, standing in for an
//! HNSW-backed embedded database. Gated behind the `embedded-backend`
//! feature, grounded on the teacher's own brute-force `UsearchBackend`.

use super::{cosine_similarity, UnitOfWork, UnitOfWorkFactory};
use crate::models::{Category, CategoryAccess, GraphEdge, Item, ItemStatus, Resource};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Document {
    resources: HashMap<Uuid, Resource>,
    items: HashMap<Uuid, Item>,
    categories: HashMap<Uuid, Category>,
    edges: HashMap<Uuid, GraphEdge>,
    embeddings: HashMap<Uuid, Vec<f32>>,
    category_accesses: HashMap<Uuid, CategoryAccess>,
}

/// Constructs `EmbeddedUnitOfWork` instances over a single file-backed
/// document, serialized by a standard mutex held for each transaction's
/// lifetime.
pub struct EmbeddedUnitOfWorkFactory {
    path: PathBuf,
    doc: Arc<Mutex<Document>>,
}

impl EmbeddedUnitOfWorkFactory {
    /// Opens (creating if necessary) the data directory and loads
    /// `memory.json` into memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or the existing
    /// document cannot be parsed.
    pub fn open(data_dir: &Path) -> Result<Self> {
        std::fs::create_dir_all(data_dir)
            .map_err(|e| Error::BackendError { operation: "create_data_dir".to_string(), cause: e.to_string() })?;
        let path = data_dir.join("memory.json");
        let doc = if path.exists() {
            let raw = std::fs::read_to_string(&path)
                .map_err(|e| Error::BackendError { operation: "read_document".to_string(), cause: e.to_string() })?;
            serde_json::from_str(&raw)
                .map_err(|e| Error::BackendError { operation: "parse_document".to_string(), cause: e.to_string() })?
        } else {
            Document::default()
        };
        Ok(Self { path, doc: Arc::new(Mutex::new(doc)) })
    }
}

impl UnitOfWorkFactory for EmbeddedUnitOfWorkFactory {
    fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let guard = self
            .doc
            .lock()
            .map_err(|_| Error::BackendError { operation: "begin".to_string(), cause: "poisoned mutex".to_string() })?;
        let snapshot = guard.clone();
        drop(guard);
        Ok(Box::new(EmbeddedUnitOfWork {
            factory_path: self.path.clone(),
            doc_handle: self.doc.clone(),
            working: snapshot,
            committed: false,
        }))
    }
}

/// A transaction-scoped handle over an in-memory document snapshot. Commits
/// replace the shared document wholesale and flush it to disk; dropping
/// without committing discards the snapshot.
pub struct EmbeddedUnitOfWork {
    factory_path: PathBuf,
    doc_handle: Arc<Mutex<Document>>,
    working: Document,
    committed: bool,
}

impl EmbeddedUnitOfWork {
    fn lock(&self) -> Result<MutexGuard<'_, Document>> {
        self.doc_handle
            .lock()
            .map_err(|_| Error::BackendError { operation: "lock".to_string(), cause: "poisoned mutex".to_string() })
    }
}

impl UnitOfWork for EmbeddedUnitOfWork {
    fn create_resource(&mut self, resource: Resource) -> Result<Resource> {
        self.working.resources.insert(resource.id, resource.clone());
        Ok(resource)
    }

    fn get_resource(&mut self, id: Uuid) -> Result<Option<Resource>> {
        Ok(self.working.resources.get(&id).cloned())
    }

    fn list_resources(&mut self, source: Option<&str>, since: Option<DateTime<Utc>>, limit: usize) -> Result<Vec<Resource>> {
        let mut out: Vec<Resource> = self
            .working
            .resources
            .values()
            .filter(|r| source.is_none_or(|s| r.source == s))
            .filter(|r| since.is_none_or(|t| r.created_at >= t))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    fn count_resources(&mut self) -> Result<usize> {
        Ok(self.working.resources.len())
    }

    fn list_unextracted_resources(&mut self, limit: usize) -> Result<Vec<Resource>> {
        let mut out: Vec<Resource> = self
            .working
            .resources
            .values()
            .filter(|r| !self.working.items.values().any(|i| i.resource_id == Some(r.id)))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        out.truncate(limit);
        Ok(out)
    }

    fn delete_orphaned_resources(&mut self, max_age_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        let ids: Vec<Uuid> = self
            .working
            .resources
            .values()
            .filter(|r| r.created_at < cutoff && !self.working.items.values().any(|i| i.resource_id == Some(r.id)))
            .map(|r| r.id)
            .collect();
        for id in &ids {
            self.working.resources.remove(id);
        }
        Ok(ids.len())
    }

    fn create_item(&mut self, item: Item) -> Result<Item> {
        self.working.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn create_items(&mut self, items: Vec<Item>) -> Result<Vec<Item>> {
        items.into_iter().map(|i| self.create_item(i)).collect()
    }

    fn get_item(&mut self, id: Uuid) -> Result<Option<Item>> {
        Ok(self.working.items.get(&id).cloned())
    }

    fn update_item(&mut self, item: Item) -> Result<Item> {
        self.working.items.insert(item.id, item.clone());
        Ok(item)
    }

    fn update_item_status(&mut self, id: Uuid, status: ItemStatus) -> Result<()> {
        if let Some(item) = self.working.items.get_mut(&id) {
            item.status = status;
        }
        Ok(())
    }

    fn list_items(&mut self, category: Option<&str>, limit: usize) -> Result<Vec<Item>> {
        let mut out: Vec<Item> = self
            .working
            .items
            .values()
            .filter(|i| i.is_user_visible())
            .filter(|i| category.is_none_or(|c| i.category.as_deref() == Some(c)))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out.truncate(limit);
        Ok(out)
    }

    fn list_items_by_resource(&mut self, resource_id: Uuid) -> Result<Vec<Item>> {
        let mut out: Vec<Item> =
            self.working.items.values().filter(|i| i.resource_id == Some(resource_id)).cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(out)
    }

    fn list_items_by_subject(&mut self, canonical_subject: &str) -> Result<Vec<Item>> {
        let mut out: Vec<Item> = self
            .working
            .items
            .values()
            .filter(|i| i.is_user_visible() && i.canonical_subject.as_deref() == Some(canonical_subject))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(out)
    }

    fn count_items(&mut self, category: Option<&str>, status: ItemStatus) -> Result<usize> {
        Ok(self
            .working
            .items
            .values()
            .filter(|i| i.status == status)
            .filter(|i| category.is_none_or(|c| i.category.as_deref() == Some(c)))
            .count())
    }

    fn find_potential_conflicts(
        &mut self,
        canonical_subject: &str,
        predicate: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Item>> {
        Ok(self
            .working
            .items
            .values()
            .filter(|i| i.status == ItemStatus::Active)
            .filter(|i| i.canonical_subject.as_deref() == Some(canonical_subject))
            .filter(|i| i.predicate.as_deref() == Some(predicate))
            .filter(|i| exclude_id.is_none_or(|ex| i.id != ex))
            .cloned()
            .collect())
    }

    fn list_duplicate_items(&mut self) -> Result<Vec<(Item, Item)>> {
        let mut seen: HashMap<(String, String, String), Item> = HashMap::new();
        let mut pairs = Vec::new();
        let mut items: Vec<Item> = self.working.items.values().filter(|i| i.is_user_visible()).cloned().collect();
        items.sort_by_key(|i| i.created_at);
        for item in items {
            let (Some(cs), Some(co)) = (item.canonical_subject.clone(), item.canonical_object.clone()) else { continue };
            let key = (cs, item.predicate.clone().unwrap_or_default(), co);
            if let Some(first) = seen.get(&key) {
                pairs.push((first.clone(), item));
            } else {
                seen.insert(key, item);
            }
        }
        Ok(pairs)
    }

    fn count_items_by_subject_recent(&mut self, canonical_subject: &str, days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(days);
        Ok(self
            .working
            .items
            .values()
            .filter(|i| {
                i.status == ItemStatus::Active && i.canonical_subject.as_deref() == Some(canonical_subject) && i.created_at >= cutoff
            })
            .count())
    }

    fn list_distinct_categories(&mut self, status: ItemStatus) -> Result<Vec<String>> {
        let mut set: std::collections::BTreeSet<String> = std::collections::BTreeSet::new();
        for i in self.working.items.values().filter(|i| i.status == status && !i.is_meta()) {
            if let Some(c) = &i.category {
                set.insert(c.clone());
            }
        }
        Ok(set.into_iter().collect())
    }

    fn list_old_low_confidence_items(&mut self, max_age_days: i64, min_confidence: f32) -> Result<Vec<Item>> {
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        Ok(self
            .working
            .items
            .values()
            .filter(|i| i.status == ItemStatus::Active && i.created_at < cutoff && i.confidence < min_confidence)
            .cloned()
            .collect())
    }

    fn item_stats_by_status(&mut self) -> Result<HashMap<String, usize>> {
        let mut out = HashMap::new();
        for i in self.working.items.values() {
            *out.entry(i.status.to_string()).or_insert(0) += 1;
        }
        Ok(out)
    }

    fn avg_confidence(&mut self) -> Result<f32> {
        let active: Vec<f32> = self
            .working
            .items
            .values()
            .filter(|i| i.is_user_visible())
            .map(|i| i.confidence)
            .collect();
        if active.is_empty() {
            return Ok(0.0);
        }
        Ok(active.iter().sum::<f32>() / active.len() as f32)
    }

    fn list_all_item_ids(&mut self, status: ItemStatus) -> Result<Vec<Uuid>> {
        Ok(self.working.items.values().filter(|i| i.status == status).map(|i| i.id).collect())
    }

    fn list_archived_items(&mut self) -> Result<Vec<Item>> {
        Ok(self.working.items.values().filter(|i| i.status == ItemStatus::Archived).cloned().collect())
    }

    fn get_superseding_item(&mut self, archived_id: Uuid) -> Result<Option<Item>> {
        Ok(self.working.items.values().find(|i| i.supersedes == Some(archived_id)).cloned())
    }

    fn get_meta_facts(&mut self, item_id: Uuid) -> Result<Vec<Item>> {
        let mut out: Vec<Item> =
            self.working.items.values().filter(|i| i.meta_about == Some(item_id)).cloned().collect();
        out.sort_by_key(|i| i.created_at);
        Ok(out)
    }

    fn create_meta_fact(&mut self, about_item_id: Uuid, predicate: &str, object: &str, confidence: f32) -> Result<Item> {
        let item = Item::new_meta(about_item_id, predicate, object, confidence);
        self.create_item(item)
    }

    fn create_category(&mut self, category: Category) -> Result<Category> {
        self.working.categories.insert(category.id, category.clone());
        Ok(category)
    }

    fn get_category(&mut self, id: Uuid) -> Result<Option<Category>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    fn get_category_by_name(&mut self, name: &str) -> Result<Option<Category>> {
        Ok(self.working.categories.values().find(|c| c.name == name).cloned())
    }

    fn list_categories(&mut self) -> Result<Vec<Category>> {
        let mut out: Vec<Category> = self.working.categories.values().cloned().collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }

    fn update_category_summary(&mut self, name: &str, summary: &str) -> Result<()> {
        if let Some(cat) = self.working.categories.values_mut().find(|c| c.name == name) {
            cat.summary = Some(summary.to_string());
            cat.updated_at = Utc::now();
        }
        Ok(())
    }

    fn upsert_category(&mut self, name: &str) -> Result<Category> {
        if let Some(existing) = self.get_category_by_name(name)? {
            return Ok(existing);
        }
        self.create_category(Category::new(name))
    }

    fn count_items_per_category(&mut self, status: ItemStatus) -> Result<HashMap<String, usize>> {
        let mut out = HashMap::new();
        for i in self.working.items.values().filter(|i| i.status == status && !i.is_meta()) {
            if let Some(c) = &i.category {
                *out.entry(c.clone()).or_insert(0) += 1;
            }
        }
        Ok(out)
    }

    fn create_edge(&mut self, edge: GraphEdge) -> Result<GraphEdge> {
        self.working.edges.insert(edge.id, edge.clone());
        Ok(edge)
    }

    fn create_edges(&mut self, edges: Vec<GraphEdge>) -> Result<Vec<GraphEdge>> {
        edges.into_iter().map(|e| self.create_edge(e)).collect()
    }

    fn get_edges_by_subject(&mut self, subject: &str) -> Result<Vec<GraphEdge>> {
        Ok(self.working.edges.values().filter(|e| e.subject == subject).cloned().collect())
    }

    fn get_edges_by_object(&mut self, object: &str) -> Result<Vec<GraphEdge>> {
        Ok(self.working.edges.values().filter(|e| e.object == object).cloned().collect())
    }

    fn list_all_edges(&mut self) -> Result<Vec<GraphEdge>> {
        Ok(self.working.edges.values().cloned().collect())
    }

    fn delete_edges_by_subject(&mut self, subject: &str) -> Result<usize> {
        let ids: Vec<Uuid> = self.working.edges.values().filter(|e| e.subject == subject).map(|e| e.id).collect();
        for id in &ids {
            self.working.edges.remove(id);
        }
        Ok(ids.len())
    }

    fn delete_all_edges(&mut self) -> Result<usize> {
        let n = self.working.edges.len();
        self.working.edges.clear();
        Ok(n)
    }

    fn update_edge_weight(&mut self, subject: &str, predicate: &str, object: &str, weight: f32) -> Result<()> {
        if let Some(edge) =
            self.working.edges.values_mut().find(|e| e.subject == subject && e.predicate == predicate && e.object == object)
        {
            edge.weight = weight.clamp(0.0, 1.0);
        }
        Ok(())
    }

    fn count_edges(&mut self) -> Result<usize> {
        Ok(self.working.edges.len())
    }

    fn upsert_embedding(&mut self, item_id: Uuid, vector: Vec<f32>) -> Result<()> {
        self.working.embeddings.insert(item_id, vector);
        Ok(())
    }

    fn get_embedding(&mut self, item_id: Uuid) -> Result<Option<Vec<f32>>> {
        Ok(self.working.embeddings.get(&item_id).cloned())
    }

    fn delete_embedding(&mut self, item_id: Uuid) -> Result<()> {
        self.working.embeddings.remove(&item_id);
        Ok(())
    }

    fn search_embeddings(
        &mut self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
        status: ItemStatus,
    ) -> Result<Vec<(Item, f32)>> {
        let mut scored: Vec<(Item, f32)> = self
            .working
            .embeddings
            .iter()
            .filter_map(|(id, vec)| {
                let item = self.working.items.get(id)?;
                if item.status != status || item.is_meta() {
                    return None;
                }
                let sim = cosine_similarity(query, vec);
                (sim >= min_similarity).then(|| (item.clone(), sim))
            })
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    fn batch_upsert_embeddings(&mut self, items: Vec<(Uuid, Vec<f32>)>) -> Result<()> {
        for (id, vec) in items {
            self.working.embeddings.insert(id, vec);
        }
        Ok(())
    }

    fn count_embeddings(&mut self) -> Result<usize> {
        Ok(self.working.embeddings.len())
    }

    fn delete_stale_embeddings(&mut self, active_ids: &[Uuid]) -> Result<usize> {
        let active: std::collections::HashSet<Uuid> = active_ids.iter().copied().collect();
        let stale: Vec<Uuid> = self.working.embeddings.keys().filter(|id| !active.contains(id)).copied().collect();
        for id in &stale {
            self.working.embeddings.remove(id);
        }
        Ok(stale.len())
    }

    fn record_category_access(&mut self, access: CategoryAccess) -> Result<()> {
        self.working.category_accesses.insert(access.id, access);
        Ok(())
    }

    fn recent_category_access(
        &mut self,
        category: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<CategoryAccess>> {
        let mut out: Vec<CategoryAccess> = self
            .working
            .category_accesses
            .values()
            .filter(|a| category.is_none_or(|c| a.category == c))
            .filter(|a| since.is_none_or(|t| a.accessed_at >= t))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.accessed_at.cmp(&a.accessed_at));
        out.truncate(limit);
        Ok(out)
    }

    fn count_category_access(&mut self, category: &str, since: Option<DateTime<Utc>>) -> Result<usize> {
        Ok(self
            .working
            .category_accesses
            .values()
            .filter(|a| a.category == category)
            .filter(|a| since.is_none_or(|t| a.accessed_at >= t))
            .count())
    }

    fn cleanup_old_category_access(&mut self, before: DateTime<Utc>) -> Result<usize> {
        let ids: Vec<Uuid> =
            self.working.category_accesses.values().filter(|a| a.accessed_at < before).map(|a| a.id).collect();
        for id in &ids {
            self.working.category_accesses.remove(id);
        }
        Ok(ids.len())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        let mut guard = self.lock()?;
        *guard = self.working.clone();
        drop(guard);
        self.factory_flush()?;
        self.committed = true;
        Ok(())
    }
}

impl EmbeddedUnitOfWork {
    fn factory_flush(&self) -> Result<()> {
        let raw = serde_json::to_string(&self.working)
            .map_err(|e| Error::BackendError { operation: "serialize_document".to_string(), cause: e.to_string() })?;
        std::fs::write(&self.factory_path, raw)
            .map_err(|e| Error::BackendError { operation: "write_document".to_string(), cause: e.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> (tempfile::TempDir, EmbeddedUnitOfWorkFactory) {
        let dir = tempfile::tempdir().expect("tempdir");
        let f = EmbeddedUnitOfWorkFactory::open(dir.path()).expect("open embedded store");
        (dir, f)
    }

    #[test]
    fn create_and_get_item_round_trips() {
        let (_dir, f) = factory();
        let mut uow = f.begin().unwrap();
        let item = Item::new(Some("user".to_string()), Some("prefers".to_string()), Some("dark_mode".to_string()));
        let created = uow.create_item(item).unwrap();
        let fetched = uow.get_item(created.id).unwrap().unwrap();
        assert_eq!(fetched.canonical_subject.as_deref(), Some("user"));
        uow.commit().unwrap();
    }

    #[test]
    fn uncommitted_changes_do_not_persist() {
        let (_dir, f) = factory();
        {
            let mut uow = f.begin().unwrap();
            uow.create_item(Item::new(Some("user".to_string()), Some("likes".to_string()), Some("rust".to_string())))
                .unwrap();
        }
        let mut uow2 = f.begin().unwrap();
        assert_eq!(uow2.count_items(None, ItemStatus::Active).unwrap(), 0);
        uow2.commit().unwrap();
    }

    #[test]
    fn reopening_loads_persisted_document() {
        let dir = tempfile::tempdir().unwrap();
        {
            let f = EmbeddedUnitOfWorkFactory::open(dir.path()).unwrap();
            let mut uow = f.begin().unwrap();
            uow.create_item(Item::new(Some("user".to_string()), Some("likes".to_string()), Some("rust".to_string())))
                .unwrap();
            uow.commit().unwrap();
        }
        let f2 = EmbeddedUnitOfWorkFactory::open(dir.path()).unwrap();
        let mut uow2 = f2.begin().unwrap();
        assert_eq!(uow2.count_items(None, ItemStatus::Active).unwrap(), 1);
        uow2.commit().unwrap();
    }
}
