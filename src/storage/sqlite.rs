//! The relational storage backend: SQLite via `rusqlite`, standing in for
//! "SQL + a cosine-distance vector extension" — vectors are persisted as
//! BLOBs and compared in Rust.

use super::{cosine_similarity, UnitOfWork, UnitOfWorkFactory};
use crate::models::{Category, CategoryAccess, GraphEdge, Item, ItemStatus, Resource};
use crate::{Error, Result};
use chrono::{DateTime, TimeZone, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS resources (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    source TEXT NOT NULL,
    content TEXT NOT NULL,
    metadata TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_resources_created_at ON resources(created_at);
CREATE INDEX IF NOT EXISTS idx_resources_source ON resources(source);

CREATE TABLE IF NOT EXISTS items (
    id TEXT PRIMARY KEY,
    created_at TEXT NOT NULL,
    resource_id TEXT,
    subject TEXT,
    predicate TEXT,
    object TEXT,
    canonical_subject TEXT,
    canonical_object TEXT,
    category TEXT,
    confidence REAL NOT NULL,
    status TEXT NOT NULL,
    supersedes TEXT,
    meta_about TEXT
);
CREATE INDEX IF NOT EXISTS idx_items_category ON items(category);
CREATE INDEX IF NOT EXISTS idx_items_status ON items(status);
CREATE INDEX IF NOT EXISTS idx_items_canonical_subject ON items(canonical_subject);
CREATE INDEX IF NOT EXISTS idx_items_canonical_object ON items(canonical_object);
CREATE INDEX IF NOT EXISTS idx_items_meta_about ON items(meta_about);
CREATE INDEX IF NOT EXISTS idx_items_created_at ON items(created_at);

CREATE TABLE IF NOT EXISTS categories (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL UNIQUE,
    summary TEXT,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS graph_edges (
    id TEXT PRIMARY KEY,
    subject TEXT NOT NULL,
    predicate TEXT NOT NULL,
    object TEXT NOT NULL,
    weight REAL NOT NULL,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_edges_subject ON graph_edges(subject);
CREATE INDEX IF NOT EXISTS idx_edges_object ON graph_edges(object);

CREATE TABLE IF NOT EXISTS embeddings (
    item_id TEXT PRIMARY KEY,
    vector BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS category_accesses (
    id TEXT PRIMARY KEY,
    category TEXT NOT NULL,
    accessed_at TEXT NOT NULL,
    source TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_accesses_category ON category_accesses(category);
CREATE INDEX IF NOT EXISTS idx_accesses_accessed_at ON category_accesses(accessed_at);
";

fn vector_to_blob(v: &[f32]) -> Vec<u8> {
    v.iter().flat_map(|f| f.to_le_bytes()).collect()
}

fn blob_to_vector(b: &[u8]) -> Vec<f32> {
    b.chunks_exact(4).map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]])).collect()
}

fn metadata_to_json(m: &HashMap<String, String>) -> String {
    serde_json::to_string(m).unwrap_or_else(|_| "{}".to_string())
}

fn metadata_from_json(s: &str) -> HashMap<String, String> {
    serde_json::from_str(s).unwrap_or_default()
}

fn parse_dt(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s).map(|d| d.with_timezone(&Utc)).unwrap_or_else(|_| Utc.timestamp_opt(0, 0).unwrap())
}

fn row_to_resource(row: &Row) -> rusqlite::Result<Resource> {
    let id: String = row.get("id")?;
    let created_at: String = row.get("created_at")?;
    let metadata: String = row.get("metadata")?;
    Ok(Resource {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        created_at: parse_dt(&created_at),
        source: row.get("source")?,
        content: row.get("content")?,
        metadata: metadata_from_json(&metadata),
    })
}

fn row_to_item(row: &Row) -> rusqlite::Result<Item> {
    let id: String = row.get("id")?;
    let created_at: String = row.get("created_at")?;
    let resource_id: Option<String> = row.get("resource_id")?;
    let status: String = row.get("status")?;
    let supersedes: Option<String> = row.get("supersedes")?;
    let meta_about: Option<String> = row.get("meta_about")?;
    Ok(Item {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        created_at: parse_dt(&created_at),
        resource_id: resource_id.and_then(|s| Uuid::parse_str(&s).ok()),
        subject: row.get("subject")?,
        predicate: row.get("predicate")?,
        object: row.get("object")?,
        canonical_subject: row.get("canonical_subject")?,
        canonical_object: row.get("canonical_object")?,
        category: row.get("category")?,
        confidence: row.get("confidence")?,
        status: ItemStatus::from_str(&status).unwrap_or(ItemStatus::Active),
        supersedes: supersedes.and_then(|s| Uuid::parse_str(&s).ok()),
        meta_about: meta_about.and_then(|s| Uuid::parse_str(&s).ok()),
        embedding: None,
    })
}

fn row_to_category(row: &Row) -> rusqlite::Result<Category> {
    let id: String = row.get("id")?;
    let updated_at: String = row.get("updated_at")?;
    Ok(Category {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        name: row.get("name")?,
        summary: row.get("summary")?,
        updated_at: parse_dt(&updated_at),
    })
}

fn row_to_edge(row: &Row) -> rusqlite::Result<GraphEdge> {
    let id: String = row.get("id")?;
    let created_at: String = row.get("created_at")?;
    Ok(GraphEdge {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        subject: row.get("subject")?,
        predicate: row.get("predicate")?,
        object: row.get("object")?,
        weight: row.get("weight")?,
        created_at: parse_dt(&created_at),
    })
}

fn row_to_access(row: &Row) -> rusqlite::Result<CategoryAccess> {
    let id: String = row.get("id")?;
    let accessed_at: String = row.get("accessed_at")?;
    Ok(CategoryAccess {
        id: Uuid::parse_str(&id).unwrap_or_default(),
        category: row.get("category")?,
        accessed_at: parse_dt(&accessed_at),
        source: row.get("source")?,
    })
}

fn sql_err(operation: &str, e: rusqlite::Error) -> Error {
    Error::BackendError { operation: operation.to_string(), cause: e.to_string() }
}

/// Constructs `SqliteUnitOfWork` instances against a single shared
/// connection, serialized by an owned mutex guard held for the lifetime of
/// each transaction.
pub struct SqliteUnitOfWorkFactory {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteUnitOfWorkFactory {
    /// Opens (creating if necessary) the database at `connection_string`
    /// and applies the schema.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection cannot be opened or the schema
    /// cannot be applied.
    pub fn open(connection_string: &str) -> Result<Self> {
        let path = connection_string.strip_prefix("sqlite://").unwrap_or(connection_string);
        let conn = if path == ":memory:" {
            Connection::open_in_memory()
        } else {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent).map_err(|e| Error::BackendError {
                        operation: "create_data_dir".to_string(),
                        cause: e.to_string(),
                    })?;
                }
            }
            Connection::open(path)
        }
        .map_err(|e| sql_err("open", e))?;

        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;").map_err(|e| sql_err("pragma", e))?;
        conn.execute_batch(SCHEMA).map_err(|e| sql_err("migrate", e))?;

        Ok(Self { conn: Arc::new(Mutex::new(conn)) })
    }
}

impl UnitOfWorkFactory for SqliteUnitOfWorkFactory {
    fn begin(&self) -> Result<Box<dyn UnitOfWork>> {
        let conn = self.conn.clone();
        let mut guard: OwnedMutexGuard<Connection> = conn.blocking_lock_owned();
        guard.execute_batch("BEGIN IMMEDIATE").map_err(|e| sql_err("begin", e))?;
        Ok(Box::new(SqliteUnitOfWork { conn: guard, committed: false }))
    }
}

/// A transaction-scoped handle over a locked SQLite connection.
pub struct SqliteUnitOfWork {
    conn: OwnedMutexGuard<Connection>,
    committed: bool,
}

impl Drop for SqliteUnitOfWork {
    fn drop(&mut self) {
        if !self.committed {
            let _ = self.conn.execute_batch("ROLLBACK");
        }
    }
}

impl UnitOfWork for SqliteUnitOfWork {
    fn create_resource(&mut self, resource: Resource) -> Result<Resource> {
        self.conn
            .execute(
                "INSERT INTO resources (id, created_at, source, content, metadata) VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    resource.id.to_string(),
                    resource.created_at.to_rfc3339(),
                    resource.source,
                    resource.content,
                    metadata_to_json(&resource.metadata),
                ],
            )
            .map_err(|e| sql_err("create_resource", e))?;
        Ok(resource)
    }

    fn get_resource(&mut self, id: Uuid) -> Result<Option<Resource>> {
        self.conn
            .query_row("SELECT * FROM resources WHERE id = ?1", params![id.to_string()], row_to_resource)
            .optional()
            .map_err(|e| sql_err("get_resource", e))
    }

    fn list_resources(
        &mut self,
        source: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<Resource>> {
        let mut sql = "SELECT * FROM resources WHERE 1=1".to_string();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(s) = source {
            sql.push_str(" AND source = ?");
            args.push(Box::new(s.to_string()));
        }
        if let Some(t) = since {
            sql.push_str(" AND created_at >= ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        args.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));

        let mut stmt = self.conn.prepare(&sql).map_err(|e| sql_err("list_resources", e))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(std::convert::AsRef::as_ref).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_resource)
            .map_err(|e| sql_err("list_resources", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_resources", e))
    }

    fn count_resources(&mut self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM resources", [], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| sql_err("count_resources", e))
    }

    fn list_unextracted_resources(&mut self, limit: usize) -> Result<Vec<Resource>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT r.* FROM resources r LEFT JOIN items i ON i.resource_id = r.id \
                 WHERE i.id IS NULL ORDER BY r.created_at ASC LIMIT ?1",
            )
            .map_err(|e| sql_err("list_unextracted_resources", e))?;
        let rows = stmt
            .query_map(params![i64::try_from(limit).unwrap_or(i64::MAX)], row_to_resource)
            .map_err(|e| sql_err("list_unextracted_resources", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_unextracted_resources", e))
    }

    fn delete_orphaned_resources(&mut self, max_age_days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(max_age_days)).to_rfc3339();
        self.conn
            .execute(
                "DELETE FROM resources WHERE created_at < ?1 AND id NOT IN (SELECT resource_id FROM items WHERE resource_id IS NOT NULL)",
                params![cutoff],
            )
            .map_err(|e| sql_err("delete_orphaned_resources", e))
    }

    fn create_item(&mut self, item: Item) -> Result<Item> {
        self.conn
            .execute(
                "INSERT INTO items (id, created_at, resource_id, subject, predicate, object, \
                 canonical_subject, canonical_object, category, confidence, status, supersedes, meta_about) \
                 VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13)",
                params![
                    item.id.to_string(),
                    item.created_at.to_rfc3339(),
                    item.resource_id.map(|u| u.to_string()),
                    item.subject,
                    item.predicate,
                    item.object,
                    item.canonical_subject,
                    item.canonical_object,
                    item.category,
                    item.confidence,
                    item.status.to_string(),
                    item.supersedes.map(|u| u.to_string()),
                    item.meta_about.map(|u| u.to_string()),
                ],
            )
            .map_err(|e| sql_err("create_item", e))?;
        Ok(item)
    }

    fn create_items(&mut self, items: Vec<Item>) -> Result<Vec<Item>> {
        items.into_iter().map(|i| self.create_item(i)).collect()
    }

    fn get_item(&mut self, id: Uuid) -> Result<Option<Item>> {
        self.conn
            .query_row("SELECT * FROM items WHERE id = ?1", params![id.to_string()], row_to_item)
            .optional()
            .map_err(|e| sql_err("get_item", e))
    }

    fn update_item(&mut self, item: Item) -> Result<Item> {
        self.conn
            .execute(
                "UPDATE items SET subject=?2, predicate=?3, object=?4, canonical_subject=?5, \
                 canonical_object=?6, category=?7, confidence=?8, status=?9, supersedes=?10, meta_about=?11 \
                 WHERE id=?1",
                params![
                    item.id.to_string(),
                    item.subject,
                    item.predicate,
                    item.object,
                    item.canonical_subject,
                    item.canonical_object,
                    item.category,
                    item.confidence,
                    item.status.to_string(),
                    item.supersedes.map(|u| u.to_string()),
                    item.meta_about.map(|u| u.to_string()),
                ],
            )
            .map_err(|e| sql_err("update_item", e))?;
        Ok(item)
    }

    fn update_item_status(&mut self, id: Uuid, status: ItemStatus) -> Result<()> {
        self.conn
            .execute("UPDATE items SET status = ?2 WHERE id = ?1", params![id.to_string(), status.to_string()])
            .map_err(|e| sql_err("update_item_status", e))?;
        Ok(())
    }

    fn list_items(&mut self, category: Option<&str>, limit: usize) -> Result<Vec<Item>> {
        let mut sql = "SELECT * FROM items WHERE status = 'active' AND meta_about IS NULL".to_string();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(c) = category {
            sql.push_str(" AND category = ?");
            args.push(Box::new(c.to_string()));
        }
        sql.push_str(" ORDER BY created_at DESC LIMIT ?");
        args.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        let mut stmt = self.conn.prepare(&sql).map_err(|e| sql_err("list_items", e))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(std::convert::AsRef::as_ref).collect();
        let rows = stmt.query_map(param_refs.as_slice(), row_to_item).map_err(|e| sql_err("list_items", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_items", e))
    }

    fn list_items_by_resource(&mut self, resource_id: Uuid) -> Result<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM items WHERE resource_id = ?1 ORDER BY created_at ASC")
            .map_err(|e| sql_err("list_items_by_resource", e))?;
        let rows = stmt
            .query_map(params![resource_id.to_string()], row_to_item)
            .map_err(|e| sql_err("list_items_by_resource", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_items_by_resource", e))
    }

    fn list_items_by_subject(&mut self, canonical_subject: &str) -> Result<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT * FROM items WHERE canonical_subject = ?1 AND status = 'active' AND meta_about IS NULL \
                 ORDER BY created_at DESC",
            )
            .map_err(|e| sql_err("list_items_by_subject", e))?;
        let rows = stmt
            .query_map(params![canonical_subject], row_to_item)
            .map_err(|e| sql_err("list_items_by_subject", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_items_by_subject", e))
    }

    fn count_items(&mut self, category: Option<&str>, status: ItemStatus) -> Result<usize> {
        let count = if let Some(c) = category {
            self.conn.query_row(
                "SELECT COUNT(*) FROM items WHERE category = ?1 AND status = ?2",
                params![c, status.to_string()],
                |r| r.get::<_, i64>(0),
            )
        } else {
            self.conn.query_row(
                "SELECT COUNT(*) FROM items WHERE status = ?1",
                params![status.to_string()],
                |r| r.get::<_, i64>(0),
            )
        };
        count.map(|n| n as usize).map_err(|e| sql_err("count_items", e))
    }

    fn find_potential_conflicts(
        &mut self,
        canonical_subject: &str,
        predicate: &str,
        exclude_id: Option<Uuid>,
    ) -> Result<Vec<Item>> {
        let mut sql = "SELECT * FROM items WHERE canonical_subject = ?1 AND predicate = ?2 AND status = 'active'"
            .to_string();
        if exclude_id.is_some() {
            sql.push_str(" AND id != ?3");
        }
        let mut stmt = self.conn.prepare(&sql).map_err(|e| sql_err("find_potential_conflicts", e))?;
        let rows = if let Some(id) = exclude_id {
            stmt.query_map(params![canonical_subject, predicate, id.to_string()], row_to_item)
        } else {
            stmt.query_map(params![canonical_subject, predicate], row_to_item)
        }
        .map_err(|e| sql_err("find_potential_conflicts", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("find_potential_conflicts", e))
    }

    fn list_duplicate_items(&mut self) -> Result<Vec<(Item, Item)>> {
        let items = self.list_items(None, usize::MAX)?;
        let mut seen: HashMap<(String, String, String), Item> = HashMap::new();
        let mut pairs = Vec::new();
        for item in items {
            let Some(cs) = item.canonical_subject.clone() else { continue };
            let Some(co) = item.canonical_object.clone() else { continue };
            let key = (cs, item.predicate.clone(), co);
            if let Some(first) = seen.get(&key) {
                pairs.push((first.clone(), item));
            } else {
                seen.insert(key, item);
            }
        }
        Ok(pairs)
    }

    fn count_items_by_subject_recent(&mut self, canonical_subject: &str, days: i64) -> Result<usize> {
        let cutoff = (Utc::now() - chrono::Duration::days(days)).to_rfc3339();
        self.conn
            .query_row(
                "SELECT COUNT(*) FROM items WHERE canonical_subject = ?1 AND status = 'active' AND created_at >= ?2",
                params![canonical_subject, cutoff],
                |r| r.get::<_, i64>(0),
            )
            .map(|n| n as usize)
            .map_err(|e| sql_err("count_items_by_subject_recent", e))
    }

    fn list_distinct_categories(&mut self, status: ItemStatus) -> Result<Vec<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT category FROM items WHERE status = ?1 AND meta_about IS NULL")
            .map_err(|e| sql_err("list_distinct_categories", e))?;
        let rows = stmt
            .query_map(params![status.to_string()], |r| r.get::<_, String>(0))
            .map_err(|e| sql_err("list_distinct_categories", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_distinct_categories", e))
    }

    fn list_old_low_confidence_items(&mut self, max_age_days: i64, min_confidence: f32) -> Result<Vec<Item>> {
        let cutoff = (Utc::now() - chrono::Duration::days(max_age_days)).to_rfc3339();
        let mut stmt = self
            .conn
            .prepare(
                "SELECT * FROM items WHERE status = 'active' AND created_at < ?1 AND confidence < ?2",
            )
            .map_err(|e| sql_err("list_old_low_confidence_items", e))?;
        let rows = stmt
            .query_map(params![cutoff, min_confidence], row_to_item)
            .map_err(|e| sql_err("list_old_low_confidence_items", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_old_low_confidence_items", e))
    }

    fn item_stats_by_status(&mut self) -> Result<HashMap<String, usize>> {
        let mut stmt = self
            .conn
            .prepare("SELECT status, COUNT(*) FROM items GROUP BY status")
            .map_err(|e| sql_err("item_stats_by_status", e))?;
        let rows = stmt
            .query_map([], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))
            .map_err(|e| sql_err("item_stats_by_status", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map(|v| v.into_iter().collect())
            .map_err(|e| sql_err("item_stats_by_status", e))
    }

    fn avg_confidence(&mut self) -> Result<f32> {
        self.conn
            .query_row(
                "SELECT AVG(confidence) FROM items WHERE status = 'active' AND meta_about IS NULL",
                [],
                |r| r.get::<_, Option<f64>>(0),
            )
            .map(|v| v.unwrap_or(0.0) as f32)
            .map_err(|e| sql_err("avg_confidence", e))
    }

    fn list_all_item_ids(&mut self, status: ItemStatus) -> Result<Vec<Uuid>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM items WHERE status = ?1")
            .map_err(|e| sql_err("list_all_item_ids", e))?;
        let rows = stmt
            .query_map(params![status.to_string()], |r| r.get::<_, String>(0))
            .map_err(|e| sql_err("list_all_item_ids", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map(|v| v.into_iter().filter_map(|s| Uuid::parse_str(&s).ok()).collect())
            .map_err(|e| sql_err("list_all_item_ids", e))
    }

    fn list_archived_items(&mut self) -> Result<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM items WHERE status = 'archived'")
            .map_err(|e| sql_err("list_archived_items", e))?;
        let rows = stmt.query_map([], row_to_item).map_err(|e| sql_err("list_archived_items", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_archived_items", e))
    }

    fn get_superseding_item(&mut self, archived_id: Uuid) -> Result<Option<Item>> {
        self.conn
            .query_row(
                "SELECT * FROM items WHERE supersedes = ?1",
                params![archived_id.to_string()],
                row_to_item,
            )
            .optional()
            .map_err(|e| sql_err("get_superseding_item", e))
    }

    fn get_meta_facts(&mut self, item_id: Uuid) -> Result<Vec<Item>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM items WHERE meta_about = ?1 ORDER BY created_at ASC")
            .map_err(|e| sql_err("get_meta_facts", e))?;
        let rows =
            stmt.query_map(params![item_id.to_string()], row_to_item).map_err(|e| sql_err("get_meta_facts", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("get_meta_facts", e))
    }

    fn create_meta_fact(&mut self, about_item_id: Uuid, predicate: &str, object: &str, confidence: f32) -> Result<Item> {
        let item = Item::new_meta(about_item_id, predicate, object, confidence);
        self.create_item(item)
    }

    fn create_category(&mut self, category: Category) -> Result<Category> {
        self.conn
            .execute(
                "INSERT INTO categories (id, name, summary, updated_at) VALUES (?1, ?2, ?3, ?4)",
                params![category.id.to_string(), category.name, category.summary, category.updated_at.to_rfc3339()],
            )
            .map_err(|e| sql_err("create_category", e))?;
        Ok(category)
    }

    fn get_category(&mut self, id: Uuid) -> Result<Option<Category>> {
        self.conn
            .query_row("SELECT * FROM categories WHERE id = ?1", params![id.to_string()], row_to_category)
            .optional()
            .map_err(|e| sql_err("get_category", e))
    }

    fn get_category_by_name(&mut self, name: &str) -> Result<Option<Category>> {
        self.conn
            .query_row("SELECT * FROM categories WHERE name = ?1", params![name], row_to_category)
            .optional()
            .map_err(|e| sql_err("get_category_by_name", e))
    }

    fn list_categories(&mut self) -> Result<Vec<Category>> {
        let mut stmt = self.conn.prepare("SELECT * FROM categories ORDER BY name ASC").map_err(|e| sql_err("list_categories", e))?;
        let rows = stmt.query_map([], row_to_category).map_err(|e| sql_err("list_categories", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_categories", e))
    }

    fn update_category_summary(&mut self, name: &str, summary: &str) -> Result<()> {
        self.conn
            .execute(
                "UPDATE categories SET summary = ?2, updated_at = ?3 WHERE name = ?1",
                params![name, summary, Utc::now().to_rfc3339()],
            )
            .map_err(|e| sql_err("update_category_summary", e))?;
        Ok(())
    }

    fn upsert_category(&mut self, name: &str) -> Result<Category> {
        if let Some(existing) = self.get_category_by_name(name)? {
            return Ok(existing);
        }
        self.create_category(Category::new(name))
    }

    fn count_items_per_category(&mut self, status: ItemStatus) -> Result<HashMap<String, usize>> {
        let mut stmt = self
            .conn
            .prepare("SELECT category, COUNT(*) FROM items WHERE status = ?1 AND meta_about IS NULL GROUP BY category")
            .map_err(|e| sql_err("count_items_per_category", e))?;
        let rows = stmt
            .query_map(params![status.to_string()], |r| Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as usize)))
            .map_err(|e| sql_err("count_items_per_category", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>()
            .map(|v| v.into_iter().collect())
            .map_err(|e| sql_err("count_items_per_category", e))
    }

    fn create_edge(&mut self, edge: GraphEdge) -> Result<GraphEdge> {
        self.conn
            .execute(
                "INSERT INTO graph_edges (id, subject, predicate, object, weight, created_at) VALUES (?1,?2,?3,?4,?5,?6)",
                params![
                    edge.id.to_string(),
                    edge.subject,
                    edge.predicate,
                    edge.object,
                    edge.weight,
                    edge.created_at.to_rfc3339()
                ],
            )
            .map_err(|e| sql_err("create_edge", e))?;
        Ok(edge)
    }

    fn create_edges(&mut self, edges: Vec<GraphEdge>) -> Result<Vec<GraphEdge>> {
        edges.into_iter().map(|e| self.create_edge(e)).collect()
    }

    fn get_edges_by_subject(&mut self, subject: &str) -> Result<Vec<GraphEdge>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM graph_edges WHERE subject = ?1")
            .map_err(|e| sql_err("get_edges_by_subject", e))?;
        let rows = stmt.query_map(params![subject], row_to_edge).map_err(|e| sql_err("get_edges_by_subject", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("get_edges_by_subject", e))
    }

    fn get_edges_by_object(&mut self, object: &str) -> Result<Vec<GraphEdge>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM graph_edges WHERE object = ?1")
            .map_err(|e| sql_err("get_edges_by_object", e))?;
        let rows = stmt.query_map(params![object], row_to_edge).map_err(|e| sql_err("get_edges_by_object", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("get_edges_by_object", e))
    }

    fn list_all_edges(&mut self) -> Result<Vec<GraphEdge>> {
        let mut stmt = self.conn.prepare("SELECT * FROM graph_edges").map_err(|e| sql_err("list_all_edges", e))?;
        let rows = stmt.query_map([], row_to_edge).map_err(|e| sql_err("list_all_edges", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("list_all_edges", e))
    }

    fn delete_edges_by_subject(&mut self, subject: &str) -> Result<usize> {
        self.conn
            .execute("DELETE FROM graph_edges WHERE subject = ?1", params![subject])
            .map_err(|e| sql_err("delete_edges_by_subject", e))
    }

    fn delete_all_edges(&mut self) -> Result<usize> {
        self.conn.execute("DELETE FROM graph_edges", []).map_err(|e| sql_err("delete_all_edges", e))
    }

    fn update_edge_weight(&mut self, subject: &str, predicate: &str, object: &str, weight: f32) -> Result<()> {
        self.conn
            .execute(
                "UPDATE graph_edges SET weight = ?4 WHERE subject = ?1 AND predicate = ?2 AND object = ?3",
                params![subject, predicate, object, weight],
            )
            .map_err(|e| sql_err("update_edge_weight", e))?;
        Ok(())
    }

    fn count_edges(&mut self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM graph_edges", [], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| sql_err("count_edges", e))
    }

    fn upsert_embedding(&mut self, item_id: Uuid, vector: Vec<f32>) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO embeddings (item_id, vector) VALUES (?1, ?2) \
                 ON CONFLICT(item_id) DO UPDATE SET vector = excluded.vector",
                params![item_id.to_string(), vector_to_blob(&vector)],
            )
            .map_err(|e| sql_err("upsert_embedding", e))?;
        Ok(())
    }

    fn get_embedding(&mut self, item_id: Uuid) -> Result<Option<Vec<f32>>> {
        self.conn
            .query_row("SELECT vector FROM embeddings WHERE item_id = ?1", params![item_id.to_string()], |r| {
                r.get::<_, Vec<u8>>(0)
            })
            .optional()
            .map(|opt| opt.map(|b| blob_to_vector(&b)))
            .map_err(|e| sql_err("get_embedding", e))
    }

    fn delete_embedding(&mut self, item_id: Uuid) -> Result<()> {
        self.conn
            .execute("DELETE FROM embeddings WHERE item_id = ?1", params![item_id.to_string()])
            .map_err(|e| sql_err("delete_embedding", e))?;
        Ok(())
    }

    fn search_embeddings(
        &mut self,
        query: &[f32],
        limit: usize,
        min_similarity: f32,
        status: ItemStatus,
    ) -> Result<Vec<(Item, f32)>> {
        let mut stmt = self
            .conn
            .prepare(
                "SELECT i.*, e.vector AS vec FROM items i JOIN embeddings e ON e.item_id = i.id \
                 WHERE i.status = ?1 AND i.meta_about IS NULL",
            )
            .map_err(|e| sql_err("search_embeddings", e))?;
        let rows = stmt
            .query_map(params![status.to_string()], |r| {
                let item = row_to_item(r)?;
                let vec: Vec<u8> = r.get("vec")?;
                Ok((item, blob_to_vector(&vec)))
            })
            .map_err(|e| sql_err("search_embeddings", e))?;

        let mut scored: Vec<(Item, f32)> = Vec::new();
        for row in rows {
            let (item, vec) = row.map_err(|e| sql_err("search_embeddings", e))?;
            let sim = cosine_similarity(query, &vec);
            if sim >= min_similarity {
                scored.push((item, sim));
            }
        }
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(limit);
        Ok(scored)
    }

    fn batch_upsert_embeddings(&mut self, items: Vec<(Uuid, Vec<f32>)>) -> Result<()> {
        for (id, vec) in items {
            self.upsert_embedding(id, vec)?;
        }
        Ok(())
    }

    fn count_embeddings(&mut self) -> Result<usize> {
        self.conn
            .query_row("SELECT COUNT(*) FROM embeddings", [], |r| r.get::<_, i64>(0))
            .map(|n| n as usize)
            .map_err(|e| sql_err("count_embeddings", e))
    }

    fn delete_stale_embeddings(&mut self, active_ids: &[Uuid]) -> Result<usize> {
        let all: Vec<String> = {
            let mut stmt =
                self.conn.prepare("SELECT item_id FROM embeddings").map_err(|e| sql_err("delete_stale_embeddings", e))?;
            let rows =
                stmt.query_map([], |r| r.get::<_, String>(0)).map_err(|e| sql_err("delete_stale_embeddings", e))?;
            rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("delete_stale_embeddings", e))?
        };
        let active: std::collections::HashSet<String> = active_ids.iter().map(std::string::ToString::to_string).collect();
        let mut deleted = 0;
        for id in all {
            if !active.contains(&id) {
                self.conn
                    .execute("DELETE FROM embeddings WHERE item_id = ?1", params![id])
                    .map_err(|e| sql_err("delete_stale_embeddings", e))?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    fn record_category_access(&mut self, access: CategoryAccess) -> Result<()> {
        self.conn
            .execute(
                "INSERT INTO category_accesses (id, category, accessed_at, source) VALUES (?1,?2,?3,?4)",
                params![access.id.to_string(), access.category, access.accessed_at.to_rfc3339(), access.source],
            )
            .map_err(|e| sql_err("record_category_access", e))?;
        Ok(())
    }

    fn recent_category_access(
        &mut self,
        category: Option<&str>,
        since: Option<DateTime<Utc>>,
        limit: usize,
    ) -> Result<Vec<CategoryAccess>> {
        let mut sql = "SELECT * FROM category_accesses WHERE 1=1".to_string();
        let mut args: Vec<Box<dyn rusqlite::ToSql>> = Vec::new();
        if let Some(c) = category {
            sql.push_str(" AND category = ?");
            args.push(Box::new(c.to_string()));
        }
        if let Some(t) = since {
            sql.push_str(" AND accessed_at >= ?");
            args.push(Box::new(t.to_rfc3339()));
        }
        sql.push_str(" ORDER BY accessed_at DESC LIMIT ?");
        args.push(Box::new(i64::try_from(limit).unwrap_or(i64::MAX)));
        let mut stmt = self.conn.prepare(&sql).map_err(|e| sql_err("recent_category_access", e))?;
        let param_refs: Vec<&dyn rusqlite::ToSql> = args.iter().map(std::convert::AsRef::as_ref).collect();
        let rows = stmt
            .query_map(param_refs.as_slice(), row_to_access)
            .map_err(|e| sql_err("recent_category_access", e))?;
        rows.collect::<rusqlite::Result<Vec<_>>>().map_err(|e| sql_err("recent_category_access", e))
    }

    fn count_category_access(&mut self, category: &str, since: Option<DateTime<Utc>>) -> Result<usize> {
        let count = if let Some(t) = since {
            self.conn.query_row(
                "SELECT COUNT(*) FROM category_accesses WHERE category = ?1 AND accessed_at >= ?2",
                params![category, t.to_rfc3339()],
                |r| r.get::<_, i64>(0),
            )
        } else {
            self.conn.query_row(
                "SELECT COUNT(*) FROM category_accesses WHERE category = ?1",
                params![category],
                |r| r.get::<_, i64>(0),
            )
        };
        count.map(|n| n as usize).map_err(|e| sql_err("count_category_access", e))
    }

    fn cleanup_old_category_access(&mut self, before: DateTime<Utc>) -> Result<usize> {
        self.conn
            .execute("DELETE FROM category_accesses WHERE accessed_at < ?1", params![before.to_rfc3339()])
            .map_err(|e| sql_err("cleanup_old_category_access", e))
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.conn.execute_batch("COMMIT").map_err(|e| sql_err("commit", e))?;
        self.committed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn factory() -> SqliteUnitOfWorkFactory {
        SqliteUnitOfWorkFactory::open(":memory:").expect("open in-memory db")
    }

    #[test]
    fn create_and_get_resource_round_trips() {
        let f = factory();
        let mut uow = f.begin().unwrap();
        let r = Resource::new("cli", "the user likes dark mode");
        let created = uow.create_resource(r.clone()).unwrap();
        let fetched = uow.get_resource(created.id).unwrap().unwrap();
        assert_eq!(fetched.content, r.content);
        uow.commit().unwrap();
    }

    #[test]
    fn create_item_and_find_conflicts() {
        let f = factory();
        let mut uow = f.begin().unwrap();
        let item = Item::new(Some("user".to_string()), Some("prefers".to_string()), Some("dark_mode".to_string()));
        let created = uow.create_item(item).unwrap();
        let conflicts = uow.find_potential_conflicts("user", "prefers", Some(created.id)).unwrap();
        assert!(conflicts.is_empty());
        let item2 = Item::new(Some("user".to_string()), Some("prefers".to_string()), Some("light_mode".to_string()));
        uow.create_item(item2).unwrap();
        let conflicts = uow.find_potential_conflicts("user", "prefers", Some(created.id)).unwrap();
        assert_eq!(conflicts.len(), 1);
        uow.commit().unwrap();
    }

    #[test]
    fn embedding_search_orders_by_similarity() {
        let f = factory();
        let mut uow = f.begin().unwrap();
        let a = uow.create_item(Item::new(Some("user".to_string()), Some("likes".to_string()), Some("rust".to_string()))).unwrap();
        let b = uow.create_item(Item::new(Some("user".to_string()), Some("likes".to_string()), Some("python".to_string()))).unwrap();
        uow.upsert_embedding(a.id, vec![1.0, 0.0, 0.0]).unwrap();
        uow.upsert_embedding(b.id, vec![0.0, 1.0, 0.0]).unwrap();
        let results = uow.search_embeddings(&[1.0, 0.0, 0.0], 10, 0.0, ItemStatus::Active).unwrap();
        assert_eq!(results[0].0.id, a.id);
        uow.commit().unwrap();
    }

    #[test]
    fn rollback_on_drop_without_commit() {
        let f = factory();
        {
            let mut uow = f.begin().unwrap();
            uow.create_item(Item::new(Some("user".to_string()), Some("likes".to_string()), Some("rust".to_string()))).unwrap();
        }
        let mut uow2 = f.begin().unwrap();
        assert_eq!(uow2.count_items(None, ItemStatus::Active).unwrap(), 0);
        uow2.commit().unwrap();
    }
}
