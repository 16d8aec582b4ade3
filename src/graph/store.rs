//! Graph store adapter: edge lookups over the pre-loaded category graph.

use async_trait::async_trait;
use rusqlite::{params, params_from_iter, OptionalExtension};
use std::collections::HashMap;

use crate::db::Db;
use crate::error::{Result, WikidiceError};
use crate::graph::{Edge, NodeId, NodeKind};

/// SQLite caps bound parameters per statement; stay well below it.
const MAX_IDS_PER_QUERY: usize = 500;

/// Read-only access to the category graph.
///
/// Implementations hold no per-request state and must tolerate many
/// concurrent callers. Names passed in are already normalized.
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Resolve a category name to its node id.
    ///
    /// Returns [`WikidiceError::CategoryNotFound`] when no category page has this name.
    async fn resolve_category(&self, name: &str) -> Result<NodeId>;

    /// All membership edges whose parent is `parent`.
    async fn child_edges(&self, parent: NodeId) -> Result<Vec<Edge>>;

    /// Membership edges for a whole BFS frontier.
    async fn frontier_edges(&self, parents: &[NodeId]) -> Result<Vec<Edge>> {
        let mut edges = Vec::new();
        for &parent in parents {
            edges.extend(self.child_edges(parent).await?);
        }
        Ok(edges)
    }

    /// Up to `limit` category names starting with `prefix`.
    async fn search_categories(&self, prefix: &str, limit: usize) -> Result<Vec<String>>;

    /// Titles for the given ids. Unknown ids are left out of the map.
    async fn page_titles(&self, ids: &[NodeId]) -> Result<HashMap<NodeId, String>>;

    /// Cheap connectivity check.
    async fn ping(&self) -> Result<()>;
}

/// [`GraphStore`] over the `page` / `page_cat_ids` tables.
#[derive(Clone)]
pub struct SqliteGraphStore {
    db: Db,
}

impl SqliteGraphStore {
    pub fn new(db: Db) -> Self {
        Self { db }
    }

    pub fn db(&self) -> &Db {
        &self.db
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(",")
}

#[async_trait]
impl GraphStore for SqliteGraphStore {
    async fn resolve_category(&self, name: &str) -> Result<NodeId> {
        let name = name.to_string();
        self.db
            .with_connection(move |conn| {
                let id = conn
                    .query_row(
                        "SELECT page_id FROM page WHERE page_namespace = ?1 AND page_title = ?2",
                        params![NodeKind::Category.namespace(), name],
                        |row| row.get::<_, NodeId>(0),
                    )
                    .optional()?;
                id.ok_or(WikidiceError::CategoryNotFound(name))
            })
            .await
    }

    async fn child_edges(&self, parent: NodeId) -> Result<Vec<Edge>> {
        self.frontier_edges(&[parent]).await
    }

    async fn frontier_edges(&self, parents: &[NodeId]) -> Result<Vec<Edge>> {
        let mut edges = Vec::new();
        for chunk in parents.chunks(MAX_IDS_PER_QUERY) {
            let ids = chunk.to_vec();
            // Page links pointing at rows missing from `page` are dangling and skipped.
            let query = format!(
                "SELECT l.page_id, l.cat_id, l.cl_type \
                 FROM page_cat_ids l \
                 WHERE l.cat_id IN ({}) \
                   AND (l.cl_type <> 'page' OR EXISTS (SELECT 1 FROM page p WHERE p.page_id = l.page_id)) \
                 ORDER BY l.cat_id, l.page_id",
                placeholders(ids.len())
            );
            let batch = self
                .db
                .with_connection(move |conn| {
                    let mut stmt = conn.prepare(&query)?;
                    let rows = stmt.query_map(params_from_iter(ids.iter()), |row| {
                        Ok(Edge {
                            child: row.get(0)?,
                            parent: row.get(1)?,
                            kind: row.get(2)?,
                        })
                    })?;
                    let mut out = Vec::new();
                    for row in rows {
                        out.push(row?);
                    }
                    Ok(out)
                })
                .await?;
            edges.extend(batch);
        }
        Ok(edges)
    }

    async fn search_categories(&self, prefix: &str, limit: usize) -> Result<Vec<String>> {
        // Byte-wise range scan on the (namespace, title) index; LIKE would be
        // case-insensitive and treat '_' as a wildcard.
        let lower = prefix.to_string();
        let upper = format!("{}{}", prefix, char::MAX);
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        self.db
            .with_connection(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT page_title FROM page \
                     WHERE page_namespace = ?1 AND page_title >= ?2 AND page_title < ?3 \
                     ORDER BY page_title \
                     LIMIT ?4",
                )?;
                let names = stmt
                    .query_map(
                        params![NodeKind::Category.namespace(), lower, upper, limit],
                        |row| row.get::<_, String>(0),
                    )?
                    .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                Ok(names)
            })
            .await
    }

    async fn page_titles(&self, ids: &[NodeId]) -> Result<HashMap<NodeId, String>> {
        let mut titles = HashMap::with_capacity(ids.len());
        for chunk in ids.chunks(MAX_IDS_PER_QUERY) {
            let ids = chunk.to_vec();
            let query = format!(
                "SELECT page_id, page_title FROM page WHERE page_id IN ({})",
                placeholders(ids.len())
            );
            let batch = self
                .db
                .with_connection(move |conn| {
                    let mut stmt = conn.prepare(&query)?;
                    let rows = stmt
                        .query_map(params_from_iter(ids.iter()), |row| {
                            Ok((row.get::<_, NodeId>(0)?, row.get::<_, String>(1)?))
                        })?
                        .collect::<std::result::Result<Vec<_>, rusqlite::Error>>()?;
                    Ok(rows)
                })
                .await?;
            titles.extend(batch);
        }
        Ok(titles)
    }

    async fn ping(&self) -> Result<()> {
        self.db.ping().await
    }
}
