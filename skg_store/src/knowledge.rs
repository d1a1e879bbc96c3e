//! The canonicalizing knowledge store.
//!
//! Owns the vertex-cache and mediates every vertex/edge write for one
//! `(user_id, extractor)` pair. Grounded on `extraction.py::KnowledgeStore`
//! for exact upsert semantics, and on `svql_driver::cache::Cache`'s
//! insert/get/contains shape for the write-through cache itself (adapted to
//! hold vertex ids instead of `Arc<Design>`).

use std::collections::HashMap;

use rusqlite::{Connection, OptionalExtension};
use skg_common::{canonical_key, EdgeId, EdgeMetadata, Extractor, UserId, Vertex, VertexId, VertexMetadata};
use tracing::debug;

use crate::error::StoreError;

/// Write-through cache from canonical key to vertex id, scoped to one user.
///
/// Mirrors `svql_driver::cache::Cache`'s insert/get/contains surface, keyed
/// by [`canonical_key`] instead of a design path.
#[derive(Debug, Clone, Default)]
struct VertexCache {
    by_key: HashMap<String, VertexId>,
}

impl VertexCache {
    fn insert(&mut self, key: String, vertex_id: VertexId) {
        self.by_key.insert(key, vertex_id);
    }

    fn get(&self, key: &str) -> Option<VertexId> {
        self.by_key.get(key).copied()
    }
}

/// Raw row shape for [`KnowledgeStore::get_vertex`], decoded before its JSON
/// columns are parsed.
struct VertexRow {
    vertex_id: VertexId,
    user_id: UserId,
    content: String,
    embedding_json: String,
    meta_json: String,
}

impl VertexRow {
    fn into_vertex(self) -> Result<Vertex, StoreError> {
        Ok(Vertex {
            vertex_id: self.vertex_id,
            user_id: self.user_id,
            content: self.content,
            embedding: serde_json::from_str(&self.embedding_json)?,
            meta_data: serde_json::from_str(&self.meta_json)?,
        })
    }
}

/// Canonicalizing vertex/edge upsert for one `(user_id, extractor)` pair.
///
/// The cache is loaded once at construction (`_load_vertex_cache` in
/// `extraction.py`) and is never invalidated by anything outside this
/// instance: the in-memory vertex cache is owned by a single knowledge-store
/// instance and there is no cross-instance invalidation path.
pub struct KnowledgeStore<'conn, E: Extractor> {
    conn: &'conn Connection,
    user_id: UserId,
    extractor: &'conn E,
    cache: VertexCache,
}

impl<'conn, E: Extractor> KnowledgeStore<'conn, E> {
    /// Opens a knowledge store for `user_id`, loading every existing
    /// `(content, vertex_id)` pair for that user into the cache.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if the warm-up scan fails.
    pub fn open(conn: &'conn Connection, user_id: UserId, extractor: &'conn E) -> Result<Self, StoreError> {
        let mut cache = VertexCache::default();
        let mut stmt = conn.prepare(
            "SELECT vertex_id, content FROM user_knowledge_vertex WHERE user_id = ?1",
        )?;
        let rows: Vec<(VertexId, String)> = stmt
            .query_map([user_id], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        for (vertex_id, content) in rows {
            cache.insert(canonical_key(&content), vertex_id);
        }
        debug!(user_id, cached = cache.by_key.len(), "warmed vertex cache");

        Ok(Self { conn, user_id, extractor, cache })
    }

    /// Gets the existing vertex for `content`'s canonical key, or creates
    /// one. On a cache hit, bumps `frequency` and advances `last_seen`
    /// without touching the stored casing of `content`. On a miss, embeds
    /// `content` and inserts a new vertex with `frequency = 1`.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if embedding or persistence fails.
    pub fn get_or_create_vertex(&mut self, content: &str, timestamp: &str) -> Result<VertexId, StoreError> {
        let key = canonical_key(content);

        if let Some(vertex_id) = self.cache.get(&key) {
            self.observe_vertex(vertex_id, timestamp)?;
            return Ok(vertex_id);
        }

        let embedding = self
            .extractor
            .embed(content)
            .map_err(|e| StoreError::persistence(e.to_string()))?;
        let meta = VertexMetadata::first_observation(timestamp);

        self.conn.execute(
            "INSERT INTO user_knowledge_vertex (user_id, content, embedding, meta_data) \
             VALUES (?1, ?2, ?3, ?4)",
            (
                self.user_id,
                content,
                serde_json::to_string(&embedding)?,
                serde_json::to_string(&meta)?,
            ),
        )?;
        let vertex_id = self.conn.last_insert_rowid();
        self.cache.insert(key, vertex_id);
        Ok(vertex_id)
    }

    fn observe_vertex(&self, vertex_id: VertexId, timestamp: &str) -> Result<(), StoreError> {
        let meta_json: String = self.conn.query_row(
            "SELECT meta_data FROM user_knowledge_vertex WHERE vertex_id = ?1",
            [vertex_id],
            |row| row.get(0),
        )?;
        let mut meta: VertexMetadata = serde_json::from_str(&meta_json)?;
        meta.observe(timestamp);

        self.conn.execute(
            "UPDATE user_knowledge_vertex SET meta_data = ?1 WHERE vertex_id = ?2",
            (serde_json::to_string(&meta)?, vertex_id),
        )?;
        Ok(())
    }

    /// Creates the edge `tail --predicate--> head`, idempotent on
    /// `(user_id, tail, head, predicate)`. Returns the existing edge id
    /// unchanged if one already exists — edges are never mutated after
    /// creation.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a database failure.
    pub fn create_edge(
        &self,
        tail: VertexId,
        head: VertexId,
        predicate: &str,
        timestamp: &str,
    ) -> Result<EdgeId, StoreError> {
        let existing: Option<EdgeId> = self
            .conn
            .query_row(
                "SELECT edge_id FROM user_knowledge_edge \
                 WHERE user_id = ?1 AND tail_vertex = ?2 AND head_vertex = ?3 AND content = ?4",
                (self.user_id, tail, head, predicate),
                |row| row.get(0),
            )
            .optional()?;
        if let Some(edge_id) = existing {
            return Ok(edge_id);
        }

        let meta = EdgeMetadata { created_at: timestamp.to_string() };
        self.conn.execute(
            "INSERT INTO user_knowledge_edge (user_id, tail_vertex, head_vertex, content, meta_data) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
            (self.user_id, tail, head, predicate, serde_json::to_string(&meta)?),
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    /// Fetches the persisted [`Vertex`] for `vertex_id`, if any.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a database or metadata-decoding failure.
    pub fn get_vertex(&self, vertex_id: VertexId) -> Result<Option<Vertex>, StoreError> {
        let row: Option<VertexRow> = self
            .conn
            .query_row(
                "SELECT vertex_id, user_id, content, embedding, meta_data \
                 FROM user_knowledge_vertex WHERE vertex_id = ?1",
                [vertex_id],
                |row| {
                    Ok(VertexRow {
                        vertex_id: row.get(0)?,
                        user_id: row.get(1)?,
                        content: row.get(2)?,
                        embedding_json: row.get(3)?,
                        meta_json: row.get(4)?,
                    })
                },
            )
            .optional()?;
        row.map(VertexRow::into_vertex).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use skg_common::testing::MockExtractor;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn canonicalizing_upsert() {
        let conn = setup();
        let extractor = MockExtractor::new();
        let mut store = KnowledgeStore::open(&conn, 1, &extractor).unwrap();

        let v1 = store.get_or_create_vertex("Paris", "t1").unwrap();
        let v2 = store.get_or_create_vertex("paris", "t2").unwrap();
        assert_eq!(v1, v2);

        let vertex = store.get_vertex(v1).unwrap().unwrap();
        assert_eq!(vertex.content, "Paris");
        assert_eq!(vertex.meta_data.frequency, 2);
        assert_eq!(vertex.meta_data.first_seen, "t1");
        assert_eq!(vertex.meta_data.last_seen, "t2");
    }

    #[test]
    fn cache_warm_up_sees_existing_rows() {
        let conn = setup();
        let extractor = MockExtractor::new();
        {
            let mut store = KnowledgeStore::open(&conn, 1, &extractor).unwrap();
            store.get_or_create_vertex("Tokyo", "t1").unwrap();
        }
        let mut reopened = KnowledgeStore::open(&conn, 1, &extractor).unwrap();
        let v1 = reopened.get_or_create_vertex("tokyo", "t2").unwrap();
        let vertex = reopened.get_vertex(v1).unwrap().unwrap();
        assert_eq!(vertex.meta_data.frequency, 2);
    }

    #[test]
    fn idempotent_edge_creation() {
        let conn = setup();
        let extractor = MockExtractor::new();
        let mut store = KnowledgeStore::open(&conn, 1, &extractor).unwrap();
        let v1 = store.get_or_create_vertex("Paris", "t1").unwrap();
        let v2 = store.get_or_create_vertex("France", "t1").unwrap();

        let e1 = store.create_edge(v1, v2, "located_in", "t1").unwrap();
        let e2 = store.create_edge(v1, v2, "located_in", "t1").unwrap();
        assert_eq!(e1, e2);

        let count: i64 = conn
            .query_row("SELECT count(*) FROM user_knowledge_edge", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn distinct_users_do_not_share_vertices() {
        let conn = setup();
        let extractor = MockExtractor::new();
        let mut store1 = KnowledgeStore::open(&conn, 1, &extractor).unwrap();
        let mut store2 = KnowledgeStore::open(&conn, 2, &extractor).unwrap();

        let v1 = store1.get_or_create_vertex("Paris", "t1").unwrap();
        let v2 = store2.get_or_create_vertex("Paris", "t1").unwrap();
        assert_ne!(v1, v2);
    }
}
