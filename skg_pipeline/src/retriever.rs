//! The retriever: query -> matched vertices -> cofaces -> gaps -> formatted
//! context.
//!
//! Grounded on `examples/original_source/src/retrieval.py::KnowledgeRetriever`
//! for exact control flow, truncation caps, and cosine-similarity math.

use std::collections::BTreeMap;

use rusqlite::Connection;
use skg_common::{Coface, Extractor, MatchedVertex, RetrievalResult, UserId, VertexId};
use skg_store::SimplexTree;

use crate::error::PipelineError;

/// Cosine similarity between two vectors. Returns `0.0` rather than
/// dividing by zero when either vector has zero norm.
#[must_use]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Retrieves relevant context from the simplicial knowledge graph for one
/// user.
pub struct KnowledgeRetriever<'conn, E: Extractor> {
    conn: &'conn Connection,
    user_id: UserId,
    extractor: &'conn E,
}

impl<'conn, E: Extractor> KnowledgeRetriever<'conn, E> {
    /// Creates a retriever scoped to `user_id`.
    #[must_use]
    pub const fn new(conn: &'conn Connection, user_id: UserId, extractor: &'conn E) -> Self {
        Self { conn, user_id, extractor }
    }

    /// Runs the full retrieval pipeline: match, locate cofaces, detect
    /// gaps, fetch display content.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] if the embedding call or any database
    /// read fails.
    pub fn retrieve(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<RetrievalResult, PipelineError> {
        let matched_vertices = self.match_vertices(query, top_k, similarity_threshold)?;
        if matched_vertices.is_empty() {
            return Ok(RetrievalResult::default());
        }

        let vertex_ids: Vec<VertexId> = matched_vertices.iter().map(|v| v.vertex_id).collect();
        let tree = SimplexTree::new(self.conn, self.user_id);
        // The entire matched set is passed as a single query: returned
        // cofaces contain *all* matched vertices, not any.
        let raw_cofaces = tree.locate_cofaces(&vertex_ids, true, Some(0))?;

        let cofaces: Vec<Coface> = raw_cofaces
            .into_iter()
            .map(|c| Coface {
                vertex_ids: c.vertex_ids,
                simplex_type: c.simplex_type.unwrap_or_default(),
                meta_data: c.meta_data.unwrap_or(serde_json::Value::Null),
            })
            .collect();

        let mut all_vertex_ids: std::collections::BTreeSet<VertexId> = std::collections::BTreeSet::new();
        for coface in &cofaces {
            all_vertex_ids.extend(coface.vertex_ids.iter().copied());
        }

        let coface_sets: Vec<Vec<VertexId>> = cofaces.iter().map(|c| c.vertex_ids.clone()).collect();
        let knowledge_gaps = self.detect_gaps(&tree, &coface_sets);

        let context_vertices = self.fetch_vertex_contents(&all_vertex_ids)?;
        let edges = self.fetch_edges(&all_vertex_ids)?;

        Ok(RetrievalResult {
            matched_vertices,
            cofaces,
            knowledge_gaps,
            context_vertices,
            edges,
        })
    }

    /// Step 1: embeds `query` and scans every vertex in this user's
    /// partition for cosine similarity `>= similarity_threshold`, returning
    /// the top `top_k` by similarity descending. Exact brute-force scan, no
    /// ANN index.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError`] if the embedding call or a database read
    /// fails.
    pub fn match_vertices(
        &self,
        query: &str,
        top_k: usize,
        similarity_threshold: f32,
    ) -> Result<Vec<MatchedVertex>, PipelineError> {
        let query_embedding = self.extractor.embed(query)?;

        let mut stmt = self.conn.prepare(
            "SELECT vertex_id, content, embedding, meta_data \
             FROM user_knowledge_vertex WHERE user_id = ?1",
        )?;
        let rows: Vec<(VertexId, String, String, String)> = stmt
            .query_map([self.user_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<_, _>>()?;

        let mut scored: Vec<MatchedVertex> = Vec::new();
        for (vertex_id, content, embedding_json, meta_json) in rows {
            let embedding: Vec<f32> = serde_json::from_str(&embedding_json)?;
            let similarity = cosine_similarity(&query_embedding, &embedding);
            if similarity >= similarity_threshold {
                let meta_data = serde_json::from_str(&meta_json)?;
                scored.push(MatchedVertex { vertex_id, content, similarity, meta_data });
            }
        }

        scored.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    /// Step 4 (Filtration Comparison): for each coface, enumerates
    /// theoretical faces of size `>= 2`; faces not already considered are
    /// looked up via `search_simplex`, and those that return `None` are
    /// gaps. Deduplicated by sorted tuple across all cofaces.
    #[must_use]
    pub fn detect_gaps(&self, tree: &SimplexTree<'_>, cofaces: &[Vec<VertexId>]) -> Vec<Vec<VertexId>> {
        let mut gaps = Vec::new();
        let mut seen: std::collections::HashSet<Vec<VertexId>> = std::collections::HashSet::new();

        for coface in cofaces {
            if coface.len() < 2 {
                continue;
            }
            for face in SimplexTree::enumerate_theoretical_faces(coface) {
                if face.len() < 2 || !seen.insert(face.clone()) {
                    continue;
                }
                if tree.search(&face).is_none() {
                    gaps.push(face);
                }
            }
        }
        gaps
    }

    fn fetch_vertex_contents(
        &self,
        vertex_ids: &std::collections::BTreeSet<VertexId>,
    ) -> Result<BTreeMap<VertexId, String>, PipelineError> {
        let mut contents = BTreeMap::new();
        if vertex_ids.is_empty() {
            return Ok(contents);
        }
        let placeholders = vertex_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT vertex_id, content FROM user_knowledge_vertex WHERE vertex_id IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let params: Vec<&dyn rusqlite::ToSql> = vertex_ids.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        let rows: Vec<(VertexId, String)> = stmt
            .query_map(params.as_slice(), |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<Result<_, _>>()?;
        for (vertex_id, content) in rows {
            contents.insert(vertex_id, content);
        }
        Ok(contents)
    }

    fn fetch_edges(
        &self,
        vertex_ids: &std::collections::BTreeSet<VertexId>,
    ) -> Result<Vec<(String, String, String)>, PipelineError> {
        if vertex_ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vertex_ids.iter().map(|_| "?").collect::<Vec<_>>().join(",");
        let sql = format!(
            "SELECT v1.content, e.content, v2.content \
             FROM user_knowledge_edge e \
             JOIN user_knowledge_vertex v1 ON e.tail_vertex = v1.vertex_id \
             JOIN user_knowledge_vertex v2 ON e.head_vertex = v2.vertex_id \
             WHERE e.tail_vertex IN ({placeholders}) AND e.head_vertex IN ({placeholders})"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let mut params: Vec<&dyn rusqlite::ToSql> = vertex_ids.iter().map(|v| v as &dyn rusqlite::ToSql).collect();
        params.extend(vertex_ids.iter().map(|v| v as &dyn rusqlite::ToSql));
        let rows = stmt
            .query_map(params.as_slice(), |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?, row.get::<_, String>(2)?))
            })?
            .collect::<Result<_, _>>()?;
        Ok(rows)
    }
}

/// Truncation cap for the *Matched Entities* section.
const MATCHED_CAP: usize = 10;
/// Truncation cap for the *Co-occurrence Patterns* section.
const COFACE_CAP: usize = 10;
/// Truncation cap for the *Known Relationships* section.
const EDGE_CAP: usize = 10;
/// Truncation cap for the *Knowledge Gaps* section.
const GAP_CAP: usize = 5;

/// Formats a [`RetrievalResult`] as a human-readable context block with
/// *Matched Entities*, *Co-occurrence Patterns*, *Known Relationships*, and
/// *Knowledge Gaps* sections, each truncated to a small cap — exactly
/// `retrieval.py::format_context`'s layout and caps.
#[must_use]
pub fn format_context(result: &RetrievalResult) -> String {
    let mut lines: Vec<String> = Vec::new();

    if !result.matched_vertices.is_empty() {
        lines.push("=== Matched Entities ===".to_string());
        for v in result.matched_vertices.iter().take(MATCHED_CAP) {
            lines.push(format!("  - {} (similarity: {:.2})", v.content, v.similarity));
        }
    }

    if !result.cofaces.is_empty() {
        lines.push(String::new());
        lines.push("=== Co-occurrence Patterns (Simplices) ===".to_string());
        for coface in result.cofaces.iter().take(COFACE_CAP) {
            let contents: Vec<String> = coface
                .vertex_ids
                .iter()
                .map(|vid| {
                    result
                        .context_vertices
                        .get(vid)
                        .cloned()
                        .unwrap_or_else(|| vid.to_string())
                })
                .collect();

            let context = match coface.simplex_type.as_str() {
                "temporal" => {
                    let start = coface.meta_data.get("window_start").and_then(|v| v.as_str()).unwrap_or("?");
                    let end = coface.meta_data.get("window_end").and_then(|v| v.as_str()).unwrap_or("?");
                    format!("from {start} to {end}")
                }
                "location" => {
                    let loc = coface.meta_data.get("location").and_then(|v| v.as_str()).unwrap_or("?");
                    format!("at {loc}")
                }
                other => other.to_string(),
            };
            lines.push(format!("  - [{context}] {{{}}}", contents.join(", ")));
        }
    }

    if !result.edges.is_empty() {
        lines.push(String::new());
        lines.push("=== Known Relationships ===".to_string());
        for (subj, rel, obj) in result.edges.iter().take(EDGE_CAP) {
            lines.push(format!("  - ({subj}) --[{rel}]--> ({obj})"));
        }
    }

    if !result.knowledge_gaps.is_empty() {
        lines.push(String::new());
        lines.push("=== Knowledge Gaps (Unconfirmed Relationships) ===".to_string());
        for gap in result.knowledge_gaps.iter().take(GAP_CAP) {
            let contents: Vec<String> = gap
                .iter()
                .map(|vid| {
                    result
                        .context_vertices
                        .get(vid)
                        .cloned()
                        .unwrap_or_else(|| vid.to_string())
                })
                .collect();
            lines.push(format!("  - {{{}}} - never directly observed together", contents.join(", ")));
        }
    }

    lines.join("\n")
}
