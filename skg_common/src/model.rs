//! The persistent data model: vertices, edges, and their metadata.
//!
//! Types here mirror `user_knowledge_vertex`, `user_knowledge_edge`, and the
//! metadata shapes a simplex-tree node carries, without committing to any
//! particular storage engine.

use serde::{Deserialize, Serialize};

/// Opaque, system-assigned vertex identifier.
pub type VertexId = i64;

/// Opaque, system-assigned edge identifier.
pub type EdgeId = i64;

/// Opaque, system-assigned simplex-tree node identifier.
pub type NodeId = i64;

/// Tenant partition key. Never crossed by any query.
pub type UserId = i64;

/// `{first_seen, last_seen, frequency}` as tracked for a vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VertexMetadata {
    /// Timestamp of the first observation, verbatim from the source event.
    pub first_seen: String,
    /// Timestamp of the most recent observation.
    pub last_seen: String,
    /// Number of times this vertex has been observed. Always `>= 1`.
    pub frequency: u32,
}

impl VertexMetadata {
    /// Metadata for a brand-new vertex observed at `timestamp`.
    #[must_use]
    pub fn first_observation(timestamp: impl Into<String>) -> Self {
        let timestamp = timestamp.into();
        Self {
            first_seen: timestamp.clone(),
            last_seen: timestamp,
            frequency: 1,
        }
    }

    /// Records a re-observation at `timestamp`: bumps frequency, advances
    /// `last_seen`. Does not touch `first_seen`.
    pub fn observe(&mut self, timestamp: impl Into<String>) {
        self.frequency += 1;
        self.last_seen = timestamp.into();
    }
}

/// A canonicalized entity in one user's knowledge graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    /// System-assigned id.
    pub vertex_id: VertexId,
    /// Tenant.
    pub user_id: UserId,
    /// First-observed casing of the entity's text. Never rewritten.
    pub content: String,
    /// Embedding vector, same dimension for every vertex in a database.
    pub embedding: Vec<f32>,
    /// Aggregated observation metadata.
    pub meta_data: VertexMetadata,
}

/// `{created_at}` as tracked for an edge. Edges are not mutated after
/// creation, so this never grows beyond the one field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EdgeMetadata {
    /// Timestamp of first observation.
    pub created_at: String,
}

/// A directed, typed relationship between two vertices.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// System-assigned id.
    pub edge_id: EdgeId,
    /// Tenant.
    pub user_id: UserId,
    /// Source vertex of the directed edge.
    pub tail_vertex: VertexId,
    /// Destination vertex of the directed edge.
    pub head_vertex: VertexId,
    /// The predicate label, e.g. `located_in`.
    pub content: String,
    /// Creation metadata.
    pub meta_data: EdgeMetadata,
}

/// A simplex-tree node's terminal-node metadata: the witness type it
/// records and the witness-specific JSON payload. `type`/`meta_data`
/// describe only the simplex terminating at that node, independent of its
/// ancestors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimplexMeta {
    /// `"temporal"`, `"location"`, or another caller-supplied label.
    pub simplex_type: String,
    /// Witness-specific payload, e.g. `{window_start, window_end,
    /// window_minutes}` for a temporal simplex.
    pub meta_data: serde_json::Value,
}

/// One vertex matched against a query embedding.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchedVertex {
    /// The matched vertex's id.
    pub vertex_id: VertexId,
    /// The matched vertex's display content.
    pub content: String,
    /// Cosine similarity against the query embedding, in `[-1.0, 1.0]`.
    pub similarity: f32,
    /// The vertex's observation metadata.
    pub meta_data: VertexMetadata,
}

/// A simplex returned by `locate_cofaces`, annotated with its terminal
/// node's [`SimplexMeta`].
#[derive(Debug, Clone, PartialEq)]
pub struct Coface {
    /// The sorted vertex ids making up this simplex.
    pub vertex_ids: Vec<VertexId>,
    /// The terminal node's witness type.
    pub simplex_type: String,
    /// The terminal node's witness-specific payload.
    pub meta_data: serde_json::Value,
}

/// The full output of one retrieval pipeline run.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    /// Vertices whose embedding matched the query above threshold.
    pub matched_vertices: Vec<MatchedVertex>,
    /// Simplices containing the entire matched vertex set.
    pub cofaces: Vec<Coface>,
    /// Theoretical faces of the cofaces that are absent from the tree.
    pub knowledge_gaps: Vec<Vec<VertexId>>,
    /// Display content for every vertex id appearing in any coface.
    pub context_vertices: std::collections::BTreeMap<VertexId, String>,
    /// `(subject, predicate, object)` triples between context vertices.
    pub edges: Vec<(String, String, String)>,
}

/// Canonicalizes a piece of human-entered text into the key used to
/// deduplicate vertices: trimmed, then case-folded.
///
/// `str::to_lowercase` matches `extraction.py`'s `str.lower()` closely
/// enough for the activity text this crate ingests (English titles, URLs,
/// place names), without pulling in a dedicated ICU dependency.
#[must_use]
pub fn canonical_key(content: &str) -> String {
    content.trim().to_lowercase()
}
