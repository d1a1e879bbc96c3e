//! The simplex tree index.
//!
//! A trie over sorted vertex-id tuples, realized as a relational table
//! (`simplex_vertex`) with parent pointers, keyed through the
//! `(user_id, parent_id, vertex_id)` sibling index for the trie hop and the
//! `(user_id, vertex_id, depth)` index for coface candidate scans. Grounded
//! on `examples/original_source/src/simplex_tree.py`'s `SimplexTree` for
//! exact control flow, and on `svql_common::index::graph_index::GraphIndex`
//! for the general "index built over a connection/structure, queried via
//! typed methods" shape.

use rusqlite::{Connection, OptionalExtension};
use serde_json::Value;
use skg_common::{NodeId, UserId, VertexId};

use crate::error::StoreError;

/// A simplex terminating at `vertex_ids`, with its terminal node's witness
/// type and metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct CofaceMatch {
    /// The sorted vertex ids making up this simplex.
    pub vertex_ids: Vec<VertexId>,
    /// The terminal node's witness type, or `None` when the caller did not
    /// request metadata.
    pub simplex_type: Option<String>,
    /// The terminal node's witness-specific payload, or `None` when the
    /// caller did not request metadata.
    pub meta_data: Option<Value>,
}

/// Index over one user's partition of the `simplex_vertex` table.
///
/// Holds no state of its own beyond the connection and the partition key;
/// every operation is a direct SQL translation against the sibling/coface
/// indices declared in the persistence schema.
pub struct SimplexTree<'conn> {
    conn: &'conn Connection,
    user_id: UserId,
}

impl<'conn> SimplexTree<'conn> {
    /// Creates a view over `conn` scoped to `user_id`. Borrows the
    /// connection rather than owning it — callers share one connection
    /// across the simplex tree, the knowledge store, and the schema module.
    #[must_use]
    pub const fn new(conn: &'conn Connection, user_id: UserId) -> Self {
        Self { conn, user_id }
    }

    fn find_child(&self, parent: Option<NodeId>, vertex_id: VertexId) -> rusqlite::Result<Option<NodeId>> {
        match parent {
            None => self
                .conn
                .query_row(
                    "SELECT node_id FROM simplex_vertex \
                     WHERE user_id = ?1 AND parent_id IS NULL AND vertex_id = ?2",
                    (self.user_id, vertex_id),
                    |row| row.get(0),
                )
                .optional(),
            Some(parent_id) => self
                .conn
                .query_row(
                    "SELECT node_id FROM simplex_vertex \
                     WHERE user_id = ?1 AND parent_id = ?2 AND vertex_id = ?3",
                    (self.user_id, parent_id, vertex_id),
                    |row| row.get(0),
                )
                .optional(),
        }
    }

    /// Resolves the terminal node of `vertex_ids`, or `None` if no such
    /// simplex exists. O(j log n) in the simplex's size `j`.
    #[must_use]
    pub fn search(&self, vertex_ids: &[VertexId]) -> Option<NodeId> {
        if vertex_ids.is_empty() {
            return None;
        }
        let mut sorted = vertex_ids.to_vec();
        sorted.sort_unstable();

        let mut parent: Option<NodeId> = None;
        for vertex_id in sorted {
            parent = self.find_child(parent, vertex_id).ok().flatten();
            parent?;
        }
        parent
    }

    /// Inserts the simplex `vertex_ids`, attaching `simplex_type`/`meta_data`
    /// to the terminal node only. If the full path already exists, returns
    /// the existing terminal node id and leaves its type/metadata
    /// untouched — duplicate insertion never overwrites.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::EmptySimplex`] if `vertex_ids` is empty, or a
    /// [`StoreError::Sql`]/[`StoreError::Persistence`] on a database
    /// failure.
    pub fn insert(
        &self,
        vertex_ids: &[VertexId],
        simplex_type: &str,
        meta_data: &Value,
    ) -> Result<NodeId, StoreError> {
        if vertex_ids.is_empty() {
            return Err(StoreError::EmptySimplex);
        }
        let mut sorted = vertex_ids.to_vec();
        sorted.sort_unstable();

        let meta_json = serde_json::to_string(meta_data)?;
        let mut parent: Option<NodeId> = None;
        let mut depth: i64 = 0;

        for vertex_id in sorted {
            if let Some(existing) = self.find_child(parent, vertex_id)? {
                parent = Some(existing);
            } else {
                self.conn.execute(
                    "INSERT INTO simplex_vertex \
                     (user_id, parent_id, vertex_id, depth, type, meta_data) \
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                    (self.user_id, parent, vertex_id, depth + 1, simplex_type, &meta_json),
                )?;
                parent = Some(self.conn.last_insert_rowid());
            }
            depth += 1;
        }

        parent.ok_or_else(|| StoreError::persistence("no simplex vertex created"))
    }

    fn collect_path(&self, node_id: NodeId) -> rusqlite::Result<Vec<VertexId>> {
        let mut vertices = Vec::new();
        let mut current = Some(node_id);
        while let Some(id) = current {
            let (vertex_id, parent_id): (VertexId, Option<NodeId>) = self.conn.query_row(
                "SELECT vertex_id, parent_id FROM simplex_vertex WHERE node_id = ?1",
                [id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )?;
            vertices.push(vertex_id);
            current = parent_id;
        }
        vertices.reverse();
        Ok(vertices)
    }

    /// Two-pointer subsequence test: does `needle` (sorted) appear, in
    /// order, within `haystack` (sorted)? The shared total order on vertex
    /// ids makes this equivalent to `set(needle) <= set(haystack)`.
    #[must_use]
    pub fn is_subsequence(needle: &[VertexId], haystack: &[VertexId]) -> bool {
        let mut hay = haystack.iter();
        needle.iter().all(|v| hay.any(|h| h == v))
    }

    fn collect_subtree(
        &self,
        root_id: NodeId,
        root_verts: &[VertexId],
        include_metadata: bool,
        max_extra_depth: Option<u32>,
        current_extra_depth: u32,
        out: &mut Vec<CofaceMatch>,
    ) -> Result<(), StoreError> {
        if let Some(limit) = max_extra_depth {
            if current_extra_depth >= limit {
                return Ok(());
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT node_id, vertex_id, type, meta_data FROM simplex_vertex WHERE parent_id = ?1",
        )?;
        let children: Vec<(NodeId, VertexId, String, String)> = stmt
            .query_map([root_id], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
            })?
            .collect::<Result<_, _>>()?;

        for (child_id, child_vertex, child_type, child_meta) in children {
            let mut child_verts = root_verts.to_vec();
            child_verts.push(child_vertex);

            let (simplex_type, meta_value) = if include_metadata {
                (Some(child_type), Some(serde_json::from_str(&child_meta)?))
            } else {
                (None, None)
            };
            out.push(CofaceMatch {
                vertex_ids: child_verts.clone(),
                simplex_type,
                meta_data: meta_value,
            });

            self.collect_subtree(
                child_id,
                &child_verts,
                include_metadata,
                max_extra_depth,
                current_extra_depth + 1,
                out,
            )?;
        }
        Ok(())
    }

    /// Finds all simplices σ with `vertex_ids ⊆ σ`.
    ///
    /// `max_extra_depth` bounds descent into a candidate's subtree beyond
    /// the exact match: `Some(0)` (the default used throughout this
    /// workspace) emits only exact matches, `Some(n)` descends `n` levels
    /// further, and `None` descends without limit.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on a database or metadata-decoding failure.
    pub fn locate_cofaces(
        &self,
        vertex_ids: &[VertexId],
        include_metadata: bool,
        max_extra_depth: Option<u32>,
    ) -> Result<Vec<CofaceMatch>, StoreError> {
        if vertex_ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut sorted = vertex_ids.to_vec();
        sorted.sort_unstable();
        let last_vertex = *sorted.last().expect("checked non-empty above");
        let min_depth = sorted.len() as i64;

        let mut stmt = self.conn.prepare(
            "SELECT node_id, type, meta_data FROM simplex_vertex \
             WHERE user_id = ?1 AND vertex_id = ?2 AND depth >= ?3",
        )?;
        let candidates: Vec<(NodeId, String, String)> = stmt
            .query_map((self.user_id, last_vertex, min_depth), |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })?
            .collect::<Result<_, _>>()?;

        let mut results = Vec::new();
        for (node_id, stype, meta_json) in candidates {
            let path = self.collect_path(node_id)?;
            if !Self::is_subsequence(&sorted, &path) {
                continue;
            }
            let (simplex_type, meta_value) = if include_metadata {
                (Some(stype), Some(serde_json::from_str(&meta_json)?))
            } else {
                (None, None)
            };
            results.push(CofaceMatch {
                vertex_ids: path.clone(),
                simplex_type,
                meta_data: meta_value,
            });
            self.collect_subtree(node_id, &path, include_metadata, max_extra_depth, 0, &mut results)?;
        }
        Ok(results)
    }

    /// Returns all `2^|vertex_ids| - 1` non-empty subsets of `vertex_ids`,
    /// each itself sorted. Pure; used by gap detection.
    #[must_use]
    pub fn enumerate_theoretical_faces(vertex_ids: &[VertexId]) -> Vec<Vec<VertexId>> {
        let mut sorted = vertex_ids.to_vec();
        sorted.sort_unstable();
        let n = sorted.len();
        if n == 0 {
            return Vec::new();
        }
        let mut faces = Vec::with_capacity((1usize << n) - 1);
        for mask in 1..(1u32 << n) {
            let face: Vec<VertexId> = (0..n)
                .filter(|i| mask & (1 << i) != 0)
                .map(|i| sorted[i])
                .collect();
            faces.push(face);
        }
        faces
    }

    /// Removes the simplex `vertex_ids`. With `remove_cofaces = true`,
    /// deletes the matched node and all its transitive descendants (a
    /// recursive CTE, matching `simplex_tree.py`'s two-step "delete
    /// descendants, then delete self" shape rather than folding both into
    /// one statement). With `remove_cofaces = false`, the node must be a
    /// leaf.
    ///
    /// Returns `true` if a removal occurred, `false` if no such simplex
    /// existed.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::HasCofaces`] if `remove_cofaces` is false and
    /// the node has children, or a [`StoreError::Sql`] on a database
    /// failure.
    pub fn remove(&self, vertex_ids: &[VertexId], remove_cofaces: bool) -> Result<bool, StoreError> {
        let Some(node_id) = self.search(vertex_ids) else {
            return Ok(false);
        };

        if remove_cofaces {
            self.conn.execute(
                "WITH RECURSIVE descendants AS ( \
                     SELECT node_id FROM simplex_vertex WHERE parent_id = ?1 \
                     UNION ALL \
                     SELECT sv.node_id FROM simplex_vertex sv \
                     JOIN descendants d ON sv.parent_id = d.node_id \
                 ) \
                 DELETE FROM simplex_vertex WHERE node_id IN (SELECT node_id FROM descendants)",
                [node_id],
            )?;
        } else {
            let has_children: bool = self.conn.query_row(
                "SELECT EXISTS(SELECT 1 FROM simplex_vertex WHERE parent_id = ?1)",
                [node_id],
                |row| row.get(0),
            )?;
            if has_children {
                return Err(StoreError::HasCofaces);
            }
        }

        self.conn.execute("DELETE FROM simplex_vertex WHERE node_id = ?1", [node_id])?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use serde_json::json;

    fn setup() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::init_schema(&conn).unwrap();
        conn.execute(
            "INSERT INTO user_knowledge_vertex (vertex_id, user_id, content, embedding, meta_data) \
             VALUES (1,1,'a','[]','{}'), (2,1,'b','[]','{}'), (3,1,'c','[]','{}'), \
                     (4,1,'d','[]','{}'), (5,1,'e','[]','{}')",
            [],
        )
        .unwrap();
        conn
    }

    #[test]
    fn insert_then_search() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        let id = tree.insert(&[1, 2, 3], "temporal", &json!({"w": 5})).unwrap();

        assert_eq!(tree.search(&[1, 2, 3]), Some(id));
        assert_eq!(tree.search(&[1, 2, 4]), None);
        assert_eq!(tree.search(&[2, 3]), None);
    }

    #[test]
    fn duplicate_insert_returns_existing_id_without_overwrite() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        let first = tree.insert(&[1, 2], "temporal", &json!({"v": 1})).unwrap();
        let second = tree.insert(&[1, 2], "location", &json!({"v": 2})).unwrap();
        assert_eq!(first, second);

        let cofaces = tree.locate_cofaces(&[1, 2], true, Some(0)).unwrap();
        assert_eq!(cofaces.len(), 1);
        assert_eq!(cofaces[0].simplex_type.as_deref(), Some("temporal"));
    }

    #[test]
    fn insert_empty_is_invalid_argument() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        assert!(matches!(tree.insert(&[], "temporal", &json!({})), Err(StoreError::EmptySimplex)));
    }

    #[test]
    fn coface_containment() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        tree.insert(&[1, 2, 3], "temporal", &json!({})).unwrap();
        tree.insert(&[1, 2, 3, 4], "temporal", &json!({})).unwrap();

        let cofaces = tree.locate_cofaces(&[1, 2], false, None).unwrap();
        let sets: Vec<Vec<VertexId>> = cofaces.into_iter().map(|c| c.vertex_ids).collect();
        assert!(sets.contains(&vec![1, 2, 3]));
        assert!(sets.contains(&vec![1, 2, 3, 4]));
    }

    #[test]
    fn coface_default_depth_excludes_super_simplices() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        tree.insert(&[1, 2, 3], "temporal", &json!({})).unwrap();
        tree.insert(&[1, 2, 3, 4], "temporal", &json!({})).unwrap();

        // max_extra_depth = 0: only the exact match at [1,2,3] itself, no descent to [1,2,3,4].
        let cofaces = tree.locate_cofaces(&[1, 2, 3], false, Some(0)).unwrap();
        let sets: Vec<Vec<VertexId>> = cofaces.into_iter().map(|c| c.vertex_ids).collect();
        assert_eq!(sets, vec![vec![1, 2, 3]]);
    }

    #[test]
    fn gap_detection_scenario() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        tree.insert(&[1, 2, 3], "temporal", &json!({})).unwrap();

        let faces = SimplexTree::enumerate_theoretical_faces(&[1, 2, 3]);
        assert_eq!(faces.len(), 7);

        let gaps: Vec<Vec<VertexId>> = faces
            .into_iter()
            .filter(|f| f.len() >= 2)
            .filter(|f| tree.search(f).is_none())
            .collect();
        assert_eq!(gaps.len(), 3);
        assert!(gaps.contains(&vec![1, 2]));
        assert!(gaps.contains(&vec![1, 3]));
        assert!(gaps.contains(&vec![2, 3]));
    }

    #[test]
    fn cascade_removes_descendants() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        tree.insert(&[1, 2], "temporal", &json!({})).unwrap();
        tree.insert(&[1, 2, 3], "temporal", &json!({})).unwrap();

        assert!(tree.remove(&[1, 2], true).unwrap());
        assert_eq!(tree.search(&[1, 2]), None);
        assert_eq!(tree.search(&[1, 2, 3]), None);
    }

    #[test]
    fn non_cascading_remove_fails_on_non_leaf() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        tree.insert(&[1, 2], "temporal", &json!({})).unwrap();
        tree.insert(&[1, 2, 3], "temporal", &json!({})).unwrap();

        assert!(matches!(tree.remove(&[1, 2], false), Err(StoreError::HasCofaces)));
        assert!(tree.search(&[1, 2]).is_some());
    }

    #[test]
    fn remove_nonexistent_returns_false() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        assert!(!tree.remove(&[9, 10], true).unwrap());
    }

    #[test]
    fn sibling_uniqueness_enforced_by_walk() {
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        let a = tree.insert(&[1, 2], "temporal", &json!({})).unwrap();
        let b = tree.insert(&[1, 3], "temporal", &json!({})).unwrap();
        assert_ne!(a, b);
        // Both share the same root node for vertex 1.
        assert!(tree.search(&[1]).is_some());
    }

    #[test]
    fn is_subsequence_matches_subset_on_sorted_lists() {
        assert!(SimplexTree::is_subsequence(&[1, 3], &[1, 2, 3, 4]));
        assert!(!SimplexTree::is_subsequence(&[2, 5], &[1, 2, 3, 4]));
        assert!(SimplexTree::is_subsequence(&[], &[1, 2, 3]));
    }

    fn sorted_dedup(mut v: Vec<i64>) -> Vec<VertexId> {
        v.sort_unstable();
        v.dedup();
        v
    }

    /// `is_subsequence(a, b)` iff `set(a) ⊆ set(b)`, for sorted integer
    /// lists without duplicates.
    #[quickcheck_macros::quickcheck]
    fn is_subsequence_iff_subset(a: Vec<i64>, b: Vec<i64>) -> bool {
        let a = sorted_dedup(a);
        let b = sorted_dedup(b);
        let b_set: std::collections::BTreeSet<_> = b.iter().copied().collect();
        let is_subset = a.iter().all(|v| b_set.contains(v));
        SimplexTree::is_subsequence(&a, &b) == is_subset
    }

    /// `enumerate_theoretical_faces(vs)` returns exactly `2^|vs| - 1`
    /// distinct sorted lists, each a non-empty subset of `vs`.
    #[quickcheck_macros::quickcheck]
    fn enumerate_theoretical_faces_covers_every_nonempty_subset(vs: Vec<i64>) -> quickcheck::TestResult {
        let vs = sorted_dedup(vs);
        if vs.is_empty() || vs.len() > 16 {
            return quickcheck::TestResult::discard();
        }
        let faces = SimplexTree::enumerate_theoretical_faces(&vs);

        let expected_count = (1usize << vs.len()) - 1;
        if faces.len() != expected_count {
            return quickcheck::TestResult::from_bool(false);
        }

        let mut seen: std::collections::HashSet<Vec<VertexId>> = std::collections::HashSet::new();
        let vs_set: std::collections::BTreeSet<_> = vs.iter().copied().collect();
        for face in &faces {
            if face.is_empty() || !seen.insert(face.clone()) {
                return quickcheck::TestResult::from_bool(false);
            }
            let mut sorted_face = face.clone();
            sorted_face.sort_unstable();
            if *face != sorted_face {
                return quickcheck::TestResult::from_bool(false);
            }
            if !face.iter().all(|v| vs_set.contains(v)) {
                return quickcheck::TestResult::from_bool(false);
            }
        }
        quickcheck::TestResult::from_bool(true)
    }

    /// Inserting and then searching a sorted simplex always resolves to a
    /// terminal node, regardless of the order vertex ids are passed in.
    #[quickcheck_macros::quickcheck]
    fn insert_then_search_is_order_independent(vs: Vec<i64>, shuffle_seed: u8) -> quickcheck::TestResult {
        let vs = sorted_dedup(vs);
        if vs.is_empty() || vs.len() > 8 {
            return quickcheck::TestResult::discard();
        }
        let conn = setup();
        let tree = SimplexTree::new(&conn, 1);
        tree.insert(&vs, "temporal", &json!({})).unwrap();

        // Rotate by `shuffle_seed` to pass the vertex ids out of order.
        let mut permuted = vs.clone();
        let rotate_by = shuffle_seed as usize % vs.len().max(1);
        permuted.rotate_left(rotate_by);

        quickcheck::TestResult::from_bool(tree.search(&permuted).is_some())
    }
}
