//! The streaming witness-complex builder.
//!
//! Online, single-threaded construction of temporal and per-location
//! simplices as activity entries arrive. Grounded on
//! `examples/original_source/src/pipeline.py::WitnessComplexBuilder` for
//! exact transition semantics, including the documented de-facto behavior
//! around location-simplex accumulation (see `DESIGN.md`).

use std::collections::HashMap;

use serde_json::json;
use skg_common::{VertexId, WitnessLocation};

use crate::error::StoreError;
use crate::simplex::SimplexTree;

/// Witness-type label for a temporal simplex.
pub const TEMPORAL: &str = "temporal";
/// Witness-type label for a location simplex.
pub const LOCATION: &str = "location";

/// Temporal window state: the vertex set observed since the window opened,
/// and the window's open/close timestamps.
#[derive(Debug, Clone, Default)]
struct TemporalWindow {
    vertices: std::collections::BTreeSet<VertexId>,
    start: Option<String>,
    end: Option<String>,
    end_seconds_cache: Option<i64>,
}

/// Per-location accumulator: the vertex set and timestamp list observed
/// under that location so far.
#[derive(Debug, Clone, Default)]
struct LocationState {
    vertices: std::collections::BTreeSet<VertexId>,
    timestamps: Vec<String>,
}

/// Streaming constructor of temporal and per-location witness simplices.
///
/// Holds two state machines, exactly as `pipeline.py::WitnessComplexBuilder`:
/// one rolling temporal window, and one vertex-set-plus-timestamp-list
/// accumulator per location string.
pub struct WitnessComplexBuilder {
    window_minutes: i64,
    temporal: TemporalWindow,
    locations: HashMap<String, LocationState>,
}

impl WitnessComplexBuilder {
    /// Creates a builder with temporal window `window_minutes`. This crate
    /// leaves the default to its caller — see `skg_pipeline`'s CLI
    /// `--window` flag.
    #[must_use]
    pub fn new(window_minutes: i64) -> Self {
        Self {
            window_minutes,
            temporal: TemporalWindow::default(),
            locations: HashMap::new(),
        }
    }

    /// Processes one entry's vertex ids, timestamp, and optional location.
    ///
    /// Timestamps must arrive in non-decreasing order. `timestamp_seconds`
    /// is the timestamp converted to whole seconds-since-epoch (or any
    /// monotonically comparable unit at second precision) by the caller —
    /// this module has no notion of wall-clock parsing itself, that lives in
    /// `skg_common::activity`/the pipeline's timestamp handling. Comparing
    /// at second precision (rather than flooring to minutes first) matches
    /// `pipeline.py`'s `timestamp - window_end <= timedelta(minutes=W)`
    /// exactly at sub-minute window boundaries.
    ///
    /// No-op if `vertex_ids` is empty.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if inserting a flushed simplex fails.
    pub fn add_entry(
        &mut self,
        tree: &SimplexTree<'_>,
        vertex_ids: &[VertexId],
        timestamp: &str,
        timestamp_seconds: i64,
        location: Option<WitnessLocation>,
    ) -> Result<(), StoreError> {
        if vertex_ids.is_empty() {
            return Ok(());
        }

        self.advance_temporal_window(tree, vertex_ids, timestamp, timestamp_seconds)?;

        if let Some(location) = location {
            self.advance_location(tree, vertex_ids, timestamp, location)?;
        }

        Ok(())
    }

    fn advance_temporal_window(
        &mut self,
        tree: &SimplexTree<'_>,
        vertex_ids: &[VertexId],
        timestamp: &str,
        timestamp_seconds: i64,
    ) -> Result<(), StoreError> {
        let window_seconds = self.window_minutes * 60;
        match self.temporal.end_seconds() {
            None => {
                self.temporal.vertices = vertex_ids.iter().copied().collect();
                self.temporal.start = Some(timestamp.to_string());
                self.temporal.end = Some(timestamp.to_string());
                self.temporal.end_seconds_cache = Some(timestamp_seconds);
            }
            Some(end_seconds) if timestamp_seconds - end_seconds <= window_seconds => {
                self.temporal.vertices.extend(vertex_ids.iter().copied());
                // An out-of-order entry (ts < window_end) uses window_end as the
                // later of the two rather than retroactively rewinding it.
                if timestamp_seconds >= end_seconds {
                    self.temporal.end = Some(timestamp.to_string());
                    self.temporal.end_seconds_cache = Some(timestamp_seconds);
                }
            }
            Some(_) => {
                self.flush_temporal_window(tree)?;
                self.temporal.vertices = vertex_ids.iter().copied().collect();
                self.temporal.start = Some(timestamp.to_string());
                self.temporal.end = Some(timestamp.to_string());
                self.temporal.end_seconds_cache = Some(timestamp_seconds);
            }
        }
        Ok(())
    }

    fn flush_temporal_window(&mut self, tree: &SimplexTree<'_>) -> Result<(), StoreError> {
        if self.temporal.vertices.len() >= 2 {
            if let (Some(start), Some(end)) = (&self.temporal.start, &self.temporal.end) {
                tree.insert(
                    &self.temporal.vertices.iter().copied().collect::<Vec<_>>(),
                    TEMPORAL,
                    &json!({
                        "window_start": start,
                        "window_end": end,
                        "window_minutes": self.window_minutes,
                    }),
                )?;
            }
        }
        Ok(())
    }

    fn advance_location(
        &mut self,
        tree: &SimplexTree<'_>,
        vertex_ids: &[VertexId],
        timestamp: &str,
        location: WitnessLocation,
    ) -> Result<(), StoreError> {
        let state = self.locations.entry(location.as_str().to_string()).or_default();
        state.vertices.extend(vertex_ids.iter().copied());
        state.timestamps.push(timestamp.to_string());

        if state.vertices.len() < 2 {
            return Ok(());
        }

        let mut sorted_ts = state.timestamps.clone();
        sorted_ts.sort();
        let first_seen = sorted_ts.first().cloned().unwrap_or_default();
        let last_seen = sorted_ts.last().cloned().unwrap_or_default();

        // The reference (`_update_location_simplex`) carries a commented-out
        // intent to remove the prior simplex for this location before
        // inserting the grown one, but never actually does so. This builder
        // preserves that de-facto behavior: historical sub-simplices for a
        // location accumulate rather than being superseded. See DESIGN.md.
        tree.insert(
            &state.vertices.iter().copied().collect::<Vec<_>>(),
            LOCATION,
            &json!({
                "location": location.as_str(),
                "first_seen": first_seen,
                "last_seen": last_seen,
                "entry_count": state.timestamps.len(),
            }),
        )?;
        Ok(())
    }

    /// Flushes the pending temporal window, if it has `>= 2` vertices. Call
    /// once at the end of processing, and on interruption before exit.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] if inserting the flushed simplex fails.
    pub fn finalize(&mut self, tree: &SimplexTree<'_>) -> Result<(), StoreError> {
        self.flush_temporal_window(tree)
    }
}

impl TemporalWindow {
    const fn end_seconds(&self) -> Option<i64> {
        self.end_seconds_cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema;
    use rusqlite::Connection;

    fn setup_tree(conn: &Connection) {
        schema::init_schema(conn).unwrap();
        let values: Vec<String> = (1..=10)
            .map(|i| format!("({i},1,'v{i}','[]','{{}}')"))
            .collect();
        conn.execute(
            &format!(
                "INSERT INTO user_knowledge_vertex (vertex_id, user_id, content, embedding, meta_data) VALUES {}",
                values.join(",")
            ),
            [],
        )
        .unwrap();
    }

    #[test]
    fn temporal_flush_on_window_close_and_finalize() {
        let conn = Connection::open_in_memory().unwrap();
        setup_tree(&conn);
        let tree = SimplexTree::new(&conn, 1);
        let mut builder = WitnessComplexBuilder::new(5);

        builder.add_entry(&tree, &[1, 2], "10:00", 0, None).unwrap();
        builder.add_entry(&tree, &[2, 3], "10:04", 4 * 60, None).unwrap();
        builder.add_entry(&tree, &[4, 5], "10:20", 20 * 60, None).unwrap();

        // Window [0,4] covering {1,2,3} should have been flushed by the third call.
        assert!(tree.search(&[1, 2, 3]).is_some());

        builder.finalize(&tree).unwrap();
        assert!(tree.search(&[4, 5]).is_some());
    }

    #[test]
    fn temporal_window_extends_within_bound() {
        let conn = Connection::open_in_memory().unwrap();
        setup_tree(&conn);
        let tree = SimplexTree::new(&conn, 1);
        let mut builder = WitnessComplexBuilder::new(5);

        builder.add_entry(&tree, &[1, 2], "10:00", 0, None).unwrap();
        builder.add_entry(&tree, &[3], "10:05", 5 * 60, None).unwrap();
        builder.finalize(&tree).unwrap();

        assert!(tree.search(&[1, 2, 3]).is_some());
    }

    #[test]
    fn window_flushes_past_sub_minute_boundary() {
        let conn = Connection::open_in_memory().unwrap();
        setup_tree(&conn);
        let tree = SimplexTree::new(&conn, 1);
        let mut builder = WitnessComplexBuilder::new(5);

        builder.add_entry(&tree, &[1, 2], "10:00:00", 0, None).unwrap();
        // 5m40s later: past the 5-minute window even though both timestamps
        // floor to the same/adjacent minute.
        builder.add_entry(&tree, &[3], "10:05:40", 5 * 60 + 40, None).unwrap();

        assert!(tree.search(&[1, 2]).is_some());
        assert!(tree.search(&[1, 2, 3]).is_none());
    }

    #[test]
    fn single_vertex_window_never_flushes() {
        let conn = Connection::open_in_memory().unwrap();
        setup_tree(&conn);
        let tree = SimplexTree::new(&conn, 1);
        let mut builder = WitnessComplexBuilder::new(5);

        builder.add_entry(&tree, &[1], "10:00", 0, None).unwrap();
        builder.finalize(&tree).unwrap();

        let count: i64 = conn
            .query_row("SELECT count(*) FROM simplex_vertex", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }

    #[test]
    fn location_simplex_grows_and_accumulates_history() {
        let conn = Connection::open_in_memory().unwrap();
        setup_tree(&conn);
        let tree = SimplexTree::new(&conn, 1);
        let mut builder = WitnessComplexBuilder::new(30);

        builder.add_entry(&tree, &[1, 2], "10:00", 0, Some(WitnessLocation::Home)).unwrap();
        builder.add_entry(&tree, &[3], "10:05", 5 * 60, Some(WitnessLocation::Home)).unwrap();

        // De-facto accumulation: the earlier {1,2} simplex is never removed.
        assert!(tree.search(&[1, 2]).is_some());
        assert!(tree.search(&[1, 2, 3]).is_some());
    }

    #[test]
    fn out_of_order_entry_does_not_rewind_window_end() {
        let conn = Connection::open_in_memory().unwrap();
        setup_tree(&conn);
        let tree = SimplexTree::new(&conn, 1);
        let mut builder = WitnessComplexBuilder::new(5);

        builder.add_entry(&tree, &[1, 2], "10:05", 5 * 60, None).unwrap();
        // Out-of-order: ts < window_end, still within window.
        builder.add_entry(&tree, &[3], "10:02", 2 * 60, None).unwrap();
        builder.finalize(&tree).unwrap();

        assert!(tree.search(&[1, 2, 3]).is_some());
    }
}
