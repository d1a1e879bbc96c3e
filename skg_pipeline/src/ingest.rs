//! Ingest orchestration: `process_entry`, checkpointing, and the run loop.
//!
//! Grounded on `examples/original_source/src/pipeline.py::process_entry` and
//! `run_pipeline` for exact control flow; the checkpoint file shape and the
//! `N = 10` write cadence match the reference verbatim.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use skg_common::{
    activity::{extract_location, extract_notification_topics, normalize_timestamp, parse_title},
    canonical_key, ActivityType, Extractor, RawActivity, UserId, VertexId,
};
use skg_store::{KnowledgeStore, SimplexTree, WitnessComplexBuilder};
use tracing::{info, warn};

use crate::error::PipelineError;

/// Checkpoint is rewritten after every `N` processed entries, matching the
/// reference's `len(processed_indices) % 10 == 0`.
const CHECKPOINT_INTERVAL: usize = 10;

/// JSON-serializable resume state: `{processed_indices: [int,…],
/// entries_with_vertices: [[ [vid,…], ts_string ], …]}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Checkpoint {
    /// Input-array indices already processed.
    pub processed_indices: Vec<usize>,
    /// `(vertex_ids, timestamp)` for every processed entry that produced at
    /// least one vertex — retained so a resumed run can still feed them to
    /// the witness builder if it is reconstructed from scratch.
    pub entries_with_vertices: Vec<(Vec<VertexId>, String)>,
}

impl Checkpoint {
    /// Loads a checkpoint from `path`, or an empty one if the file does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError::Checkpoint`] if the file exists but
    /// cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self, PipelineError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let text = std::fs::read_to_string(path).map_err(|e| PipelineError::checkpoint(e.to_string()))?;
        serde_json::from_str(&text).map_err(|e| PipelineError::checkpoint(e.to_string()))
    }

    /// Writes this checkpoint to `path`, overwriting any existing file.
    ///
    /// # Errors
    ///
    /// Returns a [`PipelineError::Checkpoint`] if the file cannot be
    /// written.
    pub fn save(&self, path: &Path) -> Result<(), PipelineError> {
        let text = serde_json::to_string(self).map_err(|e| PipelineError::checkpoint(e.to_string()))?;
        std::fs::write(path, text).map_err(|e| PipelineError::checkpoint(e.to_string()))
    }
}

/// Processes one raw activity record: parses its title, extracts entities
/// and relationships (or notification topics), and upserts the resulting
/// vertices/edges. Returns the vertex ids produced and the entry's
/// timestamp, for the caller to feed into the witness builder.
///
/// Notification entries never call the extractor — their topics come
/// straight from `subtitles`. Entries with no extractable content are
/// skipped (empty vertex list returned, no extractor call made).
///
/// # Errors
///
/// Returns a [`PipelineError`] if extraction or persistence fails.
pub fn process_entry<E: Extractor>(
    entry: &RawActivity,
    store: &mut KnowledgeStore<'_, E>,
    extractor: &E,
) -> Result<(Vec<VertexId>, String), PipelineError> {
    let timestamp = entry.time.clone();
    let activity = parse_title(&entry.title);

    if activity.activity_type == ActivityType::Notification {
        let topics = extract_notification_topics(entry.subtitles.as_deref());
        let mut vertex_ids = Vec::with_capacity(topics.len());
        for topic in &topics {
            vertex_ids.push(store.get_or_create_vertex(topic, &timestamp)?);
        }
        return Ok((vertex_ids, timestamp));
    }

    if activity.content.is_empty() {
        return Ok((Vec::new(), timestamp));
    }

    let extraction = extractor.extract(&activity)?;

    let mut entity_to_vertex: HashMap<String, VertexId> = HashMap::new();
    let mut vertex_ids = Vec::with_capacity(extraction.entities.len());
    for entity in &extraction.entities {
        let vid = store.get_or_create_vertex(entity, &timestamp)?;
        entity_to_vertex.insert(canonical_key(entity), vid);
        vertex_ids.push(vid);
    }

    for rel in &extraction.relationships {
        let subject = entity_to_vertex.get(&canonical_key(&rel.subject));
        let object = entity_to_vertex.get(&canonical_key(&rel.object));
        if let (Some(&subj), Some(&obj)) = (subject, object) {
            store.create_edge(subj, obj, &rel.predicate, &timestamp)?;
        }
    }

    Ok((vertex_ids, timestamp))
}

/// Configuration for one ingest run.
#[derive(Debug, Clone)]
pub struct IngestConfig {
    /// Path to the input activity JSON array.
    pub input_path: PathBuf,
    /// Path to the SQLite database file.
    pub db_path: String,
    /// Path to the checkpoint JSON file.
    pub checkpoint_path: PathBuf,
    /// Tenant partition key.
    pub user_id: UserId,
    /// Cap on the number of input entries considered, applied before
    /// resume filtering.
    pub limit: Option<usize>,
    /// Temporal witness window, in minutes.
    pub window_minutes: i64,
    /// Delay between extractor calls, for rate limiting.
    pub delay: Duration,
    /// Whether to resume from an existing checkpoint (`--no-resume` negates
    /// this at the CLI layer).
    pub resume: bool,
}

/// Summary statistics printed at the end of a successful or interrupted
/// ingest run.
#[derive(Debug, Clone, Copy, Default)]
pub struct IngestSummary {
    /// Entries that produced at least one vertex.
    pub entries_with_vertices: usize,
    /// Whether the run was interrupted before completion.
    pub interrupted: bool,
}

/// Runs the ingest pipeline: parses each input entry, extracts
/// vertices/edges, and feeds them to the witness builder, checkpointing
/// every [`CHECKPOINT_INTERVAL`] entries and on interruption.
///
/// `interrupted` is polled between entries; when it is set, the current
/// checkpoint is flushed, the witness builder's pending temporal window is
/// finalized, and the function returns `Ok` with `interrupted = true` so the
/// caller can exit cleanly after checkpointing.
///
/// # Errors
///
/// Returns a [`PipelineError`] if the input cannot be read, the database
/// cannot be opened, or a non-recoverable store/extraction error occurs.
/// An [`skg_common::error::ExtractionError`] for a single entry is not
/// fatal by itself at the call site that invokes this function: this
/// function propagates it and leaves that entry unprocessed, so it is not
/// recorded in the checkpoint.
pub fn run_ingest<E: Extractor>(
    config: &IngestConfig,
    extractor: &E,
    interrupted: &Arc<AtomicBool>,
) -> Result<IngestSummary, PipelineError> {
    let text = std::fs::read_to_string(&config.input_path).map_err(|e| PipelineError::input(e.to_string()))?;
    let mut entries: Vec<RawActivity> =
        serde_json::from_str(&text).map_err(|e| PipelineError::input(e.to_string()))?;
    if let Some(limit) = config.limit {
        entries.truncate(limit);
    }
    let total = entries.len();

    let conn = skg_store::open_connection(&config.db_path)?;
    skg_store::init_schema(&conn)?;

    let mut store = KnowledgeStore::open(&conn, config.user_id, extractor)?;
    let tree = SimplexTree::new(&conn, config.user_id);
    let mut witness_builder = WitnessComplexBuilder::new(config.window_minutes);

    let mut checkpoint = if config.resume {
        Checkpoint::load(&config.checkpoint_path)?
    } else {
        Checkpoint::default()
    };
    let mut processed: HashSet<usize> = checkpoint.processed_indices.iter().copied().collect();
    if !processed.is_empty() {
        info!(processed = processed.len(), "resuming from checkpoint");
    }
    info!(remaining = total - processed.len(), total, "processing entries");

    for (index, entry) in entries.iter().enumerate() {
        if processed.contains(&index) {
            continue;
        }
        if interrupted.load(Ordering::SeqCst) {
            warn!("interrupted, checkpointing and exiting");
            checkpoint.processed_indices = processed.into_iter().collect();
            checkpoint.save(&config.checkpoint_path)?;
            witness_builder.finalize(&tree)?;
            return Ok(IngestSummary {
                entries_with_vertices: checkpoint.entries_with_vertices.len(),
                interrupted: true,
            });
        }

        let (vertex_ids, timestamp) = process_entry(entry, &mut store, extractor)?;

        if !vertex_ids.is_empty() {
            checkpoint.entries_with_vertices.push((vertex_ids.clone(), timestamp.clone()));

            let location = extract_location(entry.location_infos.as_deref());
            let normalized = normalize_timestamp(&timestamp);
            let seconds = parse_timestamp_seconds(&normalized)?;
            witness_builder.add_entry(&tree, &vertex_ids, &normalized, seconds, location)?;
        }

        processed.insert(index);

        if processed.len() % CHECKPOINT_INTERVAL == 0 {
            checkpoint.processed_indices = processed.iter().copied().collect();
            checkpoint.save(&config.checkpoint_path)?;
            info!(processed = processed.len(), total, "checkpointed");
        }

        if !config.delay.is_zero() {
            std::thread::sleep(config.delay);
        }
    }

    checkpoint.processed_indices = processed.into_iter().collect();
    checkpoint.save(&config.checkpoint_path)?;
    witness_builder.finalize(&tree)?;

    let summary = IngestSummary {
        entries_with_vertices: checkpoint.entries_with_vertices.len(),
        interrupted: false,
    };
    log_final_counts(&conn, config.user_id)?;
    Ok(summary)
}

fn log_final_counts(conn: &Connection, user_id: UserId) -> Result<(), PipelineError> {
    let vertex_count: i64 =
        conn.query_row("SELECT count(*) FROM user_knowledge_vertex WHERE user_id = ?1", [user_id], |r| r.get(0))?;
    let edge_count: i64 =
        conn.query_row("SELECT count(*) FROM user_knowledge_edge WHERE user_id = ?1", [user_id], |r| r.get(0))?;
    let simplex_count: i64 =
        conn.query_row("SELECT count(*) FROM simplex_vertex WHERE user_id = ?1", [user_id], |r| r.get(0))?;
    info!(vertex_count, edge_count, simplex_count, "ingest complete");
    Ok(())
}

/// Parses an RFC3339 timestamp (with `Z` already normalized to `+00:00`)
/// into whole seconds since the Unix epoch, for the witness builder's
/// window-comparison arithmetic. Kept at second precision (rather than
/// floored to minutes) so the comparison matches `pipeline.py`'s
/// `timestamp - window_end <= timedelta(minutes=W)` at sub-minute window
/// boundaries.
fn parse_timestamp_seconds(normalized: &str) -> Result<i64, PipelineError> {
    let parsed = chrono::DateTime::parse_from_rfc3339(normalized)
        .map_err(|e| PipelineError::input(format!("invalid timestamp {normalized}: {e}")))?;
    Ok(parsed.timestamp())
}

#[cfg(test)]
mod tests {
    use super::*;
    use skg_common::testing::MockExtractor;
    use skg_common::activity::Subtitle;

    fn vertex_count(conn: &Connection) -> i64 {
        conn.query_row("SELECT count(*) FROM user_knowledge_vertex", [], |r| r.get(0)).unwrap()
    }

    #[test]
    fn process_entry_notification_skips_extractor() {
        let conn = Connection::open_in_memory().unwrap();
        skg_store::init_schema(&conn).unwrap();
        let extractor = MockExtractor::new();
        let mut store = KnowledgeStore::open(&conn, 1, &extractor).unwrap();

        let entry = RawActivity {
            title: "1 notification".to_string(),
            subtitles: Some(vec![
                Subtitle { name: "Including topics:".to_string() },
                Subtitle { name: "Sports".to_string() },
            ]),
            location_infos: None,
            time: "2024-01-01T10:00:00Z".to_string(),
        };

        let (vertex_ids, ts) = process_entry(&entry, &mut store, &extractor).unwrap();
        assert_eq!(vertex_ids.len(), 1);
        assert_eq!(ts, "2024-01-01T10:00:00Z");
        assert_eq!(vertex_count(&conn), 1);
    }

    #[test]
    fn process_entry_empty_content_produces_no_vertices() {
        let conn = Connection::open_in_memory().unwrap();
        skg_store::init_schema(&conn).unwrap();
        let extractor = MockExtractor::new();
        let mut store = KnowledgeStore::open(&conn, 1, &extractor).unwrap();

        let entry = RawActivity {
            title: "Used Search".to_string(),
            subtitles: None,
            location_infos: None,
            time: "2024-01-01T10:00:00Z".to_string(),
        };

        let (vertex_ids, _) = process_entry(&entry, &mut store, &extractor).unwrap();
        assert!(vertex_ids.is_empty());
        assert_eq!(vertex_count(&conn), 0);
    }

    #[test]
    fn process_entry_searched_creates_vertex() {
        let conn = Connection::open_in_memory().unwrap();
        skg_store::init_schema(&conn).unwrap();
        let extractor = MockExtractor::new();
        let mut store = KnowledgeStore::open(&conn, 1, &extractor).unwrap();

        let entry = RawActivity {
            title: "Searched for best restaurants jodhpur".to_string(),
            subtitles: None,
            location_infos: None,
            time: "2024-01-01T10:00:00Z".to_string(),
        };

        let (vertex_ids, _) = process_entry(&entry, &mut store, &extractor).unwrap();
        assert_eq!(vertex_ids.len(), 1);
    }

    #[test]
    fn checkpoint_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("checkpoint.json");

        let mut checkpoint = Checkpoint::default();
        checkpoint.processed_indices = vec![0, 1, 2];
        checkpoint.entries_with_vertices.push((vec![1, 2], "2024-01-01T10:00:00Z".to_string()));
        checkpoint.save(&path).unwrap();

        let loaded = Checkpoint::load(&path).unwrap();
        assert_eq!(loaded.processed_indices, vec![0, 1, 2]);
        assert_eq!(loaded.entries_with_vertices, vec![(vec![1, 2], "2024-01-01T10:00:00Z".to_string())]);
    }

    #[test]
    fn checkpoint_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let loaded = Checkpoint::load(&path).unwrap();
        assert!(loaded.processed_indices.is_empty());
    }

    #[test]
    fn timestamp_seconds_parses_normalized_rfc3339() {
        let seconds = parse_timestamp_seconds("2024-01-01T10:05:00+00:00").unwrap();
        assert!(seconds > 0);
    }
}
