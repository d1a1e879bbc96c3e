//! Error taxonomy for the ingest and retrieval orchestration layer.

use skg_common::{ConfigError, ExtractionError};
use skg_store::StoreError;
use thiserror::Error;

/// Failures raised by the ingest pipeline and the retriever.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Startup configuration was invalid (propagated from `skg_common`).
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The extractor or embedding collaborator failed.
    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    /// A store operation (simplex tree, knowledge store) failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The checkpoint file could not be read, parsed, or written.
    #[error("checkpoint I/O failed: {0}")]
    Checkpoint(String),

    /// The input activity file could not be read or parsed.
    #[error("failed to read input activities: {0}")]
    Input(String),

    /// A direct SQLite call (outside `skg_store`'s own operations) failed.
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A stored JSON column failed to parse.
    #[error("corrupt metadata column: {0}")]
    Json(#[from] serde_json::Error),
}

impl PipelineError {
    /// Build a [`PipelineError::Checkpoint`].
    pub fn checkpoint(msg: impl Into<String>) -> Self {
        Self::Checkpoint(msg.into())
    }

    /// Build a [`PipelineError::Input`].
    pub fn input(msg: impl Into<String>) -> Self {
        Self::Input(msg.into())
    }
}
