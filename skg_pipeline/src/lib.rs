//! Ingest and retrieval orchestration on top of `skg_store`'s engine.
//!
//! Two halves: the ingest run loop (checkpointing, resume, rate limiting)
//! and the retriever (query -> matched vertices -> cofaces -> gaps ->
//! formatted context).

#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod ingest;
pub mod retriever;

pub use error::PipelineError;
pub use ingest::{process_entry, run_ingest, Checkpoint, IngestConfig, IngestSummary};
pub use retriever::{cosine_similarity, format_context, KnowledgeRetriever};
