//! Shared types and contracts for the simplicial knowledge graph core.
//!
//! This crate holds everything the rest of the workspace agrees on: the
//! persistent data model, the activity parser, the `Extractor` contract, and
//! the error taxonomy. It has no knowledge of SQL or of any particular LLM
//! backend.

#![allow(clippy::missing_errors_doc)]

pub mod activity;
pub mod config;
pub mod error;
pub mod extractor;
pub mod model;
pub mod testing;

pub use activity::{ActivityType, LocationInfo, ParsedActivity, RawActivity, Subtitle, WitnessLocation};
pub use error::{ConfigError, ExtractionError};
pub use extractor::{Extractor, ExtractionResult, Relationship};
pub use model::{
    canonical_key, Coface, Edge, EdgeId, EdgeMetadata, MatchedVertex, NodeId, RetrievalResult,
    UserId, Vertex, VertexId, VertexMetadata, SimplexMeta,
};
