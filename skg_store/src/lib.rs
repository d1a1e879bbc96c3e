//! Persistence-backed core: schema, simplex tree, knowledge store, witness
//! builder.
//!
//! The SQLite-backed persistence schema, the simplex tree trie index, the
//! canonicalizing vertex/edge store, and the streaming witness-complex
//! builder. Everything here is synchronous and single-writer: no connection
//! pool, no multi-writer concurrency.

#![allow(clippy::missing_errors_doc)]

pub mod error;
pub mod knowledge;
pub mod schema;
pub mod simplex;
pub mod witness;

pub use error::StoreError;
pub use knowledge::KnowledgeStore;
pub use schema::{init_schema, open_connection};
pub use simplex::{CofaceMatch, SimplexTree};
pub use witness::WitnessComplexBuilder;
