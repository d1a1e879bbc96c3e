//! Error taxonomy for the persistence-backed store.
//!
//! Shaped like `svql_query::session::error::QueryError`: one variant per
//! failure mode, `#[error("...")]` messages, helper constructors for the
//! string-carrying variants. `search_simplex` and `remove_simplex` are
//! deliberately *not* represented here — they keep returning `Option`/`bool`
//! rather than escalating to a `Result`.

use thiserror::Error;

/// Failures raised by the simplex tree, knowledge store, and witness
/// builder.
#[derive(Debug, Error)]
pub enum StoreError {
    /// `insert_simplex` called with an empty vertex list.
    #[error("cannot insert a simplex with an empty vertex set")]
    EmptySimplex,

    /// `remove_simplex` called on a non-leaf node with `remove_cofaces =
    /// false`.
    #[error("simplex has cofaces; pass remove_cofaces = true to cascade")]
    HasCofaces,

    /// A database insert returned no row id, or a constraint other than the
    /// expected uniqueness-dedup case was violated.
    #[error("persistence failure: {0}")]
    Persistence(String),

    /// The underlying SQLite call failed.
    #[error("database error: {0}")]
    Sql(#[from] rusqlite::Error),

    /// A stored JSON column failed to parse.
    #[error("corrupt metadata column: {0}")]
    Corrupt(#[from] serde_json::Error),
}

impl StoreError {
    /// Build a [`StoreError::Persistence`].
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }
}
