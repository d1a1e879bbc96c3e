//! Error taxonomy shared across the workspace.
//!
//! Following `svql_query::session::error::QueryError`'s shape (one variant
//! per failure mode, `#[error("...")]` messages, helper constructors for the
//! string-carrying variants), this module gives each failure mode a concrete
//! enum. Operations that signal absence or a no-op through `Option`/`bool`
//! rather than an error (`search_simplex`, `remove_simplex`) are left alone
//! elsewhere in the workspace — they are not folded into these enums merely
//! for consistency.

use thiserror::Error;

/// Startup-time configuration failures: missing credentials, bad paths.
/// Fatal — callers should abort rather than retry.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required environment variable was unset or empty.
    #[error("missing or empty required environment variable: {0}")]
    MissingEnvVar(String),
    /// A path given on the command line does not exist or is not readable.
    #[error("invalid path: {0}")]
    InvalidPath(String),
}

impl ConfigError {
    /// Build a [`ConfigError::MissingEnvVar`].
    pub fn missing_env_var(name: impl Into<String>) -> Self {
        Self::MissingEnvVar(name.into())
    }

    /// Build a [`ConfigError::InvalidPath`].
    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }
}

/// Extractor/embedding failures: the external LLM or embedding collaborator
/// returned an error or malformed output. The current entry is not
/// checkpointed when this propagates out of pipeline processing.
#[derive(Debug, Error)]
pub enum ExtractionError {
    /// The embedding call failed or returned malformed output.
    #[error("embedding failed: {0}")]
    Embed(String),
    /// The entity/relationship extraction call failed or returned malformed
    /// output.
    #[error("extraction failed: {0}")]
    Extract(String),
}

impl ExtractionError {
    /// Build an [`ExtractionError::Embed`].
    pub fn embed(msg: impl Into<String>) -> Self {
        Self::Embed(msg.into())
    }

    /// Build an [`ExtractionError::Extract`].
    pub fn extract(msg: impl Into<String>) -> Self {
        Self::Extract(msg.into())
    }
}
