//! The `Extractor` contract: the external LLM/embedding collaborator.
//!
//! Entity/relationship extraction and embedding are treated as a black-box
//! `activity -> (entities, relationships)` / `text -> vector` function; only
//! the contract lives here, never a concrete client. Grounded on
//! `extraction.py`'s `EntityExtractor` (`embed`, `embed_batch`, `extract` as
//! the only three operations a caller ever invokes) and on `svql_driver`'s
//! pattern of expressing an external collaborator as a trait with an
//! associated error type.

use crate::activity::ParsedActivity;
use crate::error::ExtractionError;

/// A subject-predicate-object triple produced by extraction.
///
/// Every `subject`/`object` mentioned here must, case-folded, appear in the
/// accompanying [`ExtractionResult::entities`]. Callers drop relationships
/// that reference unknown names rather than erroring.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// The subject entity, as it appears in `entities`.
    pub subject: String,
    /// The predicate label, e.g. `located_in`.
    pub predicate: String,
    /// The object entity, as it appears in `entities`.
    pub object: String,
}

/// The structured output of one [`Extractor::extract`] call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractionResult {
    /// Entity strings mentioned in the activity.
    pub entities: Vec<String>,
    /// Relationships between those entities.
    pub relationships: Vec<Relationship>,
}

/// Contract for the external embedding and entity/relationship extraction
/// collaborator.
///
/// Implementations are considered side-effecting and possibly rate-limited;
/// callers must serialize calls and may insert delays between them. This
/// crate ships no live implementation — only [`crate::testing::MockExtractor`]
/// for offline tests and smoke-testing.
pub trait Extractor {
    /// Embeds `text` into a fixed-dimensional vector. The dimension must be
    /// the same for every call against a given database.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Embed`] if the embedding call fails.
    fn embed(&self, text: &str) -> Result<Vec<f32>, ExtractionError>;

    /// Embeds a batch of texts, preserving input order.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Embed`] if the embedding call fails.
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExtractionError>;

    /// Extracts entities and relationships from a parsed activity.
    ///
    /// # Errors
    ///
    /// Returns [`ExtractionError::Extract`] if the extraction call fails.
    fn extract(&self, activity: &ParsedActivity) -> Result<ExtractionResult, ExtractionError>;
}
