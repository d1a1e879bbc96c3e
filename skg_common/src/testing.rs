//! A deterministic, offline stand-in for the external extractor.
//!
//! `extraction.py::EntityExtractor` requires a live `DEDALUS_API_KEY` and
//! makes real network calls, so nothing in this workspace can exercise a
//! test or a local smoke-run against it. `svql_subgraph::test_harness`
//! follows the same shape for its own expensive external dependency
//! (invoking the real Yosys binary): a hand-rolled stand-in that is cheap,
//! deterministic, and offline. [`MockExtractor`] is that stand-in here —
//! hash-based pseudo-embeddings instead of a real embedding model, and a
//! trivial "extraction" that treats the whole activity content as one
//! entity with no relationships (real LLM-shaped entity/relationship
//! extraction has no offline equivalent worth faking).

use crate::activity::ParsedActivity;
use crate::error::ExtractionError;
use crate::extractor::{Extractor, ExtractionResult};

/// Fixed embedding dimension used by [`MockExtractor`].
pub const MOCK_EMBEDDING_DIM: usize = 16;

/// A deterministic, offline [`Extractor`] implementation.
///
/// `embed` hashes the input text into [`MOCK_EMBEDDING_DIM`] pseudo-random
/// floats in `[-1.0, 1.0]`; identical text always yields an identical
/// vector, and unrelated text yields (with overwhelming probability)
/// distinct vectors — enough to exercise cosine-similarity retrieval
/// end-to-end without a network call.
#[derive(Debug, Clone, Copy, Default)]
pub struct MockExtractor;

impl MockExtractor {
    /// Creates a new mock extractor. Carries no state.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn pseudo_embed(text: &str) -> Vec<f32> {
        let mut out = Vec::with_capacity(MOCK_EMBEDDING_DIM);
        for i in 0..MOCK_EMBEDDING_DIM {
            out.push(fnv1a_unit_float(text, i as u64));
        }
        out
    }
}

/// FNV-1a hash of `text` salted by `salt`, folded into `[-1.0, 1.0]`.
fn fnv1a_unit_float(text: &str, salt: u64) -> f32 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    let mut hash = FNV_OFFSET ^ salt;
    for byte in text.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    // Map the top 24 bits onto [-1.0, 1.0].
    let scaled = (hash >> 40) as u32 & 0x00FF_FFFF;
    (scaled as f32 / 0x00FF_FFFF as f32).mul_add(2.0, -1.0)
}

impl Extractor for MockExtractor {
    fn embed(&self, text: &str) -> Result<Vec<f32>, ExtractionError> {
        Ok(Self::pseudo_embed(text))
    }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, ExtractionError> {
        Ok(texts.iter().map(|t| Self::pseudo_embed(t)).collect())
    }

    fn extract(&self, activity: &ParsedActivity) -> Result<ExtractionResult, ExtractionError> {
        if activity.content.is_empty() {
            return Ok(ExtractionResult::default());
        }
        Ok(ExtractionResult {
            entities: vec![activity.content.clone()],
            relationships: Vec::new(),
        })
    }
}
