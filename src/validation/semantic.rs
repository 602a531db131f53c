use anyhow::Result;
use async_trait::async_trait;

/// External embedding scorer, treated as a black box. Implementations wrap
/// whatever embedding model the embedder has available.
#[async_trait]
pub trait EmbeddingScorer: Send + Sync {
    /// Similarity between two texts in [0,1].
    async fn similarity(&self, text_a: &str, text_b: &str) -> Result<f32>;
}
