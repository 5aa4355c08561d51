use crate::shared::embedding::Embedding;
use crate::shared::frame::Frame;

/// Domain interface for face embedding extraction.
///
/// Produces at most one embedding per frame: the single most prominent
/// face, or `None` when the frame bears no face. All embeddings from one
/// implementation share a fixed, deployment-wide dimensionality.
///
/// Implementations may hold mutable inference state, hence `&mut self`.
pub trait FaceEmbedder: Send {
    fn embed(&mut self, frame: &Frame) -> Result<Option<Embedding>, Box<dyn std::error::Error>>;

    /// Length of every embedding this embedder produces.
    fn dimension(&self) -> usize;
}
