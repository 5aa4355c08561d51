use crate::error::{VerificationError, VerificationResult};
use crate::shared::embedding::Embedding;

/// Persists enrolled reference embeddings keyed by identity.
///
/// Reference sets are append-only from the verification path's point of
/// view: `enroll` extends, `lookup` reads. `clear` exists for external
/// administrative callers and is never invoked during verification.
///
/// Implementations must allow concurrent `lookup` calls without mutual
/// exclusion and serialize `enroll` calls for the same identity so no
/// append is lost.
pub trait ReferenceStore: Send + Sync {
    /// Appends `embedding` to the identity's reference set, creating the
    /// set if absent. Returns the zero-based index of the new reference.
    ///
    /// Fails with `InvalidEmbedding` when the dimensionality disagrees
    /// with previously stored references for the same identity.
    fn enroll(&self, identity: &str, embedding: Embedding) -> VerificationResult<usize>;

    /// Stored references in insertion order.
    ///
    /// Fails with `UnknownIdentity` when the identity has no references;
    /// an identity with zero embeddings is equivalent to "not enrolled".
    fn lookup(&self, identity: &str) -> VerificationResult<Vec<Embedding>>;

    /// Every identity with at least one reference, sorted.
    fn identities(&self) -> VerificationResult<Vec<String>>;

    /// Removes all references for the identity. Administrative only;
    /// removing an unknown identity is not an error.
    fn clear(&self, identity: &str) -> VerificationResult<()>;
}

/// Shared dimensionality check for store implementations.
pub(crate) fn ensure_uniform_dimension(
    existing: Option<&Embedding>,
    incoming: &Embedding,
) -> VerificationResult<()> {
    if let Some(reference) = existing {
        if reference.dimension() != incoming.dimension() {
            return Err(VerificationError::InvalidEmbedding {
                message: format!(
                    "expected {} components to match existing references, found {}",
                    reference.dimension(),
                    incoming.dimension()
                ),
            });
        }
    }
    Ok(())
}
