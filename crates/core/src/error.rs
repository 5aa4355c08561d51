use std::path::PathBuf;

use thiserror::Error;

pub type VerificationResult<T> = Result<T, VerificationError>;

/// Error taxonomy for enrollment and verification.
///
/// Per-frame faceless frames and capture failures are absorbed by the
/// verification loop and never appear here; everything else aborts the
/// operation that raised it.
#[derive(Debug, Error)]
pub enum VerificationError {
    /// No references enrolled for the requested identity.
    #[error("unknown identity '{identity}': no enrolled references")]
    UnknownIdentity { identity: String },

    /// The embedder found no face where one was required (enrollment, or
    /// an entire verification attempt without a single face-bearing frame).
    #[error("no face detected")]
    NoFaceDetected,

    /// A vector unusable in its context: wrong dimensionality against the
    /// identity's stored references, or zero-norm under the cosine metric.
    #[error("invalid embedding: {message}")]
    InvalidEmbedding { message: String },

    /// Two vectors of different lengths were compared. Indicates an
    /// embedder or store misconfiguration upstream; surfaced loudly.
    #[error("embedding dimension mismatch: {left} vs {right}")]
    DimensionMismatch { left: usize, right: usize },

    /// Identity keys become file names in the file-backed store, so they
    /// must be non-empty and free of path separators.
    #[error("invalid identity '{identity}': {message}")]
    InvalidIdentity { identity: String, message: String },

    /// The embedder itself failed (model I/O, inference error). Distinct
    /// from "no face": never folded into a no-match verdict.
    #[error("embedder failure: {message}")]
    Embedder { message: String },

    #[error("reference store I/O failure at {path}: {source}")]
    StoreIo {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt reference file {path}: {message}")]
    CorruptStore { path: PathBuf, message: String },
}
