use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::embedder::domain::face_embedder::FaceEmbedder;
use crate::error::{VerificationError, VerificationResult};
use crate::shared::frame::Frame;
use crate::store::domain::reference_store::ReferenceStore;

/// Receipt for a successful enrollment.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EnrollmentRecord {
    pub identity: String,
    /// Zero-based position of the new reference within the identity's set.
    pub reference_index: usize,
    pub dimension: usize,
}

/// Single-step enrollment: one image, one embedding, one append.
///
/// No aggregation is involved; an image without a detectable face fails
/// with `NoFaceDetected` and nothing is stored.
pub struct EnrollIdentityUseCase {
    store: Arc<dyn ReferenceStore>,
    embedder: Box<dyn FaceEmbedder>,
}

impl EnrollIdentityUseCase {
    pub fn new(store: Arc<dyn ReferenceStore>, embedder: Box<dyn FaceEmbedder>) -> Self {
        Self { store, embedder }
    }

    pub fn execute(&mut self, identity: &str, frame: &Frame) -> VerificationResult<EnrollmentRecord> {
        let embedding = self
            .embedder
            .embed(frame)
            .map_err(|err| VerificationError::Embedder {
                message: err.to_string(),
            })?
            .ok_or(VerificationError::NoFaceDetected)?;

        let dimension = embedding.dimension();
        let reference_index = self.store.enroll(identity, embedding)?;
        log::info!("enrolled reference #{reference_index} for '{identity}'");

        Ok(EnrollmentRecord {
            identity: identity.to_string(),
            reference_index,
            dimension,
        })
    }
}
