use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::{VerificationError, VerificationResult};
use crate::shared::embedding::Embedding;
use crate::store::domain::reference_store::{ensure_uniform_dimension, ReferenceStore};

/// In-process reference store backed by a `RwLock`-guarded map.
///
/// The default store for tests and embedded callers. The read/write lock
/// gives the required semantics directly: lookups proceed concurrently,
/// enrolls take the write lock so same-identity appends never race.
#[derive(Default)]
pub struct InMemoryReferenceStore {
    references: RwLock<HashMap<String, Vec<Embedding>>>,
}

impl InMemoryReferenceStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReferenceStore for InMemoryReferenceStore {
    fn enroll(&self, identity: &str, embedding: Embedding) -> VerificationResult<usize> {
        let mut map = self.references.write().expect("reference store lock poisoned");
        let set = map.entry(identity.to_string()).or_default();
        ensure_uniform_dimension(set.first(), &embedding)?;
        set.push(embedding);
        Ok(set.len() - 1)
    }

    fn lookup(&self, identity: &str) -> VerificationResult<Vec<Embedding>> {
        let map = self.references.read().expect("reference store lock poisoned");
        match map.get(identity) {
            Some(set) if !set.is_empty() => Ok(set.clone()),
            _ => Err(VerificationError::UnknownIdentity {
                identity: identity.to_string(),
            }),
        }
    }

    fn identities(&self) -> VerificationResult<Vec<String>> {
        let map = self.references.read().expect("reference store lock poisoned");
        let mut names: Vec<String> = map
            .iter()
            .filter(|(_, set)| !set.is_empty())
            .map(|(identity, _)| identity.clone())
            .collect();
        names.sort();
        Ok(names)
    }

    fn clear(&self, identity: &str) -> VerificationResult<()> {
        let mut map = self.references.write().expect("reference store lock poisoned");
        map.remove(identity);
        Ok(())
    }
}
