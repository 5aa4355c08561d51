use std::env;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;

use crate::error::{VerificationError, VerificationResult};
use crate::shared::embedding::Embedding;
use crate::store::domain::reference_store::{ensure_uniform_dimension, ReferenceStore};

const STORE_DIR_ENV: &str = "FACEVERIFY_STORE_DIR";
const STORE_VERSION: u32 = 1;

/// On-disk record: one file per identity, always a sequence of references.
///
/// `references` is an array even for a single enrollment, so readers never
/// sniff whether the payload is one vector or a list of them.
#[derive(Debug, Serialize, Deserialize)]
struct ReferenceFile {
    version: u32,
    identity: String,
    references: Vec<Embedding>,
}

/// File-backed reference store: `<dir>/<identity>.json` per identity.
///
/// Writes go through a temp file in the same directory and a rename, so a
/// crashed enroll never leaves a half-written reference set. A single
/// writer mutex serializes enrolls; lookups read the filesystem directly.
pub struct JsonFileReferenceStore {
    dir: PathBuf,
    writer: Mutex<()>,
}

impl JsonFileReferenceStore {
    /// Opens (and creates, if needed) a store rooted at `dir`.
    pub fn open(dir: impl Into<PathBuf>) -> VerificationResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| VerificationError::StoreIo {
            path: dir.clone(),
            source,
        })?;
        Ok(Self {
            dir,
            writer: Mutex::new(()),
        })
    }

    /// Opens the store at the default location: an explicit override,
    /// `$FACEVERIFY_STORE_DIR`, or the platform data directory.
    pub fn open_default(override_dir: Option<&Path>) -> VerificationResult<Self> {
        Self::open(resolve_store_dir(override_dir))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn identity_path(&self, identity: &str) -> VerificationResult<PathBuf> {
        validate_identity(identity)?;
        Ok(self.dir.join(format!("{identity}.json")))
    }

    fn read_references(&self, identity: &str) -> VerificationResult<Vec<Embedding>> {
        let path = self.identity_path(identity)?;
        if !path.exists() {
            return Err(VerificationError::UnknownIdentity {
                identity: identity.to_string(),
            });
        }

        let data = fs::read(&path).map_err(|source| VerificationError::StoreIo {
            path: path.clone(),
            source,
        })?;
        let file: ReferenceFile =
            serde_json::from_slice(&data).map_err(|err| VerificationError::CorruptStore {
                path: path.clone(),
                message: err.to_string(),
            })?;
        Ok(file.references)
    }

    fn write_references(
        &self,
        identity: &str,
        references: &[Embedding],
    ) -> VerificationResult<()> {
        let path = self.identity_path(identity)?;
        let record = ReferenceFile {
            version: STORE_VERSION,
            identity: identity.to_string(),
            references: references.to_vec(),
        };
        let payload =
            serde_json::to_vec(&record).map_err(|err| VerificationError::CorruptStore {
                path: path.clone(),
                message: err.to_string(),
            })?;

        let store_io = |source| VerificationError::StoreIo {
            path: path.clone(),
            source,
        };
        let mut temp = NamedTempFile::new_in(&self.dir)
            .map_err(store_io)?;
        temp.write_all(&payload).map_err(store_io)?;
        temp.persist(&path)
            .map_err(|err| VerificationError::StoreIo {
                path: path.clone(),
                source: err.error,
            })?;
        Ok(())
    }
}

impl ReferenceStore for JsonFileReferenceStore {
    fn enroll(&self, identity: &str, embedding: Embedding) -> VerificationResult<usize> {
        let _guard = self.writer.lock().expect("store writer lock poisoned");

        let mut references = match self.read_references(identity) {
            Ok(existing) => existing,
            Err(VerificationError::UnknownIdentity { .. }) => Vec::new(),
            Err(other) => return Err(other),
        };
        ensure_uniform_dimension(references.first(), &embedding)?;
        references.push(embedding);
        self.write_references(identity, &references)?;
        Ok(references.len() - 1)
    }

    fn lookup(&self, identity: &str) -> VerificationResult<Vec<Embedding>> {
        let references = self.read_references(identity)?;
        if references.is_empty() {
            // A file with zero references is "not enrolled".
            return Err(VerificationError::UnknownIdentity {
                identity: identity.to_string(),
            });
        }
        Ok(references)
    }

    fn identities(&self) -> VerificationResult<Vec<String>> {
        let entries = fs::read_dir(&self.dir).map_err(|source| VerificationError::StoreIo {
            path: self.dir.clone(),
            source,
        })?;

        let mut names = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|source| VerificationError::StoreIo {
                path: self.dir.clone(),
                source,
            })?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn clear(&self, identity: &str) -> VerificationResult<()> {
        let _guard = self.writer.lock().expect("store writer lock poisoned");
        let path = self.identity_path(identity)?;
        if path.exists() {
            fs::remove_file(&path).map_err(|source| VerificationError::StoreIo {
                path,
                source,
            })?;
        }
        Ok(())
    }
}

/// Override > `$FACEVERIFY_STORE_DIR` > platform data directory.
pub fn resolve_store_dir(override_dir: Option<&Path>) -> PathBuf {
    if let Some(dir) = override_dir {
        return dir.to_path_buf();
    }
    if let Ok(env_dir) = env::var(STORE_DIR_ENV) {
        return PathBuf::from(env_dir);
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("faceverify")
        .join("references")
}

fn validate_identity(identity: &str) -> VerificationResult<()> {
    if identity.is_empty() {
        return Err(VerificationError::InvalidIdentity {
            identity: identity.to_string(),
            message: "identity must not be empty".to_string(),
        });
    }
    if identity
        .chars()
        .any(|c| c == '/' || c == '\\' || c == '\0' || c == '.')
    {
        return Err(VerificationError::InvalidIdentity {
            identity: identity.to_string(),
            message: "identity must not contain path separators or dots".to_string(),
        });
    }
    Ok(())
}
