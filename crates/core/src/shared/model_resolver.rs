use std::env;
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

/// Directory override for model files, checked before the platform cache.
const MODEL_DIR_ENV: &str = "FACEVERIFY_MODEL_DIR";

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("could not determine model cache directory")]
    NoCacheDir,
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download stream interrupted for {url}: {source}")]
    Stream {
        url: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// A downloadable model file, identified by file name and release URL.
#[derive(Clone, Debug)]
pub struct ModelFile {
    pub name: &'static str,
    pub url: &'static str,
}

impl ModelFile {
    /// Locate the model on disk, downloading it on a cache miss.
    ///
    /// Resolution order:
    /// 1. `$FACEVERIFY_MODEL_DIR/<name>` (pre-provisioned installs)
    /// 2. Platform cache directory
    /// 3. Download from `url` into the cache
    pub fn resolve(&self, progress: Option<ProgressFn>) -> Result<PathBuf, ModelResolveError> {
        if let Ok(dir) = env::var(MODEL_DIR_ENV) {
            let provisioned = Path::new(&dir).join(self.name);
            if provisioned.exists() {
                return Ok(provisioned);
            }
        }

        let cache_dir = model_cache_dir()?;
        let cached = cache_dir.join(self.name);
        if cached.exists() {
            return Ok(cached);
        }

        fs::create_dir_all(&cache_dir).map_err(ModelResolveError::CacheDir)?;
        download(self.url, &cached, progress)?;
        Ok(cached)
    }
}

/// Platform cache directory for downloaded models.
///
/// Linux: `$XDG_CACHE_HOME/faceverify/models/` (or `~/.cache/...`);
/// macOS and Windows use the equivalent platform cache locations.
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    dirs::cache_dir()
        .map(|d| d.join("faceverify").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;
    let total = response.content_length().unwrap_or(0);

    // Stream into a sibling temp file, then rename for atomicity.
    let temp_path = dest.with_extension("part");
    let write_err = |path: &Path| {
        let path = path.to_path_buf();
        move |e: std::io::Error| ModelResolveError::Write { path, source: e }
    };

    let mut file = fs::File::create(&temp_path).map_err(write_err(&temp_path))?;
    let mut buf = [0u8; 64 * 1024];
    let mut downloaded: u64 = 0;
    loop {
        let n = response.read(&mut buf).map_err(|e| ModelResolveError::Stream {
            url: url.to_string(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err(&temp_path))?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err(&temp_path))?;
    drop(file);

    fs::rename(&temp_path, dest).map_err(write_err(dest))?;
    Ok(())
}
