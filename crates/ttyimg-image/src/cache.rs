#![forbid(unsafe_code)]

//! On-disk cache of converted documents.
//!
//! Entries are PNG files named by the SHA-256 of the source document's
//! canonical path and modification time, so editing a document invalidates
//! its entry without any bookkeeping.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use image::DynamicImage;
use sha2::{Digest, Sha256};

use crate::encode::png_bytes;
use crate::error::ImageError;

/// Directory of cached document renderings.
#[derive(Debug, Clone)]
pub struct DocumentCache {
    dir: PathBuf,
}

impl DocumentCache {
    /// Cache rooted at `dir` (created on first write).
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// `<user cache dir>/ttyimg/documents`, if the platform has one.
    #[must_use]
    pub fn user_default() -> Option<Self> {
        dirs::cache_dir().map(|base| Self::new(base.join("ttyimg").join("documents")))
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Cache key for the document at `path`.
    ///
    /// # Errors
    ///
    /// The document cannot be canonicalized or stat'ed.
    pub fn key(path: &Path) -> io::Result<String> {
        let canonical = fs::canonicalize(path)?;
        let modified = fs::metadata(&canonical)?
            .modified()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or_default();

        let mut hasher = Sha256::new();
        hasher.update(canonical.as_os_str().as_encoded_bytes());
        hasher.update(b"\0");
        hasher.update(modified.to_le_bytes());
        Ok(hex::encode(hasher.finalize()))
    }

    fn entry(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.png"))
    }

    /// The cached rendering for `key`, if present and decodable.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<DynamicImage> {
        let bytes = fs::read(self.entry(key)).ok()?;
        match image::load_from_memory(&bytes) {
            Ok(image) => Some(image),
            Err(_err) => {
                #[cfg(feature = "tracing")]
                tracing::warn!(key, error = %_err, "ignoring corrupt cache entry");
                None
            }
        }
    }

    /// Store `image` under `key`.
    ///
    /// The entry is written to a temporary file and renamed into place, so
    /// readers never see a partial PNG.
    ///
    /// # Errors
    ///
    /// [`ImageError::Cache`] on I/O failure, [`ImageError::Encode`] if the
    /// image cannot be PNG-encoded.
    pub fn put(&self, key: &str, image: &DynamicImage) -> Result<(), ImageError> {
        let png = png_bytes(image)?;
        fs::create_dir_all(&self.dir).map_err(ImageError::Cache)?;
        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir).map_err(ImageError::Cache)?;
        tmp.write_all(&png).map_err(ImageError::Cache)?;
        tmp.persist(self.entry(key))
            .map_err(|err| ImageError::Cache(err.error))?;
        Ok(())
    }
}
