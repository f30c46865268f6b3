//! Durable store: one JSON document per source under a directory.
//!
//! Every write goes to its own temp file in the same directory which is then
//! renamed over the target, so a reader sees either the old entry or the new
//! one, never a partial file, even with several writers on one directory.

use std::io::{self, Write as _};
use std::path::PathBuf;

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use super::{CacheEntry, CacheStore};
use crate::error::StoreError;
use crate::ingest::types::SourceId;

#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Create the directory if needed.
    pub fn open(dir: impl Into<PathBuf>) -> io::Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, id: &SourceId) -> PathBuf {
        self.dir.join(format!("{}.json", cache_key(id)))
    }
}

/// Source ids are arbitrary strings; hash them into safe file names.
fn cache_key(id: &SourceId) -> String {
    let digest = Sha256::digest(id.as_str().as_bytes());
    let mut out = String::with_capacity(32);
    for b in digest.iter().take(16) {
        use std::fmt::Write as _;
        let _ = write!(&mut out, "{:02x}", b);
    }
    out
}

#[async_trait]
impl CacheStore for FileStore {
    async fn read(&self, id: &SourceId) -> Result<Option<CacheEntry>, StoreError> {
        let bytes = match tokio::fs::read(self.path_for(id)).await {
            Ok(b) => b,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        let entry: CacheEntry = serde_json::from_slice(&bytes)?;
        Ok(Some(entry))
    }

    async fn write(&self, entry: &CacheEntry) -> Result<(), StoreError> {
        let path = self.path_for(&entry.source_id);
        let dir = self.dir.clone();
        let json = serde_json::to_vec(entry)?;
        tokio::task::spawn_blocking(move || -> io::Result<()> {
            let mut tmp = tempfile::NamedTempFile::new_in(&dir)?;
            tmp.write_all(&json)?;
            tmp.persist(&path).map_err(|e| e.error)?;
            Ok(())
        })
        .await
        .map_err(io::Error::other)??;
        Ok(())
    }
}
