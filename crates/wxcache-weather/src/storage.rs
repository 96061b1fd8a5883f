//! Byte store for cached forecasts.
//!
//! `FileStore` keeps one file per key. Writes go to a uniquely named temp file
//! that is then renamed over the target, so a concurrent reader sees either the
//! old bytes or the new bytes, never a mix.

use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};

/// Extension of committed entries; anything else in the directory is ignored.
const ENTRY_SUFFIX: &str = ".json";
const TEMP_SUFFIX: &str = ".tmp";

/// Key/bytes store backing the forecast cache.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Replace the value stored under `key`.
    async fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()>;

    /// Read the value under `key`; `None` if nothing is stored.
    async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>>;

    /// Remove `key`. Removing a missing key is not an error.
    async fn delete(&self, key: &str) -> io::Result<()>;

    /// All stored keys.
    async fn list(&self) -> io::Result<Vec<String>>;
}

/// Directory-backed store: one file per key.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(key: &str) -> io::Result<String> {
        let encoded = urlencoding::encode(key).into_owned();
        if encoded.is_empty() || encoded == "." || encoded == ".." {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                format!("unusable storage key {:?}", key),
            ));
        }
        Ok(encoded)
    }

    fn path_for(&self, key: &str) -> io::Result<PathBuf> {
        Ok(self.dir.join(Self::file_name(key)?))
    }
}

#[async_trait]
impl BlobStore for FileStore {
    async fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        let name = Self::file_name(key)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let target = self.dir.join(&name);
        let temp = self
            .dir
            .join(format!("{}.{}{}", name, uuid::Uuid::new_v4(), TEMP_SUFFIX));

        tokio::fs::write(&temp, bytes).await?;
        if let Err(e) = tokio::fs::rename(&temp, &target).await {
            if let Err(cleanup) = tokio::fs::remove_file(&temp).await {
                tracing::warn!("Failed to remove temp file {:?}: {}", temp, cleanup);
            }
            return Err(e);
        }

        tracing::debug!("Wrote {} bytes to {:?}", bytes.len(), target);
        Ok(())
    }

    async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        let path = self.path_for(key)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        let path = self.path_for(key)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                tracing::debug!("Deleted {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn list(&self) -> io::Result<Vec<String>> {
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };

        let mut keys = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let file_name = entry.file_name();
            let Some(name) = file_name.to_str() else {
                continue;
            };
            if !name.ends_with(ENTRY_SUFFIX) {
                continue;
            }
            match urlencoding::decode(name) {
                Ok(key) => keys.push(key.into_owned()),
                Err(e) => tracing::warn!("Skipping undecodable cache file {:?}: {}", name, e),
            }
        }
        keys.sort();
        Ok(keys)
    }
}

/// In-process store, for tests and embedders without a filesystem.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

#[async_trait]
impl BlobStore for MemoryStore {
    async fn write(&self, key: &str, bytes: &[u8]) -> io::Result<()> {
        self.entries.write().insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    async fn read(&self, key: &str) -> io::Result<Option<Vec<u8>>> {
        Ok(self.entries.read().get(key).cloned())
    }

    async fn delete(&self, key: &str) -> io::Result<()> {
        self.entries.write().remove(key);
        Ok(())
    }

    async fn list(&self) -> io::Result<Vec<String>> {
        Ok(self.entries.read().keys().cloned().collect())
    }
}
