// Filesystem-backed durable store.
// One JSON file per key under the user cache directory, written atomically.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::warn;

use super::durable::{DurableStore, StoreResult};
use crate::error::StoreError;

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Distinguishes temp files of concurrent writers within this process.
static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Get the base cache directory (~/.cache/repodash on Linux).
pub fn cache_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "repodash").map(|dirs| dirs.cache_dir().join("entries"))
}

/// On-disk form of an entry. The file name is a hash, so the key lives here.
#[derive(Serialize)]
struct EntryFileRef<'a> {
    key: &'a str,
    value: &'a str,
}

#[derive(Deserialize)]
struct EntryFile {
    key: String,
    value: String,
}

/// Durable store backed by a directory of entry files.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
    quota_bytes: Option<u64>,
}

impl FileStore {
    /// Store rooted at `dir`. The directory is created on first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            quota_bytes: None,
        }
    }

    /// Store in the platform cache directory, if one can be determined.
    pub fn in_cache_dir() -> Option<Self> {
        cache_dir().map(Self::new)
    }

    /// Limit the total size of entry files.
    pub fn with_quota(mut self, quota_bytes: u64) -> Self {
        self.quota_bytes = Some(quota_bytes);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir
            .join(format!("{}.{}", file_stem(key), ENTRY_EXTENSION))
    }

    /// A temp path no other writer, in this process or another, will pick.
    fn temp_path(&self, key: &str) -> PathBuf {
        let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
        self.dir.join(format!(
            "{}.{}-{}.{}",
            file_stem(key),
            std::process::id(),
            n,
            TEMP_EXTENSION
        ))
    }

    /// Paths of all entry files, skipping temp files and anything foreign.
    async fn entry_files(&self) -> StoreResult<Vec<PathBuf>> {
        let mut read_dir = match fs::read_dir(&self.dir).await {
            Ok(read_dir) => read_dir,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut files = Vec::new();
        while let Some(entry) = read_dir.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }

    /// Read and parse an entry file. Unreadable contents are removed.
    async fn read_entry(&self, path: &Path) -> StoreResult<Option<EntryFile>> {
        let contents = match fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_str(&contents) {
            Ok(entry) => Ok(Some(entry)),
            Err(e) => {
                warn!(path = %path.display(), error = %e, "removing unreadable cache file");
                let _ = fs::remove_file(path).await;
                Ok(None)
            }
        }
    }

    async fn check_quota(&self, target: &Path, requested: u64) -> StoreResult<()> {
        let Some(quota) = self.quota_bytes else {
            return Ok(());
        };

        let mut used = 0u64;
        for path in self.entry_files().await? {
            if path == target {
                continue;
            }
            if let Ok(meta) = fs::metadata(&path).await {
                used += meta.len();
            }
        }

        if used.saturating_add(requested) > quota {
            return Err(StoreError::QuotaExceeded { requested, quota });
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for FileStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entry = self.read_entry(&self.entry_path(key)).await?;
        Ok(entry.filter(|entry| entry.key == key).map(|entry| entry.value))
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let path = self.entry_path(key);
        let contents =
            serde_json::to_string(&EntryFileRef { key, value }).map_err(io::Error::from)?;
        self.check_quota(&path, contents.len() as u64).await?;

        fs::create_dir_all(&self.dir).await?;

        // Write atomically via a temp file unique to this write
        let temp_path = self.temp_path(key);
        if let Err(e) = write_synced(&temp_path, contents.as_bytes()).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }
        if let Err(e) = fs::rename(&temp_path, &path).await {
            let _ = fs::remove_file(&temp_path).await;
            return Err(e.into());
        }

        Ok(())
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        match fs::remove_file(self.entry_path(key)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn clear(&self) -> StoreResult<()> {
        match fs::remove_dir_all(&self.dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn keys(&self) -> StoreResult<Vec<String>> {
        let mut keys = Vec::new();
        for path in self.entry_files().await? {
            if let Some(entry) = self.read_entry(&path).await? {
                keys.push(entry.key);
            }
        }
        Ok(keys)
    }
}

/// File stem for a storage key: hex SHA-256, so its length is fixed
/// whatever the key contains.
fn file_stem(key: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hex::encode(hasher.finalize())
}

async fn write_synced(path: &Path, contents: &[u8]) -> io::Result<()> {
    let mut file = fs::File::create(path).await?;
    file.write_all(contents).await?;
    file.sync_all().await
}
