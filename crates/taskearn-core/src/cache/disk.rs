//! On-disk cache store.
//!
//! Each generation is a directory under the cache root; each entry is a JSON
//! file named by the SHA-256 of its request key. Files are written to a
//! temporary name and renamed into place, so readers never see half an entry.
//! Batches are assembled in a staging directory, merged with any existing
//! entries, and swapped in with a directory rename.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use sha2::{Digest, Sha256};
use tokio::fs;
use tracing::{debug, warn};

use super::{CacheStore, GenerationId};
use crate::error::StoreError;
use crate::models::{CachedEntry, RequestKey};

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Prefix for batch staging directories; never reported as a generation
const STAGING_PREFIX: &str = ".staging-";

pub struct DiskCacheStore {
    root: PathBuf,
}

impl DiskCacheStore {
    pub fn new(root: PathBuf) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn generation_dir(&self, generation: &GenerationId) -> Result<PathBuf, StoreError> {
        generation.validate()?;
        Ok(self.root.join(generation.as_str()))
    }

    /// Sibling path under the root that `keys` never reports.
    fn scratch_dir(&self, purpose: &str, generation: &GenerationId) -> PathBuf {
        self.root.join(format!(
            "{}{}-{}-{}",
            STAGING_PREFIX,
            purpose,
            generation,
            Utc::now().timestamp_nanos_opt().unwrap_or_default()
        ))
    }

    fn entry_file_name(key: &RequestKey) -> String {
        let mut hasher = Sha256::new();
        hasher.update(key.method.as_bytes());
        hasher.update(b" ");
        hasher.update(key.url.as_bytes());
        format!("{}.{}", hex::encode(hasher.finalize()), ENTRY_EXTENSION)
    }

    async fn write_entry(dir: &Path, entry: &CachedEntry) -> Result<(), StoreError> {
        let name = Self::entry_file_name(&entry.key);
        let final_path = dir.join(&name);
        let temp_path = dir.join(format!("{}.{}", name, TEMP_EXTENSION));

        let contents = serde_json::to_vec(entry)?;
        fs::write(&temp_path, contents).await?;
        fs::rename(&temp_path, &final_path).await?;
        Ok(())
    }

    async fn read_entry(path: &Path) -> Result<Option<CachedEntry>, StoreError> {
        match fs::read(path).await {
            Ok(contents) => Ok(Some(serde_json::from_slice(&contents)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(path: &Path) -> Result<bool, StoreError> {
        Ok(fs::try_exists(path).await?)
    }

    async fn stage_batch(staging: &Path, entries: &[CachedEntry]) -> Result<(), StoreError> {
        fs::create_dir_all(staging).await?;
        for entry in entries {
            Self::write_entry(staging, entry).await?;
        }
        Ok(())
    }

    /// Copy entries of `target` that the batch does not replace into `staging`.
    async fn carry_over(target: &Path, staging: &Path) -> Result<(), StoreError> {
        let mut dir = fs::read_dir(target).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            let staged = staging.join(item.file_name());
            if !Self::exists(&staged).await? {
                fs::copy(&path, &staged).await?;
            }
        }
        Ok(())
    }

    /// Move a complete staging directory into place as `target`.
    ///
    /// An existing target is renamed aside first and only removed once the
    /// new directory is in place; if the swap fails it is moved back.
    async fn commit_batch(staging: &Path, target: &Path, retired: &Path) -> Result<(), StoreError> {
        if !Self::exists(target).await? {
            fs::rename(staging, target).await?;
            return Ok(());
        }

        fs::rename(target, retired).await?;
        if let Err(e) = fs::rename(staging, target).await {
            fs::rename(retired, target).await?;
            return Err(e.into());
        }
        if let Err(e) = fs::remove_dir_all(retired).await {
            warn!(path = %retired.display(), error = %e, "Failed to remove replaced generation");
        }
        Ok(())
    }

    async fn remove_scratch(path: &Path) {
        if let Err(e) = fs::remove_dir_all(path).await {
            if e.kind() != ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove staging directory");
            }
        }
    }
}

#[async_trait]
impl CacheStore for DiskCacheStore {
    async fn open(&self, generation: &GenerationId) -> Result<(), StoreError> {
        fs::create_dir_all(self.generation_dir(generation)?).await?;
        Ok(())
    }

    async fn has(&self, generation: &GenerationId) -> Result<bool, StoreError> {
        Self::exists(&self.generation_dir(generation)?).await
    }

    async fn keys(&self) -> Result<Vec<GenerationId>, StoreError> {
        let mut generations = Vec::new();
        let mut dir = fs::read_dir(&self.root).await?;
        while let Some(item) = dir.next_entry().await? {
            if !item.file_type().await?.is_dir() {
                continue;
            }
            let name = item.file_name().to_string_lossy().into_owned();
            match GenerationId::parse(name) {
                Ok(generation) => generations.push(generation),
                Err(e) => debug!(error = %e, "Skipping non-generation directory"),
            }
        }
        generations.sort();
        Ok(generations)
    }

    async fn delete(&self, generation: &GenerationId) -> Result<bool, StoreError> {
        match fs::remove_dir_all(self.generation_dir(generation)?).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    async fn match_key(
        &self,
        generation: &GenerationId,
        key: &RequestKey,
    ) -> Result<Option<CachedEntry>, StoreError> {
        let path = self
            .generation_dir(generation)?
            .join(Self::entry_file_name(key));
        Self::read_entry(&path).await
    }

    async fn put(&self, generation: &GenerationId, entry: CachedEntry) -> Result<(), StoreError> {
        let dir = self.generation_dir(generation)?;
        fs::create_dir_all(&dir).await?;
        Self::write_entry(&dir, &entry).await?;
        debug!(generation = %generation, key = %entry.key, "Stored cache entry");
        Ok(())
    }

    async fn put_all(
        &self,
        generation: &GenerationId,
        entries: Vec<CachedEntry>,
    ) -> Result<(), StoreError> {
        let target = self.generation_dir(generation)?;
        let staging = self.scratch_dir("put", generation);
        let retired = self.scratch_dir("old", generation);

        let result = async {
            Self::stage_batch(&staging, &entries).await?;
            if Self::exists(&target).await? {
                Self::carry_over(&target, &staging).await?;
            }
            Self::commit_batch(&staging, &target, &retired).await
        }
        .await;

        if result.is_err() {
            Self::remove_scratch(&staging).await;
        }
        result
    }

    async fn entries(&self, generation: &GenerationId) -> Result<Vec<RequestKey>, StoreError> {
        let dir_path = self.generation_dir(generation)?;
        if !Self::exists(&dir_path).await? {
            return Ok(Vec::new());
        }

        let mut keys = Vec::new();
        let mut dir = fs::read_dir(&dir_path).await?;
        while let Some(item) = dir.next_entry().await? {
            let path = item.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            match Self::read_entry(&path).await {
                Ok(Some(entry)) => keys.push(entry.key),
                Ok(None) => {}
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable cache entry");
                }
            }
        }
        keys.sort();
        Ok(keys)
    }
}
