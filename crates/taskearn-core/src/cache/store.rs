//! Generation-scoped key/value storage for cached responses.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::GenerationId;
use crate::error::StoreError;
use crate::models::{CachedEntry, RequestKey};

/// Storage backend for cache generations.
///
/// Entries are addressed by generation plus request key and are only ever
/// replaced wholesale, never mutated in place.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Create the generation if it does not exist yet.
    async fn open(&self, generation: &GenerationId) -> Result<(), StoreError>;

    async fn has(&self, generation: &GenerationId) -> Result<bool, StoreError>;

    /// All generations currently held, in no particular order.
    async fn keys(&self) -> Result<Vec<GenerationId>, StoreError>;

    /// Remove a generation and every entry in it. Returns whether it existed.
    async fn delete(&self, generation: &GenerationId) -> Result<bool, StoreError>;

    async fn match_key(
        &self,
        generation: &GenerationId,
        key: &RequestKey,
    ) -> Result<Option<CachedEntry>, StoreError>;

    /// Store one entry, creating the generation if needed.
    async fn put(&self, generation: &GenerationId, entry: CachedEntry) -> Result<(), StoreError>;

    /// Store every entry or none of them.
    async fn put_all(
        &self,
        generation: &GenerationId,
        entries: Vec<CachedEntry>,
    ) -> Result<(), StoreError>;

    /// Keys stored under a generation.
    async fn entries(&self, generation: &GenerationId) -> Result<Vec<RequestKey>, StoreError>;
}

type Generation = HashMap<RequestKey, CachedEntry>;

/// In-memory store, shared between concurrent requests through a read/write lock.
#[derive(Default)]
pub struct MemoryCacheStore {
    generations: RwLock<HashMap<GenerationId, Generation>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn open(&self, generation: &GenerationId) -> Result<(), StoreError> {
        self.generations
            .write()
            .await
            .entry(generation.clone())
            .or_default();
        Ok(())
    }

    async fn has(&self, generation: &GenerationId) -> Result<bool, StoreError> {
        Ok(self.generations.read().await.contains_key(generation))
    }

    async fn keys(&self) -> Result<Vec<GenerationId>, StoreError> {
        Ok(self.generations.read().await.keys().cloned().collect())
    }

    async fn delete(&self, generation: &GenerationId) -> Result<bool, StoreError> {
        Ok(self.generations.write().await.remove(generation).is_some())
    }

    async fn match_key(
        &self,
        generation: &GenerationId,
        key: &RequestKey,
    ) -> Result<Option<CachedEntry>, StoreError> {
        Ok(self
            .generations
            .read()
            .await
            .get(generation)
            .and_then(|entries| entries.get(key))
            .cloned())
    }

    async fn put(&self, generation: &GenerationId, entry: CachedEntry) -> Result<(), StoreError> {
        self.generations
            .write()
            .await
            .entry(generation.clone())
            .or_default()
            .insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn put_all(
        &self,
        generation: &GenerationId,
        entries: Vec<CachedEntry>,
    ) -> Result<(), StoreError> {
        // Single write guard: readers see either none or all of the batch
        let mut guard = self.generations.write().await;
        let target = guard.entry(generation.clone()).or_default();
        for entry in entries {
            target.insert(entry.key.clone(), entry);
        }
        Ok(())
    }

    async fn entries(&self, generation: &GenerationId) -> Result<Vec<RequestKey>, StoreError> {
        let mut keys: Vec<RequestKey> = self
            .generations
            .read()
            .await
            .get(generation)
            .map(|entries| entries.keys().cloned().collect())
            .unwrap_or_default();
        keys.sort();
        Ok(keys)
    }
}
