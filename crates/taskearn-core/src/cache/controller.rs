//! Cache lifecycle and per-request resolution policy.
//!
//! The controller owns three operations, each driven by a lifecycle event
//! rather than by application code:
//!
//! - `provision`: fetch the shell manifest into a new, inactive generation
//! - `activate`: purge every other generation and start serving from this one
//! - `resolve`: route one intercepted request through the cache
//!
//! Requests are resolved independently; there is no lock held across a
//! network fetch and no deduplication of concurrent fetches for the same key.

use futures::future::try_join_all;
use tokio::sync::RwLock;
use tracing::{debug, error, info, warn};
use url::Url;

use super::{ApiHostMatcher, CacheStore, GenerationId, ShellManifest};
use crate::error::{ActivateError, FetchError, ProvisionError, StoreError};
use crate::fetch::Fetcher;
use crate::models::{CachedEntry, Request, RequestKey, Resolved, Response, ResponseSource};

#[derive(Debug, Default)]
struct Lifecycle {
    /// Provisioned and ready to activate
    waiting: Option<GenerationId>,
    /// Generation requests are served from
    active: Option<GenerationId>,
}

pub struct CacheController<S, F> {
    store: S,
    fetcher: F,
    origin: Url,
    api_hosts: ApiHostMatcher,
    lifecycle: RwLock<Lifecycle>,
}

impl<S: CacheStore, F: Fetcher> CacheController<S, F> {
    pub fn new(store: S, fetcher: F, origin: Url, api_hosts: ApiHostMatcher) -> Self {
        Self {
            store,
            fetcher,
            origin,
            api_hosts,
            lifecycle: RwLock::new(Lifecycle::default()),
        }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    pub async fn active_generation(&self) -> Option<GenerationId> {
        self.lifecycle.read().await.active.clone()
    }

    pub async fn waiting_generation(&self) -> Option<GenerationId> {
        self.lifecycle.read().await.waiting.clone()
    }

    /// Fetch every shell resource and store them under `generation`.
    ///
    /// All resources are fetched before anything is written, and the batch is
    /// written with `put_all`, so a failed install leaves no trace of the new
    /// generation and the active one keeps serving.
    pub async fn provision(
        &self,
        generation: &GenerationId,
        manifest: &ShellManifest,
    ) -> Result<(), ProvisionError> {
        generation.validate().map_err(StoreError::from)?;
        info!(generation = %generation, resources = manifest.len(), "Provisioning shell resources");

        let requests = manifest.requests(&self.origin).map_err(|e| {
            error!(generation = %generation, error = %e, "Invalid shell manifest");
            ProvisionError::InvalidPath(e.to_string())
        })?;

        let fetches = requests
            .iter()
            .map(|(path, request)| self.fetch_shell_resource(path, request));

        let entries = match try_join_all(fetches).await {
            Ok(entries) => entries,
            Err(e) => {
                error!(generation = %generation, error = %e, "Provisioning failed");
                return Err(e);
            }
        };

        if let Err(e) = self.store.put_all(generation, entries).await {
            error!(generation = %generation, error = %e, "Failed to store shell resources");
            return Err(e.into());
        }

        self.lifecycle.write().await.waiting = Some(generation.clone());
        info!(generation = %generation, "Generation provisioned");
        Ok(())
    }

    async fn fetch_shell_resource(
        &self,
        path: &str,
        request: &Request,
    ) -> Result<CachedEntry, ProvisionError> {
        let response = self
            .fetcher
            .fetch(request)
            .await
            .map_err(|source| ProvisionError::ResourceUnreachable {
                path: path.to_string(),
                source,
            })?;

        if !response.is_ok() {
            return Err(ProvisionError::from_status(
                path,
                response.status,
                &response.body,
            ));
        }

        Ok(CachedEntry::new(request.key(), response))
    }

    /// Make `generation` the active one, deleting every other generation first.
    ///
    /// The lifecycle write lock is held for the whole purge, so no request is
    /// resolved against a mix of old and new generations. The previously
    /// active generation is deleted last; if any deletion fails the old
    /// generation stays active.
    pub async fn activate(&self, generation: &GenerationId) -> Result<(), ActivateError> {
        generation.validate().map_err(StoreError::from)?;
        let mut lifecycle = self.lifecycle.write().await;

        if lifecycle.active.as_ref() == Some(generation) {
            debug!(generation = %generation, "Generation already active");
            return Ok(());
        }

        if !self.store.has(generation).await? {
            return Err(ActivateError::NotProvisioned(generation.clone()));
        }

        let mut superseded: Vec<GenerationId> = self
            .store
            .keys()
            .await?
            .into_iter()
            .filter(|g| g != generation)
            .collect();
        if let Some(previous) = lifecycle.active.as_ref() {
            superseded.sort_by_key(|g| g == previous);
        }

        for old in &superseded {
            info!(generation = %old, "Deleting old cache");
            self.store.delete(old).await?;
        }

        if lifecycle.waiting.as_ref() == Some(generation) {
            lifecycle.waiting = None;
        }
        lifecycle.active = Some(generation.clone());
        info!(generation = %generation, purged = superseded.len(), "Generation activated");
        Ok(())
    }

    /// Resume serving from a generation provisioned by an earlier process.
    ///
    /// Returns false when the generation is not present in the store.
    pub async fn resume(&self, generation: &GenerationId) -> Result<bool, StoreError> {
        generation.validate()?;
        if !self.store.has(generation).await? {
            return Ok(false);
        }
        let mut lifecycle = self.lifecycle.write().await;
        lifecycle.active = Some(generation.clone());
        debug!(generation = %generation, "Resumed generation");
        Ok(true)
    }

    /// Provision and immediately activate, without waiting for existing pages to close.
    pub async fn install(
        &self,
        generation: &GenerationId,
        manifest: &ShellManifest,
    ) -> anyhow::Result<()> {
        self.provision(generation, manifest).await?;
        self.activate(generation).await?;
        Ok(())
    }

    /// Resolve one intercepted request.
    ///
    /// Backend API traffic bypasses the cache entirely. Anything else is served
    /// cache-first; on a miss the network response is returned and, when
    /// cacheable, a copy is stored in the active generation.
    ///
    /// Cached entries are never revalidated: once stored, an entry is served
    /// until its generation is purged even if the network copy changes. Only a
    /// version bump refreshes them.
    pub async fn resolve(&self, request: &Request) -> Result<Resolved, FetchError> {
        if self.api_hosts.matches(request) {
            debug!(url = %request.url, "Backend request, bypassing cache");
            let response = self.fetcher.fetch(request).await?;
            return Ok(Resolved::new(response, ResponseSource::Bypass));
        }

        if !request.is_cacheable_method() {
            let response = self.fetcher.fetch(request).await?;
            return Ok(Resolved::new(response, ResponseSource::Network));
        }

        let key = request.key();
        let looked_up_in = {
            let lifecycle = self.lifecycle.read().await;
            match lifecycle.active.as_ref() {
                Some(generation) => match self.store.match_key(generation, &key).await {
                    Ok(Some(entry)) => {
                        debug!(generation = %generation, key = %key, "Cache hit");
                        return Ok(Resolved::new(entry.response, ResponseSource::Cache));
                    }
                    Ok(None) => Some(generation.clone()),
                    Err(e) => {
                        warn!(key = %key, error = %e, "Cache lookup failed, going to network");
                        Some(generation.clone())
                    }
                },
                None => None,
            }
        };

        debug!(key = %key, "Cache miss");
        let response = match self.fetcher.fetch(request).await {
            Ok(response) => response,
            Err(e) => {
                debug!(key = %key, error = %e, "Fetch failed with nothing cached");
                return Err(e);
            }
        };

        if response.is_cacheable() {
            if let Some(generation) = looked_up_in {
                self.store_if_active(&generation, key, response.clone()).await;
            }
        }

        Ok(Resolved::new(response, ResponseSource::Network))
    }

    /// Store a fetched copy unless activation replaced the generation meanwhile.
    async fn store_if_active(&self, generation: &GenerationId, key: RequestKey, copy: Response) {
        let lifecycle = self.lifecycle.read().await;
        if lifecycle.active.as_ref() != Some(generation) {
            debug!(generation = %generation, key = %key, "Generation superseded during fetch, not storing");
            return;
        }
        if let Err(e) = self.store.put(generation, CachedEntry::new(key, copy)).await {
            warn!(generation = %generation, error = %e, "Failed to store fetched response");
        }
    }
}
