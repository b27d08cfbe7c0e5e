//! Offline cache for the application shell.
//!
//! This module provides the `CacheController`, which keeps a fixed set of
//! shell resources available without a network round trip and progressively
//! caches other static resources after their first successful fetch. Backend
//! API traffic is never cached.
//!
//! Entries are grouped into generations named by a version tag; activating a
//! generation deletes every other one.

pub mod controller;
pub mod disk;
pub mod generation;
pub mod store;

pub use controller::CacheController;
pub use disk::DiskCacheStore;
pub use generation::{ApiHostMatcher, GenerationId, ShellManifest};
pub use store::{CacheStore, MemoryCacheStore};
