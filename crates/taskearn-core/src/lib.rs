//! Offline support for the TaskEarn installable web app.
//!
//! Two loosely coupled components:
//!
//! - [`cache`]: the cache controller that keeps shell resources available
//!   offline and sits in front of every outgoing request
//! - [`gate`]: the connectivity gate that picks the top-level view and runs
//!   the install invitation
//!
//! They share no state; the only coupling is that requests issued by the
//! shell are routed through [`cache::CacheController::resolve`].

pub mod cache;
pub mod config;
pub mod error;
pub mod fetch;
pub mod gate;
pub mod models;

pub use cache::{CacheController, DiskCacheStore, GenerationId, MemoryCacheStore};
pub use config::Config;
pub use error::{ActivateError, FetchError, InvalidGenerationId, ProvisionError, StoreError};
pub use fetch::{Fetcher, HttpFetcher};
pub use gate::{AppShell, PlatformSignal, ShellEvent, View};
pub use models::{Request, Resolved, Response, ResponseSource};
