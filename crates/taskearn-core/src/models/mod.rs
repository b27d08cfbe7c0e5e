//! Data models for intercepted traffic.
//!
//! - `Request`, `RequestKey`: an outgoing request and the identity it is cached under
//! - `Response`, `ResponseType`: a fully received response and how it was obtained
//! - `Resolved`, `ResponseSource`: the result of routing a request through the cache

pub mod request;
pub mod response;

pub use request::{Request, RequestKey};
pub use response::{CachedEntry, Resolved, Response, ResponseSource, ResponseType};
