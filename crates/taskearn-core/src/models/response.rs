//! Fully received responses and cache resolution results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::RequestKey;

/// How the response was obtained relative to the requesting origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseType {
    /// Same-origin response
    Basic,
    /// Cross-origin response with readable contents
    Cors,
    /// Cross-origin response whose contents are not inspectable
    Opaque,
    /// Synthetic failure response
    Error,
}

/// A response whose body has been read to completion.
///
/// The body is owned bytes rather than a stream, so the copy handed to the
/// caller and the copy written to the cache are separate values. Clone the
/// response before storing it; the store never sees the caller's copy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    pub url: String,
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(with = "hex_body")]
    pub body: Vec<u8>,
    pub response_type: ResponseType,
}

impl Response {
    pub fn new(url: impl Into<String>, status: u16, response_type: ResponseType) -> Self {
        Self {
            url: url.into(),
            status,
            headers: Vec::new(),
            body: Vec::new(),
            response_type,
        }
    }

    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Any 2xx status
    pub fn is_ok(&self) -> bool {
        (200..=299).contains(&self.status)
    }

    /// Exactly 200 and of a type the runtime cache accepts.
    pub fn is_cacheable(&self) -> bool {
        self.status == 200
            && matches!(
                self.response_type,
                ResponseType::Basic | ResponseType::Cors | ResponseType::Opaque
            )
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A stored request/response pair.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedEntry {
    pub key: RequestKey,
    pub response: Response,
    pub cached_at: DateTime<Utc>,
}

impl CachedEntry {
    pub fn new(key: RequestKey, response: Response) -> Self {
        Self {
            key,
            response,
            cached_at: Utc::now(),
        }
    }
}

/// Where a resolved response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    /// Served from the active generation without touching the network
    Cache,
    /// Fetched from the network (and possibly stored)
    Network,
    /// Backend API traffic that bypassed the cache entirely
    Bypass,
}

/// Result of routing a request through the cache controller.
#[derive(Debug, Clone)]
pub struct Resolved {
    pub response: Response,
    pub source: ResponseSource,
}

impl Resolved {
    pub fn new(response: Response, source: ResponseSource) -> Self {
        Self { response, source }
    }
}

/// Bodies are persisted as hex so entries stay valid JSON.
mod hex_body {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }
}
