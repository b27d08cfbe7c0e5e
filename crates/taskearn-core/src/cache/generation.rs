//! Generation identifiers, the shell manifest and the backend host matcher.

use std::fmt;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::InvalidGenerationId;
use crate::models::Request;

/// Name of one generation of cached entries, e.g. `taskearn-v4`.
///
/// Every deployment that changes shell resources must bump the version so
/// activation purges the previous generation.
///
/// Ids name directories in the on-disk store, so `parse` rejects anything
/// that could resolve outside of its own directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GenerationId(String);

impl GenerationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Build `<prefix>-<version>`
    pub fn versioned(prefix: &str, version: &str) -> Self {
        Self(format!("{}-{}", prefix, version))
    }

    /// Validate an id supplied at runtime (CLI argument, config, directory listing).
    pub fn parse(id: impl Into<String>) -> Result<Self, InvalidGenerationId> {
        let id = Self(id.into());
        id.validate()?;
        Ok(id)
    }

    /// An id must be a single, non-hidden path component.
    pub fn validate(&self) -> Result<(), InvalidGenerationId> {
        let id = self.0.as_str();
        if id.is_empty()
            || id.starts_with('.')
            || id.contains(['/', '\\', '\0'])
        {
            return Err(InvalidGenerationId(self.0.clone()));
        }
        Ok(())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for GenerationId {
    type Err = InvalidGenerationId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for GenerationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for GenerationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

/// Ordered set of root-relative paths the shell needs to boot offline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShellManifest {
    paths: Vec<String>,
}

impl ShellManifest {
    pub fn new<I, S>(paths: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            paths: paths.into_iter().map(Into::into).collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Resolve each path against the shell origin, preserving order.
    pub fn requests(&self, origin: &Url) -> Result<Vec<(String, Request)>, url::ParseError> {
        self.paths
            .iter()
            .map(|path| origin.join(path).map(|url| (path.clone(), Request::get(url))))
            .collect()
    }
}

/// Hostname substring identifying backend API traffic that must never be cached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiHostMatcher {
    pattern: String,
}

impl ApiHostMatcher {
    pub fn new(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into().to_ascii_lowercase(),
        }
    }

    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matches(&self, request: &Request) -> bool {
        if self.pattern.is_empty() {
            return false;
        }
        request
            .host()
            .map(|host| host.to_ascii_lowercase().contains(&self.pattern))
            .unwrap_or(false)
    }
}
