use thiserror::Error;

use crate::cache::GenerationId;

/// Maximum length for response bodies quoted in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unreachable: {0}")]
    Unreachable(String),
}

/// A generation id that cannot name a cache directory.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid generation id {0:?}: must be non-empty, must not start with '.' and must not contain path separators")]
pub struct InvalidGenerationId(pub String);

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Cache entry is corrupt: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error(transparent)]
    InvalidGeneration(#[from] InvalidGenerationId),
}

#[derive(Error, Debug)]
pub enum ProvisionError {
    #[error("Shell resource {path} returned status {status}: {body}")]
    ResourceFailed {
        path: String,
        status: u16,
        body: String,
    },

    #[error("Shell resource {path} could not be fetched: {source}")]
    ResourceUnreachable {
        path: String,
        #[source]
        source: FetchError,
    },

    #[error("Invalid shell resource path {0}")]
    InvalidPath(String),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ProvisionError {
    /// Build a status failure, truncating the body to avoid logging excessive data
    pub fn from_status(path: &str, status: u16, body: &[u8]) -> Self {
        let text = String::from_utf8_lossy(body);
        let body = if text.len() <= MAX_ERROR_BODY_LENGTH {
            text.into_owned()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !text.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &text[..end], text.len())
        };
        ProvisionError::ResourceFailed {
            path: path.to_string(),
            status,
            body,
        }
    }
}

#[derive(Error, Debug)]
pub enum ActivateError {
    #[error("Generation {0} has not been provisioned")]
    NotProvisioned(GenerationId),

    #[error(transparent)]
    Store(#[from] StoreError),
}
