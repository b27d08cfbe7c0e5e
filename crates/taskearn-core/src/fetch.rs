//! Network side of the interception point.
//!
//! The cache controller never talks to `reqwest` directly; it goes through a
//! `Fetcher` so the policy can be exercised against a scripted network.

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;
use url::Url;

use crate::error::FetchError;
use crate::models::{Request, Response, ResponseType};

#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Perform the request and return the fully received response.
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError>;
}

/// HTTP fetcher for the application shell.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
    origin: Url,
}

impl HttpFetcher {
    pub fn new(origin: Url) -> Result<Self, FetchError> {
        let client = Client::builder().build()?;
        Ok(Self { client, origin })
    }

    /// Same-origin responses are `Basic`; everything else readable is `Cors`.
    fn classify(&self, url: &Url) -> ResponseType {
        if url.origin() == self.origin.origin() {
            ResponseType::Basic
        } else {
            ResponseType::Cors
        }
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<Response, FetchError> {
        let mut builder = self
            .client
            .request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let resp = builder.send().await?;
        let status = resp.status().as_u16();
        let final_url = resp.url().clone();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();

        // Read the whole body before handing anything back
        let body = resp.bytes().await?.to_vec();
        debug!(url = %final_url, status, bytes = body.len(), "Fetched");

        Ok(Response {
            url: final_url.to_string(),
            status,
            headers,
            body,
            response_type: self.classify(&final_url),
        })
    }
}
