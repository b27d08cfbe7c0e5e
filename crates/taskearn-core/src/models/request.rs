//! Outgoing requests and their cache identity.

use std::fmt;

use reqwest::Method;
use serde::{Deserialize, Serialize};
use url::Url;

/// An outgoing request as seen by the interception point.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    pub url: Url,
    pub headers: Vec<(String, String)>,
}

impl Request {
    pub fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            headers: Vec::new(),
        }
    }

    pub fn get(url: Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    /// Host the request is addressed to, if the URL has one
    pub fn host(&self) -> Option<&str> {
        self.url.host_str()
    }

    /// Only GET requests take part in caching; everything else goes straight to the network.
    pub fn is_cacheable_method(&self) -> bool {
        self.method == Method::GET
    }

    /// The key this request is looked up and stored under.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(&self.method, &self.url)
    }
}

/// Identity of a cached request: method plus URL, fragment excluded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RequestKey {
    pub method: String,
    pub url: String,
}

impl RequestKey {
    pub fn new(method: &Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.as_str().to_string(),
            url: url.into(),
        }
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_fragment() {
        let a = Request::get(Url::parse("https://app.example/index.html#top").unwrap());
        let b = Request::get(Url::parse("https://app.example/index.html").unwrap());
        assert_eq!(a.key(), b.key());
    }

    #[test]
    fn test_key_distinguishes_method_and_query() {
        let url = Url::parse("https://app.example/a?x=1").unwrap();
        let get = Request::get(url.clone());
        let post = Request::new(Method::POST, url);
        let other = Request::get(Url::parse("https://app.example/a?x=2").unwrap());

        assert_ne!(get.key(), post.key());
        assert_ne!(get.key(), other.key());
        assert!(get.is_cacheable_method());
        assert!(!post.is_cacheable_method());
    }

    #[test]
    fn test_key_display() {
        let req = Request::get(Url::parse("https://app.example/").unwrap());
        assert_eq!(req.key().to_string(), "GET https://app.example/");
    }
}
