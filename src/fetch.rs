//! HTTP fetch primitives used by the loader
//!
//! Everything the loader retrieves goes through a [`Fetcher`]. The loader
//! wraps its fetcher in a [`MockedFetcher`] so the mock registry sees every
//! request first.

use crate::mock::MockRegistry;
use crate::{Error, HarnessConfig, RequestAction, RequestInfo, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// A completed HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl FetchResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self { status, headers: HashMap::new(), body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Non-blocking fetch primitive
pub trait Fetcher: Send + Sync {
    fn fetch(&self, request: RequestInfo) -> BoxFuture<'_, Result<FetchResponse>>;

    /// Shorthand for a GET of `url`
    fn get(&self, url: &str) -> BoxFuture<'_, Result<FetchResponse>> {
        self.fetch(RequestInfo::new("GET", url))
    }
}

/// Fetcher backed by `reqwest`, with `file://` URLs read from disk
#[cfg(feature = "http")]
pub struct HttpFetcher {
    client: reqwest::Client,
}

#[cfg(feature = "http")]
impl HttpFetcher {
    pub fn new(config: &HarnessConfig) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        for (k, v) in &config.headers {
            let name = reqwest::header::HeaderName::from_bytes(k.as_bytes())
                .map_err(|e| Error::ConfigError(format!("invalid header name '{}': {}", k, e)))?;
            let value = reqwest::header::HeaderValue::from_str(v)
                .map_err(|e| Error::ConfigError(format!("invalid header value for '{}': {}", k, e)))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .default_headers(headers)
            .build()
            .map_err(|e| Error::InitializationError(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client })
    }

    async fn fetch_file(url: &url::Url) -> Result<FetchResponse> {
        let path = url
            .to_file_path()
            .map_err(|_| Error::LoadError(format!("not a local file path: {}", url)))?;
        match tokio::fs::read_to_string(&path).await {
            Ok(body) => Ok(FetchResponse::new(200, body)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(FetchResponse::new(404, "")),
            Err(e) => Err(Error::LoadError(format!("Failed to read {}: {}", path.display(), e))),
        }
    }

    async fn fetch_http(&self, request: RequestInfo) -> Result<FetchResponse> {
        let method = reqwest::Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|e| Error::NetworkError(format!("invalid method '{}': {}", request.method, e)))?;
        let mut builder = self.client.request(method, &request.url);
        for (k, v) in &request.headers {
            builder = builder.header(k.as_str(), v.as_str());
        }
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| Error::NetworkError(format!("Failed to fetch {}: {}", request.url, e)))?;
        let status = resp.status().as_u16();
        let headers = resp
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = resp
            .text()
            .await
            .map_err(|e| Error::LoadError(format!("Failed to read response body: {}", e)))?;

        Ok(FetchResponse { status, headers, body })
    }
}

#[cfg(feature = "http")]
impl Fetcher for HttpFetcher {
    fn fetch(&self, request: RequestInfo) -> BoxFuture<'_, Result<FetchResponse>> {
        async move {
            match url::Url::parse(&request.url) {
                Ok(u) if u.scheme() == "file" => Self::fetch_file(&u).await,
                _ => self.fetch_http(request).await,
            }
        }
        .boxed()
    }
}

/// In-memory fetcher serving fixed bodies by URL; unknown URLs get `404`
///
/// Every requested URL is recorded, which makes it handy for asserting which
/// stages of a load actually went to the network.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    responses: HashMap<String, FetchResponse>,
    requested: Mutex<Vec<String>>,
}

impl StaticFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` with status `200` for `url`
    pub fn with(mut self, url: &str, body: &str) -> Self {
        self.responses.insert(url.to_string(), FetchResponse::new(200, body));
        self
    }

    pub fn with_status(mut self, url: &str, status: u16, body: &str) -> Self {
        self.responses.insert(url.to_string(), FetchResponse::new(status, body));
        self
    }

    /// URLs requested so far, in order
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

impl Fetcher for StaticFetcher {
    fn fetch(&self, request: RequestInfo) -> BoxFuture<'_, Result<FetchResponse>> {
        if let Ok(mut r) = self.requested.lock() {
            r.push(request.url.clone());
        }
        let resp = self.responses.get(&request.url).cloned().unwrap_or_else(|| FetchResponse::new(404, ""));
        futures::future::ready(Ok(resp)).boxed()
    }
}

/// Fetcher that lets the mock registry answer first
pub struct MockedFetcher {
    inner: Arc<dyn Fetcher>,
    registry: MockRegistry,
}

impl MockedFetcher {
    pub fn new(inner: Arc<dyn Fetcher>, registry: MockRegistry) -> Self {
        Self { inner, registry }
    }

    pub fn registry(&self) -> &MockRegistry {
        &self.registry
    }
}

impl Fetcher for MockedFetcher {
    fn fetch(&self, request: RequestInfo) -> BoxFuture<'_, Result<FetchResponse>> {
        async move {
            match self.registry.handle(&request) {
                RequestAction::Fulfill { status, headers, body } => {
                    log::debug!("mocked {} {} -> {}", request.method, request.url, status);
                    let delay = self.registry.auto_respond_after();
                    if !delay.is_zero() {
                        tokio::time::sleep(delay).await;
                    }
                    Ok(FetchResponse { status, headers, body: String::from_utf8_lossy(&body).into_owned() })
                }
                RequestAction::Continue => self.inner.fetch(request).await,
            }
        }
        .boxed()
    }
}
