//! Rate-limited HTTP transport.
//!
//! Wraps any [`HttpTransport`] (a configured `reqwest::Client`, a proxying
//! or mutual-TLS client, a test double) so every request first passes a
//! [`RateLimiter`] check. A denied request fails with
//! [`TransportError::RateLimitExceeded`] before any network I/O; an admitted
//! one is handed to the inner transport untouched, so its timeout, redirect
//! policy and cookie jar keep applying.
//!
//! ```no_run
//! # async fn demo() -> Result<(), keyward_transport::TransportError> {
//! use std::time::Duration;
//! use keyward_transport::HttpRateLimiter;
//!
//! let jira = HttpRateLimiter::new(10, Duration::from_secs(60));
//! let client = jira.wrap(reqwest::Client::new(), "jira");
//! let response = client
//!     .get("https://example.atlassian.net/rest/api/2/myself")
//!     .bearer_auth("tok-abc123")
//!     .send()
//!     .await?;
//! # let _ = response;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use keyward_security::RateLimiter;
use reqwest::header::HeaderMap;
use reqwest::{Body, IntoUrl, Method, Request, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;

/// Errors from sending a request through a wrapped transport.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("Rate limit exceeded for {key}")]
    RateLimitExceeded { key: String },

    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),
}

impl TransportError {
    /// True when the request was refused locally without touching the network.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, TransportError::RateLimitExceeded { .. })
    }
}

impl From<TransportError> for keyward_core::Error {
    fn from(err: TransportError) -> Self {
        match err {
            TransportError::RateLimitExceeded { key } => {
                keyward_core::Error::RateLimitExceeded { key }
            }
            TransportError::Request(e) => keyward_core::Error::Internal(e.to_string()),
        }
    }
}

/// The request-sending step of an HTTP client.
///
/// Implemented for `reqwest::Client`; wrappers implement it by delegation.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: Request) -> Result<Response, TransportError>;
}

#[async_trait]
impl HttpTransport for reqwest::Client {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        Ok(reqwest::Client::execute(self, request).await?)
    }
}

#[async_trait]
impl<T: HttpTransport + ?Sized> HttpTransport for Arc<T> {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        (**self).execute(request).await
    }
}

/// A transport whose every request is gated by a shared [`RateLimiter`]
/// under a fixed logical key.
#[derive(Debug, Clone)]
pub struct RateLimitedTransport<T = reqwest::Client> {
    inner: T,
    limiter: Arc<RateLimiter>,
    key: String,
}

impl<T: HttpTransport> RateLimitedTransport<T> {
    pub fn new(inner: T, limiter: Arc<RateLimiter>, key: impl Into<String>) -> Self {
        Self {
            inner,
            limiter,
            key: key.into(),
        }
    }

    /// The rate-limit key requests are counted under.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl RateLimitedTransport<reqwest::Client> {
    /// Start a request on the inner client. The returned builder can only
    /// be sent through the limiter.
    pub fn request<U: IntoUrl>(&self, method: Method, url: U) -> RateLimitedRequestBuilder {
        RateLimitedRequestBuilder {
            builder: self.inner.request(method, url),
            transport: self.clone(),
        }
    }

    pub fn get<U: IntoUrl>(&self, url: U) -> RateLimitedRequestBuilder {
        self.request(Method::GET, url)
    }

    pub fn post<U: IntoUrl>(&self, url: U) -> RateLimitedRequestBuilder {
        self.request(Method::POST, url)
    }

    pub fn put<U: IntoUrl>(&self, url: U) -> RateLimitedRequestBuilder {
        self.request(Method::PUT, url)
    }

    pub fn delete<U: IntoUrl>(&self, url: U) -> RateLimitedRequestBuilder {
        self.request(Method::DELETE, url)
    }
}

/// A request under construction on a [`RateLimitedTransport`].
///
/// Mirrors the common `reqwest::RequestBuilder` methods; anything else is
/// reachable through [`RateLimitedRequestBuilder::with`]. Sending always
/// consults the limiter first.
#[derive(Debug)]
pub struct RateLimitedRequestBuilder {
    builder: RequestBuilder,
    transport: RateLimitedTransport<reqwest::Client>,
}

impl RateLimitedRequestBuilder {
    /// Apply any `reqwest::RequestBuilder` configuration.
    pub fn with(self, configure: impl FnOnce(RequestBuilder) -> RequestBuilder) -> Self {
        Self {
            builder: configure(self.builder),
            transport: self.transport,
        }
    }

    pub fn headers(self, headers: HeaderMap) -> Self {
        self.with(|b| b.headers(headers))
    }

    pub fn bearer_auth<T: fmt::Display>(self, token: T) -> Self {
        self.with(|b| b.bearer_auth(token))
    }

    pub fn basic_auth<U: fmt::Display, P: fmt::Display>(
        self,
        username: U,
        password: Option<P>,
    ) -> Self {
        self.with(|b| b.basic_auth(username, password))
    }

    pub fn query<Q: Serialize + ?Sized>(self, query: &Q) -> Self {
        self.with(|b| b.query(query))
    }

    pub fn json<B: Serialize + ?Sized>(self, json: &B) -> Self {
        self.with(|b| b.json(json))
    }

    pub fn form<F: Serialize + ?Sized>(self, form: &F) -> Self {
        self.with(|b| b.form(form))
    }

    pub fn body<B: Into<Body>>(self, body: B) -> Self {
        self.with(|b| b.body(body))
    }

    /// Per-request timeout, overriding the client's.
    pub fn timeout(self, timeout: Duration) -> Self {
        self.with(|b| b.timeout(timeout))
    }

    /// Build the request and send it if the limiter admits it.
    pub async fn send(self) -> Result<Response, TransportError> {
        let request = self.builder.build()?;
        self.transport.execute(request).await
    }
}

#[async_trait]
impl<T: HttpTransport> HttpTransport for RateLimitedTransport<T> {
    async fn execute(&self, request: Request) -> Result<Response, TransportError> {
        if !self.limiter.allow(&self.key) {
            debug!(key = %self.key, url = %request.url(), "request refused by rate limiter");
            return Err(TransportError::RateLimitExceeded {
                key: self.key.clone(),
            });
        }
        self.inner.execute(request).await
    }
}

/// Owns a [`RateLimiter`] and hands out transports that share it.
///
/// Transports wrapped under the same key share one budget; different keys
/// are counted independently.
#[derive(Debug, Clone)]
pub struct HttpRateLimiter {
    limiter: Arc<RateLimiter>,
}

impl HttpRateLimiter {
    /// Allow at most `limit` requests per key in any trailing `window`.
    pub fn new(limit: usize, window: Duration) -> Self {
        Self::from_limiter(Arc::new(RateLimiter::new(limit, window)))
    }

    pub fn from_limiter(limiter: Arc<RateLimiter>) -> Self {
        Self { limiter }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Wrap `client` so its requests count against `key`.
    pub fn wrap<T: HttpTransport>(
        &self,
        client: T,
        key: impl Into<String>,
    ) -> RateLimitedTransport<T> {
        RateLimitedTransport::new(client, Arc::clone(&self.limiter), key)
    }

    /// Wrap a default-configured `reqwest::Client`, for callers that have
    /// no client of their own.
    pub fn wrap_default(
        &self,
        key: impl Into<String>,
    ) -> Result<RateLimitedTransport<reqwest::Client>, TransportError> {
        let client = reqwest::Client::builder().build()?;
        Ok(self.wrap(client, key))
    }
}
