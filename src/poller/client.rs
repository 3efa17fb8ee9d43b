//! HTTP transport for poll requests
//!
//! This module handles:
//! - Building the shared HTTP client (fixed timeout, redirects never followed)
//! - The [`Transport`] seam pollers send their requests through
//! - The immutable request template each poller clones per attempt

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{redirect::Policy, Client, Method, Request, Response};
use std::time::Duration;
use url::Url;

/// Timeout applied to every poll request unless configured otherwise
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends a prepared request and returns the raw response
///
/// Implemented for [`reqwest::Client`]; tests substitute their own.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn execute(&self, request: Request) -> reqwest::Result<Response>;
}

#[async_trait]
impl Transport for Client {
    async fn execute(&self, request: Request) -> reqwest::Result<Response> {
        Client::execute(self, request).await
    }
}

/// Builds the HTTP client shared by pollers
///
/// Redirects are never followed, so a 3xx response reaches the handler as
/// it is. No default user agent is set: each request carries the one chosen
/// by its poller, or none at all.
///
/// # Example
///
/// ```no_run
/// use std::time::Duration;
/// use website_poller::poller::build_http_client;
///
/// let client = build_http_client(Duration::from_secs(10)).unwrap();
/// ```
pub fn build_http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder()
        .timeout(timeout)
        .redirect(Policy::none())
        .gzip(true)
        .brotli(true)
        .build()
}

/// Method, URL and headers of a poll request, fixed at construction
#[derive(Debug, Clone)]
pub struct RequestTemplate {
    method: Method,
    url: Url,
    headers: HeaderMap,
}

impl RequestTemplate {
    pub fn new(method: Method, url: Url, headers: HeaderMap) -> Self {
        Self {
            method,
            url,
            headers,
        }
    }

    /// Builds one request, adding a `User-Agent` header only when `user_agent`
    /// is non-empty and a valid header value
    pub fn build(&self, user_agent: &str) -> Request {
        let mut request = Request::new(self.method.clone(), self.url.clone());
        *request.headers_mut() = self.headers.clone();

        if !user_agent.is_empty() {
            match HeaderValue::from_str(user_agent) {
                Ok(value) => {
                    request.headers_mut().insert(USER_AGENT, value);
                }
                Err(_) => {
                    tracing::warn!(user_agent, "User agent is not a valid header value, sending none");
                }
            }
        }

        request
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}
