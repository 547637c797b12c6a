use async_trait::async_trait;
use bytes::Bytes;
use hyper::{HeaderMap, StatusCode};
use thiserror::Error;

use crate::core::{method::ProxyMethod, types::SolveCookie};

/// Custom error type for HTTP client operations
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum HttpClientError {
    /// Error when connection to the upstream fails
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// Error when the upstream does not answer in time
    #[error("Timeout error after {0} ms")]
    Timeout(u64),

    /// Error when request is invalid
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// Result type alias for HTTP client operations
pub type HttpClientResult<T> = Result<T, HttpClientError>;

/// A single outbound call to the upstream, as received from the client.
#[derive(Debug, Clone)]
pub struct ForwardRequest {
    pub method: ProxyMethod,
    /// Absolute upstream URL including the query string
    pub url: String,
    /// Inbound request headers, forwarded as-is
    pub headers: HeaderMap,
    /// Cookies to send when `headers` carries no `Cookie` header of its own
    pub cookies: Vec<SolveCookie>,
    pub body: Bytes,
}

/// Raw upstream answer. Immutable once returned.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// HttpClient defines the port (interface) for calling the upstream directly
#[async_trait]
pub trait HttpClient: Send + Sync + 'static {
    /// Issue exactly one outbound call and buffer the full response
    ///
    /// # Arguments
    /// * `req` - Method, URL, headers, cookies and body of the call
    ///
    /// # Returns
    /// A future that resolves to the upstream's response or an error when the
    /// upstream is unreachable or times out
    async fn forward(&self, req: ForwardRequest) -> HttpClientResult<UpstreamResponse>;
}
