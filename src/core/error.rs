use hyper::StatusCode;
use thiserror::Error;

use crate::{core::method::ProxyMethod, ports::http_client::HttpClientError};

/// Failures of the proxy path that never reach reconciliation.
///
/// Solver outcomes are not represented here: they always reconcile into a
/// response (see [`crate::core::reconciler`]).
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum ProxyError {
    /// The upstream could not be reached or timed out
    #[error("Upstream request failed: {0}")]
    Network(#[from] HttpClientError),

    /// A challenged request used a method the solver cannot replay
    #[error("Method {0} was challenged but has no delegation command")]
    UnsupportedMethodForDelegation(ProxyMethod),

    /// The inbound body cannot be turned into solver post data
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl ProxyError {
    /// Status written to the client; the body is always empty.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Network(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UnsupportedMethodForDelegation(_) => StatusCode::NOT_IMPLEMENTED,
            ProxyError::InvalidBody(_) => StatusCode::BAD_REQUEST,
        }
    }
}
