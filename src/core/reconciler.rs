//! Converges both proxy paths into the one response shape written to clients.
//!
//! | Input | Result |
//! |---|---|
//! | upstream answered directly | status, headers and body copied verbatim |
//! | solver call failed | 500, empty body |
//! | solver answer undecodable (e.g. solution without `status`) | 500, empty body |
//! | solver status is not "ok" | 400, empty body |
//! | solver "ok" without a solution | 400, empty body |
//! | solver solution | solution status, headers (in order, last wins), body |
use bytes::Bytes;
use hyper::{
    HeaderMap, StatusCode,
    header::{self, HeaderName, HeaderValue},
};
use serde_json::Value;

use crate::{
    core::types::{ChallengeSolution, V1Response},
    ports::{http_client::UpstreamResponse, solver::SolverResult},
};

/// Solution headers describing framing of the page the solver saw; they do
/// not hold for the decoded text we relay.
const SOLUTION_FRAMING_HEADERS: [HeaderName; 3] = [
    header::CONTENT_LENGTH,
    header::TRANSFER_ENCODING,
    header::CONTENT_ENCODING,
];

/// The single outbound response, fed by exactly one of the two paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconciledResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl ReconciledResponse {
    /// A response carrying only a status line.
    pub fn empty(status: StatusCode) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

/// Pass-through of a response the upstream produced directly.
pub fn reconcile_upstream(upstream: UpstreamResponse) -> ReconciledResponse {
    ReconciledResponse {
        status: upstream.status,
        headers: upstream.headers,
        body: upstream.body,
    }
}

/// Map the outcome of a solve call onto a client response.
pub fn reconcile_solution(outcome: SolverResult<V1Response>) -> ReconciledResponse {
    let response = match outcome {
        Ok(response) => response,
        Err(e) => {
            tracing::error!("Challenge solver failed: {}", e);
            return ReconciledResponse::empty(StatusCode::INTERNAL_SERVER_ERROR);
        }
    };

    if !response.is_ok() {
        tracing::warn!(
            "Challenge solver rejected the request (status: {}, message: {})",
            response.status,
            response.message
        );
        return ReconciledResponse::empty(StatusCode::BAD_REQUEST);
    }

    let Some(solution) = response.solution else {
        tracing::warn!("Challenge solver reported success without a solution");
        return ReconciledResponse::empty(StatusCode::BAD_REQUEST);
    };

    from_solution(solution)
}

fn from_solution(solution: ChallengeSolution) -> ReconciledResponse {
    let Ok(status) = StatusCode::from_u16(solution.http_status) else {
        tracing::warn!(
            "Challenge solver returned invalid HTTP status {}",
            solution.http_status
        );
        return ReconciledResponse::empty(StatusCode::BAD_REQUEST);
    };

    let mut headers = HeaderMap::new();
    for (name, value) in &solution.headers {
        let value = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };

        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                if SOLUTION_FRAMING_HEADERS.contains(&name) {
                    continue;
                }
                headers.insert(name, value);
            }
            _ => tracing::warn!("Skipping invalid solution header '{}'", name),
        }
    }

    ReconciledResponse {
        status,
        headers,
        body: Bytes::from(solution.response.unwrap_or_default()),
    }
}
