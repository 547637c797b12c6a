use std::time::Duration;

use async_trait::async_trait;
use eyre::{Result, WrapErr};
use reqwest::StatusCode;

use crate::{
    config::{DEFAULT_MAX_TIMEOUT_MS, SolverConfig},
    core::types::{V1Request, V1Response},
    ports::solver::{SolveDelegate, SolverError, SolverResult},
};

/// Solve delegate backed by an external FlareSolverr-compatible `/v1` service.
///
/// Each command is one JSON POST. The HTTP call is bounded by the command's
/// `maxTimeout` plus a grace period, so the solver gets to report its own
/// timeout before we give up on it.
pub struct HttpSolverAdapter {
    client: reqwest::Client,
    endpoint: String,
    grace: Duration,
}

impl HttpSolverAdapter {
    pub fn new(config: &SolverConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .wrap_err("Failed to build solver HTTP client")?;

        tracing::info!("Challenge solver endpoint: {}", config.url);
        Ok(Self {
            client,
            endpoint: config.url.clone(),
            grace: Duration::from_millis(config.timeout_grace_ms),
        })
    }

    fn call_timeout(&self, request: &V1Request) -> Duration {
        Duration::from_millis(request.max_timeout.unwrap_or(DEFAULT_MAX_TIMEOUT_MS)) + self.grace
    }
}

#[async_trait]
impl SolveDelegate for HttpSolverAdapter {
    async fn solve(&self, request: V1Request) -> SolverResult<V1Response> {
        let call_timeout = self.call_timeout(&request);
        tracing::info!(
            "Sending {} to solver{}",
            request.cmd,
            request
                .url
                .as_deref()
                .map(|url| format!(" for {url}"))
                .unwrap_or_default()
        );

        let response = self
            .client
            .post(&self.endpoint)
            .timeout(call_timeout)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    SolverError::Timeout(call_timeout.as_millis() as u64)
                } else {
                    SolverError::Unreachable(e.to_string())
                }
            })?;

        let status = response.status();
        let body = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                SolverError::Timeout(call_timeout.as_millis() as u64)
            } else {
                SolverError::InvalidResponse(format!("failed to read body: {e}"))
            }
        })?;

        let parsed = serde_json::from_slice::<V1Response>(&body);

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            let message = match parsed {
                Ok(response) => response.message,
                Err(_) => String::from_utf8_lossy(&body).into_owned(),
            };
            return Err(SolverError::Internal(message));
        }

        let response = parsed.map_err(|e| {
            SolverError::InvalidResponse(format!("HTTP {status} with undecodable body: {e}"))
        })?;

        tracing::debug!(
            "Solver answered HTTP {} with status '{}' ({})",
            status,
            response.status,
            response.message
        );
        Ok(response)
    }
}
