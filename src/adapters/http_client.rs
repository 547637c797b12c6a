use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body as AxumBody;
use eyre::Result;
use http_body_util::BodyExt;
use hyper::{Request, Uri, Version, header, header::HeaderValue};
use hyper_rustls::HttpsConnector;
use hyper_util::{
    client::legacy::{Client, connect::HttpConnector},
    rt::TokioExecutor,
};
use rustls_native_certs::load_native_certs;
use tokio::time::timeout;
use tracing::Instrument;

use crate::ports::http_client::{
    ForwardRequest, HttpClient, HttpClientError, HttpClientResult, UpstreamResponse,
};

/// Direct forwarder to the upstream using Hyper with Rustls.
///
/// Responsibilities:
/// * Issues exactly one call per request with the inbound method, headers and body
/// * Points `Host` at the upstream authority; every other header is left alone
/// * Buffers the full upstream response, bounded by the configured timeout
///
/// No retries happen here.
pub struct HttpClientAdapter {
    client: Client<HttpsConnector<HttpConnector>, AxumBody>,
    timeout: Duration,
}

impl HttpClientAdapter {
    /// Create a new HTTP client adapter whose calls give up after `timeout`.
    pub fn new(timeout: Duration) -> Result<Self> {
        // Install default crypto provider for rustls if not already set
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();

        let mut http_connector = HttpConnector::new();
        http_connector.enforce_http(false); // Allow HTTPS URLs

        let mut root_cert_store = rustls::RootCertStore::empty();
        let native_certs = load_native_certs();

        if !native_certs.certs.is_empty() {
            for cert in native_certs.certs {
                if root_cert_store.add(cert).is_err() {
                    tracing::warn!("Failed to add native certificate to rustls RootCertStore");
                }
            }
            tracing::info!("Loaded {} native root certificates.", root_cert_store.len());
        }

        if !native_certs.errors.is_empty() {
            tracing::warn!(
                "Some native certificates failed to load: {:?}",
                native_certs.errors
            );
        }

        let tls_config = rustls::ClientConfig::builder()
            .with_root_certificates(root_cert_store)
            .with_no_client_auth();

        let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
            .with_tls_config(tls_config)
            .https_or_http()
            .enable_http1()
            .wrap_connector(http_connector);

        let client = Client::builder(TokioExecutor::new()).build::<_, AxumBody>(https_connector);

        tracing::info!(
            "Created upstream HTTP client (timeout: {} ms)",
            timeout.as_millis()
        );
        Ok(Self { client, timeout })
    }

    /// Turn a forward request into the outgoing Hyper request.
    fn build_request(req: ForwardRequest) -> HttpClientResult<Request<AxumBody>> {
        let uri: Uri = req
            .url
            .parse()
            .map_err(|e| HttpClientError::InvalidRequest(format!("{}: {e}", req.url)))?;

        let Some(host) = uri.host() else {
            tracing::error!("Outgoing URI has no host: {}", uri);
            return Err(HttpClientError::InvalidRequest(
                "Outgoing URI has no host".to_string(),
            ));
        };
        let authority = match uri.port() {
            Some(port) => format!("{host}:{}", port.as_u16()),
            None => host.to_string(),
        };

        let mut headers = req.headers;
        headers.insert(
            header::HOST,
            HeaderValue::from_str(&authority)
                .map_err(|e| HttpClientError::InvalidRequest(e.to_string()))?,
        );

        if !headers.contains_key(header::COOKIE) && !req.cookies.is_empty() {
            let rendered = req
                .cookies
                .iter()
                .map(|cookie| format!("{}={}", cookie.name, cookie.value))
                .collect::<Vec<_>>()
                .join("; ");
            headers.insert(
                header::COOKIE,
                HeaderValue::from_str(&rendered)
                    .map_err(|e| HttpClientError::InvalidRequest(e.to_string()))?,
            );
        }

        let body = if req.method.sends_body() {
            AxumBody::from(req.body)
        } else {
            if !req.body.is_empty() {
                // the body is dropped, so its framing headers no longer apply
                headers.remove(header::CONTENT_LENGTH);
                headers.remove(header::TRANSFER_ENCODING);
            }
            AxumBody::empty()
        };

        let mut request = Request::builder()
            .method(req.method.as_method())
            .uri(uri)
            .version(Version::HTTP_11)
            .body(body)
            .map_err(|e| HttpClientError::InvalidRequest(e.to_string()))?;
        *request.headers_mut() = headers;

        Ok(request)
    }
}

#[async_trait]
impl HttpClient for HttpClientAdapter {
    async fn forward(&self, req: ForwardRequest) -> HttpClientResult<UpstreamResponse> {
        let span = tracing::info_span!(
            "upstream_request",
            http.method = %req.method,
            upstream.url = %req.url,
            http.status_code = tracing::field::Empty,
        );

        async move {
            let request = Self::build_request(req)?;
            let method = request.method().clone();
            let uri = request.uri().clone();

            tracing::info!("Sending request: {} {}", method, uri);
            tracing::debug!("Outgoing request headers: {:?}", request.headers());

            let exchange = async {
                let response = self.client.request(request).await.map_err(|e| {
                    HttpClientError::ConnectionError(format!(
                        "Request to {method} {uri} failed: {e}"
                    ))
                })?;

                let (mut parts, body) = response.into_parts();
                let body = body
                    .collect()
                    .await
                    .map_err(|e| {
                        HttpClientError::ConnectionError(format!(
                            "Failed to read response body from {uri}: {e}"
                        ))
                    })?
                    .to_bytes();

                // The body is fully buffered; framing is redone downstream.
                parts.headers.remove(header::TRANSFER_ENCODING);

                Ok::<_, HttpClientError>(UpstreamResponse {
                    status: parts.status,
                    headers: parts.headers,
                    body,
                })
            };

            let result = match timeout(self.timeout, exchange).await {
                Ok(result) => result,
                Err(_) => Err(HttpClientError::Timeout(self.timeout.as_millis() as u64)),
            };

            match &result {
                Ok(response) => {
                    tracing::Span::current().record("http.status_code", response.status.as_u16());
                }
                Err(e) => {
                    tracing::Span::current().record("http.status_code", 599u16);
                    tracing::error!("Error making upstream request ({} {}): {}", method, uri, e);
                }
            }

            result
        }
        .instrument(span)
        .await
    }
}
