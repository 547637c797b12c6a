//! Challenge fallback orchestration.
//!
//! `ProxyService` forwards every request to the upstream first. Only when the
//! upstream answers with the challenge status is the request replayed through
//! the solver. The service holds no per-request state: configuration and the
//! two ports are shared immutably, so concurrent requests need no locking.
use std::sync::Arc;

use bytes::Bytes;
use hyper::{HeaderMap, Method, StatusCode};

use crate::{
    config::ProxyConfig,
    core::{
        descriptor::{DescriptorBuilder, PostBody, parse_cookies},
        error::ProxyError,
        method::ProxyMethod,
        reconciler::{ReconciledResponse, reconcile_solution, reconcile_upstream},
    },
    ports::{
        http_client::{ForwardRequest, HttpClient},
        solver::SolveDelegate,
    },
};

/// Upstream status that marks a request as blocked by a challenge.
pub const CHALLENGE_STATUS: StatusCode = StatusCode::FORBIDDEN;

/// An inbound request on the proxy path, already stripped of the route prefix.
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    /// Path below the prefix, still percent-encoded, without a leading '/'
    pub path: String,
    /// Raw query string, appended verbatim when non-empty
    pub query: Option<String>,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// Routes a request to the upstream directly or, when challenged, through the solver.
pub struct ProxyService {
    config: Arc<ProxyConfig>,
    http_client: Arc<dyn HttpClient>,
    solver: Arc<dyn SolveDelegate>,
}

impl ProxyService {
    pub fn new(
        config: Arc<ProxyConfig>,
        http_client: Arc<dyn HttpClient>,
        solver: Arc<dyn SolveDelegate>,
    ) -> Self {
        Self {
            config,
            http_client,
            solver,
        }
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    /// Upstream base + path (+ "?" + query when present).
    pub fn target_url(&self, path: &str, query: Option<&str>) -> String {
        let mut url = format!("{}/{}", self.config.upstream.trim_end_matches('/'), path);
        if let Some(query) = query.filter(|q| !q.is_empty()) {
            url.push('?');
            url.push_str(query);
        }
        url
    }

    /// Handle one proxied request.
    ///
    /// The upstream call always completes before the solver is considered; the
    /// solver is invoked at most once and only for a challenged response.
    pub async fn handle(&self, request: ProxyRequest) -> Result<ReconciledResponse, ProxyError> {
        let method = ProxyMethod::from(&request.method);
        let url = self.target_url(&request.path, request.query.as_deref());
        let cookies = parse_cookies(&request.headers);

        let upstream = self
            .http_client
            .forward(ForwardRequest {
                method: method.clone(),
                url: url.clone(),
                headers: request.headers.clone(),
                cookies: cookies.clone(),
                body: request.body.clone(),
            })
            .await
            .inspect_err(|e| tracing::error!("Upstream request {} {} failed: {}", method, url, e))?;

        if upstream.status != CHALLENGE_STATUS {
            tracing::info!(
                "No challenge for {} {} (status {}), relaying upstream response",
                method,
                url,
                upstream.status
            );
            return Ok(reconcile_upstream(upstream));
        }

        tracing::info!("Challenge detected for {} {}, delegating to solver", method, url);

        let post_body = match method {
            ProxyMethod::Post => PostBody::from_request(&request.headers, &request.body)?,
            _ => None,
        };

        let descriptor = DescriptorBuilder::new(url, self.config.max_timeout_ms)
            .cookies(cookies)
            .build(&method, post_body)
            .inspect_err(|e| tracing::warn!("Cannot delegate challenged request: {}", e))?;

        tracing::debug!(
            "Solver command {} for {} (cookies: {}, post data: {})",
            descriptor.command,
            descriptor.target_url,
            descriptor.cookies.len(),
            descriptor.encoded_body.is_some()
        );

        let outcome = self.solver.solve(descriptor.into()).await;
        Ok(reconcile_solution(outcome))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        Mutex,
        atomic::{AtomicUsize, Ordering},
    };

    use async_trait::async_trait;
    use hyper::header::{self, HeaderValue};

    use super::*;
    use crate::{
        core::types::{ChallengeSolution, SolveCommand, V1Request, V1Response},
        ports::{
            http_client::{HttpClientError, HttpClientResult, UpstreamResponse},
            solver::{SolverError, SolverResult},
        },
    };

    /// Upstream double answering every call with a fixed status.
    struct StaticUpstream {
        status: StatusCode,
        calls: Mutex<Vec<ForwardRequest>>,
    }

    impl StaticUpstream {
        fn new(status: StatusCode) -> Arc<Self> {
            Arc::new(Self {
                status,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn calls(&self) -> Vec<ForwardRequest> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl HttpClient for StaticUpstream {
        async fn forward(&self, req: ForwardRequest) -> HttpClientResult<UpstreamResponse> {
            self.calls.lock().unwrap().push(req);
            let mut headers = HeaderMap::new();
            headers.insert("x-upstream", HeaderValue::from_static("1"));
            Ok(UpstreamResponse {
                status: self.status,
                headers,
                body: Bytes::from_static(b"upstream body"),
            })
        }
    }

    struct DownUpstream;

    #[async_trait]
    impl HttpClient for DownUpstream {
        async fn forward(&self, _req: ForwardRequest) -> HttpClientResult<UpstreamResponse> {
            Err(HttpClientError::ConnectionError("refused".to_string()))
        }
    }

    /// Solver double recording requests and replaying a canned outcome.
    struct RecordingSolver {
        outcome: fn() -> SolverResult<V1Response>,
        requests: Mutex<Vec<V1Request>>,
        calls: AtomicUsize,
    }

    impl RecordingSolver {
        fn new(outcome: fn() -> SolverResult<V1Response>) -> Arc<Self> {
            Arc::new(Self {
                outcome,
                requests: Mutex::new(Vec::new()),
                calls: AtomicUsize::new(0),
            })
        }

        fn last_request(&self) -> V1Request {
            self.requests.lock().unwrap().last().cloned().unwrap()
        }
    }

    #[async_trait]
    impl SolveDelegate for RecordingSolver {
        async fn solve(&self, request: V1Request) -> SolverResult<V1Response> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.requests.lock().unwrap().push(request);
            (self.outcome)()
        }
    }

    fn solved() -> SolverResult<V1Response> {
        Ok(V1Response::ok(
            ChallengeSolution::new(200)
                .with_header("X-Test", "v")
                .with_response("body"),
        ))
    }

    fn config() -> Arc<ProxyConfig> {
        Arc::new(ProxyConfig {
            prefix: "/backend-api".to_string(),
            upstream: "https://upstream.test/backend-api/".to_string(),
            max_timeout_ms: 12345,
        })
    }

    fn request(method: Method, path: &str, query: Option<&str>) -> ProxyRequest {
        let mut headers = HeaderMap::new();
        headers.insert(header::COOKIE, HeaderValue::from_static("sid=abc; theme=dark"));
        ProxyRequest {
            method,
            path: path.to_string(),
            query: query.map(str::to_string),
            headers,
            body: Bytes::new(),
        }
    }

    fn service(upstream: Arc<dyn HttpClient>, solver: Arc<dyn SolveDelegate>) -> ProxyService {
        ProxyService::new(config(), upstream, solver)
    }

    #[test]
    fn test_target_url() {
        let svc = service(StaticUpstream::new(StatusCode::OK), RecordingSolver::new(solved));
        assert_eq!(
            svc.target_url("conversation/1", None),
            "https://upstream.test/backend-api/conversation/1"
        );
        assert_eq!(
            svc.target_url("models", Some("history_and_training_disabled=false")),
            "https://upstream.test/backend-api/models?history_and_training_disabled=false"
        );
        assert_eq!(
            svc.target_url("models", Some("")),
            "https://upstream.test/backend-api/models"
        );
    }

    #[tokio::test]
    async fn test_unblocked_response_passes_through_without_solver() {
        let upstream = StaticUpstream::new(StatusCode::CREATED);
        let solver = RecordingSolver::new(solved);
        let svc = service(upstream.clone(), solver.clone());

        let response = svc
            .handle(request(Method::POST, "conversation", Some("a=b")))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::CREATED);
        assert_eq!(response.headers.get("x-upstream").unwrap(), "1");
        assert_eq!(response.body, Bytes::from_static(b"upstream body"));
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);

        let calls = upstream.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].method, ProxyMethod::Post);
        assert_eq!(
            calls[0].url,
            "https://upstream.test/backend-api/conversation?a=b"
        );
        assert_eq!(
            calls[0].headers.get(header::COOKIE).unwrap(),
            "sid=abc; theme=dark"
        );
        assert_eq!(calls[0].cookies.len(), 2);
    }

    #[tokio::test]
    async fn test_challenged_get_is_delegated() {
        let upstream = StaticUpstream::new(StatusCode::FORBIDDEN);
        let solver = RecordingSolver::new(solved);
        let svc = service(upstream.clone(), solver.clone());

        let response = svc
            .handle(request(Method::GET, "models", Some("x=1")))
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.headers.get("x-test").unwrap(), "v");
        assert_eq!(response.body, Bytes::from_static(b"body"));

        assert_eq!(upstream.calls().len(), 1);
        assert_eq!(solver.calls.load(Ordering::SeqCst), 1);

        let sent = solver.last_request();
        assert_eq!(sent.cmd, SolveCommand::RequestGet);
        assert_eq!(
            sent.url.as_deref(),
            Some("https://upstream.test/backend-api/models?x=1")
        );
        assert_eq!(sent.max_timeout, Some(12345));
        assert!(sent.post_data.is_none());
        let names: Vec<&str> = sent.cookies.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["sid", "theme"]);
    }

    #[tokio::test]
    async fn test_challenged_post_sends_form_encoded_json() {
        let solver = RecordingSolver::new(solved);
        let svc = service(StaticUpstream::new(StatusCode::FORBIDDEN), solver.clone());

        let mut req = request(Method::POST, "conversation", None);
        req.headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        req.body = Bytes::from_static(br#"{"a":"1","b":"2"}"#);

        svc.handle(req).await.unwrap();

        let sent = solver.last_request();
        assert_eq!(sent.cmd, SolveCommand::RequestPost);
        assert_eq!(sent.post_data.as_deref(), Some("a=1&b=2"));
    }

    #[tokio::test]
    async fn test_challenged_put_is_not_delegated() {
        let solver = RecordingSolver::new(solved);
        let svc = service(StaticUpstream::new(StatusCode::FORBIDDEN), solver.clone());

        let mut req = request(Method::PUT, "conversation/1", None);
        req.body = Bytes::from_static(b"{\"title\":\"x\"}");

        let err = svc.handle(req).await.unwrap_err();
        assert!(matches!(
            err,
            ProxyError::UnsupportedMethodForDelegation(ProxyMethod::Put)
        ));
        assert_eq!(err.status_code(), StatusCode::NOT_IMPLEMENTED);
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_solver_rejection_and_failure() {
        let rejected = service(
            StaticUpstream::new(StatusCode::FORBIDDEN),
            RecordingSolver::new(|| Ok(V1Response::error("Challenge not solved"))),
        );
        let response = rejected
            .handle(request(Method::GET, "models", None))
            .await
            .unwrap();
        assert_eq!(response, ReconciledResponse::empty(StatusCode::BAD_REQUEST));

        let failing = service(
            StaticUpstream::new(StatusCode::FORBIDDEN),
            RecordingSolver::new(|| Err(SolverError::Internal("crash".to_string()))),
        );
        let response = failing
            .handle(request(Method::GET, "models", None))
            .await
            .unwrap();
        assert_eq!(
            response,
            ReconciledResponse::empty(StatusCode::INTERNAL_SERVER_ERROR)
        );
    }

    #[tokio::test]
    async fn test_network_error_propagates() {
        let solver = RecordingSolver::new(solved);
        let svc = service(Arc::new(DownUpstream), solver.clone());

        let err = svc
            .handle(request(Method::GET, "models", None))
            .await
            .unwrap_err();
        assert!(matches!(err, ProxyError::Network(_)));
        assert_eq!(err.status_code(), StatusCode::BAD_GATEWAY);
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_repeated_requests_are_independent() {
        let upstream = StaticUpstream::new(StatusCode::OK);
        let solver = RecordingSolver::new(solved);
        let svc = service(upstream.clone(), solver.clone());

        let first = svc.handle(request(Method::GET, "models", None)).await.unwrap();
        let second = svc.handle(request(Method::GET, "models", None)).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(upstream.calls().len(), 2);
        assert_eq!(solver.calls.load(Ordering::SeqCst), 0);
    }
}
