use std::sync::Arc;

use axum::{
    Json, Router,
    body::{Body as AxumBody, Bytes},
    extract::{DefaultBodyLimit, State, rejection::JsonRejection},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    routing::{MethodFilter, get, on, post},
};
use serde_json::json;
use tower_http::trace::TraceLayer;

use crate::{
    core::{
        ProxyError, ProxyMethod, ProxyRequest, ProxyService, ReconciledResponse, types::V1Request,
    },
    ports::solver::{SolveDelegate, SolverError},
};

/// Methods served on the proxy prefix; anything else is answered 405 by the router.
fn proxy_methods() -> MethodFilter {
    ProxyMethod::ROUTED
        .into_iter()
        .filter_map(|method| MethodFilter::try_from(method).ok())
        .fold(MethodFilter::GET, MethodFilter::or)
}

/// HTTP front controller for the flareproxy server
pub struct HttpHandler {
    proxy_service: Arc<ProxyService>,
    solver: Arc<dyn SolveDelegate>,
}

impl HttpHandler {
    pub fn new(proxy_service: Arc<ProxyService>, solver: Arc<dyn SolveDelegate>) -> Self {
        Self {
            proxy_service,
            solver,
        }
    }

    /// Build the axum router serving the index, health, `/v1` and proxy routes.
    pub fn router(self: Arc<Self>) -> Router {
        let proxy_route = format!("{}/{{*path}}", self.proxy_service.config().prefix);
        tracing::info!("Proxy route: {}", proxy_route);

        let traced = Router::new()
            .route("/", get(index))
            .route("/v1", post(relay_v1))
            .route(
                &proxy_route,
                on(proxy_methods(), proxy).layer(DefaultBodyLimit::disable()),
            )
            .fallback(not_found)
            .layer(TraceLayer::new_for_http())
            .with_state(self);

        Router::new().route("/health", get(health)).merge(traced)
    }

    /// Path below the configured prefix, still percent-encoded, without a leading '/'.
    fn relative_path<'a>(&self, uri: &'a Uri) -> &'a str {
        let path = uri.path();
        path.strip_prefix(self.proxy_service.config().prefix.as_str())
            .unwrap_or(path)
            .trim_start_matches('/')
    }
}

impl IntoResponse for ReconciledResponse {
    fn into_response(self) -> Response {
        let mut response = Response::new(AxumBody::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        self.status_code().into_response()
    }
}

async fn index() -> Json<serde_json::Value> {
    Json(json!({
        "msg": "flareproxy is ready!",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}

async fn not_found() -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "Not Found", "status_code": 404 })),
    )
        .into_response()
}

fn v1_error(status: StatusCode, message: impl Into<String>) -> Response {
    let message = message.into();
    (
        status,
        Json(json!({ "status": "error", "message": message })),
    )
        .into_response()
}

/// Relay a raw solver command to the delegate.
async fn relay_v1(
    State(handler): State<Arc<HttpHandler>>,
    payload: Result<Json<V1Request>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => {
            tracing::warn!("Rejected /v1 command: {}", rejection.body_text());
            return v1_error(
                StatusCode::BAD_REQUEST,
                format!("Error: {}", rejection.body_text()),
            );
        }
    };

    tracing::info!("Incoming /v1 command: {}", request.cmd);

    match handler.solver.solve(request).await {
        Ok(response) if response.is_ok() => Json(response).into_response(),
        Ok(response) => {
            tracing::warn!("Solver reported an error: {}", response.message);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(response)).into_response()
        }
        Err(SolverError::Internal(message)) => {
            tracing::error!("Solver internal error: {}", message);
            v1_error(StatusCode::INTERNAL_SERVER_ERROR, message)
        }
        Err(e) => {
            tracing::error!("Solver call failed: {}", e);
            v1_error(StatusCode::INTERNAL_SERVER_ERROR, format!("Error: {e}"))
        }
    }
}

/// Hand a request on the proxy prefix to the proxy core.
async fn proxy(
    State(handler): State<Arc<HttpHandler>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = ProxyRequest {
        method,
        path: handler.relative_path(&uri).to_string(),
        query: uri.query().map(str::to_string),
        headers,
        body,
    };

    match handler.proxy_service.handle(request).await {
        Ok(response) => response.into_response(),
        Err(e) => e.into_response(),
    }
}
