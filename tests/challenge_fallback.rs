//! End-to-end tests: real adapters and router, mock upstream and mock solver.
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Method, Request, StatusCode, Uri, header},
    response::{AppendHeaders, IntoResponse},
    routing::post,
};
use flareproxy::{
    HttpClientAdapter, HttpHandler, HttpSolverAdapter, ProxyService,
    config::{ProxyConfig, SolverConfig},
    core::types::{ChallengeSolution, V1Response},
    ports::solver::SolveDelegate,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

async fn spawn(app: Router) -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Upstream API: `/api/blocked*` answers with a challenge page, everything
/// else echoes the request.
async fn upstream(method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    if uri.path().starts_with("/api/blocked") {
        return (
            StatusCode::FORBIDDEN,
            AppendHeaders([(header::CONTENT_TYPE, "text/html")]),
            "<html>Just a moment...</html>".to_string(),
        )
            .into_response();
    }

    let echo = json!({
        "method": method.as_str(),
        "uri": uri.to_string(),
        "cookie": headers.get(header::COOKIE).and_then(|v| v.to_str().ok()),
        "body": String::from_utf8_lossy(&body),
    });
    (
        StatusCode::OK,
        AppendHeaders([(header::SET_COOKIE, "s=1"), (header::SET_COOKIE, "t=2")]),
        Json(echo),
    )
        .into_response()
}

type Commands = Arc<Mutex<Vec<Value>>>;

/// FlareSolverr stand-in recording every command it receives.
async fn solver(State(seen): State<Commands>, Json(command): Json<Value>) -> impl IntoResponse {
    seen.lock().unwrap().push(command.clone());

    if command["url"].as_str().is_some_and(|url| url.contains("unsolvable")) {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({"status": "error", "message": "Error: challenge not solved"})),
        );
    }

    let solution = ChallengeSolution::new(200)
        .with_header("Content-Type", "application/json")
        .with_header("Content-Length", "1")
        .with_response(json!({"solved": command["url"]}).to_string());
    (
        StatusCode::OK,
        Json(serde_json::to_value(V1Response::ok(solution)).unwrap()),
    )
}

struct Harness {
    app: Router,
    solver_commands: Commands,
}

async fn harness() -> Harness {
    let upstream_addr = spawn(Router::new().fallback(upstream)).await;

    let solver_commands = Commands::default();
    let solver_addr = spawn(
        Router::new()
            .route("/v1", post(solver))
            .with_state(solver_commands.clone()),
    )
    .await;

    let proxy_config = ProxyConfig {
        upstream: format!("http://{upstream_addr}/api"),
        max_timeout_ms: 5_000,
        ..ProxyConfig::default()
    };
    let solver: Arc<dyn SolveDelegate> = Arc::new(
        HttpSolverAdapter::new(&SolverConfig {
            url: format!("http://{solver_addr}/v1"),
            timeout_grace_ms: 1_000,
        })
        .unwrap(),
    );
    let service = Arc::new(ProxyService::new(
        Arc::new(proxy_config),
        Arc::new(HttpClientAdapter::new(Duration::from_secs(5)).unwrap()),
        solver.clone(),
    ));

    Harness {
        app: Arc::new(HttpHandler::new(service, solver)).router(),
        solver_commands,
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, headers, body)
}

#[tokio::test]
async fn unchallenged_request_is_relayed_verbatim() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::PATCH)
        .uri("/backend-api/conversation/42?x=1&y=a%20b")
        .header(header::COOKIE, "session=abc")
        .body(Body::from("patch body"))
        .unwrap();

    let (status, headers, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    let set_cookies: Vec<_> = headers.get_all(header::SET_COOKIE).iter().collect();
    assert_eq!(set_cookies, ["s=1", "t=2"]);

    let echo: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(echo["method"], "PATCH");
    assert_eq!(echo["uri"], "/api/conversation/42?x=1&y=a%20b");
    assert_eq!(echo["cookie"], "session=abc");
    assert_eq!(echo["body"], "patch body");
    assert!(h.solver_commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn challenged_get_is_solved() {
    let h = harness().await;
    let request = Request::builder()
        .uri("/backend-api/blocked/models?limit=5")
        .header(header::COOKIE, "cf_clearance=old; session=abc")
        .body(Body::empty())
        .unwrap();

    let (status, headers, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers.get(header::CONTENT_TYPE).unwrap(), "application/json");
    let solved: Value = serde_json::from_slice(&body).unwrap();
    assert!(
        solved["solved"]
            .as_str()
            .unwrap()
            .ends_with("/api/blocked/models?limit=5")
    );

    let commands = h.solver_commands.lock().unwrap();
    assert_eq!(commands.len(), 1);
    assert_eq!(commands[0]["cmd"], "request.get");
    assert_eq!(commands[0]["maxTimeout"], 5_000);
    assert_eq!(
        commands[0]["cookies"],
        json!([
            {"name": "cf_clearance", "value": "old"},
            {"name": "session", "value": "abc"}
        ])
    );
    assert!(commands[0].get("postData").is_none());
}

#[tokio::test]
async fn challenged_json_post_is_form_encoded() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/backend-api/blocked/conversation")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(r#"{"a": 1, "b": "two"}"#))
        .unwrap();

    let (status, _, _) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    let commands = h.solver_commands.lock().unwrap();
    assert_eq!(commands[0]["cmd"], "request.post");
    assert_eq!(commands[0]["postData"], "a=1&b=two");
}

#[tokio::test]
async fn solver_failure_yields_internal_error() {
    let h = harness().await;
    let (status, _, body) = send(
        &h.app,
        Request::builder()
            .uri("/backend-api/blocked/unsolvable")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(body.is_empty());
}

#[tokio::test]
async fn challenged_delete_is_not_delegated() {
    let h = harness().await;
    let (status, _, _) = send(
        &h.app,
        Request::builder()
            .method(Method::DELETE)
            .uri("/backend-api/blocked/conversation/1")
            .body(Body::empty())
            .unwrap(),
    )
    .await;

    assert_eq!(status, StatusCode::NOT_IMPLEMENTED);
    assert!(h.solver_commands.lock().unwrap().is_empty());
}

#[tokio::test]
async fn v1_commands_are_relayed_to_the_solver() {
    let h = harness().await;
    let request = Request::builder()
        .method(Method::POST)
        .uri("/v1")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            r#"{"cmd": "request.get", "url": "https://site.test/", "maxTimeout": 1000, "custom": true}"#,
        ))
        .unwrap();

    let (status, _, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    let response: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(response["status"], "ok");
    assert_eq!(response["solution"]["status"], 200);

    let commands = h.solver_commands.lock().unwrap();
    assert_eq!(commands[0]["url"], "https://site.test/");
    assert_eq!(commands[0]["custom"], true);
}

#[tokio::test]
async fn unreachable_upstream_is_bad_gateway() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let dead = listener.local_addr().unwrap();
    drop(listener);

    let solver: Arc<dyn SolveDelegate> = Arc::new(
        HttpSolverAdapter::new(&SolverConfig {
            url: format!("http://{dead}/v1"),
            timeout_grace_ms: 100,
        })
        .unwrap(),
    );
    let service = Arc::new(ProxyService::new(
        Arc::new(ProxyConfig {
            upstream: format!("http://{dead}/api"),
            ..ProxyConfig::default()
        }),
        Arc::new(HttpClientAdapter::new(Duration::from_secs(1)).unwrap()),
        solver.clone(),
    ));
    let app = Arc::new(HttpHandler::new(service, solver)).router();

    let (status, _, body) = send(
        &app,
        Request::builder()
            .uri("/backend-api/anything")
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert!(body.is_empty());
}
