//! flareproxy - a challenge-aware reverse proxy.
//!
//! Every request under the configured prefix is forwarded to a single upstream
//! API. When the upstream answers `403 Forbidden` (an anti-bot challenge), the
//! request is replayed through an external challenge solver speaking the
//! FlareSolverr `/v1` protocol, and the solver's rendered result is returned in
//! place of the challenge page.
//!
//! # Architecture
//! The crate follows a **hexagonal architecture**:
//! - `ports` holds the two outbound seams: [`ports::http_client::HttpClient`]
//!   (direct forwarding) and [`ports::solver::SolveDelegate`] (challenge solving).
//! - `adapters` implements them (hyper for the upstream, reqwest for the
//!   solver) and exposes the axum front controller.
//! - `core` holds the fallback decision, the solver request descriptor and the
//!   response reconciliation; it depends only on the ports.
//!
//! # Quick Example
//! ```no_run
//! use std::{sync::Arc, time::Duration};
//!
//! use flareproxy::{
//!     HttpClientAdapter, HttpHandler, HttpSolverAdapter, ProxyService,
//!     config::ServerConfig,
//! };
//!
//! # #[tokio::main] async fn main() -> eyre::Result<()> {
//! let cfg: ServerConfig = flareproxy::config::load_config(None).await?;
//! let timeout = Duration::from_millis(cfg.proxy.max_timeout_ms);
//! let solver = Arc::new(HttpSolverAdapter::new(&cfg.solver)?);
//! let service = Arc::new(ProxyService::new(
//!     Arc::new(cfg.proxy.clone()),
//!     Arc::new(HttpClientAdapter::new(timeout)?),
//!     solver.clone(),
//! ));
//! let app = Arc::new(HttpHandler::new(service, solver)).router();
//! let listener = tokio::net::TcpListener::bind(&cfg.listen_addr).await?;
//! axum::serve(listener, app).await?;
//! # Ok(()) }
//! ```
//!
//! # Error Handling
//! Setup paths return `eyre::Result<T>` with context attached via `WrapErr`.
//! Request paths use the typed errors in [`core::ProxyError`],
//! [`ports::http_client::HttpClientError`] and [`ports::solver::SolverError`],
//! each of which maps to exactly one client-facing status.
pub mod config;
pub mod ports;
pub mod tracing_setup;
pub mod utils;

pub mod adapters;
pub mod core;

// Re-export the specific types needed by the binary crate
pub use crate::{
    adapters::{HttpClientAdapter, HttpHandler, HttpSolverAdapter},
    core::ProxyService,
    ports::{http_client::HttpClient, solver::SolveDelegate},
    utils::GracefulShutdown,
};
