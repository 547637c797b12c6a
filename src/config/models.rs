//! Configuration data structures for flareproxy.
//!
//! These types map directly to TOML (also JSON / YAML) configuration files and to
//! `FLAREPROXY_*` environment variables. Every field has a default so an empty
//! config (or no config file at all) yields a runnable proxy.
use serde::{Deserialize, Serialize};

/// Default upstream API the proxy forwards to.
pub const DEFAULT_UPSTREAM: &str = "https://chat.openai.com/backend-api";
/// Default route prefix served by the proxy path.
pub const DEFAULT_PREFIX: &str = "/backend-api";
/// Default `maxTimeout` handed to the challenge solver, in milliseconds.
pub const DEFAULT_MAX_TIMEOUT_MS: u64 = 30_000;
/// Default endpoint of the external challenge solver service.
pub const DEFAULT_SOLVER_URL: &str = "http://127.0.0.1:8191/v1";

/// Settings for the proxy path and its upstream.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ProxyConfig {
    /// Route prefix under which requests are proxied (e.g. "/backend-api")
    pub prefix: String,
    /// Base URL of the upstream API; the path after `prefix` is appended to it
    pub upstream: String,
    /// Upper bound for an upstream call and the `maxTimeout` sent to the solver
    pub max_timeout_ms: u64,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            prefix: DEFAULT_PREFIX.to_string(),
            upstream: DEFAULT_UPSTREAM.to_string(),
            max_timeout_ms: DEFAULT_MAX_TIMEOUT_MS,
        }
    }
}

/// Settings for the external challenge solver.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct SolverConfig {
    /// Endpoint accepting FlareSolverr-style `/v1` commands
    pub url: String,
    /// Extra time granted on top of a command's `maxTimeout` before the
    /// HTTP call to the solver is abandoned
    pub timeout_grace_ms: u64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_SOLVER_URL.to_string(),
            timeout_grace_ms: 10_000,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, e.g. "info" or "flareproxy=debug,hyper=warn"
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: true,
        }
    }
}

/// Root configuration, built once at startup and shared behind an `Arc`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: String,
    pub proxy: ProxyConfig,
    pub solver: SolverConfig,
    pub logging: LoggingConfig,
}

impl ServerConfig {
    /// Create a new server configuration builder
    pub fn builder() -> ServerConfigBuilder {
        ServerConfigBuilder::default()
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: "0.0.0.0:8080".to_string(),
            proxy: ProxyConfig::default(),
            solver: SolverConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

/// Builder for ServerConfig to allow for cleaner configuration creation
#[derive(Default)]
pub struct ServerConfigBuilder {
    config: ServerConfig,
}

impl ServerConfigBuilder {
    pub fn listen_addr(mut self, addr: impl Into<String>) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.config.proxy.prefix = prefix.into();
        self
    }

    pub fn upstream(mut self, upstream: impl Into<String>) -> Self {
        self.config.proxy.upstream = upstream.into();
        self
    }

    pub fn max_timeout_ms(mut self, max_timeout_ms: u64) -> Self {
        self.config.proxy.max_timeout_ms = max_timeout_ms;
        self
    }

    pub fn solver_url(mut self, url: impl Into<String>) -> Self {
        self.config.solver.url = url.into();
        self
    }

    pub fn log_level(mut self, level: impl Into<String>) -> Self {
        self.config.logging.level = level.into();
        self
    }

    pub fn build(self) -> ServerConfig {
        self.config
    }
}
