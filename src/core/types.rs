//! Wire types of the solver protocol.
//!
//! The solver speaks FlareSolverr's `/v1` JSON dialect: a command object goes
//! in, a status object (optionally carrying a `solution`) comes out. Fields the
//! proxy does not interpret are kept in `extra` so `/v1` relays stay lossless.
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Status reported by the solver when a command succeeded.
pub const STATUS_OK: &str = "ok";
/// Status reported by the solver (or by us) when a command failed.
pub const STATUS_ERROR: &str = "error";

/// Commands understood by the solver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SolveCommand {
    #[serde(rename = "request.get")]
    RequestGet,
    #[serde(rename = "request.post")]
    RequestPost,
    #[serde(rename = "sessions.create")]
    SessionsCreate,
    #[serde(rename = "sessions.list")]
    SessionsList,
    #[serde(rename = "sessions.destroy")]
    SessionsDestroy,
}

impl SolveCommand {
    pub fn as_str(&self) -> &'static str {
        match self {
            SolveCommand::RequestGet => "request.get",
            SolveCommand::RequestPost => "request.post",
            SolveCommand::SessionsCreate => "sessions.create",
            SolveCommand::SessionsList => "sessions.list",
            SolveCommand::SessionsDestroy => "sessions.destroy",
        }
    }
}

impl std::fmt::Display for SolveCommand {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A cookie as exchanged with the solver. Solution cookies carry extra
/// attributes (domain, path, expiry, ...) which are preserved untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SolveCookie {
    pub name: String,
    pub value: String,
    #[serde(flatten)]
    pub attributes: Map<String, Value>,
}

impl SolveCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            attributes: Map::new(),
        }
    }
}

/// Command sent to the solver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1Request {
    pub cmd: SolveCommand,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_timeout: Option<u64>,
    #[serde(default)]
    pub cookies: Vec<SolveCookie>,
    /// `application/x-www-form-urlencoded` body for `request.post`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session: Option<String>,
    #[serde(
        default,
        rename = "session_ttl_minutes",
        skip_serializing_if = "Option::is_none"
    )]
    pub session_ttl_minutes: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_only_cookies: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl V1Request {
    pub fn new(cmd: SolveCommand) -> Self {
        Self {
            cmd,
            url: None,
            max_timeout: None,
            cookies: Vec::new(),
            post_data: None,
            session: None,
            session_ttl_minutes: None,
            proxy: None,
            return_only_cookies: None,
            extra: Map::new(),
        }
    }
}

/// Response of the solver to any command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct V1Response {
    pub status: String,
    #[serde(default)]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub solution: Option<ChallengeSolution>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_timestamp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl V1Response {
    pub fn ok(solution: ChallengeSolution) -> Self {
        Self {
            status: STATUS_OK.to_string(),
            message: String::new(),
            solution: Some(solution),
            start_timestamp: None,
            end_timestamp: None,
            version: None,
            extra: Map::new(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: STATUS_ERROR.to_string(),
            message: message.into(),
            solution: None,
            start_timestamp: None,
            end_timestamp: None,
            version: None,
            extra: Map::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == STATUS_OK
    }
}

/// What the solver observed after clearing the challenge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChallengeSolution {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// HTTP status of the solved page
    #[serde(rename = "status")]
    pub http_status: u16,
    /// Response headers in the order the solver reported them
    #[serde(default)]
    pub headers: Map<String, Value>,
    /// Response body
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub cookies: Vec<SolveCookie>,
    #[serde(default)]
    pub user_agent: Option<String>,
}

impl ChallengeSolution {
    pub fn new(http_status: u16) -> Self {
        Self {
            url: None,
            http_status,
            headers: Map::new(),
            response: None,
            cookies: Vec::new(),
            user_agent: None,
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), Value::String(value.into()));
        self
    }

    pub fn with_response(mut self, body: impl Into<String>) -> Self {
        self.response = Some(body.into());
        self
    }
}
