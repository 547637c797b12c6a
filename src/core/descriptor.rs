//! Builds the solver command that replays a challenged request.
use hyper::{HeaderMap, header};
use serde_json::Value;
use url::form_urlencoded;

use crate::core::{
    error::ProxyError,
    method::ProxyMethod,
    types::{SolveCommand, SolveCookie, V1Request},
};

/// Normalized description of a challenged request, ready for the solver.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestDescriptor {
    pub target_url: String,
    pub command: SolveCommand,
    pub max_timeout_ms: u64,
    pub cookies: Vec<SolveCookie>,
    /// `application/x-www-form-urlencoded` post data, `request.post` only
    pub encoded_body: Option<String>,
}

impl From<RequestDescriptor> for V1Request {
    fn from(descriptor: RequestDescriptor) -> Self {
        let mut request = V1Request::new(descriptor.command);
        request.url = Some(descriptor.target_url);
        request.max_timeout = Some(descriptor.max_timeout_ms);
        request.cookies = descriptor.cookies;
        request.post_data = descriptor.encoded_body;
        request
    }
}

/// Inbound body in a shape the solver's `postData` can be derived from.
#[derive(Debug, Clone, PartialEq)]
pub enum PostBody {
    /// A JSON document; its top-level object is re-encoded as a form
    Json(Value),
    /// A body that already is form-urlencoded
    Form(String),
}

impl PostBody {
    /// Interpret the inbound body according to its `Content-Type`.
    ///
    /// Empty bodies and content types other than JSON or form-urlencoded
    /// yield `None`; malformed JSON is an error.
    pub fn from_request(headers: &HeaderMap, body: &[u8]) -> Result<Option<Self>, ProxyError> {
        if body.is_empty() {
            return Ok(None);
        }

        let media_type = headers
            .get(header::CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(';').next())
            .map(|value| value.trim().to_ascii_lowercase())
            .unwrap_or_default();

        if media_type == "application/json" || media_type.ends_with("+json") {
            let value = serde_json::from_slice(body)
                .map_err(|e| ProxyError::InvalidBody(format!("malformed JSON: {e}")))?;
            Ok(Some(PostBody::Json(value)))
        } else if media_type == "application/x-www-form-urlencoded" {
            let form = std::str::from_utf8(body)
                .map_err(|e| ProxyError::InvalidBody(format!("form body is not UTF-8: {e}")))?;
            Ok(Some(PostBody::Form(form.to_string())))
        } else {
            tracing::debug!(
                "Body with content type '{}' is not replayed to the solver",
                media_type
            );
            Ok(None)
        }
    }

    fn into_encoded(self) -> Result<String, ProxyError> {
        match self {
            PostBody::Json(value) => encode_form(&value),
            PostBody::Form(form) => Ok(form),
        }
    }
}

/// Re-encode a JSON object as `application/x-www-form-urlencoded`, keeping
/// key order. Strings are used verbatim, other scalars in their JSON text
/// form, `null` as an empty value, nested arrays and objects as JSON text.
/// This differs on purpose from Python's `urlencode`, which would emit
/// `True` / `None` for booleans and null.
pub fn encode_form(value: &Value) -> Result<String, ProxyError> {
    let Value::Object(fields) = value else {
        return Err(ProxyError::InvalidBody(
            "only JSON objects can be sent as post data".to_string(),
        ));
    };

    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        match value {
            Value::String(text) => serializer.append_pair(key, text),
            Value::Null => serializer.append_pair(key, ""),
            other => serializer.append_pair(key, &other.to_string()),
        };
    }
    Ok(serializer.finish())
}

/// Collect request cookies from every `Cookie` header as an ordered mapping:
/// first occurrence fixes the position, the last value wins.
pub fn parse_cookies(headers: &HeaderMap) -> Vec<SolveCookie> {
    let mut cookies: Vec<SolveCookie> = Vec::new();

    let pairs = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='));

    for (name, value) in pairs {
        let name = name.trim();
        if name.is_empty() {
            continue;
        }
        let value = value.trim();
        match cookies.iter_mut().find(|cookie| cookie.name == name) {
            Some(existing) => existing.value = value.to_string(),
            None => cookies.push(SolveCookie::new(name, value)),
        }
    }

    cookies
}

/// Assembles a [`RequestDescriptor`] for one challenged request.
#[derive(Debug, Clone)]
pub struct DescriptorBuilder {
    target_url: String,
    max_timeout_ms: u64,
    cookies: Vec<SolveCookie>,
}

impl DescriptorBuilder {
    pub fn new(target_url: impl Into<String>, max_timeout_ms: u64) -> Self {
        Self {
            target_url: target_url.into(),
            max_timeout_ms,
            cookies: Vec::new(),
        }
    }

    pub fn cookies(mut self, cookies: Vec<SolveCookie>) -> Self {
        self.cookies = cookies;
        self
    }

    /// Derive the command from `method` and attach post data for POST.
    ///
    /// Methods without a delegation command fail with
    /// [`ProxyError::UnsupportedMethodForDelegation`].
    pub fn build(
        self,
        method: &ProxyMethod,
        body: Option<PostBody>,
    ) -> Result<RequestDescriptor, ProxyError> {
        let command = method
            .delegation_command()
            .ok_or_else(|| ProxyError::UnsupportedMethodForDelegation(method.clone()))?;

        let encoded_body = match command {
            SolveCommand::RequestPost => body.map(PostBody::into_encoded).transpose()?,
            _ => None,
        };

        Ok(RequestDescriptor {
            target_url: self.target_url,
            command,
            max_timeout_ms: self.max_timeout_ms,
            cookies: self.cookies,
            encoded_body,
        })
    }
}
