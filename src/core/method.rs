//! Closed set of HTTP methods the proxy path accepts, with the two dispatch
//! tables that hang off it: how each method is forwarded upstream and which
//! solver command (if any) replays it once a challenge is hit.
use std::fmt;

use hyper::Method;

use crate::core::types::SolveCommand;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProxyMethod {
    Get,
    Post,
    Patch,
    Delete,
    Options,
    Put,
    /// Anything else; still forwarded with the same verb
    Other(Method),
}

impl ProxyMethod {
    /// Methods routed to the proxy path by the front controller.
    pub const ROUTED: [Method; 6] = [
        Method::GET,
        Method::POST,
        Method::PATCH,
        Method::DELETE,
        Method::OPTIONS,
        Method::PUT,
    ];

    pub fn as_method(&self) -> Method {
        match self {
            ProxyMethod::Get => Method::GET,
            ProxyMethod::Post => Method::POST,
            ProxyMethod::Patch => Method::PATCH,
            ProxyMethod::Delete => Method::DELETE,
            ProxyMethod::Options => Method::OPTIONS,
            ProxyMethod::Put => Method::PUT,
            ProxyMethod::Other(method) => method.clone(),
        }
    }

    /// Forwarding table: whether the inbound body travels with the upstream call.
    pub fn sends_body(&self) -> bool {
        match self {
            ProxyMethod::Get | ProxyMethod::Options => false,
            ProxyMethod::Post
            | ProxyMethod::Patch
            | ProxyMethod::Delete
            | ProxyMethod::Put
            | ProxyMethod::Other(_) => true,
        }
    }

    /// Delegation table: the solver command replaying this method, or `None`
    /// when a challenged request of this method cannot be delegated.
    pub fn delegation_command(&self) -> Option<SolveCommand> {
        match self {
            ProxyMethod::Get => Some(SolveCommand::RequestGet),
            ProxyMethod::Post => Some(SolveCommand::RequestPost),
            ProxyMethod::Patch
            | ProxyMethod::Delete
            | ProxyMethod::Options
            | ProxyMethod::Put
            | ProxyMethod::Other(_) => None,
        }
    }
}

impl From<&Method> for ProxyMethod {
    fn from(method: &Method) -> Self {
        match *method {
            Method::GET => ProxyMethod::Get,
            Method::POST => ProxyMethod::Post,
            Method::PATCH => ProxyMethod::Patch,
            Method::DELETE => ProxyMethod::Delete,
            Method::OPTIONS => ProxyMethod::Options,
            Method::PUT => ProxyMethod::Put,
            _ => ProxyMethod::Other(method.clone()),
        }
    }
}

impl fmt::Display for ProxyMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_method().as_str())
    }
}
