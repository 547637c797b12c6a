pub mod descriptor;
pub mod error;
pub mod method;
pub mod proxy_service;
pub mod reconciler;
pub mod types;

pub use descriptor::{DescriptorBuilder, RequestDescriptor};
pub use error::ProxyError;
pub use method::ProxyMethod;
pub use proxy_service::{CHALLENGE_STATUS, ProxyRequest, ProxyService};
pub use reconciler::ReconciledResponse;
