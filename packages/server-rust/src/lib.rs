//! `mxgate` Server: registries, attribute filtering, resource documents and
//! bounded operation invocation over HTTP.

pub mod error;
pub mod network;
pub mod service;
pub mod traits;

#[cfg(test)]
mod testing;

pub use error::GatewayError;
pub use network::{NetworkConfig, NetworkModule};
pub use service::{Gateway, GatewayConfig, InMemoryRegistry, InvocationOutcome};
pub use traits::{NamedResource, ResourceRef, ResourceRegistry};
