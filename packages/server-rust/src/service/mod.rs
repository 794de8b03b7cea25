//! Serialization and invocation services.
//!
//! Read path: registry lookup -> [`serializer`] -> graph walker with the
//! [`filter`] -> resource document.
//!
//! Invoke path:
//!
//! 1. **Decoding** (`decode`): request body -> `InvocationRequest`
//! 2. **Resolution** (`resolve`): operation name + parameter types -> signature
//! 3. **Dispatch** (`dispatch`): coercion, then the tower pipeline in `middleware`
//! 4. **Execution** (`executor`): the callee on the blocking pool
//! 5. **Outcome** (`outcome`): success or error document

pub mod config;
pub mod decode;
pub mod dispatch;
pub mod executor;
pub mod filter;
pub mod gateway;
pub mod invocation;
pub mod management;
pub mod middleware;
pub mod outcome;
pub mod registry;
pub mod resolve;
pub mod serializer;

// Re-export key types for convenient access.
pub use config::GatewayConfig;
pub use decode::{InvocationRequest, InvocationRequestDecoder, ParameterSpec};
pub use dispatch::{InvocationDispatcher, InvokeLimits};
pub use executor::InvocationExecutor;
pub use filter::{AttributeFilter, FilterRule, FilterRuleSet};
pub use gateway::Gateway;
pub use invocation::{Invocation, InvocationContext};
pub use management::{GatewayResource, GATEWAY_REGISTRY, GATEWAY_RESOURCE};
pub use outcome::InvocationOutcome;
pub use registry::{InMemoryRegistry, RegistryMatches, RegistrySet};
pub use resolve::OperationResolver;
pub use serializer::{QueryOverrides, ResourceSerializer};
