use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use mxgate_core::{ManagedResource, NamePattern, ResourceName};

/// Shared handle to a managed resource.
pub type ResourceRef = Arc<dyn ManagedResource>;

/// A resource together with the name it was registered under.
#[derive(Clone)]
pub struct NamedResource {
    pub name: ResourceName,
    pub resource: ResourceRef,
}

impl fmt::Debug for NamedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedResource")
            .field("name", &self.name.canonical())
            .field("type", &self.resource.type_name())
            .finish()
    }
}

/// A named source of managed resources.
/// Implementations: in-memory (built in), bridges to host-application
/// object stores.
#[async_trait]
pub trait ResourceRegistry: Send + Sync {
    /// Stable identifier of this registry, matched by registry globs and
    /// filter rules.
    fn id(&self) -> &str;

    /// Every resource whose name matches `pattern`, ordered by canonical name.
    async fn query(&self, pattern: &NamePattern) -> anyhow::Result<Vec<NamedResource>>;

    /// Number of registered resources.
    async fn resource_count(&self) -> anyhow::Result<usize>;
}
