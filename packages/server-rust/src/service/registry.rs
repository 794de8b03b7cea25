use std::sync::Arc;

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use mxgate_core::{Glob, NamePattern, ResourceName};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::GatewayError;
use crate::traits::{NamedResource, ResourceRef, ResourceRegistry};

// ---------------------------------------------------------------------------
// InMemoryRegistry
// ---------------------------------------------------------------------------

/// Registry backed by a concurrent map keyed by canonical resource name.
///
/// Lookups by an exact name hit the map directly; patterns scan all entries.
pub struct InMemoryRegistry {
    id: String,
    resources: DashMap<String, NamedResource>,
}

impl InMemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            resources: DashMap::new(),
        }
    }

    /// Register `resource` under `name`.
    ///
    /// # Errors
    ///
    /// Returns an error if a resource is already registered under the same
    /// canonical name.
    pub fn register(&self, name: ResourceName, resource: ResourceRef) -> anyhow::Result<()> {
        match self.resources.entry(name.canonical().to_string()) {
            Entry::Occupied(_) => {
                anyhow::bail!("{} is already registered in {}", name.canonical(), self.id)
            }
            Entry::Vacant(slot) => {
                debug!(registry = %self.id, name = name.canonical(), "resource registered");
                slot.insert(NamedResource { name, resource });
                Ok(())
            }
        }
    }

    /// Removes and returns the resource registered under `name`.
    pub fn unregister(&self, name: &ResourceName) -> Option<ResourceRef> {
        self.resources
            .remove(name.canonical())
            .map(|(_, entry)| entry.resource)
    }

    /// Retrieve a resource by its exact name.
    pub fn get(&self, name: &ResourceName) -> Option<NamedResource> {
        self.resources
            .get(name.canonical())
            .map(|entry| entry.value().clone())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.resources.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

#[async_trait]
impl ResourceRegistry for InMemoryRegistry {
    fn id(&self) -> &str {
        &self.id
    }

    async fn query(&self, pattern: &NamePattern) -> anyhow::Result<Vec<NamedResource>> {
        if let Some(exact) = pattern.as_exact() {
            return Ok(self.get(&exact).into_iter().collect());
        }
        let mut found: Vec<NamedResource> = self
            .resources
            .iter()
            .filter(|entry| pattern.matches(&entry.value().name))
            .map(|entry| entry.value().clone())
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn resource_count(&self) -> anyhow::Result<usize> {
        Ok(self.resources.len())
    }
}

// ---------------------------------------------------------------------------
// RegistrySet
// ---------------------------------------------------------------------------

/// Resources matched in one registry.
#[derive(Debug, Clone)]
pub struct RegistryMatches {
    pub registry: String,
    pub resources: Vec<NamedResource>,
}

/// Ordered collection of registries queried together.
///
/// Registries are consulted in registration order so multi-registry results
/// are deterministic.
pub struct RegistrySet {
    registries: RwLock<Vec<Arc<dyn ResourceRegistry>>>,
}

impl RegistrySet {
    /// Creates an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self {
            registries: RwLock::new(Vec::new()),
        }
    }

    /// Adds a registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a registry with the same id is already present.
    pub fn register(&self, registry: Arc<dyn ResourceRegistry>) -> anyhow::Result<()> {
        let mut registries = self.registries.write();
        if registries.iter().any(|r| r.id() == registry.id()) {
            anyhow::bail!("registry {} is already registered", registry.id());
        }
        registries.push(registry);
        Ok(())
    }

    /// Registry ids in registration order.
    #[must_use]
    pub fn ids(&self) -> Vec<String> {
        self.registries.read().iter().map(|r| r.id().to_string()).collect()
    }

    /// Snapshot of the registries whose id matches `registry_glob`.
    fn matching(&self, registry_glob: &Glob) -> Vec<Arc<dyn ResourceRegistry>> {
        self.registries
            .read()
            .iter()
            .filter(|r| registry_glob.is_match(r.id()))
            .cloned()
            .collect()
    }

    /// Queries every matching registry, grouping results by registry.
    /// Registries without matches are omitted.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Registry` if any registry query fails.
    pub async fn query(
        &self,
        registry_glob: &Glob,
        pattern: &NamePattern,
    ) -> Result<Vec<RegistryMatches>, GatewayError> {
        let mut groups = Vec::new();
        for registry in self.matching(registry_glob) {
            let resources = registry.query(pattern).await?;
            if !resources.is_empty() {
                groups.push(RegistryMatches {
                    registry: registry.id().to_string(),
                    resources,
                });
            }
        }
        Ok(groups)
    }

    /// Finds the single resource matching `pattern` across all matching
    /// registries. Returns the registry id alongside the resource.
    ///
    /// # Errors
    ///
    /// Returns `ResourceNotFound` when nothing matches and
    /// `ResourceAmbiguous` when more than one resource matches.
    pub async fn locate_one(
        &self,
        registry_glob: &Glob,
        pattern: &NamePattern,
    ) -> Result<(String, NamedResource), GatewayError> {
        let groups = self.query(registry_glob, pattern).await?;
        let count: usize = groups.iter().map(|g| g.resources.len()).sum();
        match count {
            0 => Err(GatewayError::ResourceNotFound(pattern.to_string())),
            1 => {
                let mut group = groups
                    .into_iter()
                    .next()
                    .ok_or_else(|| GatewayError::ResourceNotFound(pattern.to_string()))?;
                let found = group
                    .resources
                    .pop()
                    .ok_or_else(|| GatewayError::ResourceNotFound(pattern.to_string()))?;
                Ok((group.registry, found))
            }
            _ => Err(GatewayError::ResourceAmbiguous {
                pattern: pattern.to_string(),
                count,
            }),
        }
    }

    /// Total resources across all registries.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::Registry` if any registry fails to report.
    pub async fn resource_count(&self) -> Result<usize, GatewayError> {
        let registries = self.registries.read().clone();
        let mut total = 0;
        for registry in registries {
            total += registry.resource_count().await?;
        }
        Ok(total)
    }
}

impl Default for RegistrySet {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{name, Bean};

    fn registry_with(id: &str, names: &[&str]) -> Arc<InMemoryRegistry> {
        let registry = InMemoryRegistry::new(id);
        for n in names {
            registry
                .register(name(n), Arc::new(Bean::scalars("Thing", vec![])))
                .unwrap();
        }
        Arc::new(registry)
    }

    fn pattern(s: &str) -> NamePattern {
        NamePattern::parse(s).unwrap()
    }

    #[test]
    fn register_rejects_duplicate_names() {
        let registry = InMemoryRegistry::new("app");
        let bean = Arc::new(Bean::scalars("Thing", vec![]));
        registry.register(name("app:b=2,a=1"), bean.clone()).unwrap();
        // Same canonical name, different key order.
        assert!(registry.register(name("app:a=1,b=2"), bean).is_err());
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = registry_with("app", &["app:type=A"]);
        assert!(registry.unregister(&name("app:type=A")).is_some());
        assert!(registry.unregister(&name("app:type=A")).is_none());
        assert!(registry.is_empty());
    }

    #[tokio::test]
    async fn query_filters_and_sorts() {
        let registry = registry_with("app", &["app:type=B", "app:type=A", "other:type=A"]);
        let found = registry.query(&pattern("app:type=*")).await.unwrap();
        let names: Vec<_> = found.iter().map(|r| r.name.canonical().to_string()).collect();
        assert_eq!(names, vec!["app:type=A", "app:type=B"]);
        assert_eq!(registry.resource_count().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn set_groups_by_registry_in_order() {
        let set = RegistrySet::new();
        set.register(registry_with("one", &["app:type=A"])).unwrap();
        set.register(registry_with("two", &["app:type=A", "app:type=B"])).unwrap();
        set.register(registry_with("three", &["x:type=Z"])).unwrap();

        let groups = set.query(&Glob::new("*").unwrap(), &pattern("app:*")).await.unwrap();
        let summary: Vec<_> = groups
            .iter()
            .map(|g| (g.registry.as_str(), g.resources.len()))
            .collect();
        assert_eq!(summary, vec![("one", 1), ("two", 2)]);

        let only_two = set.query(&Glob::new("t*o").unwrap(), &pattern("app:*")).await.unwrap();
        assert_eq!(only_two.len(), 1);
        assert_eq!(set.resource_count().await.unwrap(), 4);
    }

    #[test]
    fn set_rejects_duplicate_registry_ids() {
        let set = RegistrySet::new();
        set.register(registry_with("one", &[])).unwrap();
        assert!(set.register(registry_with("one", &[])).is_err());
        assert_eq!(set.ids(), vec!["one"]);
    }

    #[tokio::test]
    async fn locate_one_outcomes() {
        let set = RegistrySet::new();
        set.register(registry_with("one", &["app:type=A"])).unwrap();
        set.register(registry_with("two", &["app:type=A", "app:type=B"])).unwrap();

        let (registry, found) = set
            .locate_one(&Glob::new("*").unwrap(), &pattern("app:type=B"))
            .await
            .unwrap();
        assert_eq!(registry, "two");
        assert_eq!(found.name.canonical(), "app:type=B");

        let err = set
            .locate_one(&Glob::new("*").unwrap(), &pattern("app:type=A"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ResourceAmbiguous { count: 2, .. }));

        let (registry, _) = set
            .locate_one(&Glob::new("one").unwrap(), &pattern("app:type=A"))
            .await
            .unwrap();
        assert_eq!(registry, "one");

        let err = set
            .locate_one(&Glob::new("*").unwrap(), &pattern("app:type=C"))
            .await
            .unwrap_err();
        assert!(matches!(err, GatewayError::ResourceNotFound(_)));
    }
}
