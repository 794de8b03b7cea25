//! `Gateway`: the registries, filter, serializer, decoder and dispatcher
//! wired together behind one handle shared by the HTTP surface.

use std::io::Read;
use std::sync::Arc;

use mxgate_core::{Glob, NamePattern, ResourceName};
use tracing::info;

use super::config::GatewayConfig;
use super::decode::InvocationRequestDecoder;
use super::dispatch::{InvocationDispatcher, InvokeLimits};
use super::filter::AttributeFilter;
use super::management::{GatewayResource, GATEWAY_REGISTRY, GATEWAY_RESOURCE};
use super::outcome::InvocationOutcome;
use super::registry::{InMemoryRegistry, RegistrySet};
use super::serializer::{QueryOverrides, ResourceSerializer};
use crate::error::GatewayError;
use crate::traits::ResourceRegistry;

pub struct Gateway {
    config: GatewayConfig,
    registries: RegistrySet,
    filter: Arc<AttributeFilter>,
    serializer: ResourceSerializer,
    decoder: InvocationRequestDecoder,
    dispatcher: InvocationDispatcher,
}

impl Gateway {
    /// Loads filter rules (when a rules file is configured) and registers
    /// the `gateway` registry holding the management resource.
    ///
    /// # Errors
    ///
    /// Returns `FilterConfig` if the rules file cannot be loaded.
    pub fn new(config: GatewayConfig) -> Result<Self, GatewayError> {
        let filter = Arc::new(match &config.filter_rules_path {
            Some(path) => AttributeFilter::load_from_file(path)?,
            None => AttributeFilter::empty(),
        });

        let management = InMemoryRegistry::new(GATEWAY_REGISTRY);
        management.register(
            ResourceName::parse(GATEWAY_RESOURCE)?,
            Arc::new(GatewayResource::new(&config, Arc::clone(&filter))?),
        )?;
        let registries = RegistrySet::new();
        registries.register(Arc::new(management))?;

        info!(
            max_depth = config.default_max_depth,
            ceiling = config.document_ceiling,
            filter_rules = filter.rule_count(),
            "gateway ready"
        );

        Ok(Self {
            serializer: ResourceSerializer::new(
                Arc::clone(&filter),
                config.default_max_depth,
                config.document_ceiling,
            ),
            decoder: InvocationRequestDecoder::new(config.max_request_length),
            dispatcher: InvocationDispatcher::new(&config, Arc::clone(&filter)),
            config,
            registries,
            filter,
        })
    }

    #[must_use]
    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    #[must_use]
    pub fn registries(&self) -> &RegistrySet {
        &self.registries
    }

    #[must_use]
    pub fn filter(&self) -> &AttributeFilter {
        &self.filter
    }

    /// Adds a host registry.
    ///
    /// # Errors
    ///
    /// Returns `Registry` if the id is already taken.
    pub fn register_registry(&self, registry: Arc<dyn ResourceRegistry>) -> Result<(), GatewayError> {
        Ok(self.registries.register(registry)?)
    }

    /// Multi-resource document for every resource matching `query` in the
    /// registries matching `registry` (all registries when absent).
    ///
    /// # Errors
    ///
    /// `InvalidName` for an unparseable query, `Registry` when a registry
    /// fails and `DocumentSizeExceeded` when the ceiling is crossed.
    pub async fn resources(
        &self,
        query: &str,
        registry: Option<&str>,
        overrides: &QueryOverrides,
    ) -> Result<String, GatewayError> {
        let pattern = NamePattern::parse(query)?;
        let groups = self
            .registries
            .query(&registry_glob(registry)?, &pattern)
            .await?;
        self.serializer.serialize_many(query, &groups, overrides)
    }

    /// Single-resource document for the resource registered as `name`.
    ///
    /// # Errors
    ///
    /// `InvalidName` when `name` is not a concrete resource name,
    /// `ResourceNotFound`/`ResourceAmbiguous` from the lookup and
    /// `DocumentSizeExceeded` when the ceiling is crossed.
    pub async fn resource(
        &self,
        name: &str,
        registry: Option<&str>,
        overrides: &QueryOverrides,
    ) -> Result<String, GatewayError> {
        let name = ResourceName::parse(name)?;
        let pattern = NamePattern::from(&name);
        let (registry, resource) = self
            .registries
            .locate_one(&registry_glob(registry)?, &pattern)
            .await?;
        self.serializer.serialize_one(&registry, &resource, overrides)
    }

    /// Decodes an invocation request and dispatches it.
    ///
    /// # Errors
    ///
    /// Only request faults are returned as errors; every later failure is
    /// an error outcome.
    pub async fn invoke<R: Read>(
        &self,
        body: Option<R>,
        declared_length: i64,
        limits: InvokeLimits,
    ) -> Result<InvocationOutcome, GatewayError> {
        let request = self.decoder.decode(body, declared_length)?;
        Ok(self.dispatcher.handle(&self.registries, request, limits).await)
    }

    /// Renders `outcome` under the document ceiling.
    ///
    /// # Errors
    ///
    /// Returns `ResponseTooLarge` if the document crosses the ceiling.
    pub fn outcome_document(&self, outcome: &InvocationOutcome) -> Result<String, GatewayError> {
        outcome
            .to_document(self.config.document_ceiling)
            .map_err(|e| GatewayError::ResponseTooLarge {
                size: e.reached,
                limit: e.limit,
            })
    }

    /// Re-reads the filter rules file.
    ///
    /// # Errors
    ///
    /// Returns `FilterConfig` if the file cannot be loaded; the previous
    /// rules stay active.
    pub fn reload_filters(&self) -> Result<usize, GatewayError> {
        self.filter.reload()
    }

    /// Total resources across all registries.
    ///
    /// # Errors
    ///
    /// Returns `Registry` when a registry fails.
    pub async fn resource_count(&self) -> Result<usize, GatewayError> {
        self.registries.resource_count().await
    }
}

fn registry_glob(registry: Option<&str>) -> Result<Glob, GatewayError> {
    Ok(registry.map(Glob::new).transpose()?.unwrap_or_else(Glob::any))
}
