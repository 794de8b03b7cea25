//! Resource documents: one resource, or every resource a query matched.
//!
//! ```text
//! <Resource version="1.0" name="app:type=Pool" type="Pool" registry="app">
//!   <Properties>
//!     <Property name="size" type="int">4</Property>
//!     ...
//!   </Properties>
//! </Resource>
//!
//! <Resources version="1.0">
//!   <Resource name=".." type=".." registry="..">...</Resource>
//!   ...
//! </Resources>
//! ```

use std::sync::Arc;

use mxgate_core::{
    CeilingExceeded, DocumentWriter, GraphWalker, Node, WalkLimits, MAX_NESTING, PROTOCOL_VERSION,
};
use tracing::{debug, warn};

use super::filter::AttributeFilter;
use super::registry::RegistryMatches;
use crate::error::GatewayError;
use crate::traits::NamedResource;

pub const RESOURCE_TAG: &str = "Resource";
pub const RESOURCES_TAG: &str = "Resources";
pub const PROPERTIES_TAG: &str = "Properties";

// ---------------------------------------------------------------------------
// QueryOverrides
// ---------------------------------------------------------------------------

/// Caller-supplied traversal bounds; `None` means "use the default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryOverrides {
    pub max_depth: Option<usize>,
    pub max_count: Option<usize>,
    pub max_size: Option<usize>,
}

impl QueryOverrides {
    /// Validates raw query-string values.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::InvalidOverride` for any value that is not a
    /// non-negative integer, and for a `maxDepth` above [`MAX_NESTING`].
    pub fn parse(
        max_depth: Option<&str>,
        max_count: Option<&str>,
        max_size: Option<&str>,
    ) -> Result<Self, GatewayError> {
        let depth = parse_non_negative("maxDepth", max_depth)?;
        if let (Some(depth), Some(raw)) = (depth, max_depth) {
            if depth > MAX_NESTING {
                return Err(GatewayError::InvalidOverride {
                    parameter: "maxDepth",
                    value: raw.to_string(),
                });
            }
        }
        Ok(Self {
            max_depth: depth,
            max_count: parse_non_negative("maxCount", max_count)?,
            max_size: parse_non_negative("maxSize", max_size)?,
        })
    }

    #[must_use]
    pub fn limits(&self, default_max_depth: usize) -> WalkLimits {
        WalkLimits {
            max_depth: self.max_depth.unwrap_or(default_max_depth),
            max_count: self.max_count,
            max_size: self.max_size,
        }
    }
}

/// Parses an optional non-negative integer parameter.
///
/// # Errors
///
/// Returns `GatewayError::InvalidOverride` for non-numeric, negative or
/// empty values.
pub fn parse_non_negative(
    parameter: &'static str,
    value: Option<&str>,
) -> Result<Option<usize>, GatewayError> {
    value
        .map(|raw| {
            raw.trim()
                .parse::<usize>()
                .map_err(|_| GatewayError::InvalidOverride {
                    parameter,
                    value: raw.to_string(),
                })
        })
        .transpose()
}

// ---------------------------------------------------------------------------
// ResourceSerializer
// ---------------------------------------------------------------------------

/// Renders resources through the graph walker under the configured filter.
#[derive(Debug, Clone)]
pub struct ResourceSerializer {
    filter: Arc<AttributeFilter>,
    default_max_depth: usize,
    ceiling: usize,
}

impl ResourceSerializer {
    #[must_use]
    pub fn new(filter: Arc<AttributeFilter>, default_max_depth: usize, ceiling: usize) -> Self {
        Self {
            filter,
            default_max_depth,
            ceiling,
        }
    }

    /// Single-resource document.
    ///
    /// # Errors
    ///
    /// Returns `DocumentSizeExceeded` naming the resource if the absolute
    /// ceiling is crossed.
    pub fn serialize_one(
        &self,
        registry: &str,
        resource: &NamedResource,
        overrides: &QueryOverrides,
    ) -> Result<String, GatewayError> {
        let query = resource.name.canonical();
        let mut w = DocumentWriter::new(self.ceiling);
        self.write_resource(&mut w, registry, resource, overrides, true)
            .map_err(|source| ceiling_error(query, query, source))?;
        Ok(w.finish())
    }

    /// Multi-resource document covering every group, in order.
    ///
    /// # Errors
    ///
    /// Returns `DocumentSizeExceeded` naming `query` and the resource being
    /// rendered when the ceiling is crossed. The whole call fails.
    pub fn serialize_many(
        &self,
        query: &str,
        groups: &[RegistryMatches],
        overrides: &QueryOverrides,
    ) -> Result<String, GatewayError> {
        let mut w = DocumentWriter::new(self.ceiling);
        w.start(RESOURCES_TAG, &[("version", PROTOCOL_VERSION)])
            .map_err(|source| ceiling_error(query, "<root>", source))?;
        for group in groups {
            for resource in &group.resources {
                self.write_resource(&mut w, &group.registry, resource, overrides, false)
                    .map_err(|source| ceiling_error(query, resource.name.canonical(), source))?;
            }
        }
        w.end(RESOURCES_TAG)
            .map_err(|source| ceiling_error(query, "<root>", source))?;
        debug!(query, bytes = w.len(), "resource document rendered");
        Ok(w.finish())
    }

    /// Walks one resource with the filter scoped to its registry.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` if the walk crosses the absolute ceiling.
    pub fn walk(
        &self,
        registry: &str,
        resource: &NamedResource,
        overrides: &QueryOverrides,
    ) -> Result<Node, CeilingExceeded> {
        let scoped = self.filter.scoped(registry);
        GraphWalker::new(overrides.limits(self.default_max_depth), self.ceiling)
            .with_filter(&scoped)
            .walk(
                resource.name.canonical(),
                resource.resource.as_ref(),
                Some(&resource.name),
            )
    }

    fn write_resource(
        &self,
        w: &mut DocumentWriter,
        registry: &str,
        resource: &NamedResource,
        overrides: &QueryOverrides,
        standalone: bool,
    ) -> Result<(), CeilingExceeded> {
        let node = self.walk(registry, resource, overrides)?;

        let mut attrs: Vec<(&str, &str)> = Vec::with_capacity(5);
        if standalone {
            attrs.push(("version", PROTOCOL_VERSION));
        }
        attrs.push(("name", resource.name.canonical()));
        attrs.push(("type", node.type_name.as_str()));
        attrs.push(("registry", registry));
        if let Some(reason) = node.truncation() {
            attrs.push(("truncated", reason.as_str()));
            return w.empty(RESOURCE_TAG, &attrs);
        }

        w.start(RESOURCE_TAG, &attrs)?;
        w.start(PROPERTIES_TAG, &[])?;
        for child in node.children() {
            child.write_xml(w)?;
        }
        w.end(PROPERTIES_TAG)?;
        w.end(RESOURCE_TAG)
    }
}

fn ceiling_error(query: &str, identity: &str, source: CeilingExceeded) -> GatewayError {
    metrics::counter!("mxgate_serialize_ceiling_exceeded_total").increment(1);
    warn!(query, identity, limit = source.limit, "document ceiling exceeded");
    GatewayError::DocumentSizeExceeded {
        query: query.to_string(),
        identity: identity.to_string(),
        source,
    }
}
