//! Attribute exclusion rules.
//!
//! Rules are `(registry, resource, attribute)` triples loaded from JSON and
//! held behind an [`ArcSwap`]: readers take a snapshot per call, reloads
//! replace the whole rule set atomically.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use mxgate_core::{Exclusion, Glob, NamePattern, PropertyFilter, ResourceName};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::GatewayError;

/// Attribute name that excludes every attribute.
pub const ALL_ATTRIBUTES: &str = "*";

/// One exclusion rule as written in the rules file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterRule {
    /// Glob over registry ids.
    pub registry: String,
    /// Resource name pattern.
    pub resource: String,
    /// Attribute name, or `*` for all attributes.
    pub attribute: String,
}

impl FilterRule {
    pub fn new(
        registry: impl Into<String>,
        resource: impl Into<String>,
        attribute: impl Into<String>,
    ) -> Self {
        Self {
            registry: registry.into(),
            resource: resource.into(),
            attribute: attribute.into(),
        }
    }
}

#[derive(Debug)]
struct CompiledRule {
    registry: Glob,
    resource: NamePattern,
    attribute: String,
}

/// Immutable compiled rule set.
#[derive(Debug, Default)]
pub struct FilterRuleSet {
    rules: Vec<CompiledRule>,
}

impl FilterRuleSet {
    /// Compiles rules.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::FilterConfig` if a resource pattern is invalid
    /// or an attribute name is empty.
    pub fn compile(rules: &[FilterRule]) -> Result<Self, GatewayError> {
        let rules = rules
            .iter()
            .map(|rule| {
                let resource = NamePattern::parse(&rule.resource).map_err(|err| {
                    GatewayError::FilterConfig(format!("resource pattern {:?}: {err}", rule.resource))
                })?;
                if rule.attribute.trim().is_empty() {
                    return Err(GatewayError::FilterConfig(format!(
                        "rule for {:?} has an empty attribute",
                        rule.resource
                    )));
                }
                let registry = Glob::new(&rule.registry).map_err(|err| {
                    GatewayError::FilterConfig(format!("registry pattern {:?}: {err}", rule.registry))
                })?;
                Ok(CompiledRule {
                    registry,
                    resource,
                    attribute: rule.attribute.trim().to_string(),
                })
            })
            .collect::<Result<_, _>>()?;
        Ok(Self { rules })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Attributes of `resource` in `registry` that must be omitted.
    #[must_use]
    pub fn exclusion(&self, registry: &str, resource: &ResourceName) -> Exclusion {
        let mut names = HashSet::new();
        for rule in &self.rules {
            if !rule.registry.is_match(registry) || !rule.resource.matches(resource) {
                continue;
            }
            if rule.attribute == ALL_ATTRIBUTES {
                return Exclusion::All;
            }
            names.insert(rule.attribute.clone());
        }
        if names.is_empty() {
            Exclusion::Nothing
        } else {
            Exclusion::Names(names)
        }
    }
}

// ---------------------------------------------------------------------------
// AttributeFilter
// ---------------------------------------------------------------------------

/// Process-wide, reloadable attribute filter.
#[derive(Debug)]
pub struct AttributeFilter {
    rules: ArcSwap<FilterRuleSet>,
    path: Option<PathBuf>,
}

impl AttributeFilter {
    /// Filter with no rules and no backing file.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            rules: ArcSwap::from_pointee(FilterRuleSet::default()),
            path: None,
        }
    }

    /// Filter with a fixed initial rule set and no backing file.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::FilterConfig` if a rule does not compile.
    pub fn with_rules(rules: &[FilterRule]) -> Result<Self, GatewayError> {
        Ok(Self {
            rules: ArcSwap::from_pointee(FilterRuleSet::compile(rules)?),
            path: None,
        })
    }

    /// Loads rules from a JSON file; later [`AttributeFilter::reload`] calls
    /// re-read the same file.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::FilterConfig` if the file cannot be read,
    /// parsed or compiled.
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, GatewayError> {
        let path = path.as_ref().to_path_buf();
        let rules = read_rules(&path)?;
        info!(path = %path.display(), rules = rules.len(), "filter rules loaded");
        Ok(Self {
            rules: ArcSwap::from_pointee(rules),
            path: Some(path),
        })
    }

    /// Re-reads the backing file and swaps the rule set in atomically.
    /// On failure the current rules stay active. Without a backing file
    /// this keeps the current rules.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::FilterConfig` if the file cannot be read,
    /// parsed or compiled.
    pub fn reload(&self) -> Result<usize, GatewayError> {
        let Some(path) = &self.path else {
            return Ok(self.rule_count());
        };
        let rules = read_rules(path)?;
        let count = rules.len();
        self.rules.store(Arc::new(rules));
        info!(path = %path.display(), rules = count, "filter rules reloaded");
        Ok(count)
    }

    /// Replaces the rule set.
    ///
    /// # Errors
    ///
    /// Returns `GatewayError::FilterConfig` if a rule does not compile.
    pub fn replace(&self, rules: &[FilterRule]) -> Result<usize, GatewayError> {
        let compiled = FilterRuleSet::compile(rules)?;
        let count = compiled.len();
        self.rules.store(Arc::new(compiled));
        Ok(count)
    }

    #[must_use]
    pub fn rule_count(&self) -> usize {
        self.rules.load().len()
    }

    /// Consistent view of the current rules for one registry, usable as the
    /// graph walker's property filter.
    #[must_use]
    pub fn scoped(&self, registry: &str) -> ScopedFilter {
        ScopedFilter {
            registry: registry.to_string(),
            rules: self.rules.load_full(),
        }
    }
}

impl Default for AttributeFilter {
    fn default() -> Self {
        Self::empty()
    }
}

fn read_rules(path: &Path) -> Result<FilterRuleSet, GatewayError> {
    let text = std::fs::read_to_string(path)
        .map_err(|err| GatewayError::FilterConfig(format!("{}: {err}", path.display())))?;
    let rules: Vec<FilterRule> = serde_json::from_str(&text)
        .map_err(|err| GatewayError::FilterConfig(format!("{}: {err}", path.display())))?;
    FilterRuleSet::compile(&rules)
}

/// Rule snapshot bound to one registry id.
#[derive(Debug, Clone)]
pub struct ScopedFilter {
    registry: String,
    rules: Arc<FilterRuleSet>,
}

impl PropertyFilter for ScopedFilter {
    fn exclusion(&self, identity: &ResourceName) -> Exclusion {
        self.rules.exclusion(&self.registry, identity)
    }
}
