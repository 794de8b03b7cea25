//! Exposed operation signatures and per-resource overload sets.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Declared type name of operations that return nothing.
pub const VOID_TYPE: &str = "void";

/// One declared parameter of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParameterInfo {
    pub name: String,
    pub type_name: String,
}

/// Name, ordered parameter types and result type of an exposed operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationSignature {
    pub name: String,
    pub parameters: Vec<ParameterInfo>,
    pub return_type: String,
}

impl OperationSignature {
    /// Starts a signature with no parameters.
    pub fn new(name: impl Into<String>, return_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameters: Vec::new(),
            return_type: return_type.into(),
        }
    }

    /// Appends a parameter.
    #[must_use]
    pub fn param(mut self, name: impl Into<String>, type_name: impl Into<String>) -> Self {
        self.parameters.push(ParameterInfo {
            name: name.into(),
            type_name: type_name.into(),
        });
        self
    }

    #[must_use]
    pub fn arity(&self) -> usize {
        self.parameters.len()
    }

    #[must_use]
    pub fn is_void(&self) -> bool {
        self.return_type.eq_ignore_ascii_case(VOID_TYPE)
    }

    pub fn parameter_types(&self) -> impl Iterator<Item = &str> {
        self.parameters.iter().map(|p| p.type_name.as_str())
    }
}

/// Two signatures with the same name and identical parameter types.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("duplicate operation signature {name}({})", .parameter_types.join(", "))]
pub struct DuplicateSignature {
    pub name: String,
    pub parameter_types: Vec<String>,
}

/// Exposed operations of one resource, keyed by name.
///
/// Several signatures may share a name (overloads); no two may share both
/// the name and the exact parameter-type sequence.
#[derive(Debug, Clone, Default)]
pub struct OperationSet {
    by_name: BTreeMap<String, Vec<OperationSignature>>,
}

impl OperationSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a signature.
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSignature` if an identical overload already exists.
    pub fn add(&mut self, signature: OperationSignature) -> Result<(), DuplicateSignature> {
        let overloads = self.by_name.entry(signature.name.clone()).or_default();
        if overloads
            .iter()
            .any(|existing| existing.parameter_types().eq(signature.parameter_types()))
        {
            let parameter_types = signature.parameter_types().map(str::to_string).collect();
            return Err(DuplicateSignature {
                name: signature.name,
                parameter_types,
            });
        }
        overloads.push(signature);
        Ok(())
    }

    /// Builder form of [`OperationSet::add`].
    ///
    /// # Errors
    ///
    /// Returns `DuplicateSignature` if an identical overload already exists.
    pub fn with(mut self, signature: OperationSignature) -> Result<Self, DuplicateSignature> {
        self.add(signature)?;
        Ok(self)
    }

    /// All overloads registered under `name`; empty if none.
    #[must_use]
    pub fn overloads(&self, name: &str) -> &[OperationSignature] {
        self.by_name.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = &OperationSignature> {
        self.by_name.values().flatten()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.by_name.values().map(Vec::len).sum()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overloads_share_a_name() {
        let ops = OperationSet::new()
            .with(OperationSignature::new("set", VOID_TYPE).param("v", "int"))
            .unwrap()
            .with(OperationSignature::new("set", VOID_TYPE).param("v", "string"))
            .unwrap();
        assert_eq!(ops.overloads("set").len(), 2);
        assert_eq!(ops.len(), 2);
        assert!(ops.overloads("missing").is_empty());
    }

    #[test]
    fn identical_overload_rejected() {
        let mut ops = OperationSet::new();
        ops.add(OperationSignature::new("set", VOID_TYPE).param("a", "int"))
            .unwrap();
        let err = ops
            .add(OperationSignature::new("set", "int").param("b", "int"))
            .unwrap_err();
        assert_eq!(err.parameter_types, vec!["int".to_string()]);
        assert_eq!(err.to_string(), "duplicate operation signature set(int)");
    }

    #[test]
    fn void_detection_is_case_insensitive() {
        assert!(OperationSignature::new("a", "Void").is_void());
        assert!(!OperationSignature::new("a", "int").is_void());
    }
}
