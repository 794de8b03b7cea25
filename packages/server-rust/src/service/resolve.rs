//! Overload resolution from textual wire parameters.

use mxgate_core::{types_equivalent, OperationSet, OperationSignature, TypeFamily};

use super::decode::ParameterSpec;
use crate::error::GatewayError;

/// Selects the exposed signature matching an operation name and the
/// declared parameter types.
///
/// Types are compared through [`types_equivalent`]: case-insensitively, with
/// aliases of one leaf family treated as equal. When several overloads are
/// equivalent, one whose parameter types are spelled exactly as supplied
/// wins; otherwise the call is ambiguous.
#[derive(Debug, Clone, Copy, Default)]
pub struct OperationResolver;

impl OperationResolver {
    /// # Errors
    ///
    /// - `OperationNotFound` when no overload has that name, or none has
    ///   matching parameter types
    /// - `ParameterCountMismatch` when overloads exist but none has the
    ///   supplied arity
    /// - `ParameterTypeInvalid` when a supplied type is neither a known leaf
    ///   type nor spelled like any candidate's parameter type
    /// - `OperationAmbiguous` when more than one overload matches equally
    pub fn resolve(
        &self,
        resource: &str,
        operations: &OperationSet,
        operation: &str,
        params: &[ParameterSpec],
    ) -> Result<OperationSignature, GatewayError> {
        let not_found = || GatewayError::OperationNotFound {
            resource: resource.to_string(),
            operation: operation.to_string(),
        };

        let overloads = operations.overloads(operation);
        if overloads.is_empty() {
            return Err(not_found());
        }

        let same_arity: Vec<&OperationSignature> =
            overloads.iter().filter(|s| s.arity() == params.len()).collect();
        if same_arity.is_empty() {
            let mut expected: Vec<usize> = overloads.iter().map(OperationSignature::arity).collect();
            expected.sort_unstable();
            expected.dedup();
            return Err(GatewayError::ParameterCountMismatch {
                operation: operation.to_string(),
                expected,
                supplied: params.len(),
            });
        }

        for (index, param) in params.iter().enumerate() {
            let known = TypeFamily::from_type_name(&param.type_name).is_some();
            let declared_somewhere = same_arity
                .iter()
                .any(|s| types_equivalent(&s.parameters[index].type_name, &param.type_name));
            if !known && !declared_somewhere {
                return Err(GatewayError::ParameterTypeInvalid {
                    index,
                    type_name: param.type_name.clone(),
                });
            }
        }

        let matching: Vec<&OperationSignature> = same_arity
            .into_iter()
            .filter(|s| {
                s.parameter_types()
                    .zip(params)
                    .all(|(declared, p)| types_equivalent(declared, &p.type_name))
            })
            .collect();

        match matching.as_slice() {
            [] => Err(not_found()),
            [only] => Ok((*only).clone()),
            several => {
                let exact: Vec<&&OperationSignature> = several
                    .iter()
                    .filter(|s| s.parameter_types().zip(params).all(|(d, p)| d == p.type_name))
                    .collect();
                match exact.as_slice() {
                    [only] => Ok((**only).clone()),
                    _ => Err(GatewayError::OperationAmbiguous {
                        resource: resource.to_string(),
                        operation: operation.to_string(),
                    }),
                }
            }
        }
    }
}
