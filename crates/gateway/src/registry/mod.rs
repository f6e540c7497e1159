//! Operation registry.
//!
//! Static table mapping an [`OperationId`] to its input parameters, expected
//! output shape, upstream path and minimum subscription tier. Built once at
//! startup and shared read-only through `Arc`.

mod catalogue;
mod operation;

use std::collections::HashMap;

use market_router_core::OperationId;
use thiserror::Error;

pub use catalogue::builtin_operations;
pub use operation::{JsonKind, Operation, OutputShape, ParamKind, ParamLocation, ParamSpec};

use crate::openai::ToolDefinition;

/// Upper bound for the number of operations exposed as direct tools.
pub const MAX_TOOL_LIMIT: usize = 100;

/// Errors raised while building a registry.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    /// Two operations share an id.
    #[error("duplicate operation id: {0}")]
    DuplicateId(OperationId),

    /// A `{placeholder}` in the upstream path has no matching path parameter.
    #[error("operation {operation} has no path parameter for placeholder '{placeholder}'")]
    UnboundPlaceholder {
        /// Operation id.
        operation: OperationId,
        /// Placeholder name.
        placeholder: String,
    },
}

/// Immutable table of operations, in catalogue order.
#[derive(Debug, Clone)]
pub struct OperationRegistry {
    operations: Vec<Operation>,
    by_id: HashMap<OperationId, usize>,
}

impl OperationRegistry {
    /// Build a registry from a list of operations.
    ///
    /// # Errors
    ///
    /// Returns an error on duplicate ids or on a path placeholder without a
    /// matching path parameter.
    pub fn new(operations: Vec<Operation>) -> Result<Self, RegistryError> {
        let mut by_id = HashMap::with_capacity(operations.len());
        for (index, operation) in operations.iter().enumerate() {
            if by_id.insert(operation.id.clone(), index).is_some() {
                return Err(RegistryError::DuplicateId(operation.id.clone()));
            }
            if let Some(placeholder) = operation.placeholders().find(|name| {
                operation
                    .find_param(name)
                    .is_none_or(|p| p.location != ParamLocation::Path)
            }) {
                return Err(RegistryError::UnboundPlaceholder {
                    operation: operation.id.clone(),
                    placeholder: placeholder.to_string(),
                });
            }
        }
        Ok(Self { operations, by_id })
    }

    /// The compiled-in market-data catalogue.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalogue is inconsistent.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(builtin_operations())
    }

    /// Look up an operation by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Operation> {
        self.by_id
            .get(id)
            .and_then(|&index| self.operations.get(index))
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.by_id.contains_key(id)
    }

    /// All operations in catalogue order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.operations
    }

    /// All operation ids in catalogue order.
    pub fn ids(&self) -> impl Iterator<Item = &OperationId> {
        self.operations.iter().map(|op| &op.id)
    }

    /// Number of registered operations.
    #[must_use]
    pub fn len(&self) -> usize {
        self.operations.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }

    /// A read-only view of the first `limit` operations.
    ///
    /// `limit` is clamped to [`MAX_TOOL_LIMIT`].
    #[must_use]
    pub fn view(&self, limit: usize) -> RegistryView<'_> {
        let end = limit.min(MAX_TOOL_LIMIT).min(self.operations.len());
        RegistryView {
            operations: self.operations.get(..end).unwrap_or_default(),
        }
    }
}

/// A prefix of the registry exposed by the direct tools listing.
#[derive(Debug, Clone, Copy)]
pub struct RegistryView<'a> {
    operations: &'a [Operation],
}

impl<'a> RegistryView<'a> {
    /// Operations in the view.
    #[must_use]
    pub const fn operations(&self) -> &'a [Operation] {
        self.operations
    }

    /// Whether the view contains `id`.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.operations.iter().any(|op| op.id == id)
    }

    /// Tool definitions for every operation in the view.
    #[must_use]
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.operations
            .iter()
            .map(|op| ToolDefinition::function(op.function_definition()))
            .collect()
    }
}
