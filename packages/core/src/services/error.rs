//! Service Layer Error Types
//!
//! This module defines the errors returned by tree operations. Validation
//! failures are recoverable and leave the store untouched; persistence
//! failures come from the store and are passed through unchanged.

use crate::services::descendant_updater::PendingCascade;
use serde_json::Value;
use thiserror::Error;

/// Field-level validation failures that block a move before any write
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// The prospective parent belongs to a different scope
    #[error("{field}: node '{node_id}' has {scope_field}={node_value} but parent '{parent_id}' has {scope_field}={parent_value}")]
    ScopeMismatch {
        field: String,
        node_id: String,
        parent_id: String,
        scope_field: String,
        node_value: Value,
        parent_value: Value,
    },

    /// The node would become its own ancestor
    #[error("{field}: cannot attach node '{node_id}' under '{parent_id}' (cyclic structure)")]
    CyclicStructure {
        field: String,
        node_id: String,
        parent_id: String,
    },
}

impl ValidationError {
    /// Name of the document field the error is reported against
    pub fn field(&self) -> &str {
        match self {
            ValidationError::ScopeMismatch { field, .. } => field,
            ValidationError::CyclicStructure { field, .. } => field,
        }
    }
}

/// Tree operation errors
#[derive(Error, Debug)]
pub enum TreeError {
    /// Move rejected before any write
    #[error("Tree validation failed: {0}")]
    Validation(#[from] ValidationError),

    /// Node not found by ID
    #[error("Node not found: {id}")]
    NodeNotFound { id: String },

    /// A `before_move` hook returned false
    #[error("Move of node '{node_id}' was vetoed by a move hook")]
    MoveVetoed { node_id: String },

    /// Delete refused by `DeletePolicy::Restrict`
    #[error("Node '{node_id}' has {children} children and cannot be deleted")]
    HasChildren { node_id: String, children: u64 },

    /// The node was saved but some descendants still carry the old path.
    /// Pass `pending` to `TreeService::retry_cascade` to finish the move.
    #[error("Cascade for node '{}' failed after the node was saved: {source}", .pending.node_id)]
    CascadeFailed {
        pending: PendingCascade,
        #[source]
        source: anyhow::Error,
    },

    /// Store operation failed
    #[error("Persistence failure: {0}")]
    Persistence(#[from] anyhow::Error),

    /// Configuration rejected by `TreeConfig::validate`
    #[error("Invalid tree configuration: {0}")]
    InvalidConfig(String),
}

impl TreeError {
    /// Create a node not found error
    pub fn node_not_found(id: impl Into<String>) -> Self {
        Self::NodeNotFound { id: id.into() }
    }

    pub fn move_vetoed(node_id: impl Into<String>) -> Self {
        Self::MoveVetoed {
            node_id: node_id.into(),
        }
    }

    pub fn invalid_config(msg: impl Into<String>) -> Self {
        Self::InvalidConfig(msg.into())
    }

    /// Validation details, if this is a validation failure
    pub fn validation(&self) -> Option<&ValidationError> {
        match self {
            TreeError::Validation(err) => Some(err),
            _ => None,
        }
    }

    /// True for errors that can be fixed by retrying the descendant cascade
    pub fn is_retryable_cascade(&self) -> bool {
        matches!(self, TreeError::CascadeFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_validation_error_field_and_message() {
        let err = ValidationError::ScopeMismatch {
            field: "parent_id".to_string(),
            node_id: "b1".to_string(),
            parent_id: "a1".to_string(),
            scope_field: "tenant".to_string(),
            node_value: json!("B"),
            parent_value: json!("A"),
        };
        assert_eq!(err.field(), "parent_id");
        assert!(err.to_string().contains("tenant=\"B\""));

        let tree_err: TreeError = err.into();
        assert!(tree_err.validation().is_some());
        assert!(!tree_err.is_retryable_cascade());
    }

    #[test]
    fn test_cascade_failed_message_names_node() {
        let err = TreeError::CascadeFailed {
            pending: PendingCascade::new("c1", vec!["r".into()], vec!["r2".into()]),
            source: anyhow::anyhow!("connection reset"),
        };
        assert!(err.is_retryable_cascade());
        assert_eq!(
            err.to_string(),
            "Cascade for node 'c1' failed after the node was saved: connection reset"
        );
    }
}
