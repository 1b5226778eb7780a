//! Store Error Types
//!
//! This module defines error types raised by the bundled store backends.
//! The `TreeStore` trait itself returns `anyhow::Result` so that embedding
//! applications can plug in backends with their own error types.

use thiserror::Error;

/// Errors raised by bundled `TreeStore` implementations
#[derive(Error, Debug)]
pub enum StoreError {
    /// Failed to open or connect to the backing database
    #[error("Failed to connect to store at {location}: {reason}")]
    ConnectionFailed { location: String, reason: String },

    /// Failed to prepare tables or indexes
    #[error("Failed to initialize store schema: {0}")]
    InitializationFailed(String),

    /// A field name cannot be used in a generated query
    #[error("Invalid field name for query: {0}")]
    InvalidFieldName(String),

    /// A stored document could not be mapped back to a node
    #[error("Invalid document {id}: {reason}")]
    InvalidDocument { id: String, reason: String },

    /// Query execution error with context
    #[error("Query execution failed: {context}")]
    QueryFailed { context: String },
}

impl StoreError {
    pub fn connection_failed(location: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::ConnectionFailed {
            location: location.into(),
            reason: reason.into(),
        }
    }

    pub fn initialization_failed(msg: impl Into<String>) -> Self {
        Self::InitializationFailed(msg.into())
    }

    pub fn invalid_document(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidDocument {
            id: id.into(),
            reason: reason.into(),
        }
    }

    pub fn query_failed(context: impl Into<String>) -> Self {
        Self::QueryFailed {
            context: context.into(),
        }
    }
}

/// Check that a configured name is safe to splice into a generated query
pub fn ensure_identifier(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
        && !name.starts_with(|c: char| c.is_ascii_digit());
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidFieldName(name.to_string()))
    }
}
