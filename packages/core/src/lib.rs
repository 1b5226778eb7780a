//! Materialized-Path Tree Core
//!
//! This crate keeps tree relationships between documents of a flat collection
//! consistent using the materialized-path pattern: every node stores its
//! parent id, the ordered ids of all its ancestors (`path`) and its `depth`.
//!
//! # Architecture
//!
//! - **Bulk Cascade**: Moving a node rewrites all descendant paths with one
//!   prefix-substitution update, never node by node
//! - **Validate First**: Scope and cycle checks run before any write
//! - **Retryable**: A failed cascade is idempotent and can be re-run
//! - **Query by Path**: Ancestors, descendants and siblings are single queries
//!
//! # Modules
//!
//! - [`models`] - `Node` and `ScopeKey`
//! - [`config`] - `TreeConfig` per tree type
//! - [`db`] - `TreeStore` trait, filters, backends and events
//! - [`services`] - `TreeService`, `TreeQuery` and the move algorithm

pub mod config;
pub mod db;
pub mod models;
pub mod services;

// Re-export commonly used types
pub use config::{DeletePolicy, FieldNames, TreeConfig};
pub use db::{MemoryStore, TreeEvent, TreeStore};
pub use models::*;
pub use services::*;
