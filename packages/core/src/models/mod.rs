//! Data Models
//!
//! This module contains the document types stored in a tree collection:
//!
//! - `Node` - A tree member with parent reference, materialized path and depth
//! - `ScopeKey` - Partition values a node shares with its parent

mod node;


pub use node::{Node, ScopeKey};
