//! Database Layer
//!
//! This module holds the persistence seam of the tree:
//!
//! - `TreeStore` - async trait every backend implements
//! - `Filter`, `SortKey`, `BulkUpdate` - the query and write vocabulary
//! - `MemoryStore` - in-process backend
//! - `SurrealStore` - SurrealDB backend (`surrealdb` feature)
//! - `TreeEvent` - domain events broadcast after committed writes

pub mod error;
pub mod events;
pub mod filter;
mod memory_store;
#[cfg(feature = "surrealdb")]
mod surreal_store;
mod tree_store;

pub use error::StoreError;
pub use events::{MoveRecord, TreeEvent};
pub use filter::{compare_nodes, BulkUpdate, Filter, SortDirection, SortField, SortKey};
pub use memory_store::MemoryStore;
#[cfg(feature = "surrealdb")]
pub use surreal_store::SurrealStore;
pub use tree_store::TreeStore;
