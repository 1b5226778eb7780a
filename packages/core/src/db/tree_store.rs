//! TreeStore Trait - Persistence Abstraction
//!
//! This module defines the `TreeStore` trait, the only seam between the tree
//! algorithms and the document collection that holds the nodes.
//!
//! # Design Decisions
//!
//! 1. **Async-First**: All methods are async so embedded and networked
//!    backends share one interface
//! 2. **Declarative Writes**: Descendant rewrites arrive as one
//!    `(Filter, BulkUpdate)` pair; a backend must apply them in a single
//!    round trip, never per document
//! 3. **Error Handling**: Uses `anyhow::Result` for flexible error context
//! 4. **No Transactions**: Callers must not rely on atomicity across calls
//!
//! # Examples
//!
//! ```rust
//! use treepath_core::db::{Filter, MemoryStore, TreeStore};
//!
//! # tokio_test::block_on(async {
//! let store = MemoryStore::new();
//! let roots = store.query(&Filter::ParentEq(None), &[]).await?;
//! assert!(roots.is_empty());
//! # Ok::<(), anyhow::Error>(())
//! # }).unwrap();
//! ```

use crate::db::filter::{BulkUpdate, Filter, SortKey};
use crate::models::Node;
use anyhow::Result;
use async_trait::async_trait;

/// Abstraction layer for tree document persistence
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync` to allow usage in async contexts where
/// futures may be moved between threads.
///
/// # Contract
///
/// - Documents returned by `load`/`query` carry no change-tracking state; the
///   tree service marks them as persisted
/// - `bulk_update` applies `BulkUpdate::apply` semantics to every document
///   matched by the filter and returns the number of documents changed
/// - `query` honours the sort keys and breaks ties by id
#[async_trait]
pub trait TreeStore: Send + Sync {
    /// Get a node by id
    ///
    /// - `Ok(Some(node))` if the node exists
    /// - `Ok(None)` if it doesn't (not an error)
    async fn load(&self, id: &str) -> Result<Option<Node>>;

    /// Insert or replace a node's document, including path and depth
    async fn save(&self, node: &Node) -> Result<()>;

    /// Delete a single node, returning whether it existed
    async fn delete(&self, id: &str) -> Result<bool>;

    /// Delete every matching node, returning how many were removed
    async fn delete_where(&self, filter: &Filter) -> Result<u64>;

    /// Apply one update to every matching node in a single operation
    async fn bulk_update(&self, filter: &Filter, update: &BulkUpdate) -> Result<u64>;

    /// Fetch matching nodes in the requested order
    async fn query(&self, filter: &Filter, sort: &[SortKey]) -> Result<Vec<Node>>;

    /// Count matching nodes
    async fn count(&self, filter: &Filter) -> Result<u64>;
}
