//! Read-Side Tree Traversal
//!
//! Every traversal is a single store query over `path`, `depth` and
//! `parent_id`; nothing walks parent pointers recursively. Results are limited
//! to the node's scope and to the configured node types, and ordered by the
//! configured sort keys (ascending depth by default).
//!
//! The relationship predicates (`is_ancestor_of` and friends) only look at
//! already-loaded fields and never touch the store.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use serde_json::json;
//! use treepath_core::{MemoryStore, Node, TreeConfig, TreeService};
//!
//! # tokio_test::block_on(async {
//! let service = TreeService::new(Arc::new(MemoryStore::new()), TreeConfig::default())?;
//! let root = service.create(Node::new("category", None, json!({}))).await?;
//! let child = service
//!     .create(Node::new("category", Some(root.id.clone()), json!({})))
//!     .await?;
//!
//! let ancestors = service.query().ancestors(&child).await?;
//! assert_eq!(ancestors[0].id, root.id);
//! assert!(service.query().is_ancestor_of(&root, &child));
//! # Ok::<(), treepath_core::TreeError>(())
//! # }).unwrap();
//! ```

use crate::config::TreeConfig;
use crate::db::{Filter, TreeStore};
use crate::models::{Node, ScopeKey};
use crate::services::error::TreeError;
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Clone)]
pub struct TreeQuery {
    store: Arc<dyn TreeStore>,
    config: Arc<TreeConfig>,
}

impl TreeQuery {
    pub fn new(store: Arc<dyn TreeStore>, config: Arc<TreeConfig>) -> Self {
        Self { store, config }
    }

    /// Scope key of a node under this tree's configuration
    pub fn scope_of(&self, node: &Node) -> ScopeKey {
        ScopeKey::of(node, &self.config.scope)
    }

    /// Restriction every tree query carries: scope values and node types
    pub fn scope_filter(&self, scope: &ScopeKey) -> Filter {
        let mut filter = Filter::All;
        for (field, value) in scope.values() {
            filter = filter.and(Filter::PropertyEq {
                field: field.clone(),
                value: value.clone(),
            });
        }
        if let Some(types) = &self.config.node_types {
            filter = filter.and(Filter::NodeTypeIn(types.clone()));
        }
        filter
    }

    fn scoped(&self, node: &Node, filter: Filter) -> Filter {
        filter.and(self.scope_filter(&self.scope_of(node)))
    }

    pub fn ancestors_filter(&self, node: &Node) -> Filter {
        self.scoped(node, Filter::IdIn(node.path().to_vec()))
    }

    pub fn descendants_filter(&self, node: &Node) -> Filter {
        self.scoped(node, Filter::PathContains(node.id.clone()))
    }

    pub fn self_and_descendants_filter(&self, node: &Node) -> Filter {
        self.scoped(
            node,
            Filter::IdEq(node.id.clone()).or(Filter::PathContains(node.id.clone())),
        )
    }

    pub fn children_filter(&self, node: &Node) -> Filter {
        self.scoped(node, Filter::ParentEq(Some(node.id.clone())))
    }

    pub fn siblings_filter(&self, node: &Node) -> Filter {
        self.scoped(
            node,
            Filter::ParentEq(node.parent_id.clone()).and(Filter::IdNe(node.id.clone())),
        )
    }

    /// Run a filter with the configured order; results are marked persisted
    pub async fn find(&self, filter: &Filter) -> Result<Vec<Node>, TreeError> {
        let mut nodes = self.store.query(filter, &self.config.order).await?;
        for node in &mut nodes {
            node.mark_persisted();
        }
        Ok(nodes)
    }

    pub async fn count(&self, filter: &Filter) -> Result<u64, TreeError> {
        Ok(self.store.count(filter).await?)
    }

    /// Load one node by id
    pub async fn get(&self, id: &str) -> Result<Option<Node>, TreeError> {
        let mut node = self.store.load(id).await?;
        if let Some(node) = &mut node {
            node.mark_persisted();
        }
        Ok(node)
    }

    /// All roots within a scope (`ScopeKey::unscoped()` for every root)
    pub async fn roots(&self, scope: &ScopeKey) -> Result<Vec<Node>, TreeError> {
        self.find(&Filter::ParentEq(None).and(self.scope_filter(scope)))
            .await
    }

    pub async fn parent(&self, node: &Node) -> Result<Option<Node>, TreeError> {
        match node.parent_id() {
            Some(parent_id) => self.get(parent_id).await,
            None => Ok(None),
        }
    }

    pub async fn ancestors(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        if node.path().is_empty() {
            return Ok(Vec::new());
        }
        self.find(&self.ancestors_filter(node)).await
    }

    pub async fn self_and_ancestors(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        let mut ids = node.path().to_vec();
        ids.push(node.id.clone());
        self.find(&self.scoped(node, Filter::IdIn(ids))).await
    }

    pub async fn descendants(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        self.find(&self.descendants_filter(node)).await
    }

    pub async fn self_and_descendants(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        self.find(&self.self_and_descendants_filter(node)).await
    }

    /// Descendants exactly `generations` levels below the node (1 = children)
    pub async fn descendants_at_depth(
        &self,
        node: &Node,
        generations: u32,
    ) -> Result<Vec<Node>, TreeError> {
        let filter = self
            .descendants_filter(node)
            .and(Filter::DepthEq(node.depth() + generations));
        self.find(&filter).await
    }

    pub async fn children(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        self.find(&self.children_filter(node)).await
    }

    /// Nodes sharing the parent (roots share `None`), excluding the node
    pub async fn siblings(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        self.find(&self.siblings_filter(node)).await
    }

    pub async fn self_and_siblings(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        self.find(&self.scoped(node, Filter::ParentEq(node.parent_id.clone())))
            .await
    }

    /// Root of the node's tree, or the node itself when it has no ancestors
    pub async fn root(&self, node: &Node) -> Result<Node, TreeError> {
        match node.path().first() {
            Some(root_id) => self
                .get(root_id)
                .await?
                .ok_or_else(|| TreeError::node_not_found(root_id.clone())),
            None => Ok(node.clone()),
        }
    }

    /// Nodes in the subtree (node included) that have no children
    pub async fn leaves(&self, node: &Node) -> Result<Vec<Node>, TreeError> {
        let subtree = self.self_and_descendants(node).await?;
        let parents: HashSet<&str> = subtree.iter().filter_map(|n| n.parent_id()).collect();
        let leaves = subtree
            .iter()
            .filter(|n| !parents.contains(n.id.as_str()))
            .cloned()
            .collect();
        Ok(leaves)
    }

    pub fn same_scope(&self, a: &Node, b: &Node) -> bool {
        self.scope_of(a) == self.scope_of(b)
    }

    /// True when `ancestor` appears in `node`'s path
    pub fn is_ancestor_of(&self, ancestor: &Node, node: &Node) -> bool {
        self.same_scope(ancestor, node) && node.path().iter().any(|id| *id == ancestor.id)
    }

    pub fn is_ancestor_of_or_self(&self, ancestor: &Node, node: &Node) -> bool {
        ancestor.id == node.id || self.is_ancestor_of(ancestor, node)
    }

    pub fn is_descendant_of(&self, descendant: &Node, node: &Node) -> bool {
        self.is_ancestor_of(node, descendant)
    }

    pub fn is_descendant_of_or_self(&self, descendant: &Node, node: &Node) -> bool {
        descendant.id == node.id || self.is_descendant_of(descendant, node)
    }

    pub fn is_sibling_of(&self, a: &Node, b: &Node) -> bool {
        a.id != b.id && a.parent_id == b.parent_id && self.same_scope(a, b)
    }

    pub fn is_sibling_of_or_self(&self, a: &Node, b: &Node) -> bool {
        a.id == b.id || self.is_sibling_of(a, b)
    }
}
