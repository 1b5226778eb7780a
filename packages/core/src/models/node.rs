//! Tree Node Data Structures
//!
//! This module defines the `Node` document stored in the tree collection and
//! the `ScopeKey` used to partition a collection into independent forests.
//!
//! # Materialized Path
//!
//! - **`parent_id`**: Owned by the node, the only field callers change to move it
//! - **`path`**: Ordered ancestor ids, root first, immediate parent last
//! - **`depth`**: Cached `path.len()`, `0` for roots
//!
//! `path` and `depth` have no public setters. They are assigned by the move
//! coordinator (from `PathCalculator` output) and by `BulkUpdate::apply`.
//!
//! # Change Tracking
//!
//! A node returned by the tree service carries a snapshot of what the store
//! holds for it. `is_new()`, `parent_changed()` and `will_move()` compare the
//! in-memory value against that snapshot.
//!
//! # Examples
//!
//! ```rust
//! use treepath_core::models::Node;
//! use serde_json::json;
//!
//! let root = Node::new("category", None, json!({ "tenant": "acme" }));
//! let child = Node::new("category", Some(root.id.clone()), json!({ "tenant": "acme" }));
//!
//! assert!(root.is_root());
//! assert!(child.is_child());
//! assert!(child.will_move());
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Default version value for serde deserialization (version 1)
fn default_version() -> i64 {
    1
}

fn default_properties() -> Value {
    Value::Object(Default::default())
}

/// Values of the hierarchy fields as last written to the store
#[derive(Debug, Clone, PartialEq, Eq)]
struct PersistedState {
    parent_id: Option<String>,
    path: Vec<String>,
    depth: u32,
}

/// A single document in a materialized-path tree.
///
/// # Fields
///
/// - `id`: Unique identifier, immutable once assigned
/// - `node_type`: Concrete type tag (several types may share one tree)
/// - `parent_id`: Parent reference, `None` for roots
/// - `path`: Ancestor ids from the root down to the immediate parent
/// - `depth`: Number of ancestors
/// - `properties`: JSON object holding scope fields and any other data
/// - `version`: Incremented on every persisted write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    /// Unique identifier (UUID unless given explicitly)
    pub id: String,

    /// Node type (e.g., "category", "folder")
    pub node_type: String,

    /// Parent node ID, `None` for a root
    pub parent_id: Option<String>,

    /// Ordered ancestor ids, root first
    #[serde(default)]
    path: Vec<String>,

    /// Cached `path.len()`
    #[serde(default)]
    depth: u32,

    /// Scope fields and other entity data
    #[serde(default = "default_properties")]
    pub properties: Value,

    /// Write counter
    #[serde(default = "default_version")]
    pub version: i64,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last modification timestamp
    pub modified_at: DateTime<Utc>,

    #[serde(skip)]
    persisted: Option<PersistedState>,
}

impl Node {
    /// Create a new node with an auto-generated UUID
    ///
    /// The node has an empty path until it is saved through the tree service,
    /// which computes `path`/`depth` from the parent before the first write.
    pub fn new(node_type: impl Into<String>, parent_id: Option<String>, properties: Value) -> Self {
        Self::new_with_id(Uuid::new_v4().to_string(), node_type, parent_id, properties)
    }

    /// Create a new node with an explicit id
    pub fn new_with_id(
        id: impl Into<String>,
        node_type: impl Into<String>,
        parent_id: Option<String>,
        properties: Value,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: id.into(),
            node_type: node_type.into(),
            parent_id,
            path: Vec::new(),
            depth: 0,
            properties,
            version: 1,
            created_at: now,
            modified_at: now,
            persisted: None,
        }
    }

    pub fn parent_id(&self) -> Option<&str> {
        self.parent_id.as_deref()
    }

    /// Ancestor ids, root first
    pub fn path(&self) -> &[String] {
        &self.path
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    /// True when the node has no parent reference
    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn is_child(&self) -> bool {
        !self.is_root()
    }

    /// Value of a scope field, `Value::Null` when absent
    pub fn scope_value(&self, field: &str) -> &Value {
        self.properties.get(field).unwrap_or(&Value::Null)
    }

    /// True until the node has been written to (or loaded from) a store
    pub fn is_new(&self) -> bool {
        self.persisted.is_none()
    }

    /// True when `parent_id` differs from the last persisted value
    ///
    /// Always false for new nodes; see `will_move()`.
    pub fn parent_changed(&self) -> bool {
        match &self.persisted {
            Some(state) => state.parent_id != self.parent_id,
            None => false,
        }
    }

    /// True when saving this node must run the move protocol
    pub fn will_move(&self) -> bool {
        self.is_new() || self.parent_changed()
    }

    /// Parent id as last persisted, `None` for new nodes and persisted roots
    pub fn persisted_parent_id(&self) -> Option<&str> {
        self.persisted.as_ref().and_then(|s| s.parent_id.as_deref())
    }

    /// Path as last persisted, `None` for new nodes
    pub fn persisted_path(&self) -> Option<&[String]> {
        self.persisted.as_ref().map(|s| s.path.as_slice())
    }

    pub fn persisted_depth(&self) -> Option<u32> {
        self.persisted.as_ref().map(|s| s.depth)
    }

    /// Record the current hierarchy fields as the persisted snapshot
    pub(crate) fn mark_persisted(&mut self) {
        self.persisted = Some(PersistedState {
            parent_id: self.parent_id.clone(),
            path: self.path.clone(),
            depth: self.depth,
        });
    }

    /// Replace the persisted snapshot with what the store currently holds
    ///
    /// `None` means the document does not exist, so the node becomes new.
    /// Otherwise the write counter and creation time follow the stored
    /// document, while the in-memory `parent_id`/`path`/`depth` are kept.
    pub(crate) fn rebase_on(&mut self, stored: Option<&Node>) {
        match stored {
            Some(stored) => {
                self.version = stored.version;
                self.created_at = stored.created_at;
                self.persisted = Some(PersistedState {
                    parent_id: stored.parent_id.clone(),
                    path: stored.path.clone(),
                    depth: stored.depth,
                });
            }
            None => self.persisted = None,
        }
    }

    /// Take `parent_id`, `path` and `depth` from the stored document
    pub(crate) fn adopt_hierarchy(&mut self, stored: &Node) {
        self.parent_id = stored.parent_id.clone();
        self.set_path(stored.path.clone(), stored.depth);
    }

    /// Copy of this node without change-tracking state, as a store holds it
    pub(crate) fn to_document(&self) -> Node {
        let mut doc = self.clone();
        doc.persisted = None;
        doc
    }

    pub(crate) fn set_path(&mut self, path: Vec<String>, depth: u32) {
        self.path = path;
        self.depth = depth;
    }

    /// Bump version and modification time ahead of a write
    pub(crate) fn touch(&mut self) {
        if !self.is_new() {
            self.version += 1;
        }
        self.modified_at = Utc::now();
    }
}

/// Values of the configured scope fields for one node
///
/// Two nodes may only be related (parent/child, siblings, ancestors) when their
/// scope keys are equal. An empty scope configuration yields an empty key, which
/// equals every other empty key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ScopeKey {
    values: Vec<(String, Value)>,
}

impl ScopeKey {
    /// Key with no scope fields (matches the whole collection)
    pub fn unscoped() -> Self {
        Self::default()
    }

    /// Read the given scope fields from a node
    pub fn of(node: &Node, fields: &[String]) -> Self {
        Self {
            values: fields
                .iter()
                .map(|field| (field.clone(), node.scope_value(field).clone()))
                .collect(),
        }
    }

    /// Add a field value, for building keys without a node at hand
    pub fn with(mut self, field: impl Into<String>, value: Value) -> Self {
        self.values.push((field.into(), value));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    /// First field whose value differs between two keys over the same fields
    pub fn first_mismatch<'a>(&'a self, other: &'a ScopeKey) -> Option<(&'a str, &'a Value, &'a Value)> {
        self.values
            .iter()
            .zip(other.values.iter())
            .find(|((_, a), (_, b))| a != b)
            .map(|((field, a), (_, b))| (field.as_str(), a, b))
    }
}
