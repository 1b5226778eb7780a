//! Query and Bulk-Update Vocabulary
//!
//! Every traversal and every cascade is expressed with the types in this module,
//! so a backend only needs to understand `Filter`, `SortKey` and `BulkUpdate`
//! to host a materialized-path tree.
//!
//! `Filter::matches`, `compare_nodes` and `BulkUpdate::apply` are the reference
//! semantics. `MemoryStore` uses them directly; query-language backends compile
//! the same structures into their own syntax.

use crate::models::Node;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::cmp::Ordering;

/// Boolean predicate over tree documents
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// Matches every document
    All,
    IdEq(String),
    IdNe(String),
    IdIn(Vec<String>),
    /// `None` matches roots
    ParentEq(Option<String>),
    /// The id appears anywhere in the path (descendant match)
    PathContains(String),
    /// The path begins with exactly these segments, in order
    PathStartsWith(Vec<String>),
    DepthEq(u32),
    /// A property equals a value; absent properties compare as `null`
    PropertyEq { field: String, value: Value },
    NodeTypeIn(Vec<String>),
    Not(Box<Filter>),
    And(Vec<Filter>),
    Or(Vec<Filter>),
}

impl Filter {
    /// Conjunction, flattening nested `And` and dropping `All`
    pub fn and(self, other: Filter) -> Filter {
        let mut parts = Vec::new();
        for filter in [self, other] {
            match filter {
                Filter::All => {}
                Filter::And(inner) => parts.extend(inner),
                other => parts.push(other),
            }
        }
        match parts.len() {
            0 => Filter::All,
            1 => parts.remove(0),
            _ => Filter::And(parts),
        }
    }

    pub fn or(self, other: Filter) -> Filter {
        match self {
            Filter::Or(mut inner) => {
                inner.push(other);
                Filter::Or(inner)
            }
            first => Filter::Or(vec![first, other]),
        }
    }

    pub fn negate(self) -> Filter {
        Filter::Not(Box::new(self))
    }

    pub fn matches(&self, node: &Node) -> bool {
        match self {
            Filter::All => true,
            Filter::IdEq(id) => node.id == *id,
            Filter::IdNe(id) => node.id != *id,
            Filter::IdIn(ids) => ids.iter().any(|id| *id == node.id),
            Filter::ParentEq(parent) => node.parent_id() == parent.as_deref(),
            Filter::PathContains(id) => node.path().iter().any(|segment| segment == id),
            Filter::PathStartsWith(prefix) => node.path().starts_with(prefix),
            Filter::DepthEq(depth) => node.depth() == *depth,
            Filter::PropertyEq { field, value } => node.scope_value(field) == value,
            Filter::NodeTypeIn(types) => types.iter().any(|t| *t == node.node_type),
            Filter::Not(inner) => !inner.matches(node),
            Filter::And(parts) => parts.iter().all(|f| f.matches(node)),
            Filter::Or(parts) => parts.iter().any(|f| f.matches(node)),
        }
    }
}

/// Field a result set can be ordered by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Depth,
    Id,
    NodeType,
    CreatedAt,
    ModifiedAt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    pub field: SortField,
    #[serde(default)]
    pub direction: SortDirection,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Asc,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            direction: SortDirection::Desc,
        }
    }
}

/// Compare two nodes by a list of sort keys, falling back to id for stability
pub fn compare_nodes(keys: &[SortKey], a: &Node, b: &Node) -> Ordering {
    for key in keys {
        let ordering = match key.field {
            SortField::Depth => a.depth().cmp(&b.depth()),
            SortField::Id => a.id.cmp(&b.id),
            SortField::NodeType => a.node_type.cmp(&b.node_type),
            SortField::CreatedAt => a.created_at.cmp(&b.created_at),
            SortField::ModifiedAt => a.modified_at.cmp(&b.modified_at),
        };
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    a.id.cmp(&b.id)
}

/// Write applied to every document matched by a bulk update
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BulkUpdate {
    /// Remove the first `strip` path segments, put `prepend` in their place and
    /// shift depth by `depth_delta`. Order of the remaining suffix is preserved.
    SplicePathPrefix {
        strip: usize,
        prepend: Vec<String>,
        depth_delta: i64,
    },

    /// Overwrite path and set depth to its length
    SetPath { path: Vec<String> },
}

impl BulkUpdate {
    /// Apply the update to one document in place
    pub fn apply(&self, node: &mut Node) {
        match self {
            BulkUpdate::SplicePathPrefix {
                strip,
                prepend,
                depth_delta,
            } => {
                let suffix = node.path().get(*strip..).unwrap_or_default();
                let mut path = Vec::with_capacity(prepend.len() + suffix.len());
                path.extend_from_slice(prepend);
                path.extend_from_slice(suffix);
                let depth = (i64::from(node.depth()) + depth_delta).max(0);
                node.set_path(path, u32::try_from(depth).unwrap_or(u32::MAX));
            }
            BulkUpdate::SetPath { path } => {
                let depth = u32::try_from(path.len()).unwrap_or(u32::MAX);
                node.set_path(path.clone(), depth);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn node_at(id: &str, path: &[&str]) -> Node {
        let mut node = Node::new_with_id(
            id,
            "category",
            path.last().map(|p| p.to_string()),
            json!({ "tenant": "a" }),
        );
        node.set_path(
            path.iter().map(|s| s.to_string()).collect(),
            path.len() as u32,
        );
        node
    }

    #[test]
    fn test_and_flattens_and_drops_all() {
        let filter = Filter::All
            .and(Filter::IdEq("a".into()))
            .and(Filter::DepthEq(1).and(Filter::PathContains("r".into())));
        assert_eq!(
            filter,
            Filter::And(vec![
                Filter::IdEq("a".into()),
                Filter::DepthEq(1),
                Filter::PathContains("r".into()),
            ])
        );
        assert_eq!(Filter::All.and(Filter::All), Filter::All);
    }

    #[test]
    fn test_path_filters() {
        let g = node_at("g", &["r", "c"]);
        assert!(Filter::PathContains("c".into()).matches(&g));
        assert!(Filter::PathStartsWith(vec!["r".into(), "c".into()]).matches(&g));
        assert!(!Filter::PathStartsWith(vec!["c".into()]).matches(&g));
        assert!(Filter::PathStartsWith(vec![]).matches(&g));
        assert!(Filter::ParentEq(Some("c".into())).matches(&g));
        assert!(Filter::ParentEq(None).matches(&node_at("r", &[])));
    }

    #[test]
    fn test_property_filter_treats_missing_as_null() {
        let node = node_at("a", &[]);
        assert!(Filter::PropertyEq {
            field: "tenant".into(),
            value: json!("a")
        }
        .matches(&node));
        assert!(Filter::PropertyEq {
            field: "region".into(),
            value: Value::Null
        }
        .matches(&node));
    }

    #[test]
    fn test_or_and_not() {
        let node = node_at("a", &[]);
        let filter = Filter::IdEq("x".into()).or(Filter::IdEq("a".into()));
        assert!(filter.matches(&node));
        assert!(!filter.negate().matches(&node));
    }

    #[test]
    fn test_splice_preserves_suffix_order() {
        let mut node = node_at("leaf", &["r", "c", "x", "y"]);
        BulkUpdate::SplicePathPrefix {
            strip: 2,
            prepend: vec!["r2".into(), "m".into(), "c".into()],
            depth_delta: 1,
        }
        .apply(&mut node);

        assert_eq!(node.path(), &["r2", "m", "c", "x", "y"]);
        assert_eq!(node.depth(), 5);
    }

    #[test]
    fn test_splice_can_shorten_path() {
        let mut node = node_at("leaf", &["r", "a", "c", "x"]);
        BulkUpdate::SplicePathPrefix {
            strip: 3,
            prepend: vec!["c".into()],
            depth_delta: -2,
        }
        .apply(&mut node);

        assert_eq!(node.path(), &["c", "x"]);
        assert_eq!(node.depth(), 2);
    }

    #[test]
    fn test_set_path_derives_depth() {
        let mut node = node_at("a", &["stale"]);
        BulkUpdate::SetPath {
            path: vec!["r".into(), "p".into()],
        }
        .apply(&mut node);
        assert_eq!(node.depth(), 2);
    }

    #[test]
    fn test_compare_nodes_by_depth_then_id() {
        let keys = [SortKey::asc(SortField::Depth)];
        let deep = node_at("a", &["r", "c"]);
        let shallow = node_at("z", &["r"]);
        assert_eq!(compare_nodes(&keys, &shallow, &deep), Ordering::Less);

        let keys = [SortKey::desc(SortField::Depth)];
        assert_eq!(compare_nodes(&keys, &shallow, &deep), Ordering::Greater);

        let other = node_at("b", &["r"]);
        assert_eq!(compare_nodes(&[], &other, &shallow), Ordering::Less);
    }
}
