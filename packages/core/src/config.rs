//! Tree Type Configuration
//!
//! `TreeConfig` is the immutable descriptor for one tree type. It is built once
//! at startup (from code or from JSON), validated, and then shared by every
//! service operating on that tree.

use crate::db::error::ensure_identifier;
use crate::db::filter::{SortField, SortKey};
use crate::services::error::TreeError;
use serde::{Deserialize, Serialize};

/// Default capacity of the tree event broadcast channel
pub const DEFAULT_EVENT_CAPACITY: usize = 128;

/// Document field names for the three hierarchy fields
///
/// Backends that speak a query language use these as column names. They are
/// also the keys reported by validation errors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldNames {
    #[serde(rename = "parent_id_field")]
    pub parent_id: String,

    #[serde(rename = "path_field")]
    pub path: String,

    #[serde(rename = "depth_field")]
    pub depth: String,
}

impl Default for FieldNames {
    fn default() -> Self {
        Self {
            parent_id: "parent_id".to_string(),
            path: "path".to_string(),
            depth: "depth".to_string(),
        }
    }
}

/// What happens to descendants when a node is destroyed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeletePolicy {
    /// Remove every descendant, then the node
    #[default]
    DestroyDescendants,
    /// Turn direct children into roots
    NullifyChildren,
    /// Re-parent direct children onto the node's parent
    MoveChildrenToParent,
    /// Refuse to delete a node that has children
    Restrict,
}

/// Configuration for one tree type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    #[serde(flatten)]
    pub fields: FieldNames,

    /// Properties that must be equal between a node and its parent
    pub scope: Vec<String>,

    /// Ordering for tree queries
    pub order: Vec<SortKey>,

    /// Node types that form this tree; `None` means the whole collection
    pub node_types: Option<Vec<String>>,

    /// Persist immediately when a parent is assigned through `set_parent`
    pub autosave: bool,

    pub delete_policy: DeletePolicy,

    pub event_capacity: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            fields: FieldNames::default(),
            scope: Vec::new(),
            order: vec![SortKey::asc(SortField::Depth)],
            node_types: None,
            autosave: true,
            delete_policy: DeletePolicy::default(),
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl TreeConfig {
    /// Parse and validate a JSON configuration; absent keys take defaults
    pub fn from_json_str(json: &str) -> Result<Self, TreeError> {
        let config: TreeConfig = serde_json::from_str(json)
            .map_err(|e| TreeError::invalid_config(format!("malformed tree config: {}", e)))?;
        config.validate().map_err(TreeError::invalid_config)?;
        Ok(config)
    }

    pub fn with_scope<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.scope = fields.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_order(mut self, order: Vec<SortKey>) -> Self {
        self.order = order;
        self
    }

    pub fn with_node_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.node_types = Some(types.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_autosave(mut self, autosave: bool) -> Self {
        self.autosave = autosave;
        self
    }

    pub fn with_delete_policy(mut self, policy: DeletePolicy) -> Self {
        self.delete_policy = policy;
        self
    }

    pub fn with_field_names(mut self, fields: FieldNames) -> Self {
        self.fields = fields;
        self
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        let FieldNames {
            parent_id,
            path,
            depth,
        } = &self.fields;

        for name in [parent_id, path, depth] {
            ensure_identifier(name).map_err(|e| e.to_string())?;
        }
        if parent_id == path || parent_id == depth || path == depth {
            return Err("parent_id_field, path_field and depth_field must be distinct".to_string());
        }

        for field in &self.scope {
            ensure_identifier(field).map_err(|e| format!("scope field: {}", e))?;
        }
        let mut seen = self.scope.clone();
        seen.sort();
        seen.dedup();
        if seen.len() != self.scope.len() {
            return Err("scope fields must not repeat".to_string());
        }

        if matches!(&self.node_types, Some(types) if types.is_empty()) {
            return Err("node_types cannot be an empty list".to_string());
        }

        if self.event_capacity == 0 {
            return Err("event_capacity must be greater than 0".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::filter::SortDirection;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::default();
        assert_eq!(config.fields.parent_id, "parent_id");
        assert_eq!(config.fields.path, "path");
        assert_eq!(config.fields.depth, "depth");
        assert!(config.scope.is_empty());
        assert_eq!(config.order, vec![SortKey::asc(SortField::Depth)]);
        assert!(config.autosave);
        assert_eq!(config.delete_policy, DeletePolicy::DestroyDescendants);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_from_json_fills_defaults() {
        let config = TreeConfig::from_json_str(
            r#"{
                "parent_id_field": "parent",
                "scope": ["tenant_id"],
                "order": [{ "field": "created_at", "direction": "desc" }],
                "delete_policy": "move_children_to_parent"
            }"#,
        )
        .unwrap();

        assert_eq!(config.fields.parent_id, "parent");
        assert_eq!(config.fields.path, "path");
        assert_eq!(config.scope, vec!["tenant_id".to_string()]);
        assert_eq!(config.order[0].field, SortField::CreatedAt);
        assert_eq!(config.order[0].direction, SortDirection::Desc);
        assert_eq!(config.delete_policy, DeletePolicy::MoveChildrenToParent);
        assert!(config.autosave);
    }

    #[test]
    fn test_validate_rejects_bad_fields() {
        let config = TreeConfig::default().with_field_names(FieldNames {
            parent_id: "path".to_string(),
            ..FieldNames::default()
        });
        assert!(config.validate().unwrap_err().contains("distinct"));

        let config = TreeConfig::default().with_scope(["tenant", "tenant"]);
        assert!(config.validate().is_err());

        let config = TreeConfig::default().with_scope(["tenant id"]);
        assert!(config.validate().unwrap_err().contains("scope field"));

        let config = TreeConfig::default().with_node_types(Vec::<String>::new());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_json_reports_invalid_config() {
        let err = TreeConfig::from_json_str(r#"{ "event_capacity": 0 }"#).unwrap_err();
        assert!(matches!(err, TreeError::InvalidConfig(_)));

        let err = TreeConfig::from_json_str("not json").unwrap_err();
        assert!(err.to_string().contains("malformed"));
    }
}
