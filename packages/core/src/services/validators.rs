//! Move validation: scope equality and acyclicity.
//!
//! Both validators run before anything is written. A failure is reported as a
//! `ValidationError` keyed to the parent reference field.

use crate::db::Filter;
use crate::models::Node;
use crate::services::error::{TreeError, ValidationError};
use crate::services::tree_query::TreeQuery;

/// Rejects a parent whose scope fields differ from the node's
pub struct ScopeValidator<'a> {
    query: &'a TreeQuery,
    parent_field: &'a str,
}

impl<'a> ScopeValidator<'a> {
    pub fn new(query: &'a TreeQuery, parent_field: &'a str) -> Self {
        Self {
            query,
            parent_field,
        }
    }

    pub fn validate(&self, node: &Node, parent: &Node) -> Result<(), ValidationError> {
        let node_scope = self.query.scope_of(node);
        let parent_scope = self.query.scope_of(parent);
        match node_scope.first_mismatch(&parent_scope) {
            Some((scope_field, node_value, parent_value)) => Err(ValidationError::ScopeMismatch {
                field: self.parent_field.to_string(),
                node_id: node.id.clone(),
                parent_id: parent.id.clone(),
                scope_field: scope_field.to_string(),
                node_value: node_value.clone(),
                parent_value: parent_value.clone(),
            }),
            None => Ok(()),
        }
    }
}

/// Rejects self-parenting and attaching a node below its own descendant
pub struct CycleValidator<'a> {
    query: &'a TreeQuery,
    parent_field: &'a str,
}

impl<'a> CycleValidator<'a> {
    pub fn new(query: &'a TreeQuery, parent_field: &'a str) -> Self {
        Self {
            query,
            parent_field,
        }
    }

    /// `node.is_new()` must reflect whether the store holds the document;
    /// `TreeService` rebases the node on the stored copy before calling this.
    pub async fn validate(&self, node: &Node) -> Result<(), TreeError> {
        let Some(parent_id) = node.parent_id() else {
            return Ok(());
        };

        let cyclic = if parent_id == node.id {
            true
        } else if node.is_new() {
            false
        } else {
            // The node's stored subtree is what the parent must stay out of.
            let filter = self
                .query
                .self_and_descendants_filter(node)
                .and(Filter::IdEq(parent_id.to_string()));
            self.query.count(&filter).await? > 0
        };

        if cyclic {
            return Err(ValidationError::CyclicStructure {
                field: self.parent_field.to_string(),
                node_id: node.id.clone(),
                parent_id: parent_id.to_string(),
            }
            .into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TreeConfig;
    use crate::db::{MemoryStore, TreeStore};
    use serde_json::json;
    use std::sync::Arc;

    fn at(id: &str, path: &[&str], tenant: &str) -> Node {
        let mut node = Node::new_with_id(
            id,
            "category",
            path.last().map(|p| p.to_string()),
            json!({ "tenant": tenant }),
        );
        node.set_path(path.iter().map(|s| s.to_string()).collect(), path.len() as u32);
        node
    }

    fn query(store: Arc<MemoryStore>, config: TreeConfig) -> TreeQuery {
        TreeQuery::new(store, Arc::new(config))
    }

    #[test]
    fn test_scope_validator_rejects_cross_tenant_parent() {
        let q = query(
            Arc::new(MemoryStore::new()),
            TreeConfig::default().with_scope(["tenant"]),
        );
        let validator = ScopeValidator::new(&q, "parent_id");

        let parent = at("a1", &[], "A");
        let same = at("a2", &[], "A");
        let other = at("b1", &[], "B");

        assert!(validator.validate(&same, &parent).is_ok());
        let err = validator.validate(&other, &parent).unwrap_err();
        assert_eq!(err.field(), "parent_id");
        assert!(matches!(err, ValidationError::ScopeMismatch { ref scope_field, .. } if scope_field == "tenant"));
    }

    #[test]
    fn test_scope_validator_without_scope_accepts_anything() {
        let q = query(Arc::new(MemoryStore::new()), TreeConfig::default());
        let validator = ScopeValidator::new(&q, "parent_id");
        assert!(validator.validate(&at("b1", &[], "B"), &at("a1", &[], "A")).is_ok());
    }

    #[tokio::test]
    async fn test_cycle_validator_rejects_self_parent() {
        let q = query(Arc::new(MemoryStore::new()), TreeConfig::default());
        let validator = CycleValidator::new(&q, "parent_id");

        let mut node = at("n", &[], "A");
        node.parent_id = Some("n".to_string());
        let err = validator.validate(&node).await.unwrap_err();
        assert!(matches!(
            err.validation(),
            Some(ValidationError::CyclicStructure { .. })
        ));
    }

    #[tokio::test]
    async fn test_cycle_validator_rejects_descendant_parent() {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_raw([at("r", &[], "A"), at("c", &["r"], "A"), at("g", &["r", "c"], "A")])
            .await;
        let q = query(store.clone(), TreeConfig::default());
        let validator = CycleValidator::new(&q, "parent_id");

        let mut r = q.get("r").await.unwrap().unwrap();
        r.parent_id = Some("g".to_string());
        assert!(validator.validate(&r).await.is_err());

        let mut g = q.get("g").await.unwrap().unwrap();
        g.parent_id = Some("r".to_string());
        assert!(validator.validate(&g).await.is_ok());

        assert_eq!(store.count(&Filter::All).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_cycle_validator_skips_query_for_new_nodes() {
        let q = query(Arc::new(MemoryStore::new()), TreeConfig::default());
        let validator = CycleValidator::new(&q, "parent_id");
        let node = Node::new_with_id("n", "category", Some("p".to_string()), json!({}));
        assert!(validator.validate(&node).await.is_ok());
    }
}
