//! Scoped Tree Tests
//!
//! Several independent forests share one collection, partitioned by scope
//! properties and by node type. Also covers JSON configuration and the
//! opt-in path repair on documents written outside the tree service.

#[cfg(test)]
mod scoped_tree_tests {
    use anyhow::Result;
    use serde_json::json;
    use std::sync::Arc;
    use treepath_core::{
        DeletePolicy, MemoryStore, Node, ScopeKey, TreeConfig, TreeError, TreeService,
        ValidationError,
    };

    fn tenant_node(id: &str, parent: Option<&str>, tenant: &str) -> Node {
        Node::new_with_id(
            id,
            "category",
            parent.map(String::from),
            json!({ "tenant": tenant }),
        )
    }

    async fn create_tenant_service() -> Result<TreeService> {
        let config = TreeConfig::default().with_scope(["tenant"]);
        let service = TreeService::new(Arc::new(MemoryStore::new()), config)?;
        service.create(tenant_node("a-root", None, "A")).await?;
        service.create(tenant_node("a-child", Some("a-root"), "A")).await?;
        service.create(tenant_node("b-root", None, "B")).await?;
        service.create(tenant_node("b-child", Some("b-root"), "B")).await?;
        Ok(service)
    }

    #[tokio::test]
    async fn test_cross_scope_reparent_is_rejected() -> Result<()> {
        let service = create_tenant_service().await?;

        let err = service
            .move_node("b-child", Some("a-root"))
            .await
            .expect_err("tenant B node cannot move under tenant A");

        match err.validation() {
            Some(ValidationError::ScopeMismatch {
                field,
                scope_field,
                node_value,
                parent_value,
                ..
            }) => {
                assert_eq!(field, "parent_id");
                assert_eq!(scope_field, "tenant");
                assert_eq!(node_value, &json!("B"));
                assert_eq!(parent_value, &json!("A"));
            }
            other => panic!("expected ScopeMismatch, got {:?}", other),
        }

        let b_child = service.get("b-child").await?.expect("b-child exists");
        assert_eq!(b_child.parent_id(), Some("b-root"));
        assert_eq!(b_child.path(), &["b-root"]);
        Ok(())
    }

    #[tokio::test]
    async fn test_queries_stay_inside_scope() -> Result<()> {
        let service = create_tenant_service().await?;
        let query = service.query();

        let a_root = service.get("a-root").await?.expect("a-root exists");
        let siblings: Vec<String> = query
            .siblings(&a_root)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert!(siblings.is_empty(), "b-root is a root of another tenant");

        let a_roots = query.roots(&ScopeKey::unscoped().with("tenant", json!("A"))).await?;
        assert_eq!(a_roots.len(), 1);
        assert_eq!(a_roots[0].id, "a-root");

        assert_eq!(query.roots(&ScopeKey::unscoped()).await?.len(), 2);

        let b_root = service.get("b-root").await?.expect("b-root exists");
        assert!(!query.same_scope(&a_root, &b_root));
        assert!(!query.is_sibling_of(&a_root, &b_root));
        Ok(())
    }

    #[tokio::test]
    async fn test_node_types_select_the_tree() -> Result<()> {
        let store = Arc::new(MemoryStore::new());
        let folders = TreeService::new(
            store.clone(),
            TreeConfig::default().with_node_types(["folder", "smart_folder"]),
        )?;

        folders
            .create(Node::new_with_id("f", "folder", None, json!({})))
            .await?;
        folders
            .create(Node::new_with_id("s", "smart_folder", Some("f".into()), json!({})))
            .await?;
        folders
            .create(Node::new_with_id("note", "note", Some("f".into()), json!({})))
            .await?;

        let f = folders.get("f").await?.expect("f exists");
        let children: Vec<String> = folders
            .query()
            .children(&f)
            .await?
            .into_iter()
            .map(|n| n.id)
            .collect();
        assert_eq!(children, vec!["s".to_string()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_config_from_json() -> Result<()> {
        let config = TreeConfig::from_json_str(
            r#"{
                "parent_id_field": "parent",
                "path_field": "ancestry",
                "depth_field": "level",
                "scope": ["tenant"],
                "delete_policy": "restrict",
                "autosave": false
            }"#,
        )?;

        assert_eq!(config.fields.parent_id, "parent");
        assert_eq!(config.fields.path, "ancestry");
        assert_eq!(config.fields.depth, "level");
        assert_eq!(config.scope, vec!["tenant".to_string()]);
        assert_eq!(config.delete_policy, DeletePolicy::Restrict);
        assert!(!config.autosave);
        assert_eq!(config.event_capacity, TreeConfig::default().event_capacity);

        let service = TreeService::new(Arc::new(MemoryStore::new()), config)?;
        service.create(tenant_node("r", None, "A")).await?;
        let err = service
            .create(tenant_node("x", Some("r"), "B"))
            .await
            .unwrap_err();
        assert_eq!(
            err.validation().map(|v| v.field().to_string()),
            Some("parent".to_string())
        );
        Ok(())
    }

    #[test]
    fn test_invalid_json_config_is_rejected() {
        let err = TreeConfig::from_json_str(r#"{ "path_field": "parent_id" }"#).unwrap_err();
        assert!(matches!(err, TreeError::InvalidConfig(_)));

        let err = TreeConfig::from_json_str("not json").unwrap_err();
        assert!(matches!(err, TreeError::InvalidConfig(_)));
    }

    #[tokio::test]
    async fn test_rebuild_paths_after_external_writes() -> Result<()> {
        let store = Arc::new(MemoryStore::new());

        // Documents imported with wrong cached paths
        let raw: Vec<Node> = serde_json::from_value(json!([
            { "id": "r", "nodeType": "category", "parentId": null,
              "createdAt": "2024-01-01T00:00:00Z", "modifiedAt": "2024-01-01T00:00:00Z" },
            { "id": "c", "nodeType": "category", "parentId": "r", "path": [], "depth": 0,
              "createdAt": "2024-01-01T00:00:00Z", "modifiedAt": "2024-01-01T00:00:00Z" },
            { "id": "g", "nodeType": "category", "parentId": "c", "path": ["zz"], "depth": 7,
              "createdAt": "2024-01-01T00:00:00Z", "modifiedAt": "2024-01-01T00:00:00Z" }
        ]))?;
        store.insert_raw(raw).await;

        let service = TreeService::new(store, TreeConfig::default())?;
        assert_eq!(service.rebuild_paths().await?, 2);

        let g = service.get("g").await?.expect("g exists");
        assert_eq!(g.path(), &["r", "c"]);
        assert_eq!(g.depth(), 2);

        let r = service.get("r").await?.expect("r exists");
        assert_eq!(service.query().descendants(&r).await?.len(), 2);
        Ok(())
    }
}
