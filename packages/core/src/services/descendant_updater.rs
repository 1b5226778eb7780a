//! Descendant Path Cascade
//!
//! After a node moves, every document below it still carries the node's old
//! ancestor prefix. `DescendantUpdater` replaces that prefix in one bulk write:
//!
//! ```text
//! before:  old_path ++ [node] ++ suffix
//! after:   new_path ++ [node] ++ suffix
//! ```
//!
//! The filter only matches documents whose path still starts with the stale
//! prefix, so a rewrite that already ran matches nothing the second time.
//! This makes a failed or interrupted cascade safe to retry with the same
//! arguments.
//!
//! This is the only writer of descendant `path`/`depth` fields.

use crate::db::{BulkUpdate, Filter, TreeStore};
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Arguments of one descendant rewrite, kept so a failed cascade can be re-run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingCascade {
    pub node_id: String,
    pub old_path: Vec<String>,
    pub new_path: Vec<String>,
    pub delta_depth: i64,
}

impl PendingCascade {
    pub fn new(node_id: impl Into<String>, old_path: Vec<String>, new_path: Vec<String>) -> Self {
        let delta_depth = new_path.len() as i64 - old_path.len() as i64;
        Self {
            node_id: node_id.into(),
            old_path,
            new_path,
            delta_depth,
        }
    }

    /// True when the node kept its ancestors and nothing below it changes
    pub fn is_noop(&self) -> bool {
        self.old_path == self.new_path
    }

    /// Old ancestor prefix of every descendant, ending with the node itself
    fn stale_prefix(&self) -> Vec<String> {
        let mut prefix = self.old_path.clone();
        prefix.push(self.node_id.clone());
        prefix
    }

    fn fresh_prefix(&self) -> Vec<String> {
        let mut prefix = self.new_path.clone();
        prefix.push(self.node_id.clone());
        prefix
    }

    /// Documents still holding the stale prefix
    pub fn filter(&self) -> Filter {
        Filter::PathContains(self.node_id.clone()).and(Filter::PathStartsWith(self.stale_prefix()))
    }

    pub fn update(&self) -> BulkUpdate {
        BulkUpdate::SplicePathPrefix {
            strip: self.old_path.len() + 1,
            prepend: self.fresh_prefix(),
            depth_delta: self.delta_depth,
        }
    }
}

#[derive(Clone)]
pub struct DescendantUpdater {
    store: Arc<dyn TreeStore>,
}

impl DescendantUpdater {
    pub fn new(store: Arc<dyn TreeStore>) -> Self {
        Self { store }
    }

    /// Rewrite every descendant of `node_id` from `old_path` to `new_path`
    ///
    /// Returns the number of documents changed. Running it again with the same
    /// arguments changes nothing.
    pub async fn rewrite(
        &self,
        node_id: &str,
        old_path: &[String],
        new_path: &[String],
        delta_depth: i64,
    ) -> Result<u64> {
        let pending = PendingCascade {
            node_id: node_id.to_string(),
            old_path: old_path.to_vec(),
            new_path: new_path.to_vec(),
            delta_depth,
        };
        self.apply(&pending).await
    }

    pub async fn apply(&self, pending: &PendingCascade) -> Result<u64> {
        if pending.is_noop() {
            return Ok(0);
        }
        let updated = self
            .store
            .bulk_update(&pending.filter(), &pending.update())
            .await?;
        tracing::debug!(
            "Cascaded path of {} to {} descendants ({:?} -> {:?})",
            pending.node_id,
            updated,
            pending.old_path,
            pending.new_path
        );
        Ok(updated)
    }

    /// Set one node's path and depth outright
    ///
    /// Used by the repair walk only; moves always go through `rewrite`.
    pub async fn overwrite(&self, node_id: &str, path: Vec<String>) -> Result<u64> {
        self.store
            .bulk_update(&Filter::IdEq(node_id.to_string()), &BulkUpdate::SetPath { path })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::MemoryStore;
    use crate::models::Node;
    use serde_json::json;

    fn at(id: &str, path: &[&str]) -> Node {
        let mut node = Node::new_with_id(id, "category", path.last().map(|p| p.to_string()), json!({}));
        node.set_path(path.iter().map(|s| s.to_string()).collect(), path.len() as u32);
        node
    }

    fn strings(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    /// r -> c -> g -> gg, plus an unrelated tree under r2
    async fn seeded() -> Arc<MemoryStore> {
        let store = Arc::new(MemoryStore::new());
        store
            .insert_raw([
                at("r", &[]),
                at("c", &["r"]),
                at("g", &["r", "c"]),
                at("gg", &["r", "c", "g"]),
                at("r2", &[]),
                at("x", &["r2"]),
            ])
            .await;
        store
    }

    #[tokio::test]
    async fn test_rewrite_replaces_prefix_and_keeps_order() {
        let store = seeded().await;
        let updater = DescendantUpdater::new(store.clone());

        let updated = updater
            .rewrite("c", &strings(&["r"]), &strings(&["r2", "x"]), 1)
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let g = store.load("g").await.unwrap().unwrap();
        assert_eq!(g.path(), &["r2", "x", "c"]);
        assert_eq!(g.depth(), 3);

        let gg = store.load("gg").await.unwrap().unwrap();
        assert_eq!(gg.path(), &["r2", "x", "c", "g"]);
        assert_eq!(gg.depth(), 4);

        let x = store.load("x").await.unwrap().unwrap();
        assert_eq!(x.path(), &["r2"], "unrelated nodes are untouched");
    }

    #[tokio::test]
    async fn test_rewrite_is_idempotent() {
        let store = seeded().await;
        let updater = DescendantUpdater::new(store.clone());
        let old = strings(&["r"]);
        let new = strings(&["r2"]);

        assert_eq!(updater.rewrite("c", &old, &new, 0).await.unwrap(), 2);
        let once = store.query(&Filter::All, &[]).await.unwrap();

        assert_eq!(updater.rewrite("c", &old, &new, 0).await.unwrap(), 0);
        let twice = store.query(&Filter::All, &[]).await.unwrap();

        let paths = |nodes: &[Node]| -> Vec<(String, Vec<String>, u32)> {
            nodes
                .iter()
                .map(|n| (n.id.clone(), n.path().to_vec(), n.depth()))
                .collect()
        };
        assert_eq!(paths(&once), paths(&twice));
    }

    #[tokio::test]
    async fn test_rewrite_to_root_shortens_paths() {
        let store = seeded().await;
        let updater = DescendantUpdater::new(store.clone());

        updater.apply(&PendingCascade::new("g", strings(&["r", "c"]), vec![])).await.unwrap();

        let gg = store.load("gg").await.unwrap().unwrap();
        assert_eq!(gg.path(), &["g"]);
        assert_eq!(gg.depth(), 1);
    }

    #[tokio::test]
    async fn test_noop_cascade_skips_store() {
        let store = seeded().await;
        let updater = DescendantUpdater::new(store.clone());
        let pending = PendingCascade::new("c", strings(&["r"]), strings(&["r"]));
        assert!(pending.is_noop());
        assert_eq!(updater.apply(&pending).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_overwrite_sets_single_node() {
        let store = seeded().await;
        let updater = DescendantUpdater::new(store.clone());

        assert_eq!(updater.overwrite("x", strings(&["r", "c"])).await.unwrap(), 1);
        let x = store.load("x").await.unwrap().unwrap();
        assert_eq!(x.path(), &["r", "c"]);
        assert_eq!(x.depth(), 2);
    }

    #[test]
    fn test_pending_cascade_delta() {
        let pending = PendingCascade::new("c", strings(&["a", "b", "c0"]), strings(&["z"]));
        assert_eq!(pending.delta_depth, -2);
        assert_eq!(
            pending.update(),
            BulkUpdate::SplicePathPrefix {
                strip: 4,
                prepend: strings(&["z", "c"]),
                depth_delta: -2,
            }
        );
    }
}
