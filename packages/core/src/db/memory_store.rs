//! MemoryStore - In-Process TreeStore Backend
//!
//! Holds documents in a `BTreeMap` behind a `tokio::sync::RwLock`. Each trait
//! call takes the lock once, so every bulk update is atomic with respect to
//! other store calls. A move as a whole is not.

use crate::db::filter::{compare_nodes, BulkUpdate, Filter, SortKey};
use crate::db::tree_store::TreeStore;
use crate::models::Node;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct MemoryStore {
    documents: RwLock<BTreeMap<String, Node>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored documents
    pub async fn len(&self) -> usize {
        self.documents.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.documents.read().await.is_empty()
    }

    /// Write documents exactly as given, bypassing the tree service
    ///
    /// Used to seed fixtures and to simulate corrupted trees for repair.
    pub async fn insert_raw(&self, nodes: impl IntoIterator<Item = Node>) {
        let mut documents = self.documents.write().await;
        for node in nodes {
            documents.insert(node.id.clone(), node.to_document());
        }
    }
}

#[async_trait]
impl TreeStore for MemoryStore {
    async fn load(&self, id: &str) -> Result<Option<Node>> {
        Ok(self.documents.read().await.get(id).cloned())
    }

    async fn save(&self, node: &Node) -> Result<()> {
        self.documents
            .write()
            .await
            .insert(node.id.clone(), node.to_document());
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.documents.write().await.remove(id).is_some())
    }

    async fn delete_where(&self, filter: &Filter) -> Result<u64> {
        let mut documents = self.documents.write().await;
        let before = documents.len();
        documents.retain(|_, node| !filter.matches(node));
        Ok((before - documents.len()) as u64)
    }

    async fn bulk_update(&self, filter: &Filter, update: &BulkUpdate) -> Result<u64> {
        let mut documents = self.documents.write().await;
        let mut changed = 0;
        for node in documents.values_mut().filter(|node| filter.matches(node)) {
            update.apply(node);
            node.version += 1;
            changed += 1;
        }
        Ok(changed)
    }

    async fn query(&self, filter: &Filter, sort: &[SortKey]) -> Result<Vec<Node>> {
        let documents = self.documents.read().await;
        let mut nodes: Vec<Node> = documents
            .values()
            .filter(|node| filter.matches(node))
            .cloned()
            .collect();
        nodes.sort_by(|a, b| compare_nodes(sort, a, b));
        Ok(nodes)
    }

    async fn count(&self, filter: &Filter) -> Result<u64> {
        let documents = self.documents.read().await;
        Ok(documents.values().filter(|node| filter.matches(node)).count() as u64)
    }
}
