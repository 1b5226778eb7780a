//! Tree Service - Move Coordination
//!
//! `TreeService` is the write side of a materialized-path tree. Every save of a
//! node whose parent changed (or that is new) runs the move protocol:
//!
//! 1. **Detect**: `Node::will_move()`
//! 2. **Validate**: scope, then cycles. Failure aborts with nothing written
//! 3. **Snapshot**: old parent/path/depth from the stored document
//! 4. **Compute**: `PathCalculator` from the freshly loaded parent
//! 5. **Persist self**: `before_move` hooks may veto, then the node is saved
//! 6. **Cascade**: existing nodes only, one bulk rewrite of all descendants
//! 7. **Commit**: `after_move` hooks and a `TreeEvent`
//!
//! # Concurrency
//!
//! There is no lock or transaction around steps 2-6. Two concurrent moves
//! touching the same subtree can interleave and leave stale paths; callers
//! must serialize writes per subtree. A cascade that fails after step 5 is
//! reported as `TreeError::CascadeFailed` and can be finished with
//! `retry_cascade`.

use crate::config::{DeletePolicy, TreeConfig};
use crate::db::{Filter, MoveRecord, TreeEvent, TreeStore};
use crate::models::{Node, ScopeKey};
use crate::services::descendant_updater::{DescendantUpdater, PendingCascade};
use crate::services::error::TreeError;
use crate::services::hooks::{MoveContext, MoveHook};
use crate::services::path_calculator::{ComputedPath, PathCalculator};
use crate::services::tree_query::TreeQuery;
use crate::services::validators::{CycleValidator, ScopeValidator};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tokio::sync::broadcast;

/// Progress of a single move
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MoveState {
    Idle,
    Validating,
    PathComputed,
    SelfPersisted,
    DescendantsCascaded,
    Committed,
}

fn advance(state: &mut MoveState, next: MoveState, node_id: &str) {
    tracing::debug!("Move of {}: {:?} -> {:?}", node_id, state, next);
    *state = next;
}

/// Result of a successful save
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveOutcome {
    /// True when the move protocol ran (new node or parent change)
    pub moved: bool,
    pub descendants_updated: u64,
}

/// Write-side service for one tree type
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use serde_json::json;
/// use treepath_core::{MemoryStore, Node, TreeConfig, TreeService};
///
/// # tokio_test::block_on(async {
/// let service = TreeService::new(Arc::new(MemoryStore::new()), TreeConfig::default())?;
///
/// let r = service.create(Node::new("category", None, json!({}))).await?;
/// let r2 = service.create(Node::new("category", None, json!({}))).await?;
/// let c = service.create(Node::new("category", Some(r.id.clone()), json!({}))).await?;
///
/// let moved = service.move_node(&c.id, Some(&r2.id)).await?;
/// assert_eq!(moved.path(), &[r2.id.clone()]);
/// # Ok::<(), treepath_core::TreeError>(())
/// # }).unwrap();
/// ```
#[derive(Clone)]
pub struct TreeService {
    store: Arc<dyn TreeStore>,
    config: Arc<TreeConfig>,
    query: TreeQuery,
    updater: DescendantUpdater,
    hooks: Vec<Arc<dyn MoveHook>>,
    event_tx: broadcast::Sender<TreeEvent>,
}

impl TreeService {
    /// Create a service without move hooks
    pub fn new(store: Arc<dyn TreeStore>, config: TreeConfig) -> Result<Self, TreeError> {
        Self::with_hooks(store, config, Vec::new())
    }

    /// Create a service with an ordered list of move hooks
    pub fn with_hooks(
        store: Arc<dyn TreeStore>,
        config: TreeConfig,
        hooks: Vec<Arc<dyn MoveHook>>,
    ) -> Result<Self, TreeError> {
        config.validate().map_err(TreeError::invalid_config)?;
        let config = Arc::new(config);
        let (event_tx, _) = broadcast::channel(config.event_capacity);

        Ok(Self {
            query: TreeQuery::new(store.clone(), config.clone()),
            updater: DescendantUpdater::new(store.clone()),
            store,
            config,
            hooks,
            event_tx,
        })
    }

    pub fn config(&self) -> &TreeConfig {
        &self.config
    }

    /// Read-side traversal for this tree
    pub fn query(&self) -> &TreeQuery {
        &self.query
    }

    pub fn subscribe(&self) -> broadcast::Receiver<TreeEvent> {
        self.event_tx.subscribe()
    }

    /// Ignores errors if no subscribers
    fn emit_event(&self, event: TreeEvent) {
        let _ = self.event_tx.send(event);
    }

    pub async fn get(&self, id: &str) -> Result<Option<Node>, TreeError> {
        self.query.get(id).await
    }

    async fn require(&self, id: &str) -> Result<Node, TreeError> {
        self.get(id)
            .await?
            .ok_or_else(|| TreeError::node_not_found(id))
    }

    /// Insert a new node, computing its path from the parent
    pub async fn create(&self, mut node: Node) -> Result<Node, TreeError> {
        self.save(&mut node).await?;
        Ok(node)
    }

    /// Persist a node, running the move protocol when its parent changed
    ///
    /// The stored document, not the node's own snapshot, decides whether this
    /// is a move and what the old path was, so handles loaded before an
    /// ancestor moved are safe to save. A save that leaves `parent_id` alone
    /// keeps the stored `parent_id`/`path`/`depth` and writes everything else.
    ///
    /// Scope fields are only checked on moves. Editing a scope property of a
    /// node that stays in place is not validated against its parent or
    /// children.
    pub async fn save(&self, node: &mut Node) -> Result<SaveOutcome, TreeError> {
        let stored = self.store.load(&node.id).await?;
        let moving = match &stored {
            None => true,
            Some(stored) => node.will_move() && stored.parent_id != node.parent_id,
        };
        node.rebase_on(stored.as_ref());

        let Some(stored) = stored.filter(|_| !moving) else {
            return self.run_move(node).await;
        };

        node.adopt_hierarchy(&stored);
        node.touch();
        self.store.save(node).await?;
        node.mark_persisted();
        self.emit_event(TreeEvent::NodeUpdated(node.clone()));
        Ok(SaveOutcome {
            moved: false,
            descendants_updated: 0,
        })
    }

    /// Assign a new parent; persists immediately when `autosave` is on
    ///
    /// Returns `None` when the change was only made in memory.
    pub async fn set_parent(
        &self,
        node: &mut Node,
        parent_id: Option<String>,
    ) -> Result<Option<SaveOutcome>, TreeError> {
        node.parent_id = parent_id;
        if !self.config.autosave {
            return Ok(None);
        }
        self.save(node).await.map(Some)
    }

    /// Load a node, re-parent it and save it
    pub async fn move_node(&self, id: &str, new_parent: Option<&str>) -> Result<Node, TreeError> {
        let mut node = self.require(id).await?;
        node.parent_id = new_parent.map(String::from);
        self.save(&mut node).await?;
        Ok(node)
    }

    /// `node` must already be rebased on the stored document
    async fn run_move(&self, node: &mut Node) -> Result<SaveOutcome, TreeError> {
        let mut state = MoveState::Idle;
        let parent_field = self.config.fields.parent_id.as_str();

        advance(&mut state, MoveState::Validating, &node.id);
        let parent = match node.parent_id() {
            Some(parent_id) => self.get(parent_id).await?,
            None => None,
        };
        if let Some(parent) = &parent {
            ScopeValidator::new(&self.query, parent_field).validate(node, parent)?;
        } else if let Some(parent_id) = node.parent_id() {
            tracing::warn!(
                "Parent {} of node {} not found; node is stored as a root",
                parent_id,
                node.id
            );
        }
        CycleValidator::new(&self.query, parent_field)
            .validate(node)
            .await?;

        let is_new = node.is_new();
        let old_parent_id = node.persisted_parent_id().map(String::from);
        let old_path = node.persisted_path().map(<[String]>::to_vec);

        let computed: ComputedPath = PathCalculator::calculate(parent.as_ref());
        let ctx = MoveContext {
            node_id: node.id.clone(),
            is_new,
            old_parent_id: old_parent_id.clone(),
            new_parent_id: node.parent_id.clone(),
            old_path: old_path.clone(),
            new_path: computed.path.clone(),
            new_depth: computed.depth,
        };
        for hook in &self.hooks {
            if !hook.before_move(&ctx).await {
                tracing::warn!("Move of node {} vetoed by hook", node.id);
                return Err(TreeError::move_vetoed(node.id.clone()));
            }
        }

        node.set_path(computed.path.clone(), computed.depth);
        advance(&mut state, MoveState::PathComputed, &node.id);

        node.touch();
        self.store.save(node).await?;
        node.mark_persisted();
        advance(&mut state, MoveState::SelfPersisted, &node.id);

        let mut descendants_updated = 0;
        if let Some(old_path) = &old_path {
            let pending = PendingCascade::new(node.id.clone(), old_path.clone(), computed.path.clone());
            descendants_updated = match self.updater.apply(&pending).await {
                Ok(updated) => updated,
                Err(source) => {
                    tracing::warn!(
                        "Cascade for node {} failed, descendants keep stale paths: {}",
                        node.id,
                        source
                    );
                    return Err(TreeError::CascadeFailed { pending, source });
                }
            };
            advance(&mut state, MoveState::DescendantsCascaded, &node.id);
        }

        for hook in &self.hooks {
            hook.after_move(&ctx).await;
        }
        advance(&mut state, MoveState::Committed, &node.id);

        if is_new {
            tracing::info!("Created node {} at depth {}", node.id, node.depth());
            self.emit_event(TreeEvent::NodeCreated(node.clone()));
        } else {
            tracing::info!(
                "Moved node {} from {:?} to {:?} ({} descendants updated)",
                node.id,
                old_parent_id,
                node.parent_id,
                descendants_updated
            );
            self.emit_event(TreeEvent::NodeMoved(MoveRecord {
                node_id: node.id.clone(),
                old_parent_id,
                new_parent_id: node.parent_id.clone(),
                old_path: old_path.unwrap_or_default(),
                new_path: computed.path,
                descendants_updated,
            }));
        }

        Ok(SaveOutcome {
            moved: true,
            descendants_updated,
        })
    }

    /// Re-run a cascade that failed after its node was saved
    pub async fn retry_cascade(&self, pending: &PendingCascade) -> Result<u64, TreeError> {
        let updated = self.updater.apply(pending).await?;
        tracing::info!(
            "Retried cascade for node {}: {} descendants updated",
            pending.node_id,
            updated
        );
        Ok(updated)
    }

    /// Delete a node according to the configured `DeletePolicy`
    ///
    /// Returns the number of documents removed, the node included.
    pub async fn destroy(&self, node: &Node) -> Result<u64, TreeError> {
        let descendants_removed = match self.config.delete_policy {
            DeletePolicy::DestroyDescendants => {
                self.store
                    .delete_where(&Filter::PathContains(node.id.clone()))
                    .await?
            }
            DeletePolicy::NullifyChildren => {
                self.reparent_children(node, None).await?;
                0
            }
            DeletePolicy::MoveChildrenToParent => {
                self.reparent_children(node, node.parent_id.clone()).await?;
                0
            }
            DeletePolicy::Restrict => {
                let children = self.query.count(&Filter::ParentEq(Some(node.id.clone()))).await?;
                if children > 0 {
                    return Err(TreeError::HasChildren {
                        node_id: node.id.clone(),
                        children,
                    });
                }
                0
            }
        };

        let removed = u64::from(self.store.delete(&node.id).await?) + descendants_removed;
        tracing::info!(
            "Deleted node {} ({} descendants removed)",
            node.id,
            descendants_removed
        );
        self.emit_event(TreeEvent::NodeDeleted {
            id: node.id.clone(),
            descendants_removed,
        });
        Ok(removed)
    }

    async fn reparent_children(&self, node: &Node, parent_id: Option<String>) -> Result<(), TreeError> {
        for mut child in self.query.children(node).await? {
            child.parent_id = parent_id.clone();
            self.save(&mut child).await?;
        }
        Ok(())
    }

    /// Recompute every stored path from `parent_id` links
    ///
    /// Opt-in repair for trees whose paths went stale (for example after an
    /// abandoned cascade). Walks each tree breadth-first from its roots and
    /// overwrites nodes one at a time, so it is far slower than a move.
    /// Nodes unreachable from a root (dangling or cyclic parent links) are
    /// left untouched. Returns the number of nodes rewritten.
    pub async fn rebuild_paths(&self) -> Result<u64, TreeError> {
        let mut queue: VecDeque<(Node, ComputedPath)> = self
            .query
            .roots(&ScopeKey::unscoped())
            .await?
            .into_iter()
            .map(|root| (root, ComputedPath::root()))
            .collect();
        let mut visited = HashSet::new();
        let mut repaired = 0;

        while let Some((node, expected)) = queue.pop_front() {
            if !visited.insert(node.id.clone()) {
                continue;
            }
            if !expected.matches(&node) {
                tracing::debug!(
                    "Repairing path of {}: {:?} -> {:?}",
                    node.id,
                    node.path(),
                    expected.path
                );
                repaired += self.updater.overwrite(&node.id, expected.path.clone()).await?;
            }
            let children = self
                .query
                .find(&Filter::ParentEq(Some(node.id.clone())).and(self.type_filter()))
                .await?;
            for child in children {
                let child_path = expected.child_of(&node.id);
                queue.push_back((child, child_path));
            }
        }

        tracing::info!("Rebuilt tree paths: {} nodes repaired", repaired);
        self.emit_event(TreeEvent::PathsRepaired { repaired });
        Ok(repaired)
    }

    fn type_filter(&self) -> Filter {
        self.query.scope_filter(&ScopeKey::unscoped())
    }
}
