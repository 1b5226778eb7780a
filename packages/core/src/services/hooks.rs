//! Move lifecycle hooks.
//!
//! Hooks are registered as an ordered list when a `TreeService` is built.
//! `before_move` runs after validation and before the node is written; the
//! first hook that returns `false` aborts the move with nothing persisted.
//! `after_move` runs once the node and its descendants are committed.
//!
//! Plain closures `Fn(&MoveContext) -> bool` work as veto-only hooks.

use async_trait::async_trait;

/// What a hook sees of the move in progress
#[derive(Debug, Clone, PartialEq)]
pub struct MoveContext {
    pub node_id: String,
    /// True for the first save of a node
    pub is_new: bool,
    pub old_parent_id: Option<String>,
    pub new_parent_id: Option<String>,
    /// `None` for new nodes
    pub old_path: Option<Vec<String>>,
    pub new_path: Vec<String>,
    pub new_depth: u32,
}

#[async_trait]
pub trait MoveHook: Send + Sync {
    /// Return `false` to veto the move
    async fn before_move(&self, _ctx: &MoveContext) -> bool {
        true
    }

    async fn after_move(&self, _ctx: &MoveContext) {}
}

#[async_trait]
impl<F> MoveHook for F
where
    F: Fn(&MoveContext) -> bool + Send + Sync,
{
    async fn before_move(&self, ctx: &MoveContext) -> bool {
        (self)(ctx)
    }
}
