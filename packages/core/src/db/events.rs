//! Tree Domain Events
//!
//! This module defines the domain events emitted by `TreeService` after a
//! write commits. Events follow the observer pattern, so other parts of an
//! application can react to tree changes without coupling to the store.
//!
//! # Architecture
//!
//! Events are sent on a tokio broadcast channel. Sending never blocks and is
//! skipped silently when nobody is subscribed.
//!
//! Move hooks (`services::hooks`) run inside the move and can veto it; events
//! are only observed afterwards.

use crate::models::Node;
use serde::{Deserialize, Serialize};

/// Summary of a committed move
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveRecord {
    pub node_id: String,
    pub old_parent_id: Option<String>,
    pub new_parent_id: Option<String>,
    pub old_path: Vec<String>,
    pub new_path: Vec<String>,
    pub descendants_updated: u64,
}

/// Domain events emitted by `TreeService`
#[derive(Debug, Clone)]
pub enum TreeEvent {
    /// A new node was inserted with its computed path
    NodeCreated(Node),

    /// A node was saved without changing its parent
    NodeUpdated(Node),

    /// An existing node changed parent and its descendants were rewritten
    NodeMoved(MoveRecord),

    /// A node was removed, together with `descendants_removed` descendants
    NodeDeleted { id: String, descendants_removed: u64 },

    /// `rebuild_paths` corrected `repaired` nodes
    PathsRepaired { repaired: u64 },
}

impl TreeEvent {
    /// Get a string representation of the event type
    pub fn event_type(&self) -> &str {
        match self {
            TreeEvent::NodeCreated(_) => "node:created",
            TreeEvent::NodeUpdated(_) => "node:updated",
            TreeEvent::NodeMoved(_) => "node:moved",
            TreeEvent::NodeDeleted { .. } => "node:deleted",
            TreeEvent::PathsRepaired { .. } => "tree:repaired",
        }
    }
}
