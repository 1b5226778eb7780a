//! Path and depth computation for a node about to be written.

use crate::models::Node;

/// Hierarchy fields computed for a node
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComputedPath {
    pub path: Vec<String>,
    pub depth: u32,
}

impl ComputedPath {
    /// Path and depth of a root
    pub fn root() -> Self {
        Self::default()
    }

    /// Path and depth of a child of the node described by `self`
    pub fn child_of(&self, parent_id: &str) -> Self {
        let mut path = Vec::with_capacity(self.path.len() + 1);
        path.extend_from_slice(&self.path);
        path.push(parent_id.to_string());
        Self {
            path,
            depth: self.depth + 1,
        }
    }

    /// True when the node already stores exactly these values
    pub fn matches(&self, node: &Node) -> bool {
        node.path() == self.path.as_slice() && node.depth() == self.depth
    }
}

pub struct PathCalculator;

impl PathCalculator {
    /// Compute a node's path and depth from its parent
    ///
    /// A missing parent (no parent id, or a parent id the store cannot
    /// resolve) yields a root path. There is no error case.
    pub fn calculate(parent: Option<&Node>) -> ComputedPath {
        match parent {
            Some(parent) => ComputedPath {
                path: parent.path().to_vec(),
                depth: parent.depth(),
            }
            .child_of(&parent.id),
            None => ComputedPath::root(),
        }
    }
}
