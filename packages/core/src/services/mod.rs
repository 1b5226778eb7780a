//! Tree Services
//!
//! This module contains the tree algorithms built on top of the store:
//!
//! - `TreeService` - Move coordination, creation, deletion and repair
//! - `TreeQuery` - Ancestor/descendant/sibling traversal and predicates
//! - `DescendantUpdater` - Bulk path rewrite for a moved subtree
//! - `PathCalculator` - Path and depth from a parent
//! - `ScopeValidator` / `CycleValidator` - Move validation
//! - `MoveHook` - Vetoable move lifecycle observers

pub mod descendant_updater;
pub mod error;
pub mod hooks;
pub mod path_calculator;
pub mod tree_query;
pub mod tree_service;
pub mod validators;


pub use descendant_updater::{DescendantUpdater, PendingCascade};
pub use error::{TreeError, ValidationError};
pub use hooks::{MoveContext, MoveHook};
pub use path_calculator::{ComputedPath, PathCalculator};
pub use tree_query::TreeQuery;
pub use tree_service::{MoveState, SaveOutcome, TreeService};
pub use validators::{CycleValidator, ScopeValidator};
