//! # sortree
//!
//! A self-balancing, array-backed binary search tree maintaining a
//! dynamic, ordered, deduplicated collection of values, with node-level
//! handles whose lifecycle is explicitly tracked.
//!
//! ## Overview
//!
//! - **Sorted array core**: the authoritative representation is a flat,
//!   sorted, deduplicated array of live nodes; searches are binary,
//!   in-order iteration is a slice scan.
//! - **Lazily derived shape**: a balanced binary tree over the same nodes
//!   is rebuilt on demand for pre/post-order walks and
//!   ancestor/descendant chains; bursts of writes coalesce into a single
//!   rebuild.
//! - **Tracked node handles**: entries are exposed as shared
//!   [`TreeNode`](tree::TreeNode) handles that can be detached from,
//!   rejoined to, or freed from their tree, and remain safely observable
//!   across arbitrary mutations.
//! - **Pluggable criteria**: equality and ordering are closures; swapping
//!   them re-sorts and re-dedupes the collection.
//!
//! ## Example
//!
//! ```rust
//! use sortree::prelude::*;
//!
//! let tree = SortedTree::from_values([5, 3, 8, 3, 1]);
//! assert_eq!(tree.values(), vec![1, 3, 5, 8]);
//!
//! let node = tree.get(&5).unwrap();
//! node.set_value(7);
//! assert_eq!(tree.values(), vec![1, 3, 7, 8]);
//!
//! node.detach();
//! assert_eq!(tree.values(), vec![1, 3, 8]);
//! assert_eq!(node.state(), NodeState::Detached);
//! ```
//!
//! ## Concurrency model
//!
//! Single-threaded, synchronous, cooperative: every operation runs to
//! completion before returning, and the handles are deliberately neither
//! `Send` nor `Sync`. A multi-threaded port would need a writer lock
//! around the array and the shape-staleness flag.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]

/// Prelude module for convenient imports.
///
/// Re-exports commonly used types.
///
/// # Usage
///
/// ```rust
/// use sortree::prelude::*;
/// ```
pub mod prelude {
    pub use crate::tree::{
        CriteriaUpdate, Criterion, CriterionSetting, NodeState, SortedTree, TraversalDirection,
        TraversalOptions, TraversalOrder, TreeError, TreeNode, TreeOptions,
    };
}

pub mod tree;
