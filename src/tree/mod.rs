//! Sorted tree with tracked node handles.
//!
//! This module provides [`SortedTree`], a mutable, ordered, deduplicated
//! collection backed by a flat sorted array, and [`TreeNode`], a shared
//! handle to one of its entries whose lifecycle — live, detached, free —
//! is explicitly tracked and independently manipulable.
//!
//! # Two representations, one collection
//!
//! The sorted array is authoritative: every search, insertion, and
//! in-order scan runs against it. A balanced binary *shape* (left, right,
//! and parent links) is derived from the array lazily and serves only the
//! divide-and-conquer walks — pre/post-order traversal and the
//! ancestor/descendant chains. Writes mark the shape stale; the next
//! shape-reading operation rebuilds it in one pass.
//!
//! # Node lifecycle
//!
//! External code may hold a [`TreeNode`] for as long as it likes. The
//! entry can be [`detach`](TreeNode::detach)ed — removed from the live
//! array while keeping its association — then
//! [`join`](TreeNode::join)ed back at its recomputed sorted position, or
//! [`free`](TreeNode::free)d entirely. Detached nodes survive wholesale
//! replacement of the live set, and [`SortedTree::cleanup`] releases any
//! still-detached nodes deterministically.
//!
//! # Examples
//!
//! ```rust
//! use sortree::tree::{NodeState, SortedTree};
//!
//! let tree = SortedTree::from_values([0, 11, 0, 77, 11, 33, 0, 99, 55]);
//! assert_eq!(tree.values(), vec![0, 11, 33, 55, 77, 99]);
//!
//! let node = tree.get(&77).unwrap();
//! node.detach();
//! assert_eq!(tree.values(), vec![0, 11, 33, 55, 99]);
//!
//! node.join().unwrap();
//! assert_eq!(tree.values(), vec![0, 11, 33, 55, 77, 99]);
//! assert_eq!(node.state(), NodeState::Live);
//! ```

use std::cell::RefCell;
use std::rc::{Rc, Weak};

mod criteria;
mod error;
mod node;
mod sorted_tree;
mod traversal;

pub use criteria::{CriteriaUpdate, Criterion, CriterionSetting, TreeOptions};
pub use error::TreeError;
pub use node::{
    AncestorsIterator, DescendantsIterator, NodeState, ParentsUntilIterator, TreeNode,
};
pub use sorted_tree::SortedTree;
pub use traversal::{
    TraversalDirection, TraversalOptions, TraversalOrder, TreeTraversalIterator,
};

use node::NodeCore;
use sorted_tree::TreeCore;

// =============================================================================
// Shared Link Aliases
// =============================================================================

/// Owning link to a node record; trees own their live nodes through
/// these, and shape links point downward through them.
pub(in crate::tree) type NodeCoreLink<T> = Rc<RefCell<NodeCore<T>>>;

/// Non-owning link to a node record; parent links and the cleanup
/// registry point through these so that shape and registry never keep a
/// node alive.
pub(in crate::tree) type WeakNodeCoreLink<T> = Weak<RefCell<NodeCore<T>>>;

/// Owning link to a tree record; every [`SortedTree`] handle is one.
pub(in crate::tree) type TreeCoreLink<T> = Rc<RefCell<TreeCore<T>>>;

/// Non-owning back-link from a node to its tree; a dead one is
/// observable as the free state.
pub(in crate::tree) type WeakTreeCoreLink<T> = Weak<RefCell<TreeCore<T>>>;
