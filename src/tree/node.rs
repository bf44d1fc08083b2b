//! Tree entries and their lifecycle state machine.
//!
//! A [`TreeNode`] is a cheap-to-clone shared handle to one entry of a
//! [`SortedTree`](super::SortedTree). The handle stays valid across
//! arbitrary tree mutations; what changes is the node's *state*:
//!
//! - **Live**: associated with a tree and present in its ordered array.
//! - **Detached**: associated with a tree but excluded from the array.
//! - **Free**: not associated with any tree.
//!
//! Transitions run through [`detach`](TreeNode::detach),
//! [`join`](TreeNode::join), and [`free`](TreeNode::free), each of which
//! delegates the actual array surgery back into the owning tree under a
//! transition phase marker, so that the tree-level entry points can tell a
//! re-entrant internal call from direct external use.

use std::rc::{Rc, Weak};

use smallvec::SmallVec;

use super::error::TreeError;
use super::sorted_tree::SortedTree;
use super::{NodeCoreLink, WeakNodeCoreLink, WeakTreeCoreLink};

// =============================================================================
// Node State
// =============================================================================

/// The lifecycle state of a node, as observed through its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Associated with a tree and present in its ordered array.
    Live,
    /// Associated with a tree but excluded from the ordered array.
    Detached,
    /// Not associated with any tree.
    Free,
}

/// Which state-changing operation, if any, is currently mid-flight.
///
/// The tree-level `insert_node`/`remove_node` entry points consult this to
/// distinguish a delegated internal call from direct external use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(in crate::tree) enum TransitionPhase {
    Complete,
    Detaching,
    Joining,
    Disassociating,
}

// =============================================================================
// Node Core
// =============================================================================

/// The shared record behind a [`TreeNode`] handle.
///
/// Fields are module-private: only the `tree` module mutates them, which is
/// what keeps the shape links and order index externally read-only.
pub(in crate::tree) struct NodeCore<T> {
    pub(in crate::tree) value: T,
    /// Last-known in-order position; authoritative only while live.
    pub(in crate::tree) order_index: usize,
    pub(in crate::tree) left: Option<NodeCoreLink<T>>,
    pub(in crate::tree) right: Option<NodeCoreLink<T>>,
    pub(in crate::tree) parent: Option<WeakNodeCoreLink<T>>,
    /// The association; `None` means free.
    pub(in crate::tree) tree: Option<WeakTreeCoreLink<T>>,
    pub(in crate::tree) detached: bool,
    pub(in crate::tree) phase: TransitionPhase,
}

impl<T> NodeCore<T> {
    pub(in crate::tree) fn new_live(value: T, tree: WeakTreeCoreLink<T>) -> Self {
        Self {
            value,
            order_index: 0,
            left: None,
            right: None,
            parent: None,
            tree: Some(tree),
            detached: false,
            phase: TransitionPhase::Complete,
        }
    }

    /// Shape links are only meaningful while live; everything that takes a
    /// node out of the array clears them.
    pub(in crate::tree) fn clear_shape_links(&mut self) {
        self.left = None;
        self.right = None;
        self.parent = None;
    }
}

// =============================================================================
// Node Handle
// =============================================================================

/// A shared handle to one entry of a [`SortedTree`].
///
/// Handles are created by the tree (via insertion or bulk value
/// assignment) and stay usable after the entry leaves the live array;
/// [`state`](Self::state) reports where in its lifecycle the entry is.
/// Cloning a handle never clones the entry — equality between handles is
/// identity.
///
/// # Examples
///
/// ```rust
/// use sortree::tree::{NodeState, SortedTree};
///
/// let tree = SortedTree::from_values([10, 20, 30]);
/// let node = tree.get(&20).unwrap();
///
/// node.detach();
/// assert_eq!(tree.values(), vec![10, 30]);
/// assert_eq!(node.state(), NodeState::Detached);
///
/// node.join().unwrap();
/// assert_eq!(tree.values(), vec![10, 20, 30]);
/// assert_eq!(node.state(), NodeState::Live);
/// ```
pub struct TreeNode<T> {
    pub(in crate::tree) core: NodeCoreLink<T>,
}

impl<T> Clone for TreeNode<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T> TreeNode<T> {
    pub(in crate::tree) fn from_core(core: NodeCoreLink<T>) -> Self {
        Self { core }
    }

    /// Upgrades the association, if the node has one and the owner is
    /// still alive.
    fn owning_core(&self) -> Option<super::TreeCoreLink<T>> {
        self.core.borrow().tree.as_ref().and_then(Weak::upgrade)
    }

    /// Rebuilds the owner's shape if stale; `None` when the node is not
    /// live (its shape links are meaningless then).
    fn refresh_shape(&self) -> Option<()> {
        if self.core.borrow().detached {
            return None;
        }
        let tree = self.owning_core()?;
        SortedTree::from_core(tree).rotate();
        Some(())
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// Returns a copy of the stored value.
    pub fn value(&self) -> T
    where
        T: Clone,
    {
        self.core.borrow().value.clone()
    }

    /// The node's last-known in-order position.
    ///
    /// Authoritative only while the node is live; it may go stale while
    /// the node is detached.
    pub fn order_index(&self) -> usize {
        self.core.borrow().order_index
    }

    /// The node's current lifecycle state.
    ///
    /// A node whose owner was dropped without [`SortedTree::cleanup`]
    /// reports [`NodeState::Free`].
    pub fn state(&self) -> NodeState {
        let core = self.core.borrow();
        match &core.tree {
            None => NodeState::Free,
            Some(weak) if weak.upgrade().is_none() => NodeState::Free,
            Some(_) if core.detached => NodeState::Detached,
            Some(_) => NodeState::Live,
        }
    }

    /// Whether the node is excluded from its owner's ordered array.
    ///
    /// Remains `true` after [`free`](Self::free) as a defensive
    /// post-condition, even though the node then has no owner at all.
    pub fn is_detached(&self) -> bool {
        self.core.borrow().detached
    }

    /// Whether the node has no owning tree.
    pub fn is_free(&self) -> bool {
        self.state() == NodeState::Free
    }

    /// The owning tree, if the node has one and it is still alive.
    pub fn tree(&self) -> Option<SortedTree<T>> {
        self.owning_core().map(SortedTree::from_core)
    }

    /// Whether two handles refer to the same entry.
    pub fn same_node(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    // -------------------------------------------------------------------------
    // Value mutation
    // -------------------------------------------------------------------------

    /// Replaces the stored value.
    ///
    /// Setting a value equal (by `==`, not by the tree's criterion) to
    /// the current one is a no-op. On a live node the owning tree
    /// re-positions the entry via
    /// [`synchronize`](SortedTree::synchronize); on a detached or free
    /// node the value simply changes in place.
    pub fn set_value(&self, value: T)
    where
        T: PartialEq,
    {
        {
            let core = self.core.borrow();
            if core.value == value {
                return;
            }
        }
        self.core.borrow_mut().value = value;
        if !self.core.borrow().detached {
            if let Some(tree) = self.owning_core() {
                SortedTree::from_core(tree).synchronize(self);
            }
        }
    }

    // -------------------------------------------------------------------------
    // Lifecycle transitions
    // -------------------------------------------------------------------------

    /// Live → Detached. No-op if the node is already detached or free.
    ///
    /// The node leaves the owner's ordered array (renumbering every entry
    /// after it) but keeps its association, and is registered with the
    /// owner's cleanup notification so that
    /// [`SortedTree::cleanup`] frees it if it is never rejoined.
    pub fn detach(&self) {
        let Some(tree) = self.owning_core() else {
            return;
        };
        if self.core.borrow().detached {
            return;
        }
        self.core.borrow_mut().phase = TransitionPhase::Detaching;
        let owner = SortedTree::from_core(Rc::clone(&tree));
        let _ = owner.remove_node(self);
        {
            let mut core = self.core.borrow_mut();
            core.detached = true;
            core.phase = TransitionPhase::Complete;
            core.clear_shape_links();
        }
        tree.borrow_mut().watch_for_cleanup(&self.core);
    }

    /// Detached → Live. No-op (`Ok(true)`) if the node is not detached.
    ///
    /// Re-inserts the node into the owner's array at its correctly
    /// recomputed sorted position — not necessarily its old one — and
    /// cancels the pending cleanup registration.
    ///
    /// Returns `Ok(false)` when an equal value was inserted while this
    /// node was detached: the node loses to the resident entry and stays
    /// associated-but-detached.
    ///
    /// # Errors
    ///
    /// [`TreeError::NoTree`] if the node has no owning tree.
    pub fn join(&self) -> Result<bool, TreeError> {
        let tree = self.owning_core().ok_or(TreeError::NoTree)?;
        if !self.core.borrow().detached {
            return Ok(true);
        }
        self.core.borrow_mut().phase = TransitionPhase::Joining;
        let owner = SortedTree::from_core(Rc::clone(&tree));
        let result = owner.insert_node(self);
        let joined = !self.core.borrow().detached;
        if joined {
            tree.borrow_mut().unwatch_for_cleanup(&self.core);
        }
        self.core.borrow_mut().phase = TransitionPhase::Complete;
        result.map(|()| joined)
    }

    /// Live or Detached → Free. No-op if the node is already free.
    ///
    /// A live node is first spliced out of the array (skipped while the
    /// owner is mid-[`cleanup`](SortedTree::cleanup), where the array is
    /// being torn down wholesale); any cleanup registration is cancelled;
    /// the association is cleared. `detached` is left `true` afterwards.
    pub fn free(&self) {
        let association = self.core.borrow().tree.clone();
        let Some(weak) = association else {
            return;
        };
        if let Some(tree) = weak.upgrade() {
            let disposing = tree.borrow().disposing;
            if !disposing {
                self.core.borrow_mut().phase = TransitionPhase::Disassociating;
                let owner = SortedTree::from_core(Rc::clone(&tree));
                let _ = owner.remove_node(self);
                tree.borrow_mut().unwatch_for_cleanup(&self.core);
            }
        }
        let mut core = self.core.borrow_mut();
        core.tree = None;
        core.detached = true;
        core.phase = TransitionPhase::Complete;
        core.clear_shape_links();
    }

    /// Re-parents the node onto another tree.
    ///
    /// Assigning the current owner is a no-op. Assigning a different tree
    /// first frees the node from its old owner, then joins it onto the
    /// new one (an equal resident value leaves it associated-but-detached
    /// there, as with [`join`](Self::join)).
    ///
    /// # Errors
    ///
    /// [`TreeError::CannotUnsetTree`] when `tree` is `None`: clearing the
    /// association must go through [`free`](Self::free).
    pub fn set_tree(&self, tree: Option<&SortedTree<T>>) -> Result<(), TreeError> {
        let Some(target) = tree else {
            return Err(TreeError::CannotUnsetTree);
        };
        if let Some(current) = self.owning_core() {
            if Rc::ptr_eq(&current, &target.core) {
                return Ok(());
            }
        }
        if self.core.borrow().tree.is_some() {
            self.free();
        }
        target.insert_node(self)
    }

    // -------------------------------------------------------------------------
    // Shape accessors
    // -------------------------------------------------------------------------

    /// The node's left child in the derived shape, rebuilding a stale
    /// shape first. `None` when the node is not live.
    pub fn left(&self) -> Option<Self> {
        self.refresh_shape()?;
        let link = self.core.borrow().left.clone()?;
        Some(Self::from_core(link))
    }

    /// The node's right child in the derived shape, rebuilding a stale
    /// shape first. `None` when the node is not live.
    pub fn right(&self) -> Option<Self> {
        self.refresh_shape()?;
        let link = self.core.borrow().right.clone()?;
        Some(Self::from_core(link))
    }

    /// The node's parent in the derived shape, rebuilding a stale shape
    /// first. `None` for the shape root or a non-live node.
    pub fn parent(&self) -> Option<Self> {
        self.refresh_shape()?;
        let link = self.core.borrow().parent.as_ref().and_then(Weak::upgrade)?;
        Some(Self::from_core(link))
    }

    /// The present children, left before right.
    pub fn children(&self) -> Vec<Self> {
        if self.refresh_shape().is_none() {
            return Vec::new();
        }
        let core = self.core.borrow();
        core.left
            .iter()
            .chain(core.right.iter())
            .cloned()
            .map(Self::from_core)
            .collect()
    }

    // -------------------------------------------------------------------------
    // Walks
    // -------------------------------------------------------------------------

    /// Walks `parent` links upward, yielding up to `max_depth` ancestors
    /// (all of them for `None`), stopping at the shape root.
    ///
    /// Lazy and restartable: each call produces a fresh sequence.
    pub fn ancestors(&self, max_depth: Option<usize>) -> AncestorsIterator<T> {
        let live = self.refresh_shape().is_some();
        AncestorsIterator {
            current: live.then(|| Rc::clone(&self.core)),
            remaining: max_depth.unwrap_or(usize::MAX),
        }
    }

    /// In-order walk over the subtree below this node — the node itself
    /// is excluded — visiting nothing deeper than `max_depth` levels
    /// below it (children are depth 1; `None` is unbounded).
    pub fn descendants(&self, max_depth: Option<usize>) -> DescendantsIterator<T> {
        let mut iterator = DescendantsIterator {
            stack: SmallVec::new(),
            pending_right: None,
            max_depth: max_depth.unwrap_or(usize::MAX),
        };
        if self.refresh_shape().is_some() {
            let (left, right) = {
                let core = self.core.borrow();
                (core.left.clone(), core.right.clone())
            };
            iterator.pending_right = right.map(|link| (link, 1));
            iterator.descend_left(left, 1);
        }
        iterator
    }

    /// Walks upward like [`ancestors`](Self::ancestors), unbounded,
    /// stopping after yielding `stop` if it is encountered; otherwise the
    /// full ancestor chain is yielded.
    pub fn parents_until(&self, stop: Option<&Self>) -> ParentsUntilIterator<T> {
        let live = self.refresh_shape().is_some();
        ParentsUntilIterator {
            current: live.then(|| Rc::clone(&self.core)),
            stop: stop.map(|node| Rc::clone(&node.core)),
        }
    }
}

impl<T> PartialEq for TreeNode<T> {
    /// Handle identity: two handles are equal when they refer to the same
    /// entry, regardless of value.
    fn eq(&self, other: &Self) -> bool {
        self.same_node(other)
    }
}

impl<T> Eq for TreeNode<T> {}

impl<T: std::fmt::Debug> std::fmt::Debug for TreeNode<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.borrow();
        formatter
            .debug_struct("TreeNode")
            .field("value", &core.value)
            .field("order_index", &core.order_index)
            .field("detached", &core.detached)
            .finish()
    }
}

// =============================================================================
// Walk Iterators
// =============================================================================

/// Lazy upward walk produced by [`TreeNode::ancestors`].
pub struct AncestorsIterator<T> {
    current: Option<NodeCoreLink<T>>,
    remaining: usize,
}

impl<T> Iterator for AncestorsIterator<T> {
    type Item = TreeNode<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let current = self.current.take()?;
        let parent = current.borrow().parent.as_ref().and_then(Weak::upgrade)?;
        self.remaining -= 1;
        self.current = Some(Rc::clone(&parent));
        Some(TreeNode::from_core(parent))
    }
}

/// Lazy upward walk produced by [`TreeNode::parents_until`].
pub struct ParentsUntilIterator<T> {
    current: Option<NodeCoreLink<T>>,
    stop: Option<NodeCoreLink<T>>,
}

impl<T> Iterator for ParentsUntilIterator<T> {
    type Item = TreeNode<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.current.take()?;
        let parent = current.borrow().parent.as_ref().and_then(Weak::upgrade)?;
        let reached_stop = self
            .stop
            .as_ref()
            .is_some_and(|stop| Rc::ptr_eq(stop, &parent));
        if !reached_stop {
            self.current = Some(Rc::clone(&parent));
        }
        Some(TreeNode::from_core(parent))
    }
}

/// Lazy depth-bounded in-order walk produced by
/// [`TreeNode::descendants`].
pub struct DescendantsIterator<T> {
    stack: SmallVec<[(NodeCoreLink<T>, usize); 16]>,
    pending_right: Option<(NodeCoreLink<T>, usize)>,
    max_depth: usize,
}

impl<T> DescendantsIterator<T> {
    fn descend_left(&mut self, mut cursor: Option<NodeCoreLink<T>>, mut depth: usize) {
        while let Some(node) = cursor {
            if depth > self.max_depth {
                break;
            }
            cursor = node.borrow().left.clone();
            self.stack.push((node, depth));
            depth += 1;
        }
    }
}

impl<T> Iterator for DescendantsIterator<T> {
    type Item = TreeNode<T>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some((node, depth)) = self.stack.pop() {
                let right = node.borrow().right.clone();
                self.descend_left(right, depth + 1);
                return Some(TreeNode::from_core(node));
            }
            let (right, depth) = self.pending_right.take()?;
            self.descend_left(Some(right), depth);
        }
    }
}
