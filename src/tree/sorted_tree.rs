//! The tree: sorted array, derived shape, and all bulk operations.
//!
//! A [`SortedTree`] maintains two representations of the same collection:
//!
//! - the **ordered array** — the authoritative, sorted, deduplicated list
//!   of live nodes, serving every search and in-order scan;
//! - the **derived shape** — left/right/parent links forming a balanced
//!   binary tree over the same nodes, rebuilt wholesale and lazily, used
//!   only by the divide-and-conquer walks (pre/post-order traversal,
//!   ancestor/descendant chains).
//!
//! Structural writes mark the shape stale; the next shape-reading
//! operation rebuilds it in one pass via balanced-midpoint partitioning,
//! so a burst of writes costs a single rebuild. Shape links are never
//! durable identity — only the array plus each node's order index is.
//!
//! # Time Complexity
//!
//! | Operation      | Cost                          |
//! |----------------|-------------------------------|
//! | `index_of`     | O(log n)                      |
//! | `insert`       | O(log n) search + O(n) splice |
//! | `remove`       | O(log n) search + O(n) splice |
//! | `set_values`   | O(m log m)                    |
//! | `rotate`       | O(n), amortized over writes   |
//! | `traversal`    | O(1) + O(k) lazily            |
//!
//! # Examples
//!
//! ```rust
//! use sortree::tree::SortedTree;
//!
//! let tree = SortedTree::from_values([0, 11, 0, 77, 11, 33, 0, 99, 55]);
//! assert_eq!(tree.values(), vec![0, 11, 33, 55, 77, 99]);
//!
//! tree.insert(44);
//! assert_eq!(tree.index_of(&44), Some(3));
//! ```

use std::cell::RefCell;
use std::cmp::Ordering;
use std::rc::Rc;

use super::criteria::{
    CriteriaUpdate, Criterion, CriterionSetting, TreeOptions, default_is_same_value,
    default_is_value_before,
};
use super::error::TreeError;
use super::node::{NodeCore, TransitionPhase, TreeNode};
use super::traversal::{TraversalOptions, TreeTraversalIterator};
use super::{NodeCoreLink, TreeCoreLink, WeakNodeCoreLink};

// =============================================================================
// Insertion Point
// =============================================================================

/// Result of computing where a value would be inserted.
///
/// One binary-search pass answers both questions: where the value
/// belongs, and whether an equal entry already exists anywhere in the
/// array.
pub(in crate::tree) enum InsertionPoint {
    /// No equal entry exists; the value belongs at this index.
    Vacant(usize),
    /// An equal entry already exists; no insertion.
    Occupied,
}

// =============================================================================
// Tree Core
// =============================================================================

/// The shared record behind a [`SortedTree`] handle.
pub(in crate::tree) struct TreeCore<T> {
    /// The authoritative sorted, deduplicated, live node list.
    pub(in crate::tree) nodes: Vec<NodeCoreLink<T>>,
    pub(in crate::tree) is_same_value: Criterion<T>,
    pub(in crate::tree) is_value_before: Criterion<T>,
    pub(in crate::tree) same_is_default: bool,
    pub(in crate::tree) before_is_default: bool,
    /// Deferred-rebuild bookkeeping: writes set this, shape reads resolve
    /// it through `rotate`.
    pub(in crate::tree) shape_stale: bool,
    pub(in crate::tree) shape_root: Option<NodeCoreLink<T>>,
    /// Detached nodes registered for release on `cleanup`.
    pub(in crate::tree) cleanup_watchers: Vec<WeakNodeCoreLink<T>>,
    pub(in crate::tree) disposing: bool,
}

impl<T> TreeCore<T> {
    /// The 3-way comparison every search and insertion decision goes
    /// through: `Equal` if the equality criterion holds, else `Less` if
    /// the ordering criterion holds, else `Greater`.
    pub(in crate::tree) fn compare(&self, value: &T, other: &T) -> Ordering {
        if (self.is_same_value)(value, other) {
            Ordering::Equal
        } else if (self.is_value_before)(value, other) {
            Ordering::Less
        } else {
            Ordering::Greater
        }
    }

    /// Binary search over the inclusive index range `[low, high]`.
    fn search_range(&self, value: &T, low: usize, high: usize) -> Option<usize> {
        let mut low = low;
        let mut high = high + 1;
        while low < high {
            let middle = low + (high - low) / 2;
            let ordering = {
                let node = self.nodes[middle].borrow();
                self.compare(value, &node.value)
            };
            match ordering {
                Ordering::Equal => return Some(middle),
                Ordering::Less => high = middle,
                Ordering::Greater => low = middle + 1,
            }
        }
        None
    }

    /// Computes the insertion point for `value` over the whole array,
    /// detecting an existing equal entry in the same pass.
    pub(in crate::tree) fn insertion_point(&self, value: &T) -> InsertionPoint {
        let mut low = 0;
        let mut high = self.nodes.len();
        while low < high {
            let middle = low + (high - low) / 2;
            let ordering = {
                let node = self.nodes[middle].borrow();
                self.compare(value, &node.value)
            };
            match ordering {
                Ordering::Equal => return InsertionPoint::Occupied,
                Ordering::Less => high = middle,
                Ordering::Greater => low = middle + 1,
            }
        }
        InsertionPoint::Vacant(low)
    }

    /// Locates a node's actual array position, trusting its cached order
    /// index when it still points at the node and falling back to a scan.
    fn position_of(&self, node: &NodeCoreLink<T>) -> Option<usize> {
        let cached = node.borrow().order_index;
        if self
            .nodes
            .get(cached)
            .is_some_and(|candidate| Rc::ptr_eq(candidate, node))
        {
            return Some(cached);
        }
        self.nodes
            .iter()
            .position(|candidate| Rc::ptr_eq(candidate, node))
    }

    fn renumber_from(&mut self, start: usize) {
        for index in start..self.nodes.len() {
            self.nodes[index].borrow_mut().order_index = index;
        }
    }

    fn renumber_range(&mut self, low: usize, high: usize) {
        let last = self.nodes.len().saturating_sub(1);
        for index in low..=high.min(last) {
            self.nodes[index].borrow_mut().order_index = index;
        }
    }

    pub(in crate::tree) fn watch_for_cleanup(&mut self, node: &NodeCoreLink<T>) {
        let weak = Rc::downgrade(node);
        if !self
            .cleanup_watchers
            .iter()
            .any(|watcher| watcher.ptr_eq(&weak))
        {
            self.cleanup_watchers.push(weak);
        }
    }

    pub(in crate::tree) fn unwatch_for_cleanup(&mut self, node: &NodeCoreLink<T>) {
        let weak = Rc::downgrade(node);
        self.cleanup_watchers.retain(|watcher| !watcher.ptr_eq(&weak));
    }

    fn apply_same_value(&mut self, setting: CriterionSetting<T>) -> bool
    where
        T: PartialOrd,
    {
        match setting {
            CriterionSetting::Default => {
                if self.same_is_default {
                    return false;
                }
                self.is_same_value = default_is_same_value();
                self.same_is_default = true;
                true
            }
            CriterionSetting::Custom(criterion) => {
                if !self.same_is_default && Rc::ptr_eq(&criterion, &self.is_same_value) {
                    return false;
                }
                self.is_same_value = criterion;
                self.same_is_default = false;
                true
            }
        }
    }

    fn apply_value_before(&mut self, setting: CriterionSetting<T>) -> bool
    where
        T: PartialOrd,
    {
        match setting {
            CriterionSetting::Default => {
                if self.before_is_default {
                    return false;
                }
                self.is_value_before = default_is_value_before();
                self.before_is_default = true;
                true
            }
            CriterionSetting::Custom(criterion) => {
                if !self.before_is_default && Rc::ptr_eq(&criterion, &self.is_value_before) {
                    return false;
                }
                self.is_value_before = criterion;
                self.before_is_default = false;
                true
            }
        }
    }
}

/// Balanced-midpoint shape construction: the node at the middle of the
/// range becomes the subroot, its children are built from the two halves.
/// Height is O(log n) regardless of insertion history.
fn build_shape<T>(
    nodes: &[NodeCoreLink<T>],
    parent: Option<&NodeCoreLink<T>>,
) -> Option<NodeCoreLink<T>> {
    if nodes.is_empty() {
        return None;
    }
    let middle = (nodes.len() - 1) / 2;
    let node = Rc::clone(&nodes[middle]);
    node.borrow_mut().parent = parent.map(Rc::downgrade);
    let left = build_shape(&nodes[..middle], Some(&node));
    let right = build_shape(&nodes[middle + 1..], Some(&node));
    {
        let mut core = node.borrow_mut();
        core.left = left;
        core.right = right;
    }
    Some(node)
}

// =============================================================================
// Tree Handle
// =============================================================================

/// A sorted, deduplicated collection of values exposing tracked node
/// handles.
///
/// The tree is a cheap-to-clone shared handle; clones refer to the same
/// collection. All mutation runs to completion synchronously — the model
/// is single-actor, which is why the handle is neither `Send` nor `Sync`.
///
/// # Examples
///
/// ```rust
/// use sortree::tree::SortedTree;
///
/// let tree = SortedTree::from_values([3, 1, 2, 3, 1]);
/// assert_eq!(tree.values(), vec![1, 2, 3]);
///
/// // Duplicate insertion is a no-op.
/// assert!(tree.insert(2).is_none());
///
/// // A returned handle tracks its entry across mutations.
/// let node = tree.insert(10).unwrap();
/// tree.insert(0);
/// assert_eq!(node.order_index(), 4);
/// ```
pub struct SortedTree<T> {
    pub(in crate::tree) core: TreeCoreLink<T>,
}

impl<T> Clone for SortedTree<T> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<T: PartialOrd> SortedTree<T> {
    /// Creates an empty tree with the default criteria (`==` and `<`).
    #[must_use]
    pub fn new() -> Self {
        Self::with_options(std::iter::empty(), TreeOptions::default())
    }

    /// Creates a tree from an iterable of values, sorted and deduplicated
    /// under the default criteria.
    pub fn from_values<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        Self::with_options(values, TreeOptions::default())
    }

    /// Creates a tree from an iterable of values and explicit options.
    pub fn with_options<I>(values: I, options: TreeOptions<T>) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let same_is_default = options.is_same_value.is_none();
        let before_is_default = options.is_value_before.is_none();
        let core = TreeCore {
            nodes: Vec::new(),
            is_same_value: options.is_same_value.unwrap_or_else(default_is_same_value),
            is_value_before: options
                .is_value_before
                .unwrap_or_else(default_is_value_before),
            same_is_default,
            before_is_default,
            shape_stale: false,
            shape_root: None,
            cleanup_watchers: Vec::new(),
            disposing: false,
        };
        let tree = Self {
            core: Rc::new(RefCell::new(core)),
        };
        tree.set_values(values);
        tree
    }
}

impl<T: PartialOrd> Default for SortedTree<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> SortedTree<T> {
    pub(in crate::tree) fn from_core(core: TreeCoreLink<T>) -> Self {
        Self { core }
    }

    // -------------------------------------------------------------------------
    // Observation
    // -------------------------------------------------------------------------

    /// The number of live nodes.
    pub fn len(&self) -> usize {
        self.core.borrow().nodes.len()
    }

    /// Whether the tree holds no live nodes.
    pub fn is_empty(&self) -> bool {
        self.core.borrow().nodes.is_empty()
    }

    /// The live values in order.
    pub fn values(&self) -> Vec<T>
    where
        T: Clone,
    {
        self.core
            .borrow()
            .nodes
            .iter()
            .map(|node| node.borrow().value.clone())
            .collect()
    }

    /// Whether an entry equal to `value` (under the equality criterion)
    /// is live in the tree.
    pub fn contains(&self, value: &T) -> bool {
        self.index_of(value).is_some()
    }

    /// The live node equal to `value`, if any.
    pub fn get(&self, value: &T) -> Option<TreeNode<T>> {
        let core = self.core.borrow();
        let index = self.index_in(&core, value)?;
        Some(TreeNode::from_core(Rc::clone(&core.nodes[index])))
    }

    /// The first (smallest) live node.
    pub fn first(&self) -> Option<TreeNode<T>> {
        let core = self.core.borrow();
        core.nodes.first().map(|node| TreeNode::from_core(Rc::clone(node)))
    }

    /// The last (largest) live node.
    pub fn last(&self) -> Option<TreeNode<T>> {
        let core = self.core.borrow();
        core.nodes.last().map(|node| TreeNode::from_core(Rc::clone(node)))
    }

    /// The live node at an order index.
    pub fn node_at(&self, index: usize) -> Option<TreeNode<T>> {
        let core = self.core.borrow();
        core.nodes
            .get(index)
            .map(|node| TreeNode::from_core(Rc::clone(node)))
    }

    /// Whether `node` is associated with this tree (live or detached).
    pub fn contains_node(&self, node: &TreeNode<T>) -> bool {
        node.tree().is_some_and(|owner| owner.same_tree(self))
    }

    /// Whether two handles refer to the same tree.
    pub fn same_tree(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.core, &other.core)
    }

    /// Whether a structural write has outdated the derived shape.
    pub fn is_shape_stale(&self) -> bool {
        self.core.borrow().shape_stale
    }

    // -------------------------------------------------------------------------
    // Search
    // -------------------------------------------------------------------------

    fn index_in(&self, core: &TreeCore<T>, value: &T) -> Option<usize> {
        if core.nodes.is_empty() {
            return None;
        }
        core.search_range(value, 0, core.nodes.len() - 1)
    }

    /// Binary search for `value` over the whole array; the matching
    /// node's order index, or `None`.
    pub fn index_of(&self, value: &T) -> Option<usize> {
        let core = self.core.borrow();
        self.index_in(&core, value)
    }

    /// Binary search restricted to `[start, end]`.
    ///
    /// Negative indices resolve against the tree size, clamping at zero
    /// if still negative; a start at or past the size answers `None`
    /// immediately; an end past the size clamps to the last valid index.
    pub fn index_of_within(&self, value: &T, start: isize, end: isize) -> Option<usize> {
        let core = self.core.borrow();
        let len = core.nodes.len();
        if len == 0 {
            return None;
        }
        let low = if start < 0 {
            usize::try_from((len as isize + start).max(0)).unwrap_or(0)
        } else {
            usize::try_from(start).unwrap_or(usize::MAX)
        };
        if low >= len {
            return None;
        }
        let high = if end < 0 {
            usize::try_from((len as isize + end).max(0)).unwrap_or(0)
        } else {
            usize::try_from(end).unwrap_or(usize::MAX).min(len - 1)
        };
        if low > high {
            return None;
        }
        core.search_range(value, low, high)
    }

    // -------------------------------------------------------------------------
    // Mutation
    // -------------------------------------------------------------------------

    /// Inserts a value, keeping the array sorted and deduplicated.
    ///
    /// Returns the new live node's handle, or `None` when an equal entry
    /// already exists (the insert is then a no-op).
    pub fn insert(&self, value: T) -> Option<TreeNode<T>> {
        let weak = Rc::downgrade(&self.core);
        let mut core = self.core.borrow_mut();
        match core.insertion_point(&value) {
            InsertionPoint::Occupied => None,
            InsertionPoint::Vacant(index) => {
                let node = Rc::new(RefCell::new(NodeCore::new_live(value, weak)));
                core.nodes.insert(index, Rc::clone(&node));
                core.renumber_from(index);
                core.shape_stale = true;
                Some(TreeNode::from_core(node))
            }
        }
    }

    /// Brings a node handle into this tree.
    ///
    /// - A free node is associated with this tree and joined.
    /// - A node already live here is left alone.
    /// - A detached node is joined (or, mid-`join`, spliced directly into
    ///   its recomputed position — the re-entrant branch the node-side
    ///   state machine delegates to).
    ///
    /// # Errors
    ///
    /// [`TreeError::TreeMismatch`] when the node belongs to a different
    /// tree. Move it with [`TreeNode::set_tree`] instead.
    pub fn insert_node(&self, node: &TreeNode<T>) -> Result<(), TreeError> {
        let association = node.core.borrow().tree.clone();
        match association.and_then(|weak| weak.upgrade()) {
            None => {
                {
                    let mut record = node.core.borrow_mut();
                    record.tree = Some(Rc::downgrade(&self.core));
                    record.detached = true;
                }
                let joined = node.join()?;
                if !joined {
                    self.core.borrow_mut().watch_for_cleanup(&node.core);
                }
                Ok(())
            }
            Some(owner) if !Rc::ptr_eq(&owner, &self.core) => Err(TreeError::TreeMismatch),
            Some(_) => {
                let (detached, phase) = {
                    let record = node.core.borrow();
                    (record.detached, record.phase)
                };
                if !detached {
                    Ok(())
                } else if phase == TransitionPhase::Joining {
                    self.splice_in_detached(node);
                    Ok(())
                } else {
                    node.join().map(|_| ())
                }
            }
        }
    }

    /// The mid-`join` splice: inserts a detached node of this tree at its
    /// recomputed position without touching the cleanup registry (the
    /// delegating `join` handles that). `false` when an equal resident
    /// entry wins.
    fn splice_in_detached(&self, node: &TreeNode<T>) -> bool {
        let mut core = self.core.borrow_mut();
        let point = {
            let record = node.core.borrow();
            core.insertion_point(&record.value)
        };
        match point {
            InsertionPoint::Occupied => false,
            InsertionPoint::Vacant(index) => {
                core.nodes.insert(index, Rc::clone(&node.core));
                core.renumber_from(index);
                core.shape_stale = true;
                drop(core);
                node.core.borrow_mut().detached = false;
                true
            }
        }
    }

    /// Removes the entry equal to `value`, fully freeing its node.
    ///
    /// `false` when the tree is empty or no such entry exists.
    pub fn remove(&self, value: &T) -> bool {
        let found = {
            let core = self.core.borrow();
            if core.nodes.is_empty() {
                return false;
            }
            let last = core.nodes.len() - 1;
            core.search_range(value, 0, last)
                .map(|index| Rc::clone(&core.nodes[index]))
        };
        match found {
            None => false,
            Some(link) => {
                TreeNode::from_core(link).free();
                true
            }
        }
    }

    /// Takes a node handle out of this tree.
    ///
    /// Outside a transition this is a full [`TreeNode::free`]; while the
    /// node-side state machine is mid-`detach`/`free` it is the direct
    /// array splice that those operations delegate to.
    ///
    /// # Errors
    ///
    /// [`TreeError::TreeMismatch`] when the node belongs to a different
    /// tree (or to none).
    pub fn remove_node(&self, node: &TreeNode<T>) -> Result<(), TreeError> {
        let association = node.core.borrow().tree.clone();
        match association.and_then(|weak| weak.upgrade()) {
            Some(owner) if Rc::ptr_eq(&owner, &self.core) => {}
            _ => return Err(TreeError::TreeMismatch),
        }
        let (detached, phase) = {
            let record = node.core.borrow();
            (record.detached, record.phase)
        };
        if matches!(
            phase,
            TransitionPhase::Detaching | TransitionPhase::Disassociating
        ) {
            if !detached {
                let mut core = self.core.borrow_mut();
                if let Some(index) = core.position_of(&node.core) {
                    core.nodes.remove(index);
                    core.renumber_from(index);
                    core.shape_stale = true;
                }
            }
            Ok(())
        } else {
            node.free();
            Ok(())
        }
    }

    /// Re-positions a live node after its value changed.
    ///
    /// Called automatically by [`TreeNode::set_value`]; call it manually
    /// after mutating a value in place through other means. No-op for
    /// detached nodes or nodes of other trees.
    ///
    /// When the new value equals an existing different entry, the node
    /// loses: it is spliced out and left associated-but-detached, and the
    /// indices between its old and would-be positions keep their old
    /// numbers — the node never got re-inserted, and order indices are
    /// only authoritative for live nodes.
    pub fn synchronize(&self, node: &TreeNode<T>) {
        let owner = node.core.borrow().tree.clone().and_then(|weak| weak.upgrade());
        if !owner.is_some_and(|owner| Rc::ptr_eq(&owner, &self.core)) {
            return;
        }
        if node.core.borrow().detached {
            return;
        }
        let mut core = self.core.borrow_mut();
        let Some(old_index) = core.position_of(&node.core) else {
            return;
        };
        core.nodes.remove(old_index);
        let point = {
            let record = node.core.borrow();
            core.insertion_point(&record.value)
        };
        match point {
            InsertionPoint::Occupied => {
                core.shape_stale = true;
                core.watch_for_cleanup(&node.core);
                drop(core);
                let mut record = node.core.borrow_mut();
                record.detached = true;
                record.clear_shape_links();
            }
            InsertionPoint::Vacant(index) if index == old_index => {
                // Same slot: splice straight back in, nothing to renumber.
                core.nodes.insert(old_index, Rc::clone(&node.core));
            }
            InsertionPoint::Vacant(index) => {
                core.nodes.insert(index, Rc::clone(&node.core));
                let low = old_index.min(index);
                let high = old_index.max(index);
                core.renumber_range(low, high);
                core.shape_stale = true;
            }
        }
    }

    /// Replaces the live set wholesale.
    ///
    /// Every element is wrapped in a new node, the set is sorted and
    /// deduplicated (first occurrence in sorted order wins; ties are
    /// broken arbitrarily), and every previously-live node is freed.
    /// Detached nodes are unaffected — they survive replacement of the
    /// live set, their order indices now stale.
    ///
    /// If the computed sequence is element-for-element equal (under the
    /// equality criterion) to the current one, the whole assignment is a
    /// no-op: no node churn, no rebuild scheduled. An empty iterable
    /// clears the tree.
    pub fn set_values<I>(&self, values: I)
    where
        I: IntoIterator<Item = T>,
    {
        let weak = Rc::downgrade(&self.core);
        let mut incoming: Vec<NodeCoreLink<T>> = values
            .into_iter()
            .map(|value| Rc::new(RefCell::new(NodeCore::new_live(value, weak.clone()))))
            .collect();
        {
            let core = self.core.borrow();
            incoming.sort_unstable_by(|a, b| {
                let a = a.borrow();
                let b = b.borrow();
                core.compare(&a.value, &b.value)
            });
            incoming.dedup_by(|second, first| {
                let second = second.borrow();
                let first = first.borrow();
                core.compare(&first.value, &second.value) == Ordering::Equal
            });
            let identical = incoming.len() == core.nodes.len()
                && incoming.iter().zip(core.nodes.iter()).all(|(new, old)| {
                    (core.is_same_value)(&new.borrow().value, &old.borrow().value)
                });
            if identical {
                return;
            }
        }
        let previous = {
            let mut core = self.core.borrow_mut();
            std::mem::take(&mut core.nodes)
        };
        for node in &previous {
            let mut record = node.borrow_mut();
            record.tree = None;
            record.detached = true;
            record.phase = TransitionPhase::Complete;
            record.clear_shape_links();
        }
        let mut core = self.core.borrow_mut();
        core.nodes = incoming;
        core.renumber_from(0);
        core.shape_root = None;
        core.shape_stale = true;
    }

    /// Clears the tree, freeing every live node.
    pub fn clear(&self) {
        self.set_values(std::iter::empty());
    }

    // -------------------------------------------------------------------------
    // Criteria
    // -------------------------------------------------------------------------

    /// Replaces one or both criteria.
    ///
    /// Re-assigning a criterion its current setting (default over
    /// default, or the pointer-identical custom closure) changes nothing.
    /// Any effective change re-runs the bulk assignment over the current
    /// value sequence, so the tree re-sorts and re-dedupes under the new
    /// criteria — live node handles are replaced in the process, exactly
    /// as with [`set_values`](Self::set_values).
    pub fn set_criteria(&self, update: CriteriaUpdate<T>)
    where
        T: Clone + PartialOrd,
    {
        let mut changed = false;
        {
            let mut core = self.core.borrow_mut();
            if let Some(setting) = update.is_same_value {
                changed |= core.apply_same_value(setting);
            }
            if let Some(setting) = update.is_value_before {
                changed |= core.apply_value_before(setting);
            }
        }
        if changed {
            let current: Vec<T> = {
                self.core
                    .borrow()
                    .nodes
                    .iter()
                    .map(|node| node.borrow().value.clone())
                    .collect()
            };
            self.set_values(current);
        }
    }

    /// Replaces the equality criterion only.
    pub fn set_is_same_value(&self, setting: CriterionSetting<T>)
    where
        T: Clone + PartialOrd,
    {
        self.set_criteria(CriteriaUpdate {
            is_same_value: Some(setting),
            is_value_before: None,
        });
    }

    /// Replaces the ordering criterion only.
    pub fn set_is_value_before(&self, setting: CriterionSetting<T>)
    where
        T: Clone + PartialOrd,
    {
        self.set_criteria(CriteriaUpdate {
            is_same_value: None,
            is_value_before: Some(setting),
        });
    }

    // -------------------------------------------------------------------------
    // Shape
    // -------------------------------------------------------------------------

    /// Rebuilds the derived shape if a write left it stale; a no-op
    /// otherwise.
    ///
    /// The previous shape is discarded entirely — shape links are not
    /// durable identity — and replaced by a balanced-midpoint partition
    /// of the current array, giving O(log n) height regardless of
    /// insertion history.
    pub fn rotate(&self) {
        let mut core = self.core.borrow_mut();
        if !core.shape_stale {
            return;
        }
        let root = build_shape(&core.nodes, None);
        core.shape_root = root;
        core.shape_stale = false;
    }

    // -------------------------------------------------------------------------
    // Traversal
    // -------------------------------------------------------------------------

    /// A lazy traversal per `options`; see [`TraversalOptions`].
    ///
    /// Forces a rebuild of a stale shape first, then borrows nothing for
    /// longer than each step.
    pub fn traversal(&self, options: TraversalOptions) -> TreeTraversalIterator<T> {
        self.rotate();
        TreeTraversalIterator::new(&self.core, options)
    }

    /// In-order, left-to-right iteration over the live node handles.
    pub fn iter(&self) -> TreeTraversalIterator<T> {
        self.traversal(TraversalOptions::new())
    }

    /// Materializes a traversal into a vector of node handles.
    pub fn traverse(&self, options: TraversalOptions) -> Vec<TreeNode<T>> {
        self.traversal(options).collect()
    }

    /// Invokes `callback` once per visited node.
    pub fn traverse_with<F>(&self, options: TraversalOptions, mut callback: F)
    where
        F: FnMut(&TreeNode<T>),
    {
        for node in self.traversal(options) {
            callback(&node);
        }
    }

    // -------------------------------------------------------------------------
    // Cleanup
    // -------------------------------------------------------------------------

    /// Releases every registered detached node deterministically.
    ///
    /// Fires the cleanup notification: each detached node still
    /// registered frees itself. While this runs, the per-node array
    /// removal and registry deregistration inside `free` are skipped —
    /// the array no longer holds those nodes and the registry is being
    /// drained wholesale.
    ///
    /// Call this before discarding the last handle to a tree whose
    /// detached nodes are still referenced elsewhere; dropping the tree
    /// without it leaves them observable only as free.
    pub fn cleanup(&self) {
        self.core.borrow_mut().disposing = true;
        let watchers: Vec<WeakNodeCoreLink<T>> = {
            let mut core = self.core.borrow_mut();
            core.cleanup_watchers.drain(..).collect()
        };
        for watcher in watchers {
            if let Some(link) = watcher.upgrade() {
                TreeNode::from_core(link).free();
            }
        }
        self.core.borrow_mut().disposing = false;
    }
}

impl<T: std::fmt::Debug> std::fmt::Debug for SortedTree<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let core = self.core.borrow();
        let mut list = formatter.debug_list();
        for node in &core.nodes {
            list.entry(&node.borrow().value);
        }
        list.finish()
    }
}
