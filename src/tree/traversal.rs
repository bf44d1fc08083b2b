//! Tree-wide traversal.
//!
//! [`TraversalOptions`] selects a direction (left-to-right or mirrored),
//! a visitation order (in-, pre-, or post-order), an optional starting
//! node, and an optional length cap. In-order traversal is serviced
//! straight from the flat ordered array — a bounded slice scan, no shape
//! needed for the visit itself — while pre- and post-order run as
//! explicit-stack walks over the derived shape. Every traversal entry
//! point rebuilds a stale shape first.
//!
//! Iterators are lazy, finite, and restartable: each call to
//! [`SortedTree::traversal`](super::SortedTree::traversal) produces a
//! fresh, independent sequence of node handles.

use std::rc::Rc;

use smallvec::SmallVec;

use super::node::TreeNode;
use super::{NodeCoreLink, TreeCoreLink};

// =============================================================================
// Options
// =============================================================================

/// Which way a traversal sweeps across the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalDirection {
    /// Mirrored: right subtrees before left, descending value order for
    /// in-order.
    Left,
    /// Left-to-right, ascending value order for in-order. The default.
    Right,
}

/// The visitation order of a traversal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraversalOrder {
    /// Children around the node: the sorted sequence itself. The default.
    InOrder,
    /// Node before its subtrees.
    PreOrder,
    /// Subtrees before their node.
    PostOrder,
}

/// Options for [`SortedTree::traversal`](super::SortedTree::traversal).
///
/// `start` names the node — by order index, negative values resolving
/// from the end — at which emission begins within the requested order's
/// full visitation sequence; the walk continues from there across subtree
/// boundaries to the end of that sequence. A `start` that resolves
/// outside the array yields an empty sequence, as does
/// `max_length = Some(0)`.
///
/// # Examples
///
/// ```rust
/// use sortree::tree::{SortedTree, TraversalOptions, TraversalOrder};
///
/// let tree = SortedTree::from_values([1, 2, 3, 4, 5, 6, 7]);
/// let preorder: Vec<i32> = tree
///     .traversal(TraversalOptions::new().order(TraversalOrder::PreOrder))
///     .map(|node| node.value())
///     .collect();
/// assert_eq!(preorder, vec![4, 2, 1, 3, 6, 5, 7]);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TraversalOptions {
    pub(in crate::tree) direction: TraversalDirection,
    pub(in crate::tree) order: TraversalOrder,
    pub(in crate::tree) start: Option<isize>,
    pub(in crate::tree) max_length: Option<usize>,
}

impl TraversalOptions {
    /// The defaults: in-order, left-to-right, whole tree.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            direction: TraversalDirection::Right,
            order: TraversalOrder::InOrder,
            start: None,
            max_length: None,
        }
    }

    /// Sets the sweep direction.
    #[must_use]
    pub const fn direction(mut self, direction: TraversalDirection) -> Self {
        self.direction = direction;
        self
    }

    /// Sets the visitation order.
    #[must_use]
    pub const fn order(mut self, order: TraversalOrder) -> Self {
        self.order = order;
        self
    }

    /// Sets the starting node by order index; negative resolves from the
    /// end.
    #[must_use]
    pub const fn start(mut self, start: isize) -> Self {
        self.start = Some(start);
        self
    }

    /// Caps the number of yielded nodes.
    #[must_use]
    pub const fn max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }
}

impl Default for TraversalOptions {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Iterator
// =============================================================================

enum Mode<T> {
    InOrder {
        tree: TreeCoreLink<T>,
        cursor: Option<usize>,
        descending: bool,
    },
    PreOrder {
        stack: SmallVec<[NodeCoreLink<T>; 16]>,
        left_first: bool,
    },
    PostOrder {
        stack: SmallVec<[(NodeCoreLink<T>, bool); 16]>,
        left_first: bool,
    },
}

/// A lazy traversal over a tree's nodes.
///
/// Produced by [`SortedTree::traversal`](super::SortedTree::traversal)
/// and [`SortedTree::iter`](super::SortedTree::iter).
pub struct TreeTraversalIterator<T> {
    mode: Mode<T>,
    /// Emission begins once this node is reached; `None` from the start.
    awaiting: Option<NodeCoreLink<T>>,
    remaining: usize,
}

impl<T> TreeTraversalIterator<T> {
    /// The caller is responsible for having rebuilt a stale shape.
    pub(in crate::tree) fn new(tree: &TreeCoreLink<T>, options: TraversalOptions) -> Self {
        let core = tree.borrow();
        let len = core.nodes.len();
        let left_first = options.direction == TraversalDirection::Right;

        // Resolve the starting node, mirroring index-search semantics:
        // negative resolves against len and clamps at zero, past-the-end
        // empties the traversal.
        let mut exhausted = len == 0;
        let start_index = options.start.and_then(|start| {
            let resolved = if start < 0 {
                (len as isize + start).max(0)
            } else {
                start
            };
            let resolved = usize::try_from(resolved).unwrap_or(0);
            if resolved >= len {
                exhausted = true;
                None
            } else {
                Some(resolved)
            }
        });

        let mode = match options.order {
            TraversalOrder::InOrder => {
                let cursor = if exhausted {
                    None
                } else {
                    Some(start_index.unwrap_or(if left_first { 0 } else { len - 1 }))
                };
                Mode::InOrder {
                    tree: Rc::clone(tree),
                    cursor,
                    descending: !left_first,
                }
            }
            TraversalOrder::PreOrder => {
                let mut stack = SmallVec::new();
                if let Some(root) = &core.shape_root {
                    stack.push(Rc::clone(root));
                }
                Mode::PreOrder { stack, left_first }
            }
            TraversalOrder::PostOrder => {
                let mut stack = SmallVec::new();
                if let Some(root) = &core.shape_root {
                    stack.push((Rc::clone(root), false));
                }
                Mode::PostOrder { stack, left_first }
            }
        };

        // In-order consumes the start via its cursor; the shape walks
        // skip until the starting node comes up in sequence.
        let awaiting = match options.order {
            TraversalOrder::InOrder => None,
            _ => start_index.map(|index| Rc::clone(&core.nodes[index])),
        };

        Self {
            mode,
            awaiting,
            remaining: if exhausted {
                0
            } else {
                options.max_length.unwrap_or(usize::MAX)
            },
        }
    }

    fn advance(&mut self) -> Option<NodeCoreLink<T>> {
        match &mut self.mode {
            Mode::InOrder {
                tree,
                cursor,
                descending,
            } => {
                let index = (*cursor)?;
                let link = tree.borrow().nodes.get(index).cloned()?;
                *cursor = if *descending {
                    index.checked_sub(1)
                } else {
                    Some(index + 1)
                };
                Some(link)
            }
            Mode::PreOrder { stack, left_first } => {
                let node = stack.pop()?;
                let (left, right) = {
                    let core = node.borrow();
                    (core.left.clone(), core.right.clone())
                };
                let (first, second) = if *left_first {
                    (left, right)
                } else {
                    (right, left)
                };
                if let Some(second) = second {
                    stack.push(second);
                }
                if let Some(first) = first {
                    stack.push(first);
                }
                Some(node)
            }
            Mode::PostOrder { stack, left_first } => loop {
                let (node, expanded) = stack.pop()?;
                if expanded {
                    return Some(node);
                }
                let (left, right) = {
                    let core = node.borrow();
                    (core.left.clone(), core.right.clone())
                };
                stack.push((node, true));
                let (first, second) = if *left_first {
                    (left, right)
                } else {
                    (right, left)
                };
                if let Some(second) = second {
                    stack.push((second, false));
                }
                if let Some(first) = first {
                    stack.push((first, false));
                }
            },
        }
    }
}

impl<T> Iterator for TreeTraversalIterator<T> {
    type Item = TreeNode<T>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        loop {
            let candidate = self.advance()?;
            if let Some(target) = &self.awaiting {
                if !Rc::ptr_eq(target, &candidate) {
                    continue;
                }
            }
            self.awaiting = None;
            self.remaining -= 1;
            return Some(TreeNode::from_core(candidate));
        }
    }
}
