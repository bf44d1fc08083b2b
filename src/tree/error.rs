//! Error types for tree and node operations.
//!
//! Every failure in this crate is reported synchronously through
//! [`TreeError`] at the point of the offending call; nothing is retried
//! internally. The `Display` texts are part of the public contract —
//! callers may match on them — so they are kept verbatim stable.

use static_assertions::assert_impl_all;

/// Represents a contextually invalid node or tree argument.
///
/// Structurally invalid arguments (a non-node object, a non-function
/// criterion, and so on) cannot be expressed against this API in the first
/// place; what remains are the contextual misuses below.
///
/// # Examples
///
/// ```rust
/// use sortree::tree::TreeError;
///
/// assert_eq!(format!("{}", TreeError::NoTree), "cannot join: no tree");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeError {
    /// The node belongs to a different tree (or to no tree at all) than
    /// the one being operated on.
    TreeMismatch,
    /// `join` was called on a node with no owning tree.
    NoTree,
    /// The tree association was assigned `None` directly; clearing the
    /// association must go through `free`.
    CannotUnsetTree,
}

impl std::fmt::Display for TreeError {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::TreeMismatch => write!(formatter, "tree mismatch"),
            Self::NoTree => write!(formatter, "cannot join: no tree"),
            Self::CannotUnsetTree => write!(formatter, "cannot directly unset tree"),
        }
    }
}

impl std::error::Error for TreeError {}

assert_impl_all!(TreeError: std::error::Error, Send, Sync, Clone, Copy);
