//! Pluggable comparison policy.
//!
//! A tree orders and deduplicates its values through two criteria: an
//! equality criterion (`is_same_value`) and an ordering criterion
//! (`is_value_before`). Every search and insertion decision in the crate
//! is funneled through the single 3-way comparison built from this pair —
//! values are never compared directly — so replacing the criteria fully
//! controls ordering.
//!
//! Criteria are shared closures ([`Criterion`]); closure identity
//! (`Rc::ptr_eq`) is what makes "setting a criterion back to its existing
//! value" detectable as a no-op. The consistency of a custom pair is the
//! caller's responsibility: a non-transitive or contradictory pair
//! produces an unspecified (but memory-safe) ordering.

use std::rc::Rc;

/// A shared comparison closure over two values.
///
/// Used both for equality (`is_same_value`) and ordering
/// (`is_value_before`). Criteria must be pure: re-entering the owning tree
/// from inside a criterion is a usage error.
pub type Criterion<T> = Rc<dyn Fn(&T, &T) -> bool>;

/// The default equality criterion: the language's `==`.
pub(in crate::tree) fn default_is_same_value<T: PartialOrd>() -> Criterion<T> {
    Rc::new(|a: &T, b: &T| a == b)
}

/// The default ordering criterion: the language's `<`.
///
/// A pair on which `<` holds in neither direction (for example `f64::NAN`
/// against anything) never compares "before", so such values fall through
/// to the append side of every placement decision.
pub(in crate::tree) fn default_is_value_before<T: PartialOrd>() -> Criterion<T> {
    Rc::new(|a: &T, b: &T| a < b)
}

/// One criterion assignment: either the built-in default or a custom
/// closure.
///
/// `Default` is the reset sentinel; assigning it over an already-default
/// criterion is a no-op, as is assigning a `Custom` closure that is
/// pointer-identical to the active one.
#[derive(Clone)]
pub enum CriterionSetting<T> {
    /// Reset the criterion to the built-in default.
    Default,
    /// Install a custom criterion.
    Custom(Criterion<T>),
}

impl<T> std::fmt::Debug for CriterionSetting<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Default => formatter.write_str("CriterionSetting::Default"),
            Self::Custom(_) => formatter.write_str("CriterionSetting::Custom(..)"),
        }
    }
}

/// A partial criteria replacement.
///
/// Fields left as `None` keep the corresponding criterion unchanged. Any
/// effective change re-sorts and re-dedupes the tree from its current
/// value sequence.
///
/// # Examples
///
/// ```rust
/// use std::rc::Rc;
/// use sortree::tree::{CriteriaUpdate, CriterionSetting, SortedTree};
///
/// let tree = SortedTree::from_values([1, 5, 3]);
/// tree.set_criteria(CriteriaUpdate {
///     is_value_before: Some(CriterionSetting::Custom(Rc::new(|a: &i32, b: &i32| a > b))),
///     ..CriteriaUpdate::unchanged()
/// });
/// assert_eq!(tree.values(), vec![5, 3, 1]);
/// ```
#[derive(Debug, Clone)]
pub struct CriteriaUpdate<T> {
    /// Replacement for the equality criterion, if any.
    pub is_same_value: Option<CriterionSetting<T>>,
    /// Replacement for the ordering criterion, if any.
    pub is_value_before: Option<CriterionSetting<T>>,
}

impl<T> CriteriaUpdate<T> {
    /// An update that changes nothing; combine with struct-update syntax.
    #[must_use]
    pub const fn unchanged() -> Self {
        Self {
            is_same_value: None,
            is_value_before: None,
        }
    }
}

/// Construction options for a tree.
///
/// Criteria left as `None` fall back to the defaults (`==` and `<`).
#[derive(Clone)]
pub struct TreeOptions<T> {
    /// The equality criterion, or `None` for the default.
    pub is_same_value: Option<Criterion<T>>,
    /// The ordering criterion, or `None` for the default.
    pub is_value_before: Option<Criterion<T>>,
}

impl<T> Default for TreeOptions<T> {
    fn default() -> Self {
        Self {
            is_same_value: None,
            is_value_before: None,
        }
    }
}

impl<T> std::fmt::Debug for TreeOptions<T> {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("TreeOptions")
            .field("is_same_value", &self.is_same_value.is_some())
            .field("is_value_before", &self.is_value_before.is_some())
            .finish()
    }
}
