//! Unit tests for SortedTree construction, search, and mutation.

use std::rc::Rc;

use rstest::rstest;
use sortree::tree::{CriteriaUpdate, CriterionSetting, NodeState, SortedTree, TreeError};

// =============================================================================
// Construction Tests
// =============================================================================

#[rstest]
fn test_new_creates_empty_tree() {
    let tree: SortedTree<i32> = SortedTree::new();
    assert!(tree.is_empty());
    assert_eq!(tree.len(), 0);
    assert_eq!(tree.values(), Vec::<i32>::new());
}

#[rstest]
fn test_default_creates_empty_tree() {
    let tree: SortedTree<i32> = SortedTree::default();
    assert!(tree.is_empty());
}

#[rstest]
fn test_construction_sorts_and_dedupes() {
    let tree = SortedTree::from_values([0, 11, 0, 77, 11, 33, 0, 99, 55]);
    assert_eq!(tree.values(), vec![0, 11, 33, 55, 77, 99]);
}

#[rstest]
fn test_construction_from_empty_iterable() {
    let tree = SortedTree::from_values(std::iter::empty::<i32>());
    assert!(tree.is_empty());
}

#[rstest]
fn test_clone_shares_the_same_tree() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let alias = tree.clone();
    alias.insert(4);
    assert_eq!(tree.values(), vec![1, 2, 3, 4]);
    assert!(tree.same_tree(&alias));
}

// =============================================================================
// Insert Tests
// =============================================================================

#[rstest]
fn test_insert_returns_live_handle() {
    let tree = SortedTree::from_values([1, 3]);
    let node = tree.insert(2).unwrap();
    assert_eq!(node.state(), NodeState::Live);
    assert_eq!(node.order_index(), 1);
    assert_eq!(tree.values(), vec![1, 2, 3]);
}

#[rstest]
fn test_insert_duplicate_is_noop() {
    let tree = SortedTree::from_values([1, 2, 3]);
    assert!(tree.insert(2).is_none());
    assert_eq!(tree.values(), vec![1, 2, 3]);
}

#[rstest]
fn test_insert_between_power_of_two_neighbors() {
    let mut values = vec![0];
    values.extend((1..=13).map(|exponent| 1 << exponent));
    let tree = SortedTree::from_values(values);
    tree.insert(11);
    assert_eq!(
        tree.values()[..6],
        [0, 2, 4, 8, 11, 16],
        "11 belongs strictly between 8 and 16"
    );
}

#[rstest]
fn test_insert_below_minimum_prepends() {
    let tree = SortedTree::from_values([10, 20, 30]);
    tree.insert(5);
    assert_eq!(tree.values(), vec![5, 10, 20, 30]);
}

#[rstest]
fn test_insert_above_maximum_appends() {
    let tree = SortedTree::from_values([10, 20, 30]);
    tree.insert(40);
    assert_eq!(tree.values(), vec![10, 20, 30, 40]);
}

#[rstest]
fn test_insert_renumbers_following_nodes() {
    let tree = SortedTree::from_values([10, 20, 30]);
    let last = tree.get(&30).unwrap();
    tree.insert(15);
    assert_eq!(last.order_index(), 3);
}

// =============================================================================
// Remove Tests
// =============================================================================

#[rstest]
fn test_remove_frees_the_node() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    assert!(tree.remove(&2));
    assert_eq!(tree.values(), vec![1, 3]);
    assert_eq!(node.state(), NodeState::Free);
}

#[rstest]
fn test_remove_missing_value_returns_false() {
    let tree = SortedTree::from_values([1, 2, 3]);
    assert!(!tree.remove(&7));
    assert_eq!(tree.values(), vec![1, 2, 3]);
}

#[rstest]
fn test_remove_on_empty_tree_is_noop() {
    let tree: SortedTree<i32> = SortedTree::new();
    assert!(!tree.remove(&1));
}

// =============================================================================
// Search Tests
// =============================================================================

#[rstest]
fn test_index_of_finds_every_value() {
    let tree = SortedTree::from_values([10, 20, 30, 40]);
    assert_eq!(tree.index_of(&10), Some(0));
    assert_eq!(tree.index_of(&30), Some(2));
    assert_eq!(tree.index_of(&40), Some(3));
    assert_eq!(tree.index_of(&25), None);
}

#[rstest]
fn test_index_of_within_restricts_the_range() {
    let tree = SortedTree::from_values([10, 20, 30, 40, 50]);
    assert_eq!(tree.index_of_within(&10, 1, 4), None);
    assert_eq!(tree.index_of_within(&30, 1, 3), Some(2));
}

#[rstest]
fn test_index_of_within_start_past_size_returns_none() {
    let tree = SortedTree::from_values([10, 20, 30]);
    assert_eq!(tree.index_of_within(&10, 3, 5), None);
}

#[rstest]
fn test_index_of_within_end_past_size_clamps() {
    let tree = SortedTree::from_values([10, 20, 30]);
    assert_eq!(tree.index_of_within(&30, 0, 99), Some(2));
}

#[rstest]
fn test_index_of_within_negative_indices_resolve_from_end() {
    let tree = SortedTree::from_values([10, 20, 30, 40, 50]);
    // start = len - 3 = 2, end = len - 1 = 4
    assert_eq!(tree.index_of_within(&40, -3, -1), Some(3));
    assert_eq!(tree.index_of_within(&10, -3, -1), None);
}

#[rstest]
fn test_index_of_within_overshooting_negative_start_clamps_to_zero() {
    let tree = SortedTree::from_values([10, 20, 30]);
    assert_eq!(tree.index_of_within(&10, -99, 2), Some(0));
}

#[rstest]
fn test_index_of_within_overshooting_negative_end_clamps_to_zero() {
    let tree = SortedTree::from_values([10, 20, 30]);
    assert_eq!(tree.index_of_within(&10, 0, -99), Some(0));
    assert_eq!(tree.index_of_within(&20, 1, -99), None);
}

#[rstest]
fn test_contains_and_get() {
    let tree = SortedTree::from_values([1, 2, 3]);
    assert!(tree.contains(&2));
    assert!(!tree.contains(&9));
    assert_eq!(tree.get(&2).unwrap().value(), 2);
    assert!(tree.get(&9).is_none());
}

#[rstest]
fn test_first_and_last() {
    let tree = SortedTree::from_values([30, 10, 20]);
    assert_eq!(tree.first().unwrap().value(), 10);
    assert_eq!(tree.last().unwrap().value(), 30);
    assert!(SortedTree::<i32>::new().first().is_none());
}

#[rstest]
fn test_node_at_returns_by_order_index() {
    let tree = SortedTree::from_values([10, 20, 30]);
    assert_eq!(tree.node_at(1).unwrap().value(), 20);
    assert!(tree.node_at(3).is_none());
}

// =============================================================================
// Bulk Value Assignment Tests
// =============================================================================

#[rstest]
fn test_set_values_replaces_live_set() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    tree.set_values([9, 7, 7, 5]);
    assert_eq!(tree.values(), vec![5, 7, 9]);
    assert_eq!(node.state(), NodeState::Free);
}

#[rstest]
fn test_set_values_identical_sequence_is_noop() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    tree.rotate();
    tree.set_values([3, 2, 1]);
    assert_eq!(node.state(), NodeState::Live, "no node churn on a no-op");
    assert!(!tree.is_shape_stale(), "no rebuild scheduled on a no-op");
}

#[rstest]
fn test_set_values_spares_detached_nodes() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let detached = tree.get(&2).unwrap();
    detached.detach();
    tree.set_values([10, 20]);
    assert_eq!(detached.state(), NodeState::Detached);
    assert!(tree.contains_node(&detached));
}

#[rstest]
fn test_set_values_empty_clears() {
    let tree = SortedTree::from_values([1, 2, 3]);
    tree.set_values(std::iter::empty());
    assert!(tree.is_empty());
}

#[rstest]
fn test_clear_frees_all_live_nodes() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&1).unwrap();
    tree.clear();
    assert!(tree.is_empty());
    assert_eq!(node.state(), NodeState::Free);
}

// =============================================================================
// Synchronize Tests
// =============================================================================

#[rstest]
fn test_set_value_repositions_the_node() {
    let tree = SortedTree::from_values([0, 3, 6, 9]);
    let node = tree.get(&9).unwrap();
    node.set_value(4);
    assert_eq!(tree.values(), vec![0, 3, 4, 6]);
    assert_eq!(node.state(), NodeState::Live);
    assert_eq!(node.order_index(), 2);
}

#[rstest]
fn test_set_value_to_existing_value_detaches_the_loser() {
    let tree = SortedTree::from_values([0, 3, 6, 9]);
    let node = tree.get(&9).unwrap();
    node.set_value(3);
    assert_eq!(tree.values(), vec![0, 3, 6]);
    assert_eq!(node.state(), NodeState::Detached);
    assert_eq!(node.value(), 3);
}

#[rstest]
fn test_set_value_same_slot_keeps_position() {
    let tree = SortedTree::from_values([0, 3, 6, 9]);
    let node = tree.get(&6).unwrap();
    node.set_value(5);
    assert_eq!(tree.values(), vec![0, 3, 5, 9]);
    assert_eq!(node.order_index(), 2);
}

#[rstest]
fn test_set_value_identical_value_is_noop() {
    let tree = SortedTree::from_values([0, 3, 6, 9]);
    let node = tree.get(&6).unwrap();
    tree.rotate();
    node.set_value(6);
    assert!(!tree.is_shape_stale());
    assert_eq!(tree.values(), vec![0, 3, 6, 9]);
}

#[rstest]
fn test_set_value_on_detached_node_has_no_positional_effect() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    node.detach();
    node.set_value(99);
    assert_eq!(tree.values(), vec![1, 3]);
    assert_eq!(node.value(), 99);
}

#[rstest]
fn test_synchronize_is_noop_for_detached_nodes() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    node.detach();
    tree.synchronize(&node);
    assert_eq!(tree.values(), vec![1, 3]);
    assert_eq!(node.state(), NodeState::Detached);
}

// =============================================================================
// Criteria Tests
// =============================================================================

#[rstest]
fn test_custom_ordering_criterion_reverses_the_tree() {
    let tree = SortedTree::from_values([1, 5, 3]);
    tree.set_is_value_before(CriterionSetting::Custom(Rc::new(|a: &i32, b: &i32| a > b)));
    assert_eq!(tree.values(), vec![5, 3, 1]);
}

#[rstest]
fn test_resetting_ordering_criterion_restores_defaults() {
    let tree = SortedTree::from_values([1, 5, 3]);
    tree.set_is_value_before(CriterionSetting::Custom(Rc::new(|a: &i32, b: &i32| a > b)));
    tree.set_is_value_before(CriterionSetting::Default);
    assert_eq!(tree.values(), vec![1, 3, 5]);
}

#[rstest]
fn test_custom_equality_criterion_rededuplicates() {
    let tree = SortedTree::from_values([10, 11, 20, 21]);
    tree.set_is_same_value(CriterionSetting::Custom(Rc::new(|a: &i32, b: &i32| {
        a / 10 == b / 10
    })));
    // Same-decade entries collapse onto one survivor per run; which one
    // wins the run is a sort tie.
    let values = tree.values();
    assert_eq!(values.len(), 2);
    assert_eq!(values[0] / 10, 1);
    assert_eq!(values[1] / 10, 2);
}

#[rstest]
fn test_reassigning_default_criterion_is_noop() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    tree.set_is_same_value(CriterionSetting::Default);
    assert_eq!(node.state(), NodeState::Live, "no rebuild: nodes keep alive");
}

#[rstest]
fn test_reassigning_identical_custom_criterion_is_noop() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let criterion: Rc<dyn Fn(&i32, &i32) -> bool> = Rc::new(|a: &i32, b: &i32| a > b);
    tree.set_is_value_before(CriterionSetting::Custom(Rc::clone(&criterion)));
    let node = tree.get(&2).unwrap();
    tree.set_is_value_before(CriterionSetting::Custom(criterion));
    assert_eq!(node.state(), NodeState::Live, "identical closure: no churn");
}

#[rstest]
fn test_criteria_change_replaces_live_handles() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    tree.set_criteria(CriteriaUpdate {
        is_value_before: Some(CriterionSetting::Custom(Rc::new(|a: &i32, b: &i32| a > b))),
        ..CriteriaUpdate::unchanged()
    });
    assert_eq!(node.state(), NodeState::Free, "rebuild frees previous nodes");
    assert_eq!(tree.values(), vec![3, 2, 1]);
}

// =============================================================================
// Node Argument Validation Tests
// =============================================================================

#[rstest]
fn test_insert_node_from_another_tree_is_a_mismatch() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let other = SortedTree::from_values([7, 8]);
    let foreign = other.get(&7).unwrap();
    assert_eq!(tree.insert_node(&foreign), Err(TreeError::TreeMismatch));
}

#[rstest]
fn test_remove_node_from_another_tree_is_a_mismatch() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let other = SortedTree::from_values([7, 8]);
    let foreign = other.get(&7).unwrap();
    assert_eq!(tree.remove_node(&foreign), Err(TreeError::TreeMismatch));
}

#[rstest]
fn test_insert_node_already_live_here_is_noop() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    assert_eq!(tree.insert_node(&node), Ok(()));
    assert_eq!(tree.values(), vec![1, 2, 3]);
}

#[rstest]
fn test_insert_node_adopts_a_free_node() {
    let source = SortedTree::from_values([1, 2, 3]);
    let node = source.get(&2).unwrap();
    node.free();

    let target = SortedTree::from_values([10, 20]);
    assert_eq!(target.insert_node(&node), Ok(()));
    assert_eq!(node.state(), NodeState::Live);
    assert_eq!(target.values(), vec![2, 10, 20]);
    assert_eq!(source.values(), vec![1, 3]);
}

#[rstest]
fn test_remove_node_detaches_nothing_for_detached_node() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let node = tree.get(&2).unwrap();
    node.detach();
    // A detached node still belongs to the tree; removing it frees it.
    assert_eq!(tree.remove_node(&node), Ok(()));
    assert_eq!(node.state(), NodeState::Free);
    assert_eq!(tree.values(), vec![1, 3]);
}

// =============================================================================
// Deferred Rebuild Tests
// =============================================================================

#[rstest]
fn test_writes_mark_the_shape_stale() {
    let tree = SortedTree::from_values([1, 2, 3]);
    assert!(tree.is_shape_stale());
    tree.rotate();
    assert!(!tree.is_shape_stale());
    tree.insert(4);
    assert!(tree.is_shape_stale());
}

#[rstest]
fn test_shape_reads_resolve_staleness() {
    let tree = SortedTree::from_values([1, 2, 3]);
    let _ = tree.traversal(Default::default()).count();
    assert!(!tree.is_shape_stale());
}

#[rstest]
fn test_write_bursts_coalesce_into_one_rebuild() {
    let tree: SortedTree<i32> = SortedTree::new();
    for value in 0..100 {
        tree.insert(value);
    }
    assert!(tree.is_shape_stale());
    let root = tree.node_at(0).unwrap().parent();
    assert!(root.is_some());
    assert!(!tree.is_shape_stale());
}
