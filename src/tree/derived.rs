//! Derived accumulations
//!
//! Standard tree computations expressed with the skeleton primitives, in
//! sequential and distributed form. They double as worked examples of the
//! strategy types.

use crate::comm::ProcessGroup;
use crate::tree::btree::BTree;
use crate::tree::dist::DistTree;
use crate::tree::ops::{ReduceFns, StepFns};
use crate::SkeletonError;

fn depth_steps() -> StepFns<impl Fn(&i64, &i64) -> i64, impl Fn(&i64, &i64) -> i64> {
    StepFns::new(|new: &i64, _: &i64| new + 1, |new: &i64, _: &i64| new + 1)
}

fn prefix_steps() -> StepFns<impl Fn(&i64, &i64) -> i64, impl Fn(&i64, &i64) -> i64> {
    StepFns::new(|new: &i64, old: &i64| new + old, |new: &i64, old: &i64| new + old)
}

fn sum_ops() -> ReduceFns<impl Fn(&i64) -> i64, impl Fn(i64, &i64, i64) -> i64> {
    ReduceFns::new(|value: &i64| *value, |l: i64, value: &i64, r: i64| l + value + r)
}

/// Each node's depth, root at 0.
pub fn depths(tree: &BTree<i64>) -> BTree<i64> {
    tree.downward_accumulate(&depth_steps(), 0)
}

/// Each node's sum of strict-ancestor values.
pub fn ancestor_sums(tree: &BTree<i64>) -> BTree<i64> {
    tree.downward_accumulate(&prefix_steps(), 0)
}

/// Each node's subtree total.
pub fn subtree_sums(tree: &BTree<i64>) -> BTree<i64> {
    tree.upward_accumulate(&|l: &i64, v: &i64, r: &i64| l + v + r)
}

/// Distributed counterpart of [`depths`].
pub fn dist_depths<G>(tree: &DistTree<i64, G>) -> Result<DistTree<i64, G>, SkeletonError>
where
    G: ProcessGroup + Clone,
{
    tree.downward_accumulate(&depth_steps(), 0)
}

/// Distributed counterpart of [`ancestor_sums`].
pub fn dist_ancestor_sums<G>(tree: &DistTree<i64, G>) -> Result<DistTree<i64, G>, SkeletonError>
where
    G: ProcessGroup + Clone,
{
    tree.downward_accumulate(&prefix_steps(), 0)
}

/// Distributed counterpart of [`subtree_sums`].
pub fn dist_subtree_sums<G>(tree: &DistTree<i64, G>) -> Result<DistTree<i64, G>, SkeletonError>
where
    G: ProcessGroup + Clone,
{
    tree.upward_accumulate(&sum_ops())
}
