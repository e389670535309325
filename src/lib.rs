//! # Parallel algorithmic skeletons over binary trees
//!
//! This library lets application code express tree computations (map,
//! reduce, upward and downward accumulation, structural zip) that execute
//! across a fixed group of cooperating processes under a
//! Bulk-Synchronous-Parallel discipline, without managing partitioning,
//! communication, or synchronization directly.
//!
//! ## How it fits together
//!
//! 1. A [`BTree`] is flattened into a [`LinearTree`]: one spine of
//!    critical boundary nodes plus one [`Segment`] per maximal fully-owned
//!    subtree hanging off it.
//! 2. A [`DistTree`] owns one segment per process and runs every skeleton
//!    as a two-phase algorithm: a purely local pass, one collective where
//!    contraction summaries meet, and (for downward operations) a local
//!    finalize.
//! 3. Combination behavior is passed as named strategies
//!    ([`ReduceOps`], [`DownwardOps`]) rather than positional closures.
//!
//! ## Usage example
//!
//! ```ignore
//! use bramble::{BTree, DistTree, ReduceFns, ThreadGroup};
//!
//! let totals = ThreadGroup::run(3, |group| {
//!     let tree = BTree::node(13, BTree::leaf(47), BTree::leaf(32));
//!     let dist = DistTree::from_tree(&group, &tree, 1);
//!     let sum = ReduceFns::new(|v: &i64| *v, |l, v: &i64, r| l + v + r);
//!     dist.reduce(&sum)
//! });
//! ```

#![warn(missing_docs, missing_debug_implementations)]

pub mod comm;
pub mod stream;
pub mod tree;

// Re-exports for convenience
pub use comm::{Exchange, ProcessGroup, SoloGroup, ThreadGroup};
pub use stream::{ReplicatedStream, WindowStream};
pub use tree::ops::{CriticalReduceFns, DownwardOps, ReduceFns, ReduceOps, StepFns};
pub use tree::{BTree, DistTree, LinearTree, Segment, Tag};

use thiserror::Error;

/// Contract violations the skeletons can surface.
///
/// All three are programming errors on a statically agreed partition, not
/// transient faults: there is no retry. Every group member evaluating the
/// same predicate on the same structure observes the same variant at the
/// same collective point.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SkeletonError {
    /// Operand trees differ in topology; detected from shape metadata
    /// before any value moves.
    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    /// A linear encoding cannot be parsed into a consistent tree (tag or
    /// arity disagreement, missing or extra child segment).
    #[error("ill-formed tree encoding: {0}")]
    IllFormedEncoding(String),

    /// A reduction or reconstruction was demanded of a tree with no nodes.
    #[error("operation undefined on an empty tree")]
    EmptyTree,
}
