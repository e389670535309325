//! Distributed trees
//!
//! One segment of a linear tree per process. Every skeleton is a
//! two-phase BSP algorithm: a purely local pass over the owned segment,
//! one collective at which contraction summaries meet, and (for downward
//! operations) a local finalize seeded by the value delivered to the
//! segment's attachment point.
//!
//! The collective is an all-gather, so the global combine runs redundantly
//! from identical inputs on every member: all processes reach the same
//! collective in the same order and derive the same outcome. Local
//! structural failures travel inside the gathered payload and are raised
//! only after it, in rank order, so no process can fail while a peer still
//! blocks on the collective.

use tracing::trace;

use crate::comm::{Exchange, ProcessGroup};
use crate::tree::btree::BTree;
use crate::tree::linear::LinearTree;
use crate::tree::ops::{DownwardOps, MappedReduce, ReduceOps};
use crate::tree::segment::{Incoming, LocalReduce, Segment, Side};
use crate::SkeletonError;

/// A binary tree partitioned across a process group, one segment per
/// member. Every operation yields a new tree or a scalar; nothing is
/// mutated across process boundaries.
#[derive(Debug, Clone)]
pub struct DistTree<A, G> {
    group: G,
    seg_count: usize,
    segment: Segment<A>,
}

impl<A, G> DistTree<A, G>
where
    A: Exchange,
    G: ProcessGroup + Clone,
{
    /// Partition a replicated tree across the group. The granularity is
    /// doubled until the segment count fits the group, so every segment
    /// has an owner.
    pub fn from_tree(group: &G, tree: &BTree<A>, granularity: usize) -> Self {
        let mut granularity = granularity.max(1);
        let mut linear = LinearTree::from_tree(tree, granularity);
        while linear.segment_count() > group.size() {
            granularity *= 2;
            linear = LinearTree::from_tree(tree, granularity);
        }
        Self::from_linear(group, &linear)
    }

    /// Wrap a pre-built linear tree, including deliberately ill-formed
    /// ones; validity is checked by the operations, not here. The linear
    /// tree must be replicated across the group.
    pub fn from_linear(group: &G, linear: &LinearTree<A>) -> Self {
        assert!(
            linear.segment_count() <= group.size(),
            "linear tree has {} segments but the process group has {} members",
            linear.segment_count(),
            group.size()
        );
        let segment = linear
            .segments()
            .get(group.rank())
            .cloned()
            .unwrap_or_else(Segment::empty);
        Self {
            group: group.clone(),
            seg_count: linear.segment_count(),
            segment,
        }
    }

    /// Collective: gather every segment back into a linear tree.
    pub fn to_linear(&self) -> LinearTree<A> {
        let segments = self.group.gather(self.segment.clone());
        LinearTree::new(segments.into_iter().take(self.seg_count).collect())
    }

    /// Collective: gather and stitch the tree back together.
    pub fn to_tree(&self) -> Result<BTree<A>, SkeletonError> {
        self.to_linear().to_tree()
    }

    /// The segment owned by this process.
    pub fn local_segment(&self) -> &Segment<A> {
        &self.segment
    }

    /// Number of segments in the encoding (not the group size: trailing
    /// members own empty placeholders).
    pub fn segment_count(&self) -> usize {
        self.seg_count
    }

    /// Whether the encoding holds no tree at all.
    pub fn is_empty(&self) -> bool {
        self.seg_count == 0
    }

    /// The process group this tree lives on.
    pub fn group(&self) -> &G {
        &self.group
    }

    /// Elementwise transform, `node_op` at internal positions (critical
    /// included) and `leaf_op` at leaves. Shape-preserving; no
    /// communication.
    pub fn map<B, N, L>(&self, node_op: &N, leaf_op: &L) -> DistTree<B, G>
    where
        B: Exchange,
        N: Fn(&A) -> B,
        L: Fn(&A) -> B,
    {
        DistTree {
            group: self.group.clone(),
            seg_count: self.seg_count,
            segment: self.segment.map_values(node_op, leaf_op),
        }
    }

    /// Reduce the whole tree to one value, returned on every member.
    pub fn reduce<B, R>(&self, ops: &R) -> Result<B, SkeletonError>
    where
        B: Exchange,
        R: ReduceOps<A, B>,
    {
        if self.is_empty() {
            return Err(SkeletonError::EmptyTree);
        }
        reduce_pipeline(&self.group, self.seg_count, &self.segment, ops)
    }

    /// Replace every value with the reduction of its own subtree.
    /// Critical values are finalized in the global phase, where each
    /// local accumulation meets its sibling's.
    pub fn upward_accumulate<R>(&self, ops: &R) -> Result<Self, SkeletonError>
    where
        R: ReduceOps<A, A>,
    {
        if self.is_empty() {
            return Ok(self.clone());
        }
        let rank = self.group.rank();
        let local = (rank < self.seg_count).then(|| self.segment.upward_local(ops));
        let payload = match &local {
            Some(Ok((_, summary, _))) => Ok(Some(summary.clone())),
            Some(Err(error)) => Err(error.clone()),
            None => Ok(None),
        };
        let gathered = self.group.gather(payload);
        let parts = collect_local(gathered, self.seg_count)?;
        let mut fixes: Vec<Vec<A>> = vec![Vec::new(); parts.len()];
        let mut next = 0;
        resolve_with_fixes(&parts, &mut next, ops, &mut fixes)?;
        expect_attached(next, parts.len())?;
        trace!(segments = parts.len(), "upward accumulation resolved");
        let segment = match local {
            Some(result) => {
                let (out, _, holes) = result?;
                self.segment.upward_apply(out, &holes, &fixes[rank])?
            }
            None => Segment::empty(),
        };
        Ok(DistTree {
            group: self.group.clone(),
            seg_count: self.seg_count,
            segment,
        })
    }

    /// Replace every value with the fold of its root-to-node path: the
    /// root takes `seed`, and the global phase sweeps the spine to deliver
    /// each segment the value at its attachment point.
    pub fn downward_accumulate<D>(&self, steps: &D, seed: A) -> Result<Self, SkeletonError>
    where
        D: DownwardOps<A>,
    {
        if self.is_empty() {
            return Ok(self.clone());
        }
        let rank = self.group.rank();
        let local = (rank < self.seg_count).then(|| self.segment.down_path());
        let payload = match &local {
            Some(Ok(path)) => Ok(Some(path.clone())),
            Some(Err(error)) => Err(error.clone()),
            None => Ok(None),
        };
        let gathered = self.group.gather(payload);
        let paths = collect_local(gathered, self.seg_count)?;
        let mut incoming: Vec<Option<Incoming<A>>> = vec![None; paths.len()];
        let mut next = 0;
        sweep_down(&paths, &mut next, Incoming::Seed(seed), steps, &mut incoming)?;
        expect_attached(next, paths.len())?;
        trace!(segments = paths.len(), "downward sweep resolved");
        let segment = match local {
            Some(result) => {
                result?;
                let delivered = incoming[rank].take().ok_or_else(|| {
                    SkeletonError::IllFormedEncoding(
                        "segment missed by the downward sweep".into(),
                    )
                })?;
                self.segment.downward_local(steps, &delivered)?
            }
            None => Segment::empty(),
        };
        Ok(DistTree {
            group: self.group.clone(),
            seg_count: self.seg_count,
            segment,
        })
    }

    /// Pair with another tree of identical shape and segmentation. The
    /// precondition is a gathered vote over local shape metadata, so every
    /// member decides identically; values never move.
    pub fn zip<B>(&self, other: &DistTree<B, G>) -> Result<DistTree<(A, B), G>, SkeletonError>
    where
        B: Exchange,
    {
        self.shape_vote(other)?;
        let segment = self.segment.zip(&other.segment)?;
        Ok(DistTree {
            group: self.group.clone(),
            seg_count: self.seg_count,
            segment,
        })
    }

    /// Zip then combine pairwise; same precondition as `zip`.
    pub fn map2<B, C, N, L>(
        &self,
        node_op: &N,
        leaf_op: &L,
        other: &DistTree<B, G>,
    ) -> Result<DistTree<C, G>, SkeletonError>
    where
        B: Exchange,
        C: Exchange,
        N: Fn(&A, &B) -> C,
        L: Fn(&A, &B) -> C,
    {
        let zipped = self.zip(other)?;
        Ok(zipped.map(
            &|pair: &(A, B)| node_op(&pair.0, &pair.1),
            &|pair: &(A, B)| leaf_op(&pair.0, &pair.1),
        ))
    }

    /// `map` then `reduce`, with the map composed into the reduction
    /// strategies so the mapped tree never exists. Value-identical to the
    /// unfused composition.
    pub fn map_then_reduce<M, B, N, L, R>(
        &self,
        node_op: &N,
        leaf_op: &L,
        ops: &R,
    ) -> Result<B, SkeletonError>
    where
        B: Exchange,
        N: Fn(&A) -> M,
        L: Fn(&A) -> M,
        R: ReduceOps<M, B>,
    {
        if self.is_empty() {
            return Err(SkeletonError::EmptyTree);
        }
        let fused = MappedReduce {
            node_op,
            leaf_op,
            inner: ops,
        };
        reduce_pipeline(&self.group, self.seg_count, &self.segment, &fused)
    }

    /// `zip` then `reduce` without building the intermediate distributed
    /// tree; only the local segments are paired.
    pub fn zip_then_reduce<B, C, R>(
        &self,
        other: &DistTree<B, G>,
        ops: &R,
    ) -> Result<C, SkeletonError>
    where
        B: Exchange,
        C: Exchange,
        R: ReduceOps<(A, B), C>,
    {
        self.shape_vote(other)?;
        let segment = self.segment.zip(&other.segment)?;
        if self.is_empty() {
            return Err(SkeletonError::EmptyTree);
        }
        reduce_pipeline(&self.group, self.seg_count, &segment, ops)
    }

    /// `map2` then `reduce`; pairs are combined on the fly inside the
    /// reduction strategies.
    pub fn map2_then_reduce<B, M, C, N, L, R>(
        &self,
        node_op: &N,
        leaf_op: &L,
        other: &DistTree<B, G>,
        ops: &R,
    ) -> Result<C, SkeletonError>
    where
        B: Exchange,
        C: Exchange,
        N: Fn(&A, &B) -> M,
        L: Fn(&A, &B) -> M,
        R: ReduceOps<M, C>,
    {
        self.shape_vote(other)?;
        let segment = self.segment.zip(&other.segment)?;
        if self.is_empty() {
            return Err(SkeletonError::EmptyTree);
        }
        let node = |pair: &(A, B)| node_op(&pair.0, &pair.1);
        let leaf = |pair: &(A, B)| leaf_op(&pair.0, &pair.1);
        let fused = MappedReduce {
            node_op: &node,
            leaf_op: &leaf,
            inner: ops,
        };
        reduce_pipeline(&self.group, self.seg_count, &segment, &fused)
    }

    fn shape_vote<B>(&self, other: &DistTree<B, G>) -> Result<(), SkeletonError>
    where
        B: Exchange,
    {
        let compatible =
            self.seg_count == other.seg_count && self.segment.same_shape(&other.segment);
        let votes = self.group.gather(compatible);
        if votes.iter().all(|ok| *ok) {
            Ok(())
        } else {
            Err(SkeletonError::ShapeMismatch(
                "distributed trees differ in topology".into(),
            ))
        }
    }
}

/// Shared collective half of the reduce family: local summaries, one
/// all-gather, and a redundant sequential resolve along the spine.
fn reduce_pipeline<X, B, G, R>(
    group: &G,
    seg_count: usize,
    segment: &Segment<X>,
    ops: &R,
) -> Result<B, SkeletonError>
where
    X: Exchange,
    B: Exchange,
    G: ProcessGroup,
    R: ReduceOps<X, B>,
{
    let local = if group.rank() < seg_count {
        segment.reduce_local(ops).map(Some)
    } else {
        Ok(None)
    };
    let gathered = group.gather(local);
    let parts = collect_local(gathered, seg_count)?;
    trace!(segments = parts.len(), "reduction summaries gathered");
    let mut next = 0;
    let value = resolve(&parts, &mut next, ops)?;
    expect_attached(next, parts.len())?;
    Ok(value)
}

/// Surface gathered per-segment payloads, raising the lowest-rank error
/// first so every member reports the same failure.
fn collect_local<T>(
    gathered: Vec<Result<Option<T>, SkeletonError>>,
    seg_count: usize,
) -> Result<Vec<T>, SkeletonError> {
    let mut parts = Vec::with_capacity(seg_count);
    for result in gathered.into_iter().take(seg_count) {
        match result? {
            Some(part) => parts.push(part),
            None => {
                return Err(SkeletonError::IllFormedEncoding(
                    "a segment owner sent no contribution".into(),
                ))
            }
        }
    }
    Ok(parts)
}

fn expect_attached(consumed: usize, total: usize) -> Result<(), SkeletonError> {
    if consumed == total {
        Ok(())
    } else {
        Err(SkeletonError::IllFormedEncoding(
            "unattached segments left over".into(),
        ))
    }
}

fn missing_child() -> SkeletonError {
    SkeletonError::IllFormedEncoding("critical entry missing a child segment".into())
}

/// Resolve the segment tree bottom-up: child segments first, then the
/// critical combine, then the recorded path back to the segment root.
fn resolve<X, B, R>(
    parts: &[LocalReduce<X, B>],
    next: &mut usize,
    ops: &R,
) -> Result<B, SkeletonError>
where
    B: Clone,
    R: ReduceOps<X, B>,
{
    let part = parts.get(*next).ok_or_else(missing_child)?;
    *next += 1;
    match part {
        LocalReduce::Full(value) => Ok(value.clone()),
        LocalReduce::Pruned { critical, path } => {
            let left = resolve(parts, next, ops)?;
            let right = resolve(parts, next, ops)?;
            let mut acc = ops.critical(left, critical, right);
            for step in path {
                acc = match step.critical_on {
                    Side::Left => ops.node(acc, &step.value, step.sibling.clone()),
                    Side::Right => ops.node(step.sibling.clone(), &step.value, acc),
                };
            }
            Ok(acc)
        }
    }
}

/// Like `resolve`, additionally recording the finalized value of every
/// critical and path position, per segment, in the order the owners expect
/// their fixups.
fn resolve_with_fixes<A, R>(
    parts: &[LocalReduce<A, A>],
    next: &mut usize,
    ops: &R,
    fixes: &mut [Vec<A>],
) -> Result<A, SkeletonError>
where
    A: Clone,
    R: ReduceOps<A, A>,
{
    let index = *next;
    let part = parts.get(index).ok_or_else(missing_child)?;
    *next += 1;
    match part {
        LocalReduce::Full(value) => Ok(value.clone()),
        LocalReduce::Pruned { critical, path } => {
            let left = resolve_with_fixes(parts, next, ops, fixes)?;
            let right = resolve_with_fixes(parts, next, ops, fixes)?;
            let mut acc = ops.critical(left, critical, right);
            fixes[index].push(acc.clone());
            for step in path {
                acc = match step.critical_on {
                    Side::Left => ops.node(acc, &step.value, step.sibling.clone()),
                    Side::Right => ops.node(step.sibling.clone(), &step.value, acc),
                };
                fixes[index].push(acc.clone());
            }
            Ok(acc)
        }
    }
}

/// Sequential sweep down the spine: compute the prefix at every critical
/// attachment point and record what each segment's root will be seeded
/// with.
fn sweep_down<A, D>(
    paths: &[Option<Vec<A>>],
    next: &mut usize,
    incoming: Incoming<A>,
    steps: &D,
    out: &mut [Option<Incoming<A>>],
) -> Result<(), SkeletonError>
where
    A: Clone,
    D: DownwardOps<A>,
{
    let index = *next;
    let path = paths.get(index).ok_or_else(missing_child)?;
    *next += 1;
    if let Some(path) = path {
        // Walk the owner's root-to-critical path; every node on it is
        // internal, so only the node step applies.
        let mut new = match &incoming {
            Incoming::Seed(seed) => seed.clone(),
            Incoming::Step {
                parent_new,
                parent_old,
            } => steps.to_node(parent_new, parent_old),
        };
        let (first, rest) = path.split_first().ok_or_else(|| {
            SkeletonError::IllFormedEncoding("pruned segment with an empty path".into())
        })?;
        let mut old = first;
        for value in rest {
            new = steps.to_node(&new, old);
            old = value;
        }
        let child = Incoming::Step {
            parent_new: new,
            parent_old: old.clone(),
        };
        out[index] = Some(incoming);
        sweep_down(paths, next, child.clone(), steps, out)?;
        sweep_down(paths, next, child, steps, out)?;
    } else {
        out[index] = Some(incoming);
    }
    Ok(())
}
