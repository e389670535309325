//! Tagged segments
//!
//! A segment is one contiguous, fully-owned slice of a tree's pre-order
//! layout: a flat sequence of `(value, Tag)` pairs. Consuming tags left to
//! right must yield exactly one complete subtree: a NODE consumes the next
//! two subtrees in the same segment, a CRITICAL consumes two children that
//! live in other segments, a LEAF consumes nothing. At most one CRITICAL
//! entry may appear.
//!
//! The purely local halves of the skeletons live here: everything that can
//! be computed from a segment without talking to the rest of the group.

use crate::tree::ops::{DownwardOps, ReduceOps};
use crate::tree::tag::Tag;
use crate::SkeletonError;

/// Which child of an ancestor leads toward the critical entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Side {
    Left,
    Right,
}

/// One ancestor on the path from a segment's critical entry up to its root.
/// The off-path child is fully owned, so its reduction is already known.
#[derive(Debug, Clone)]
pub(crate) struct PathStep<A, B> {
    pub value: A,
    pub sibling: B,
    pub critical_on: Side,
}

/// A segment's contribution to the global phase of a reduction: either the
/// complete reduction of its subtree, or a contraction summary pruned at
/// the critical entry.
#[derive(Debug, Clone)]
pub(crate) enum LocalReduce<A, B> {
    Full(B),
    /// `path` runs from the critical entry up to the segment root.
    Pruned { critical: A, path: Vec<PathStep<A, B>> },
}

/// The value delivered to a segment's root by the global downward sweep.
#[derive(Debug, Clone)]
pub(crate) enum Incoming<A> {
    /// This segment holds the tree root; its root value becomes the seed.
    Seed(A),
    /// The parent critical entry's new and old values.
    Step { parent_new: A, parent_old: A },
}

enum Parsed<A, B> {
    Done(B),
    Hole { critical: A, path: Vec<PathStep<A, B>> },
}

/// An ordered sequence of tagged values encoding one pre-order slice.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Segment<A> {
    items: Vec<(A, Tag)>,
}

impl<A> Segment<A> {
    /// Wrap a raw tagged sequence. No validation happens here: ill-formed
    /// sequences are accepted and rejected later by the parsing operations,
    /// which is what test fixtures rely on.
    pub fn new(items: Vec<(A, Tag)>) -> Self {
        Self { items }
    }

    /// The empty segment, owned by processes the encoding has no work for.
    pub fn empty() -> Self {
        Self { items: Vec::new() }
    }

    /// Number of tagged entries.
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Whether the segment holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// The tagged entries in pre-order.
    pub fn items(&self) -> &[(A, Tag)] {
        &self.items
    }

    /// Whether any entry is tagged CRITICAL.
    pub fn has_critical(&self) -> bool {
        self.items.iter().any(|(_, tag)| *tag == Tag::Critical)
    }

    /// Same length and the same tag at every position.
    pub fn same_shape<B>(&self, other: &Segment<B>) -> bool {
        self.items.len() == other.items.len()
            && self
                .items
                .iter()
                .zip(other.items.iter())
                .all(|((_, ta), (_, tb))| ta == tb)
    }

    /// Structural validity: the tags parse into exactly one complete
    /// subtree with no leftover entries, and at most one CRITICAL appears.
    pub fn check(&self) -> Result<(), SkeletonError> {
        if self.items.is_empty() {
            return Err(SkeletonError::IllFormedEncoding(
                "empty segment in encoding".into(),
            ));
        }
        let mut open = 1usize;
        let mut criticals = 0usize;
        for (_, tag) in &self.items {
            if open == 0 {
                return Err(SkeletonError::IllFormedEncoding(
                    "trailing entries after a complete subtree".into(),
                ));
            }
            open = open - 1 + tag.local_arity();
            if *tag == Tag::Critical {
                criticals += 1;
            }
        }
        if open != 0 {
            Err(SkeletonError::IllFormedEncoding(
                "segment ends before its subtree is complete".into(),
            ))
        } else if criticals > 1 {
            Err(SkeletonError::IllFormedEncoding(
                "more than one critical entry in a segment".into(),
            ))
        } else {
            Ok(())
        }
    }

    /// Elementwise value transform; tags are preserved. CRITICAL positions
    /// are internal nodes and take `node_op`.
    pub fn map_values<B, N, L>(&self, node_op: &N, leaf_op: &L) -> Segment<B>
    where
        N: Fn(&A) -> B,
        L: Fn(&A) -> B,
    {
        Segment {
            items: self
                .items
                .iter()
                .map(|(value, tag)| match tag {
                    Tag::Leaf => (leaf_op(value), *tag),
                    Tag::Node | Tag::Critical => (node_op(value), *tag),
                })
                .collect(),
        }
    }

    fn entry(&self, pos: usize) -> Result<&(A, Tag), SkeletonError> {
        self.items.get(pos).ok_or_else(|| {
            SkeletonError::IllFormedEncoding(
                "segment ends before its subtree is complete".into(),
            )
        })
    }
}

impl<A: Clone> Segment<A> {
    /// Pair this segment with another of identical shape.
    pub fn zip<B: Clone>(&self, other: &Segment<B>) -> Result<Segment<(A, B)>, SkeletonError> {
        if !self.same_shape(other) {
            return Err(SkeletonError::ShapeMismatch(
                "segments differ in length or tags".into(),
            ));
        }
        Ok(Segment {
            items: self
                .items
                .iter()
                .zip(other.items.iter())
                .map(|((a, tag), (b, _))| ((a.clone(), b.clone()), *tag))
                .collect(),
        })
    }

    /// Local phase of `reduce`: reduce everything this segment fully owns.
    pub(crate) fn reduce_local<B, R>(&self, ops: &R) -> Result<LocalReduce<A, B>, SkeletonError>
    where
        R: ReduceOps<A, B>,
    {
        let mut pos = 0;
        let parsed = self.reduce_at(&mut pos, ops)?;
        self.expect_consumed(pos)?;
        Ok(match parsed {
            Parsed::Done(value) => LocalReduce::Full(value),
            Parsed::Hole { critical, path } => LocalReduce::Pruned { critical, path },
        })
    }

    fn reduce_at<B, R>(&self, pos: &mut usize, ops: &R) -> Result<Parsed<A, B>, SkeletonError>
    where
        R: ReduceOps<A, B>,
    {
        let (value, tag) = self.entry(*pos)?;
        *pos += 1;
        match tag {
            Tag::Leaf => Ok(Parsed::Done(ops.leaf(value))),
            Tag::Critical => Ok(Parsed::Hole {
                critical: value.clone(),
                path: Vec::new(),
            }),
            Tag::Node => {
                let left = self.reduce_at(pos, ops)?;
                let right = self.reduce_at(pos, ops)?;
                self.wrap(value, left, right, |l, v, r| ops.node(l, v, r))
            }
        }
    }

    /// Local phase of `upward_accumulate`. Returns the per-position results
    /// (`None` where the global phase must fill in), the contraction
    /// summary, and the positions awaiting fixup in critical-to-root order.
    #[allow(clippy::type_complexity)]
    pub(crate) fn upward_local<R>(
        &self,
        ops: &R,
    ) -> Result<(Vec<Option<A>>, LocalReduce<A, A>, Vec<usize>), SkeletonError>
    where
        R: ReduceOps<A, A>,
    {
        let mut out: Vec<Option<A>> = vec![None; self.items.len()];
        let mut holes = Vec::new();
        let mut pos = 0;
        let parsed = self.uacc_at(&mut pos, ops, &mut out, &mut holes)?;
        self.expect_consumed(pos)?;
        let summary = match parsed {
            Parsed::Done(value) => LocalReduce::Full(value),
            Parsed::Hole { critical, path } => LocalReduce::Pruned { critical, path },
        };
        Ok((out, summary, holes))
    }

    fn uacc_at<R>(
        &self,
        pos: &mut usize,
        ops: &R,
        out: &mut [Option<A>],
        holes: &mut Vec<usize>,
    ) -> Result<Parsed<A, A>, SkeletonError>
    where
        R: ReduceOps<A, A>,
    {
        let here = *pos;
        let (value, tag) = self.entry(here)?;
        *pos += 1;
        match tag {
            Tag::Leaf => {
                let total = ops.leaf(value);
                out[here] = Some(total.clone());
                Ok(Parsed::Done(total))
            }
            Tag::Critical => {
                holes.push(here);
                Ok(Parsed::Hole {
                    critical: value.clone(),
                    path: Vec::new(),
                })
            }
            Tag::Node => {
                let left = self.uacc_at(pos, ops, out, holes)?;
                let right = self.uacc_at(pos, ops, out, holes)?;
                let wrapped = self.wrap(value, left, right, |l, v, r| ops.node(l, v, r))?;
                match wrapped {
                    Parsed::Done(total) => {
                        out[here] = Some(total.clone());
                        Ok(Parsed::Done(total))
                    }
                    hole => {
                        holes.push(here);
                        Ok(hole)
                    }
                }
            }
        }
    }

    fn wrap<B>(
        &self,
        value: &A,
        left: Parsed<A, B>,
        right: Parsed<A, B>,
        combine: impl Fn(B, &A, B) -> B,
    ) -> Result<Parsed<A, B>, SkeletonError> {
        match (left, right) {
            (Parsed::Done(l), Parsed::Done(r)) => Ok(Parsed::Done(combine(l, value, r))),
            (Parsed::Hole { critical, mut path }, Parsed::Done(sibling)) => {
                path.push(PathStep {
                    value: value.clone(),
                    sibling,
                    critical_on: Side::Left,
                });
                Ok(Parsed::Hole { critical, path })
            }
            (Parsed::Done(sibling), Parsed::Hole { critical, mut path }) => {
                path.push(PathStep {
                    value: value.clone(),
                    sibling,
                    critical_on: Side::Right,
                });
                Ok(Parsed::Hole { critical, path })
            }
            (Parsed::Hole { .. }, Parsed::Hole { .. }) => Err(SkeletonError::IllFormedEncoding(
                "more than one critical entry in a segment".into(),
            )),
        }
    }

    /// Splice globally resolved values into the positions `upward_local`
    /// left open, producing the finished segment.
    pub(crate) fn upward_apply(
        &self,
        mut out: Vec<Option<A>>,
        holes: &[usize],
        fixes: &[A],
    ) -> Result<Segment<A>, SkeletonError> {
        for (position, value) in holes.iter().zip(fixes) {
            out[*position] = Some(value.clone());
        }
        let items = self
            .items
            .iter()
            .zip(out)
            .map(|((_, tag), value)| match value {
                Some(value) => Ok((value, *tag)),
                None => Err(SkeletonError::IllFormedEncoding(
                    "position left unresolved by the global phase".into(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Segment { items })
    }

    /// Old values along the root-to-critical path, root first and critical
    /// included; `None` when the segment is fully owned.
    pub(crate) fn down_path(&self) -> Result<Option<Vec<A>>, SkeletonError> {
        let mut pos = 0;
        let path = self.path_at(&mut pos)?;
        self.expect_consumed(pos)?;
        Ok(path.map(|mut p| {
            p.reverse();
            p
        }))
    }

    fn path_at(&self, pos: &mut usize) -> Result<Option<Vec<A>>, SkeletonError> {
        let (value, tag) = self.entry(*pos)?;
        *pos += 1;
        match tag {
            Tag::Leaf => Ok(None),
            Tag::Critical => Ok(Some(vec![value.clone()])),
            Tag::Node => {
                let left = self.path_at(pos)?;
                let right = self.path_at(pos)?;
                match (left, right) {
                    (None, None) => Ok(None),
                    (Some(mut path), None) | (None, Some(mut path)) => {
                        path.push(value.clone());
                        Ok(Some(path))
                    }
                    (Some(_), Some(_)) => Err(SkeletonError::IllFormedEncoding(
                        "more than one critical entry in a segment".into(),
                    )),
                }
            }
        }
    }

    /// Local finalize of `downward_accumulate`: sweep the whole segment
    /// top-down, seeded by the value the global phase delivered to its root.
    pub(crate) fn downward_local<D>(
        &self,
        steps: &D,
        incoming: &Incoming<A>,
    ) -> Result<Segment<A>, SkeletonError>
    where
        D: DownwardOps<A>,
    {
        let (_, root_tag) = self.entry(0)?;
        let root_new = match incoming {
            Incoming::Seed(seed) => seed.clone(),
            Incoming::Step {
                parent_new,
                parent_old,
            } => match root_tag {
                Tag::Leaf => steps.to_leaf(parent_new, parent_old),
                Tag::Node | Tag::Critical => steps.to_node(parent_new, parent_old),
            },
        };
        let mut out: Vec<Option<A>> = vec![None; self.items.len()];
        let mut pos = 0;
        self.down_at(&mut pos, root_new, steps, &mut out)?;
        self.expect_consumed(pos)?;
        let items = self
            .items
            .iter()
            .zip(out)
            .map(|((_, tag), value)| match value {
                Some(value) => Ok((value, *tag)),
                None => Err(SkeletonError::IllFormedEncoding(
                    "position missed by the downward sweep".into(),
                )),
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Segment { items })
    }

    fn down_at<D>(
        &self,
        pos: &mut usize,
        my_new: A,
        steps: &D,
        out: &mut [Option<A>],
    ) -> Result<(), SkeletonError>
    where
        D: DownwardOps<A>,
    {
        let here = *pos;
        let (my_old, tag) = self.entry(here)?;
        *pos += 1;
        match tag {
            // Children, if any, live in other segments.
            Tag::Leaf | Tag::Critical => {
                out[here] = Some(my_new);
                Ok(())
            }
            Tag::Node => {
                for _ in 0..2 {
                    let (_, child_tag) = self.entry(*pos)?;
                    let child_new = match child_tag {
                        Tag::Leaf => steps.to_leaf(&my_new, my_old),
                        Tag::Node | Tag::Critical => steps.to_node(&my_new, my_old),
                    };
                    self.down_at(pos, child_new, steps, out)?;
                }
                out[here] = Some(my_new);
                Ok(())
            }
        }
    }

    fn expect_consumed(&self, pos: usize) -> Result<(), SkeletonError> {
        if pos == self.items.len() {
            Ok(())
        } else {
            Err(SkeletonError::IllFormedEncoding(
                "trailing entries after a complete subtree".into(),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ops::ReduceFns;

    fn sum_ops() -> ReduceFns<impl Fn(&i64) -> i64, impl Fn(i64, &i64, i64) -> i64> {
        ReduceFns::new(|v: &i64| *v, |l: i64, v: &i64, r: i64| l + v + r)
    }

    #[test]
    fn test_check_accepts_complete_subtree() {
        let seg = Segment::new(vec![(72, Tag::Node), (92, Tag::Leaf), (42, Tag::Leaf)]);
        assert!(seg.check().is_ok());
        assert!(Segment::new(vec![(13, Tag::Critical)]).check().is_ok());
    }

    #[test]
    fn test_check_rejects_bad_arity() {
        let truncated = Segment::new(vec![(72, Tag::Node), (92, Tag::Leaf)]);
        assert!(truncated.check().is_err());
        let trailing = Segment::new(vec![(92, Tag::Leaf), (42, Tag::Leaf)]);
        assert!(trailing.check().is_err());
        assert!(Segment::<i64>::empty().check().is_err());
    }

    #[test]
    fn test_reduce_local_full() {
        let seg = Segment::new(vec![(72, Tag::Node), (92, Tag::Leaf), (42, Tag::Leaf)]);
        match seg.reduce_local(&sum_ops()).unwrap() {
            LocalReduce::Full(total) => assert_eq!(total, 206),
            other => panic!("expected full reduction, got {other:?}"),
        }
    }

    #[test]
    fn test_reduce_local_pruned_records_path() {
        // 5 at the root, critical on the left, a reduced sibling on the right
        let seg = Segment::new(vec![
            (5, Tag::Node),
            (13, Tag::Critical),
            (7, Tag::Node),
            (1, Tag::Leaf),
            (2, Tag::Leaf),
        ]);
        match seg.reduce_local(&sum_ops()).unwrap() {
            LocalReduce::Pruned { critical, path } => {
                assert_eq!(critical, 13);
                assert_eq!(path.len(), 1);
                assert_eq!(path[0].value, 5);
                assert_eq!(path[0].sibling, 10);
                assert_eq!(path[0].critical_on, Side::Left);
            }
            other => panic!("expected pruned reduction, got {other:?}"),
        }
    }

    #[test]
    fn test_down_path_runs_root_to_critical() {
        let seg = Segment::new(vec![
            (5, Tag::Node),
            (1, Tag::Leaf),
            (8, Tag::Node),
            (13, Tag::Critical),
            (2, Tag::Leaf),
        ]);
        assert_eq!(seg.down_path().unwrap(), Some(vec![5, 8, 13]));
        let full = Segment::new(vec![(1, Tag::Leaf)]);
        assert_eq!(full.down_path().unwrap(), None);
    }
}
