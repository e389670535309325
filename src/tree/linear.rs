//! Linear trees
//!
//! An ordered sequence of segments encoding one binary tree. Segments are
//! the bridges between critical nodes, serialized in pre-order of the
//! segment tree: the first segment holds the root, and a segment containing
//! a CRITICAL entry is followed (recursively) by the two segments holding
//! that entry's children. Reading every CRITICAL entry in segment order
//! yields the spine, root to descendant.

use tracing::debug;

use crate::tree::btree::BTree;
use crate::tree::segment::Segment;
use crate::tree::tag::Tag;
use crate::SkeletonError;

/// A tree flattened into segments.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LinearTree<A> {
    segments: Vec<Segment<A>>,
}

impl<A> LinearTree<A> {
    /// Wrap raw segments. Nothing is validated here: deliberately
    /// ill-formed encodings are legitimate test fixtures and are rejected
    /// by the operations that parse them.
    pub fn new(segments: Vec<Segment<A>>) -> Self {
        Self { segments }
    }

    /// The segments in pre-order of the segment tree.
    pub fn segments(&self) -> &[Segment<A>] {
        &self.segments
    }

    /// Take the segments out, in order.
    pub fn into_segments(self) -> Vec<Segment<A>> {
        self.segments
    }

    /// Number of segments.
    pub fn segment_count(&self) -> usize {
        self.segments.len()
    }

    /// Whether the encoding holds no tree at all.
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }

    /// Validity of the whole encoding: every segment parses on its own,
    /// and consuming segments in order fills exactly the child slots the
    /// critical entries demand: one segment per slot, two new slots per
    /// critical, nothing missing and nothing left over.
    pub fn check(&self) -> Result<(), SkeletonError> {
        if self.segments.is_empty() {
            return Err(SkeletonError::EmptyTree);
        }
        let mut expected = 1usize;
        for segment in &self.segments {
            if expected == 0 {
                return Err(SkeletonError::IllFormedEncoding(
                    "unattached segments left over".into(),
                ));
            }
            segment.check()?;
            expected = expected - 1 + if segment.has_critical() { 2 } else { 0 };
        }
        if expected != 0 {
            return Err(SkeletonError::IllFormedEncoding(
                "critical entry missing a child segment".into(),
            ));
        }
        Ok(())
    }
}

/// Pre-order subtree sizes, used to decide which nodes are critical.
fn preorder_sizes<A>(tree: &BTree<A>, out: &mut Vec<usize>) -> usize {
    let slot = out.len();
    out.push(0);
    let size = match tree {
        BTree::Leaf(_) => 1,
        BTree::Node(_, left, right) => {
            1 + preorder_sizes(left, out) + preorder_sizes(right, out)
        }
    };
    out[slot] = size;
    size
}

fn blocks(size: usize, granularity: usize) -> usize {
    size.div_ceil(granularity)
}

impl<A: Clone> LinearTree<A> {
    /// Flatten a tree, deterministically for a given tree and granularity.
    ///
    /// A node is critical when its subtree spans more granularity blocks
    /// than either child's; small granularities cut many segments (more
    /// parallelism, more synchronization), large ones few.
    pub fn from_tree(tree: &BTree<A>, granularity: usize) -> Self {
        let granularity = granularity.max(1);
        let mut sizes = Vec::new();
        preorder_sizes(tree, &mut sizes);
        let mut segments = Vec::new();
        emit_segment(tree, 0, &sizes, granularity, &mut segments);
        debug!(
            segments = segments.len(),
            granularity,
            nodes = sizes[0],
            "linearized tree"
        );
        Self { segments }
    }

    /// Reconstruct the tree: parse each segment and re-link every child
    /// segment at its critical attachment point.
    pub fn to_tree(&self) -> Result<BTree<A>, SkeletonError> {
        if self.segments.is_empty() {
            return Err(SkeletonError::EmptyTree);
        }
        let mut next = 0;
        let tree = self.stitch(&mut next)?;
        if next != self.segments.len() {
            return Err(SkeletonError::IllFormedEncoding(
                "unattached segments left over".into(),
            ));
        }
        Ok(tree)
    }

    fn stitch(&self, next: &mut usize) -> Result<BTree<A>, SkeletonError> {
        let segment = self.segments.get(*next).ok_or_else(|| {
            SkeletonError::IllFormedEncoding(
                "critical entry missing a child segment".into(),
            )
        })?;
        *next += 1;
        let mut pos = 0;
        let mut seen_critical = false;
        let tree = self.build(segment, &mut pos, next, &mut seen_critical)?;
        if pos != segment.len() {
            return Err(SkeletonError::IllFormedEncoding(
                "trailing entries after a complete subtree".into(),
            ));
        }
        Ok(tree)
    }

    fn build(
        &self,
        segment: &Segment<A>,
        pos: &mut usize,
        next: &mut usize,
        seen_critical: &mut bool,
    ) -> Result<BTree<A>, SkeletonError> {
        let (value, tag) = segment.items().get(*pos).ok_or_else(|| {
            SkeletonError::IllFormedEncoding(
                "segment ends before its subtree is complete".into(),
            )
        })?;
        *pos += 1;
        match tag {
            Tag::Leaf => Ok(BTree::Leaf(value.clone())),
            Tag::Node => {
                let left = self.build(segment, pos, next, seen_critical)?;
                let right = self.build(segment, pos, next, seen_critical)?;
                Ok(BTree::node(value.clone(), left, right))
            }
            Tag::Critical => {
                if *seen_critical {
                    return Err(SkeletonError::IllFormedEncoding(
                        "more than one critical entry in a segment".into(),
                    ));
                }
                *seen_critical = true;
                let left = self.stitch(next)?;
                let right = self.stitch(next)?;
                Ok(BTree::node(value.clone(), left, right))
            }
        }
    }
}

/// Serialize the bridge rooted at `tree`, then recurse into the segments
/// hanging off its critical entry, keeping segment order pre-order.
fn emit_segment<'t, A: Clone>(
    tree: &'t BTree<A>,
    pos: usize,
    sizes: &[usize],
    granularity: usize,
    segments: &mut Vec<Segment<A>>,
) {
    let mut items = Vec::new();
    let mut pending: Vec<(&'t BTree<A>, usize)> = Vec::new();
    serialize_bridge(tree, pos, sizes, granularity, &mut items, &mut pending);
    segments.push(Segment::new(items));
    for (child, child_pos) in pending {
        emit_segment(child, child_pos, sizes, granularity, segments);
    }
}

fn serialize_bridge<'t, A: Clone>(
    tree: &'t BTree<A>,
    pos: usize,
    sizes: &[usize],
    granularity: usize,
    items: &mut Vec<(A, Tag)>,
    pending: &mut Vec<(&'t BTree<A>, usize)>,
) {
    match tree {
        BTree::Leaf(value) => items.push((value.clone(), Tag::Leaf)),
        BTree::Node(value, left, right) => {
            let left_pos = pos + 1;
            let right_pos = pos + 1 + sizes[left_pos];
            let here = blocks(sizes[pos], granularity);
            let critical = here > blocks(sizes[left_pos], granularity)
                && here > blocks(sizes[right_pos], granularity);
            if critical {
                items.push((value.clone(), Tag::Critical));
                pending.push((left, left_pos));
                pending.push((right, right_pos));
            } else {
                items.push((value.clone(), Tag::Node));
                serialize_bridge(left, left_pos, sizes, granularity, items, pending);
                serialize_bridge(right, right_pos, sizes, granularity, items, pending);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tree() -> BTree<i64> {
        BTree::node(
            13,
            BTree::node(31, BTree::leaf(47), BTree::leaf(32)),
            BTree::node(72, BTree::leaf(92), BTree::leaf(42)),
        )
    }

    #[test]
    fn test_partition_cuts_at_critical_root() {
        let linear = LinearTree::from_tree(&sample_tree(), 3);
        let expected = LinearTree::new(vec![
            Segment::new(vec![(13, Tag::Critical)]),
            Segment::new(vec![(31, Tag::Node), (47, Tag::Leaf), (32, Tag::Leaf)]),
            Segment::new(vec![(72, Tag::Node), (92, Tag::Leaf), (42, Tag::Leaf)]),
        ]);
        assert_eq!(linear, expected);
        assert!(linear.check().is_ok());
    }

    #[test]
    fn test_coarse_granularity_keeps_one_segment() {
        let linear = LinearTree::from_tree(&sample_tree(), 100);
        assert_eq!(linear.segment_count(), 1);
        assert_eq!(linear.to_tree().unwrap(), sample_tree());
    }

    #[test]
    fn test_roundtrip_across_granularities() {
        let tree = sample_tree();
        for granularity in 1..=8 {
            let linear = LinearTree::from_tree(&tree, granularity);
            assert_eq!(linear.to_tree().unwrap(), tree, "granularity {granularity}");
            assert_eq!(linear, LinearTree::from_tree(&tree, granularity));
        }
    }

    #[test]
    fn test_missing_child_segment_is_rejected() {
        let linear = LinearTree::new(vec![
            Segment::new(vec![(13, Tag::Critical)]),
            Segment::new(vec![(72, Tag::Node), (92, Tag::Leaf), (42, Tag::Leaf)]),
        ]);
        assert!(matches!(
            linear.to_tree(),
            Err(SkeletonError::IllFormedEncoding(_))
        ));
        assert!(matches!(
            linear.check(),
            Err(SkeletonError::IllFormedEncoding(_))
        ));
    }
}
