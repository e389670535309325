//! Sequential binary trees
//!
//! The in-memory tree type and the reference algorithms. The parallel
//! skeletons must agree with these on the reconstructed tree, so every
//! parallel operation has its oracle here.

use crate::tree::ops::DownwardOps;
use crate::SkeletonError;

/// A binary tree where every internal node has exactly two children.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BTree<A> {
    /// A value with no children.
    Leaf(A),

    /// A value with two owned children.
    Node(A, Box<BTree<A>>, Box<BTree<A>>),
}

impl<A> BTree<A> {
    /// Leaf constructor.
    pub fn leaf(value: A) -> Self {
        BTree::Leaf(value)
    }

    /// Node constructor taking unboxed children.
    pub fn node(value: A, left: Self, right: Self) -> Self {
        BTree::Node(value, Box::new(left), Box::new(right))
    }

    /// The value at the root.
    pub fn value(&self) -> &A {
        match self {
            BTree::Leaf(value) => value,
            BTree::Node(value, _, _) => value,
        }
    }

    /// Whether the root is a leaf.
    pub fn is_leaf(&self) -> bool {
        matches!(self, BTree::Leaf(_))
    }

    /// Total number of nodes, leaves included.
    pub fn size(&self) -> usize {
        match self {
            BTree::Leaf(_) => 1,
            BTree::Node(_, left, right) => 1 + left.size() + right.size(),
        }
    }

    /// Length of the longest root-to-leaf path, counting nodes.
    pub fn height(&self) -> usize {
        match self {
            BTree::Leaf(_) => 1,
            BTree::Node(_, left, right) => 1 + left.height().max(right.height()),
        }
    }

    /// Shape-preserving value transform: `node_op` at internal positions,
    /// `leaf_op` at leaves.
    pub fn map<B, N, L>(&self, node_op: &N, leaf_op: &L) -> BTree<B>
    where
        N: Fn(&A) -> B,
        L: Fn(&A) -> B,
    {
        match self {
            BTree::Leaf(value) => BTree::Leaf(leaf_op(value)),
            BTree::Node(value, left, right) => BTree::node(
                node_op(value),
                left.map(node_op, leaf_op),
                right.map(node_op, leaf_op),
            ),
        }
    }

    /// Pair this tree with another of identical shape.
    pub fn zip<B>(&self, other: &BTree<B>) -> Result<BTree<(A, B)>, SkeletonError>
    where
        A: Clone,
        B: Clone,
    {
        match (self, other) {
            (BTree::Leaf(a), BTree::Leaf(b)) => Ok(BTree::Leaf((a.clone(), b.clone()))),
            (BTree::Node(a, al, ar), BTree::Node(b, bl, br)) => Ok(BTree::node(
                (a.clone(), b.clone()),
                al.zip(bl)?,
                ar.zip(br)?,
            )),
            _ => Err(SkeletonError::ShapeMismatch(
                "leaf paired with node".into(),
            )),
        }
    }

    /// Zip then combine pairwise, without materializing the pair tree.
    pub fn map2<B, C, N, L>(
        &self,
        node_op: &N,
        leaf_op: &L,
        other: &BTree<B>,
    ) -> Result<BTree<C>, SkeletonError>
    where
        N: Fn(&A, &B) -> C,
        L: Fn(&A, &B) -> C,
    {
        match (self, other) {
            (BTree::Leaf(a), BTree::Leaf(b)) => Ok(BTree::Leaf(leaf_op(a, b))),
            (BTree::Node(a, al, ar), BTree::Node(b, bl, br)) => Ok(BTree::node(
                node_op(a, b),
                al.map2(node_op, leaf_op, bl)?,
                ar.map2(node_op, leaf_op, br)?,
            )),
            _ => Err(SkeletonError::ShapeMismatch(
                "leaf paired with node".into(),
            )),
        }
    }
}

impl<A: Clone> BTree<A> {
    /// Bottom-up reduction: a leaf is its value, a node is
    /// `combine(reduce(left), value, reduce(right))`.
    pub fn reduce<F>(&self, combine: &F) -> A
    where
        F: Fn(&A, &A, &A) -> A,
    {
        match self {
            BTree::Leaf(value) => value.clone(),
            BTree::Node(value, left, right) => {
                combine(&left.reduce(combine), value, &right.reduce(combine))
            }
        }
    }

    /// Shape-preserving transform replacing every node's value with the
    /// reduction of its own subtree.
    pub fn upward_accumulate<F>(&self, combine: &F) -> BTree<A>
    where
        F: Fn(&A, &A, &A) -> A,
    {
        match self {
            BTree::Leaf(value) => BTree::Leaf(value.clone()),
            BTree::Node(value, left, right) => {
                let left = left.upward_accumulate(combine);
                let right = right.upward_accumulate(combine);
                // A subtree's accumulated root value is its reduction.
                let total = combine(left.value(), value, right.value());
                BTree::node(total, left, right)
            }
        }
    }

    /// Shape-preserving transform assigning every node the fold of the
    /// root-to-node path: the root receives `seed`, and each child receives
    /// a step over its parent's new and old values.
    pub fn downward_accumulate<D>(&self, steps: &D, seed: A) -> BTree<A>
    where
        D: DownwardOps<A>,
    {
        match self {
            BTree::Leaf(_) => BTree::Leaf(seed),
            BTree::Node(value, left, right) => {
                let left = left.accumulate_below(steps, &seed, value);
                let right = right.accumulate_below(steps, &seed, value);
                BTree::node(seed, left, right)
            }
        }
    }

    fn accumulate_below<D>(&self, steps: &D, parent_new: &A, parent_old: &A) -> BTree<A>
    where
        D: DownwardOps<A>,
    {
        match self {
            BTree::Leaf(_) => BTree::Leaf(steps.to_leaf(parent_new, parent_old)),
            BTree::Node(value, left, right) => {
                let new = steps.to_node(parent_new, parent_old);
                let left = left.accumulate_below(steps, &new, value);
                let right = right.accumulate_below(steps, &new, value);
                BTree::node(new, left, right)
            }
        }
    }

    /// Build a balanced tree of roughly `size` nodes, drawing values from
    /// `gen` in pre-order. Even sizes round up to the next odd count, since
    /// every internal node here has exactly two children.
    pub fn balanced(size: usize, gen: &mut impl FnMut() -> A) -> Self {
        let size = if size % 2 == 0 { size + 1 } else { size };
        if size == 1 {
            return Self::leaf(gen());
        }
        let value = gen();
        let mut left = (size - 1) / 2;
        if left % 2 == 0 {
            left -= 1;
        }
        let right = size - 1 - left;
        Self::node(
            value,
            Self::balanced(left, gen),
            Self::balanced(right, gen),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tree::ops::StepFns;

    fn sum3(l: &i64, v: &i64, r: &i64) -> i64 {
        l + v + r
    }

    #[test]
    fn test_map_applies_per_role() {
        let t = BTree::node(1, BTree::leaf(2), BTree::leaf(3));
        let mapped = t.map(&|v| v - 1, &|v| v + 1);
        assert_eq!(mapped, BTree::node(0, BTree::leaf(3), BTree::leaf(4)));
    }

    #[test]
    fn test_reduce_and_upward_accumulate() {
        let t = BTree::node(
            13,
            BTree::node(31, BTree::leaf(47), BTree::leaf(32)),
            BTree::node(72, BTree::leaf(92), BTree::leaf(42)),
        );
        assert_eq!(t.reduce(&sum3), 329);

        let up = t.upward_accumulate(&sum3);
        assert_eq!(*up.value(), 329);
        match up {
            BTree::Node(_, left, right) => {
                assert_eq!(*left.value(), 110);
                assert_eq!(*right.value(), 206);
            }
            BTree::Leaf(_) => panic!("shape changed"),
        }
    }

    #[test]
    fn test_downward_accumulate_paths() {
        let t = BTree::node(
            13,
            BTree::node(31, BTree::leaf(47), BTree::leaf(32)),
            BTree::node(72, BTree::leaf(92), BTree::leaf(42)),
        );
        let steps = StepFns::new(|n: &i64, o: &i64| n + o, |n: &i64, o: &i64| n + o);
        let down = t.downward_accumulate(&steps, 0);
        let expected = BTree::node(
            0,
            BTree::node(13, BTree::leaf(44), BTree::leaf(44)),
            BTree::node(13, BTree::leaf(85), BTree::leaf(85)),
        );
        assert_eq!(down, expected);
    }

    #[test]
    fn test_zip_rejects_shape_mismatch() {
        let a = BTree::leaf(1);
        let b = BTree::node(4, BTree::leaf(5), BTree::leaf(6));
        assert!(matches!(
            a.zip(&b),
            Err(SkeletonError::ShapeMismatch(_))
        ));
        assert!(matches!(
            b.zip(&a),
            Err(SkeletonError::ShapeMismatch(_))
        ));
    }

    #[test]
    fn test_balanced_builder_is_full() {
        let mut next = 0;
        let t = BTree::balanced(20, &mut || {
            next += 1;
            next
        });
        assert_eq!(t.size(), 21);
    }
}
