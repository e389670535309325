//! Named combination strategies for the skeletons
//!
//! Each skeleton takes one strategy value instead of a positional list of
//! closures; the strategy names say where each function applies.

/// Combination strategy for `reduce` and `upward_accumulate`.
///
/// `leaf` transforms a leaf value, `node` combines an internal value with
/// the results of its two children in the local phase, and `critical`
/// combines at critical positions during the global phase. Most reductions
/// combine identically at both internal roles, so `critical` defaults to
/// `node`.
pub trait ReduceOps<A, B> {
    /// Transform a leaf value.
    fn leaf(&self, value: &A) -> B;

    /// Combine at a NODE position: `node(left, value, right)`.
    fn node(&self, left: B, value: &A, right: B) -> B;

    /// Combine at a CRITICAL position, once both child segments have
    /// been resolved.
    fn critical(&self, left: B, value: &A, right: B) -> B {
        self.node(left, value, right)
    }
}

/// Step strategy for `downward_accumulate`.
///
/// A child's new value is computed from its parent's new and old values;
/// the step differs by the child's role.
pub trait DownwardOps<A> {
    /// Step onto an internal child.
    fn to_node(&self, parent_new: &A, parent_old: &A) -> A;

    /// Step onto a leaf child.
    fn to_leaf(&self, parent_new: &A, parent_old: &A) -> A;
}

/// `ReduceOps` from a leaf transform and a node combine; the critical
/// combine falls back to the node combine.
pub struct ReduceFns<L, N> {
    leaf: L,
    node: N,
}

impl<L, N> ReduceFns<L, N> {
    /// Build the strategy from the two closures.
    pub fn new(leaf: L, node: N) -> Self {
        Self { leaf, node }
    }
}

impl<A, B, L, N> ReduceOps<A, B> for ReduceFns<L, N>
where
    L: Fn(&A) -> B,
    N: Fn(B, &A, B) -> B,
{
    fn leaf(&self, value: &A) -> B {
        (self.leaf)(value)
    }

    fn node(&self, left: B, value: &A, right: B) -> B {
        (self.node)(left, value, right)
    }
}

/// `ReduceOps` with a distinct critical combine.
pub struct CriticalReduceFns<L, N, C> {
    leaf: L,
    node: N,
    critical: C,
}

impl<L, N, C> CriticalReduceFns<L, N, C> {
    /// Build the strategy from the three closures.
    pub fn new(leaf: L, node: N, critical: C) -> Self {
        Self {
            leaf,
            node,
            critical,
        }
    }
}

impl<A, B, L, N, C> ReduceOps<A, B> for CriticalReduceFns<L, N, C>
where
    L: Fn(&A) -> B,
    N: Fn(B, &A, B) -> B,
    C: Fn(B, &A, B) -> B,
{
    fn leaf(&self, value: &A) -> B {
        (self.leaf)(value)
    }

    fn node(&self, left: B, value: &A, right: B) -> B {
        (self.node)(left, value, right)
    }

    fn critical(&self, left: B, value: &A, right: B) -> B {
        (self.critical)(left, value, right)
    }
}

/// `DownwardOps` from two step closures.
pub struct StepFns<N, L> {
    to_node: N,
    to_leaf: L,
}

impl<N, L> StepFns<N, L> {
    /// Build the strategy from the two step closures.
    pub fn new(to_node: N, to_leaf: L) -> Self {
        Self { to_node, to_leaf }
    }
}

impl<A, N, L> DownwardOps<A> for StepFns<N, L>
where
    N: Fn(&A, &A) -> A,
    L: Fn(&A, &A) -> A,
{
    fn to_node(&self, parent_new: &A, parent_old: &A) -> A {
        (self.to_node)(parent_new, parent_old)
    }

    fn to_leaf(&self, parent_new: &A, parent_old: &A) -> A {
        (self.to_leaf)(parent_new, parent_old)
    }
}

/// Fuses an elementwise map into a reduction strategy, so the mapped tree
/// never has to exist.
pub(crate) struct MappedReduce<'a, NO, LO, R> {
    pub node_op: &'a NO,
    pub leaf_op: &'a LO,
    pub inner: &'a R,
}

impl<A, M, B, NO, LO, R> ReduceOps<A, B> for MappedReduce<'_, NO, LO, R>
where
    NO: Fn(&A) -> M,
    LO: Fn(&A) -> M,
    R: ReduceOps<M, B>,
{
    fn leaf(&self, value: &A) -> B {
        self.inner.leaf(&(self.leaf_op)(value))
    }

    fn node(&self, left: B, value: &A, right: B) -> B {
        self.inner.node(left, &(self.node_op)(value), right)
    }

    fn critical(&self, left: B, value: &A, right: B) -> B {
        self.inner.critical(left, &(self.node_op)(value), right)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_critical_defaults_to_node() {
        let ops = ReduceFns::new(|v: &i64| *v, |l: i64, v: &i64, r: i64| l + v + r);
        assert_eq!(ops.critical(1, &2, 3), ops.node(1, &2, 3));
    }

    #[test]
    fn test_distinct_critical_combine() {
        let ops = CriticalReduceFns::new(
            |v: &i64| *v,
            |l: i64, v: &i64, r: i64| l + v + r,
            |l: i64, v: &i64, r: i64| l.max(*v).max(r),
        );
        assert_eq!(ops.node(1, &2, 3), 6);
        assert_eq!(ops.critical(1, &2, 3), 3);
    }
}
