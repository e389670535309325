//! The one-member group
//!
//! Runs the full two-phase skeletons without any peers; collectives
//! degenerate to identity. Useful as a default and for sequential tests
//! of the distributed pipeline.

use super::{Exchange, ProcessGroup};

/// A process group with a single member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SoloGroup;

impl ProcessGroup for SoloGroup {
    fn rank(&self) -> usize {
        0
    }

    fn size(&self) -> usize {
        1
    }

    fn broadcast<T, F>(&self, root: usize, make: F) -> T
    where
        T: Exchange,
        F: FnOnce() -> T,
    {
        debug_assert_eq!(root, 0, "broadcast root out of range");
        make()
    }

    fn gather<T>(&self, value: T) -> Vec<T>
    where
        T: Exchange,
    {
        vec![value]
    }
}
