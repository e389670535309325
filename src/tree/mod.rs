//! Trees, their linear encoding, and the skeletons over both
//!
//! `BTree` is the sequential reference. `Segment` and `LinearTree` encode
//! a tree as flat tagged sequences that survive partitioning, and
//! `DistTree` runs the parallel skeletons over one segment per process.

mod btree;
mod dist;
mod linear;
mod segment;
mod tag;

pub mod derived;
pub mod ops;

pub use btree::BTree;
pub use dist::DistTree;
pub use linear::LinearTree;
pub use segment::Segment;
pub use tag::Tag;
