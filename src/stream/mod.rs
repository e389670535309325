//! Micro-batch streaming
//!
//! A small engine, unrelated to the tree skeletons, that buffers growing
//! input into fixed-size windows and applies queued operations to each
//! window as it fills. `WindowStream` is the sequential engine;
//! `ReplicatedStream` lets one root member drive a source and replicates
//! the window state to the whole process group.

mod replicated;
mod window;

pub use replicated::ReplicatedStream;
pub use window::WindowStream;
