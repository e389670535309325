//! Group-replicated micro-batches
//!
//! One root member owns the source; everyone else receives the window
//! state by broadcast after each round, so any member can read the
//! running results without touching the input.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use crate::comm::{Exchange, ProcessGroup};
use crate::stream::WindowStream;

/// Conventional owner of the source.
const ROOT: usize = 0;

/// An operation queued against every future window.
pub enum WindowOp<T> {
    /// Transform each buffered item.
    Map(Arc<dyn Fn(&T) -> T + Send + Sync>),
    /// Drop buffered items failing the predicate.
    Filter(Arc<dyn Fn(&T) -> bool + Send + Sync>),
    /// Fold the window, carrying the previous window's value.
    Reduce(Arc<dyn Fn(&T, &T) -> T + Send + Sync>, Option<T>),
}

impl<T> fmt::Debug for WindowOp<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WindowOp::Map(_) => write!(f, "Map"),
            WindowOp::Filter(_) => write!(f, "Filter"),
            WindowOp::Reduce(_, _) => write!(f, "Reduce"),
        }
    }
}

/// A windowed stream whose state is identical on every group member.
#[derive(Debug)]
pub struct ReplicatedStream<T, G> {
    inner: WindowStream<T>,
    ops: Vec<WindowOp<T>>,
    group: G,
}

impl<T, G> ReplicatedStream<T, G>
where
    T: Exchange,
    G: ProcessGroup + Clone,
{
    /// A replicated stream over `group` with the given window size.
    pub fn new(group: &G, window_size: usize) -> Self {
        Self {
            inner: WindowStream::new(window_size),
            ops: Vec::new(),
            group: group.clone(),
        }
    }

    /// Queue a map against every future window.
    pub fn map(&mut self, op: impl Fn(&T) -> T + Send + Sync + 'static) -> &mut Self {
        self.ops.push(WindowOp::Map(Arc::new(op)));
        self
    }

    /// Queue a filter against every future window.
    pub fn filter(&mut self, predicate: impl Fn(&T) -> bool + Send + Sync + 'static) -> &mut Self {
        self.ops.push(WindowOp::Filter(Arc::new(predicate)));
        self
    }

    /// Queue a carrying reduce against every future window.
    pub fn reduce(
        &mut self,
        op: impl Fn(&T, &T) -> T + Send + Sync + 'static,
        neutral: Option<T>,
    ) -> &mut Self {
        self.ops.push(WindowOp::Reduce(Arc::new(op), neutral));
        self
    }

    /// One micro-batch round, collective: the root fills its window from
    /// `source` (other members pass `None`), applies the queued operations
    /// in order, rotates, and the resulting state replaces every member's.
    pub fn run_round<I>(&mut self, source: Option<&mut I>) -> &WindowStream<T>
    where
        I: Iterator<Item = T>,
    {
        let group = self.group.clone();
        let inner = &mut self.inner;
        let ops = &self.ops;
        let state = group.broadcast(ROOT, move || {
            if let Some(source) = source {
                inner.fill_from(source);
            }
            for op in ops {
                match op {
                    WindowOp::Map(f) => inner.map(|item| f(item)),
                    WindowOp::Filter(f) => inner.filter(|item| f(item)),
                    WindowOp::Reduce(f, neutral) => {
                        inner.reduce(|a, b| f(a, b), neutral.clone());
                    }
                }
            }
            inner.rotate();
            inner.clone()
        });
        debug!(
            rank = self.group.rank(),
            processed = state.processed().len(),
            "stream round replicated"
        );
        self.inner = state;
        &self.inner
    }

    /// The replicated window state as of the last round.
    pub fn state(&self) -> &WindowStream<T> {
        &self.inner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::comm::SoloGroup;

    #[test]
    fn test_round_applies_queued_ops_in_order() {
        let mut stream = ReplicatedStream::new(&SoloGroup, 4);
        stream.filter(|v: &i64| v % 2 == 0);
        stream.map(|v| v + 1);
        stream.reduce(|a, b| a + b, Some(0));

        let mut source = vec![1_i64, 2, 3, 4, 5, 6].into_iter();
        stream.run_round(Some(&mut source));
        // first window [1,2,3,4] -> evens [2,4] -> incremented [3,5] -> 8
        assert_eq!(stream.state().last_reduced(), Some(&8));
        assert_eq!(stream.state().last_window(), &[3, 5]);

        stream.run_round(Some(&mut source));
        // second window [5,6] -> [6] -> [7] -> 7 plus the carried 8
        assert_eq!(stream.state().last_reduced(), Some(&15));
    }
}
