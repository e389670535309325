//! SPMD thread groups
//!
//! One OS thread per member, collectives through a shared slot table and
//! a barrier. Two barrier crossings bound each collective: all writes
//! land before any read, and all reads finish before the next collective
//! may overwrite a slot.

use std::any::Any;
use std::fmt;
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

use super::{Exchange, ProcessGroup};

struct Shared {
    size: usize,
    slots: Mutex<Vec<Option<Box<dyn Any + Send>>>>,
    barrier: Barrier,
}

/// One member of an in-process SPMD group.
#[derive(Clone)]
pub struct ThreadGroup {
    rank: usize,
    shared: Arc<Shared>,
}

impl ThreadGroup {
    /// Run `body` as `size` identical members and return their results in
    /// rank order. Panics in any member propagate after the group joins.
    pub fn run<R, F>(size: usize, body: F) -> Vec<R>
    where
        R: Send,
        F: Fn(ThreadGroup) -> R + Sync,
    {
        assert!(size >= 1, "a process group needs at least one member");
        let shared = Arc::new(Shared {
            size,
            slots: Mutex::new((0..size).map(|_| None).collect()),
            barrier: Barrier::new(size),
        });
        thread::scope(|scope| {
            let handles: Vec<_> = (0..size)
                .map(|rank| {
                    let group = ThreadGroup {
                        rank,
                        shared: Arc::clone(&shared),
                    };
                    let body = &body;
                    scope.spawn(move || body(group))
                })
                .collect();
            handles
                .into_iter()
                .map(|handle| handle.join().expect("group member panicked"))
                .collect()
        })
    }

    fn write_slot<T: Exchange>(&self, slot: usize, value: T) {
        let mut slots = self.shared.slots.lock().expect("process group poisoned");
        slots[slot] = Some(Box::new(value));
    }

    fn read_slot<T: Exchange>(&self, slot: usize) -> T {
        let slots = self.shared.slots.lock().expect("process group poisoned");
        slots[slot]
            .as_ref()
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
            .expect("mismatched collective payload across the group")
    }
}

impl ProcessGroup for ThreadGroup {
    fn rank(&self) -> usize {
        self.rank
    }

    fn size(&self) -> usize {
        self.shared.size
    }

    fn broadcast<T, F>(&self, root: usize, make: F) -> T
    where
        T: Exchange,
        F: FnOnce() -> T,
    {
        assert!(root < self.shared.size, "broadcast root out of range");
        if self.rank == root {
            self.write_slot(root, make());
        }
        self.shared.barrier.wait();
        let value = self.read_slot::<T>(root);
        self.shared.barrier.wait();
        value
    }

    fn gather<T>(&self, value: T) -> Vec<T>
    where
        T: Exchange,
    {
        self.write_slot(self.rank, value);
        self.shared.barrier.wait();
        let values = (0..self.shared.size)
            .map(|rank| self.read_slot::<T>(rank))
            .collect();
        self.shared.barrier.wait();
        values
    }
}

impl fmt::Debug for ThreadGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ThreadGroup")
            .field("rank", &self.rank)
            .field("size", &self.shared.size)
            .finish()
    }
}
