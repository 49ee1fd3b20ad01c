//! Shared access to an allocator.

use alloc::vec::Vec;

use spin::Mutex;

use crate::{
    Allocator,
    error::{AllocateError, DeallocateError},
    placement::Policy,
    process::{Process, ProcessId},
    status::{MemoryStats, Slot},
};

/// An allocator behind a spin lock.
///
/// Each method holds the lock for exactly one operation, so callers on
/// different threads always observe the allocator between operations.
#[derive(Debug, Default)]
pub struct Locked<A> {
    inner: Mutex<A>,
}

impl<A> Locked<A> {
    pub const fn new(allocator: A) -> Self {
        Self {
            inner: Mutex::new(allocator),
        }
    }

    /// Runs `f` with exclusive access to the allocator.
    pub fn with<R>(&self, f: impl FnOnce(&mut A) -> R) -> R {
        f(&mut self.inner.lock())
    }

    pub fn into_inner(self) -> A {
        self.inner.into_inner()
    }
}

impl<A> Locked<A>
where
    A: Allocator,
{
    pub fn allocate(&self, process: &mut Process, policy: Policy) -> Result<(), AllocateError> {
        self.inner.lock().allocate(process, policy)
    }

    pub fn deallocate(&self, id: ProcessId) -> Result<(), DeallocateError> {
        self.inner.lock().deallocate(id)
    }

    pub fn status(&self) -> Vec<Slot> {
        self.inner.lock().status()
    }

    pub fn stats(&self) -> MemoryStats {
        self.inner.lock().stats()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::{dynamic::DynamicAllocator, paging::PagingAllocator};

    #[test]
    fn test_concurrent_allocate_and_deallocate() {
        let locked = Locked::new(DynamicAllocator::new(64 * 128).unwrap());
        thread::scope(|s| {
            for worker in 0..4_u32 {
                let locked = &locked;
                s.spawn(move || {
                    for round in 0..50_u32 {
                        let id = worker * 1000 + round;
                        let mut process = Process::new(id, 64);
                        locked.allocate(&mut process, Policy::BestFit).unwrap();
                        if round % 2 == 0 {
                            locked.deallocate(process.id()).unwrap();
                        }
                    }
                });
            }
        });

        let stats = locked.stats();
        assert_eq!(stats.requested, 4 * 25 * 64);
        let allocator = locked.into_inner();
        assert_eq!(allocator.stats(), stats);
    }

    #[test]
    fn test_with() {
        let locked = Locked::new(PagingAllocator::new(256, 64).unwrap());
        locked
            .allocate(&mut Process::new(1, 100), Policy::FirstFit)
            .unwrap();
        let table = locked.with(|paging| paging.page_table(ProcessId::new(1)).map(<[_]>::to_vec));
        assert_eq!(table, Some(vec![0, 1]));
        assert_eq!(locked.status().len(), 4);
    }
}
