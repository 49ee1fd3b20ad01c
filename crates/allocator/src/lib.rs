//! Simulated memory allocators for classical allocation techniques.
//!
//! This crate models how an operating system hands out a span of memory to
//! processes. Memory is abstract: addresses are plain numbers from zero to a
//! fixed capacity, and no bytes are ever read or written. Every allocator
//! keeps its layout consistent after each call, so the interesting part is
//! watching how placement decisions and fragmentation evolve.
//!
//! The crate is `no_std` compatible and only needs `alloc`.
//!
//! # Available Allocators
//!
//! ## [`FixedPartitionAllocator`](fixed::FixedPartitionAllocator)
//!
//! Equal partitions decided up front, one process per partition. Requests
//! larger than a partition are rejected outright.
//!
//! ## [`UnequalPartitionAllocator`](unequal::UnequalPartitionAllocator)
//!
//! Partitions of caller-chosen sizes. Best-fit by default. Can optionally
//! spread a large process over several partitions, rolling back if the
//! request cannot be completed.
//!
//! ## [`DynamicAllocator`](dynamic::DynamicAllocator)
//!
//! Splits free regions on allocation and coalesces neighbors on
//! deallocation.
//!
//! ## [`BuddyAllocator`](buddy::BuddyAllocator)
//!
//! Power-of-two blocks that are only ever merged with their buddy.
//!
//! ## [`PagingAllocator`](paging::PagingAllocator)
//!
//! Fixed-size frames handed out non-contiguously, with a page table per
//! process.
//!
//! # Usage
//!
//! ```rust
//! use allocator::{Allocator, Memory, Policy, Process, Technique, trace::trace};
//!
//! let technique = Technique::Unequal {
//!     partitions: vec![100, 500, 200, 300, 600],
//!     spanning: false,
//! };
//! let mut memory = Memory::new(&technique).unwrap();
//!
//! let placed = trace(&mut memory, &[212, 417, 112, 426], Policy::BestFit);
//! assert_eq!(placed, [Some(3), Some(1), Some(2), Some(4)]);
//!
//! let stats = memory.stats();
//! assert_eq!(stats.free, 100);
//! assert_eq!(stats.internal_fragmentation(), 1600 - 1167);
//! ```
//!
//! # Characteristics
//!
//! | Allocator | Policy | Splits | Merges | Internal fragmentation |
//! |-----------|--------|--------|--------|------------------------|
//! | `FixedPartitionAllocator` | any | never | never | partition size - request |
//! | `UnequalPartitionAllocator` | any | never | never | partition size - request |
//! | `DynamicAllocator` | any | on allocate | with any free neighbor | none |
//! | `BuddyAllocator` | ignored | halving | with its buddy only | up to half a block |
//! | `PagingAllocator` | ignored | never | never | last frame only |
//!
//! ## Thread Safety
//!
//! The allocators are `Send` and `Sync` but every mutating operation takes
//! `&mut self`. Wrap one in [`Locked`](sync::Locked) to share it between
//! threads.

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

use alloc::vec::Vec;

pub use self::{
    error::{AllocateError, ConfigError, DeallocateError},
    memory::{Memory, Technique},
    placement::{ParsePolicyError, Policy},
    process::{Process, ProcessId, ProcessState},
    status::{MemoryStats, Slot, SlotState},
};

pub mod buddy;
pub mod dynamic;
pub mod error;
pub mod fixed;
pub mod memory;
pub mod paging;
mod partition;
pub mod placement;
pub mod process;
pub mod status;
pub mod sync;
pub mod trace;
pub mod unequal;

/// Operations shared by every allocation technique.
///
/// Every operation either succeeds completely or returns an error without
/// changing the allocator.
pub trait Allocator {
    /// Returns the total number of units managed.
    fn capacity(&self) -> usize;

    /// Places `process` according to `policy` and marks it allocated.
    ///
    /// On failure the process stays unallocated.
    fn allocate(&mut self, process: &mut Process, policy: Policy) -> Result<(), AllocateError>;

    /// Frees everything owned by `id`.
    fn deallocate(&mut self, id: ProcessId) -> Result<(), DeallocateError>;

    /// Returns every slot in address order.
    fn status(&self) -> Vec<Slot>;

    /// Returns the status indices of the slots owned by `id`.
    fn slots_of(&self, id: ProcessId) -> Vec<usize>;

    /// Summarizes usage and fragmentation from the current status.
    fn stats(&self) -> MemoryStats {
        MemoryStats::from_slots(self.capacity(), &self.status())
    }

    /// Deallocates `process` and marks it unallocated again.
    fn release(&mut self, process: &mut Process) -> Result<(), DeallocateError> {
        self.deallocate(process.id())?;
        process.set_state(ProcessState::Unallocated);
        Ok(())
    }
}
