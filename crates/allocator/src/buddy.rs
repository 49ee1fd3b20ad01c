//! Binary buddy allocation.
//!
//! Every block has a power-of-two size and is aligned to its size. A request
//! is rounded up to the next power of two (but never below the minimum block
//! size), and a free block is halved until it matches. On deallocation a
//! block is merged with its buddy, the block at `start ^ size`, for as long
//! as the buddy is free and of the same size.
//!
//! ```text
//! capacity 1024, allocate 200 -> 256
//!
//! [            1024            ]
//! [     512     ][     512     ]
//! [ 256 ][ 256 ][     512     ]
//!   ^^^ owned
//! ```

use alloc::vec::Vec;

use log::{debug, trace};
use region_ledger::RegionLedger;
use snafu::ensure;

use crate::{
    Allocator,
    error::{
        AllocateError, ConfigError, DeallocateError, allocate_error, config_error,
        deallocate_error::NotFoundSnafu,
    },
    placement::{self, Policy},
    process::{Claim, Process, ProcessId, ProcessState},
    status::Slot,
};

/// Buddy-system allocator over a power-of-two capacity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuddyAllocator {
    ledger: RegionLedger<Claim>,
    min_block: usize,
}

impl BuddyAllocator {
    /// Creates an allocator holding one free block of `capacity` units.
    ///
    /// Both `capacity` and `min_block` must be powers of two, and
    /// `min_block` must not exceed `capacity`.
    pub fn new(capacity: usize, min_block: usize) -> Result<Self, ConfigError> {
        use config_error::{
            NotPowerOfTwoSnafu, UnitExceedsCapacitySnafu, ZeroCapacitySnafu, ZeroUnitSizeSnafu,
        };

        ensure!(capacity > 0, ZeroCapacitySnafu);
        ensure!(
            min_block > 0,
            ZeroUnitSizeSnafu {
                unit: "minimum block size"
            }
        );
        ensure!(
            capacity.is_power_of_two(),
            NotPowerOfTwoSnafu {
                what: "capacity",
                value: capacity,
            }
        );
        ensure!(
            min_block.is_power_of_two(),
            NotPowerOfTwoSnafu {
                what: "minimum block size",
                value: min_block,
            }
        );
        ensure!(
            min_block <= capacity,
            UnitExceedsCapacitySnafu {
                unit: "minimum block size",
                unit_size: min_block,
                capacity,
            }
        );

        Ok(Self {
            ledger: RegionLedger::new(capacity),
            min_block,
        })
    }

    #[must_use]
    pub fn min_block(&self) -> usize {
        self.min_block
    }

    /// Returns the size of the block a request of `requested` units would
    /// receive, or `None` if no block could ever hold it.
    #[must_use]
    pub fn block_size(&self, requested: usize) -> Option<usize> {
        let size = requested.checked_next_power_of_two()?.max(self.min_block);
        (size <= self.ledger.capacity()).then_some(size)
    }

    /// Checks that every block is a power of two in size and aligned to it.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.ledger.is_consistent()
            && self.ledger.iter().all(|block| {
                block.size.is_power_of_two()
                    && block.size >= self.min_block
                    && block.start.is_multiple_of(block.size)
            })
    }

    fn find(&self, id: ProcessId) -> Option<usize> {
        self.ledger
            .position(|block| block.owner.is_some_and(|claim| claim.id == id))
    }

    /// Merges the free block at `index` with its buddy until the buddy is
    /// missing, owned, or of a different size. Returns the final index.
    fn merge_buddies(&mut self, mut index: usize) -> usize {
        loop {
            let block = self.ledger.as_slice()[index];
            if block.size == self.ledger.capacity() {
                return index;
            }
            let buddy_start = block.start ^ block.size;
            let (lower, buddy) = if buddy_start > block.start {
                (index, index + 1)
            } else {
                let Some(prev) = index.checked_sub(1) else {
                    return index;
                };
                (prev, prev)
            };
            let Some(candidate) = self.ledger.get(buddy) else {
                return index;
            };
            if candidate.start != buddy_start
                || candidate.size != block.size
                || !candidate.is_free()
            {
                return index;
            }
            self.ledger.merge_with_next(lower);
            trace!(
                "buddy: merged {}..{} into a block of {}",
                block.start,
                block.end(),
                block.size * 2
            );
            index = lower;
        }
    }
}

impl Allocator for BuddyAllocator {
    fn capacity(&self) -> usize {
        self.ledger.capacity()
    }

    /// Places the process in the smallest free block that fits.
    ///
    /// The policy is ignored.
    fn allocate(&mut self, process: &mut Process, _policy: Policy) -> Result<(), AllocateError> {
        use allocate_error::{AlreadyAllocatedSnafu, EmptyRequestSnafu, OutOfSpaceSnafu};

        let id = process.id();
        let requested = process.size();
        ensure!(requested > 0, EmptyRequestSnafu { id });
        ensure!(self.find(id).is_none(), AlreadyAllocatedSnafu { id });

        let Some(wanted) = self.block_size(requested) else {
            return OutOfSpaceSnafu { id, requested }.fail();
        };
        let Some(index) =
            placement::select(self.ledger.free_candidates(), wanted, Policy::BestFit)
        else {
            return OutOfSpaceSnafu { id, requested }.fail();
        };

        loop {
            let block = self.ledger.as_slice()[index];
            let half = block.size / 2;
            if half < wanted {
                break;
            }
            self.ledger.split(index, half);
            trace!(
                "buddy: split {}..{} into two blocks of {half}",
                block.start,
                block.end()
            );
        }

        self.ledger.assign(index, Claim::new(id, requested));
        process.set_state(ProcessState::Allocated);
        let start = self.ledger.as_slice()[index].start;
        debug!("buddy: process {id} ({requested}) -> {start}..{}", start + wanted);
        debug_assert!(self.is_well_formed());
        Ok(())
    }

    fn deallocate(&mut self, id: ProcessId) -> Result<(), DeallocateError> {
        let Some(index) = self.find(id) else {
            return NotFoundSnafu { id }.fail();
        };
        self.ledger.release(index);
        let index = self.merge_buddies(index);
        let block = self.ledger.as_slice()[index];
        debug!(
            "buddy: process {id} released, free block {}..{}",
            block.start,
            block.end()
        );
        debug_assert!(self.is_well_formed());
        Ok(())
    }

    fn status(&self) -> Vec<Slot> {
        self.ledger
            .iter()
            .enumerate()
            .map(|(index, block)| Slot::from_region(index, block))
            .collect()
    }

    fn slots_of(&self, id: ProcessId) -> Vec<usize> {
        self.find(id).into_iter().collect()
    }
}
