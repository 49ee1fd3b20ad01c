//! Dynamic (free-list) allocation.
//!
//! Memory starts as one free region. Allocation carves the requested size
//! off the front of the chosen free region; deallocation frees the region
//! and immediately coalesces every run of neighboring free regions, so two
//! free regions are never left side by side.
//!
//! ```text
//! allocate A=212, B=417        deallocate A
//! ┌─────┬───────┬──────────┐   ┌─────┬───────┬──────────┐
//! │  A  │   B   │   free   │   │free │   B   │   free   │
//! └─────┴───────┴──────────┘   └─────┴───────┴──────────┘
//! 0    212     629      1000   0    212     629      1000
//! ```

use alloc::vec::Vec;

use log::{debug, trace};
use region_ledger::RegionLedger;
use snafu::ensure;

use crate::{
    Allocator,
    error::{
        AllocateError, ConfigError, DeallocateError, allocate_error,
        config_error::ZeroCapacitySnafu, deallocate_error::NotFoundSnafu,
    },
    placement::{self, Policy},
    process::{Claim, Process, ProcessId, ProcessState},
    status::Slot,
};

/// Variable-partition allocator with split-on-allocate and mandatory
/// coalescing on deallocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DynamicAllocator {
    ledger: RegionLedger<Claim>,
}

impl DynamicAllocator {
    pub fn new(capacity: usize) -> Result<Self, ConfigError> {
        ensure!(capacity > 0, ZeroCapacitySnafu);
        Ok(Self {
            ledger: RegionLedger::new(capacity),
        })
    }

    /// Returns the number of regions, free and owned.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.ledger.region_count()
    }

    fn find(&self, id: ProcessId) -> Option<usize> {
        self.ledger
            .position(|region| region.owner.is_some_and(|claim| claim.id == id))
    }
}

impl Allocator for DynamicAllocator {
    fn capacity(&self) -> usize {
        self.ledger.capacity()
    }

    fn allocate(&mut self, process: &mut Process, policy: Policy) -> Result<(), AllocateError> {
        use allocate_error::{AlreadyAllocatedSnafu, EmptyRequestSnafu, OutOfSpaceSnafu};

        let id = process.id();
        let requested = process.size();
        ensure!(requested > 0, EmptyRequestSnafu { id });
        ensure!(self.find(id).is_none(), AlreadyAllocatedSnafu { id });

        let Some(index) = placement::select(self.ledger.free_candidates(), requested, policy)
        else {
            return OutOfSpaceSnafu { id, requested }.fail();
        };

        let hole = self.ledger.as_slice()[index];
        if hole.size > requested {
            let rest = self.ledger.split(index, requested);
            trace!(
                "dynamic: split {}..{} leaving {} free at region {rest}",
                hole.start,
                hole.end(),
                hole.size - requested
            );
        }
        self.ledger.assign(index, Claim::new(id, requested));
        process.set_state(ProcessState::Allocated);
        debug!(
            "dynamic: process {id} ({requested}) -> {}..{} ({policy})",
            hole.start,
            hole.start + requested
        );
        Ok(())
    }

    fn deallocate(&mut self, id: ProcessId) -> Result<(), DeallocateError> {
        let owned: Vec<_> = self.ledger.owned_by(move |claim| claim.id == id).collect();
        ensure!(!owned.is_empty(), NotFoundSnafu { id });

        for &index in &owned {
            self.ledger.release(index);
        }
        let merged = self.ledger.coalesce();
        debug_assert!(self.ledger.is_coalesced());
        debug!("dynamic: process {id} released, {merged} merge(s)");
        Ok(())
    }

    fn status(&self) -> Vec<Slot> {
        self.ledger
            .iter()
            .enumerate()
            .map(|(index, region)| Slot::from_region(index, region))
            .collect()
    }

    fn slots_of(&self, id: ProcessId) -> Vec<usize> {
        self.find(id).into_iter().collect()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    fn shape(allocator: &DynamicAllocator) -> Vec<(usize, usize, Option<u32>)> {
        allocator
            .ledger
            .iter()
            .map(|r| (r.start, r.size, r.owner.map(|claim| claim.id.get())))
            .collect()
    }

    fn alloc(allocator: &mut DynamicAllocator, id: u32, size: usize, policy: Policy) {
        allocator
            .allocate(&mut Process::new(id, size), policy)
            .unwrap();
    }

    #[test]
    fn test_zero_capacity() {
        assert!(matches!(
            DynamicAllocator::new(0),
            Err(ConfigError::ZeroCapacity { .. })
        ));
    }

    #[test]
    fn test_split_on_allocate() {
        let mut allocator = DynamicAllocator::new(1000).unwrap();
        alloc(&mut allocator, 1, 212, Policy::FirstFit);
        alloc(&mut allocator, 2, 417, Policy::FirstFit);
        assert_eq!(
            shape(&allocator),
            vec![(0, 212, Some(1)), (212, 417, Some(2)), (629, 371, None)]
        );
        assert!(allocator.ledger.is_consistent());
    }

    #[test]
    fn test_exact_fit_does_not_split() {
        let mut allocator = DynamicAllocator::new(100).unwrap();
        alloc(&mut allocator, 1, 100, Policy::FirstFit);
        assert_eq!(shape(&allocator), vec![(0, 100, Some(1))]);
        assert!(matches!(
            allocator.allocate(&mut Process::new(2, 1), Policy::FirstFit),
            Err(AllocateError::OutOfSpace { .. })
        ));
    }

    #[test]
    fn test_best_fit_reuses_exact_hole() {
        let mut allocator = DynamicAllocator::new(1000).unwrap();
        alloc(&mut allocator, 1, 212, Policy::BestFit);
        alloc(&mut allocator, 2, 417, Policy::BestFit);
        allocator.deallocate(ProcessId::new(1)).unwrap();

        // Holes: 0..212 (212 free) and 629..1000 (371 free)
        alloc(&mut allocator, 3, 200, Policy::BestFit);
        assert_eq!(
            shape(&allocator),
            vec![
                (0, 200, Some(3)),
                (200, 12, None),
                (212, 417, Some(2)),
                (629, 371, None),
            ]
        );
    }

    #[test]
    fn test_worst_fit_takes_largest_hole() {
        let mut allocator = DynamicAllocator::new(1000).unwrap();
        alloc(&mut allocator, 1, 212, Policy::WorstFit);
        alloc(&mut allocator, 2, 417, Policy::WorstFit);
        allocator.deallocate(ProcessId::new(1)).unwrap();

        alloc(&mut allocator, 3, 200, Policy::WorstFit);
        assert_eq!(allocator.slots_of(ProcessId::new(3)), vec![2]);
        assert_eq!(allocator.status()[2].start, 629);
    }

    #[test]
    fn test_coalesce_both_neighbors() {
        let mut allocator = DynamicAllocator::new(300).unwrap();
        for id in 1..=3 {
            alloc(&mut allocator, id, 100, Policy::FirstFit);
        }
        allocator.deallocate(ProcessId::new(1)).unwrap();
        allocator.deallocate(ProcessId::new(3)).unwrap();
        assert_eq!(
            shape(&allocator),
            vec![(0, 100, None), (100, 100, Some(2)), (200, 100, None)]
        );

        allocator.deallocate(ProcessId::new(2)).unwrap();
        assert_eq!(shape(&allocator), vec![(0, 300, None)]);
    }

    #[test]
    fn test_failed_allocate_changes_nothing() {
        let mut allocator = DynamicAllocator::new(300).unwrap();
        alloc(&mut allocator, 1, 100, Policy::FirstFit);
        alloc(&mut allocator, 2, 100, Policy::FirstFit);
        allocator.deallocate(ProcessId::new(1)).unwrap();
        let before = allocator.clone();

        // 200 free in total, but split in two holes of 100
        let mut process = Process::new(3, 150);
        let err = allocator
            .allocate(&mut process, Policy::WorstFit)
            .unwrap_err();
        assert!(matches!(err, AllocateError::OutOfSpace { requested: 150, .. }));
        assert_eq!(allocator, before);
        assert_eq!(allocator.stats().external_fragmentation(), 100);
    }

    #[test]
    fn test_allocate_then_deallocate_restores_layout() {
        let mut allocator = DynamicAllocator::new(1000).unwrap();
        alloc(&mut allocator, 1, 300, Policy::FirstFit);
        alloc(&mut allocator, 2, 300, Policy::FirstFit);
        allocator.deallocate(ProcessId::new(1)).unwrap();

        for policy in [Policy::FirstFit, Policy::BestFit, Policy::WorstFit] {
            let before = allocator.clone();
            alloc(&mut allocator, 9, 120, policy);
            allocator.deallocate(ProcessId::new(9)).unwrap();
            assert_eq!(allocator, before, "{policy}");
        }
    }

    #[test]
    fn test_deallocate_unknown() {
        let mut allocator = DynamicAllocator::new(10).unwrap();
        assert!(matches!(
            allocator.deallocate(ProcessId::new(1)),
            Err(DeallocateError::NotFound { .. })
        ));
    }
}
