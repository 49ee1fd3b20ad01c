//! Fixed-size partitioning.
//!
//! Memory is cut into equally sized partitions when the allocator is built.
//! Each process occupies exactly one partition, so a request larger than the
//! partition size can never be served, and anything smaller wastes the rest
//! of its partition.

use alloc::{vec, vec::Vec};

use log::debug;
use snafu::ensure;

use crate::{
    Allocator,
    error::{
        AllocateError, ConfigError, DeallocateError, allocate_error, config_error,
        deallocate_error::NotFoundSnafu,
    },
    partition::PartitionTable,
    placement::Policy,
    process::{Process, ProcessId, ProcessState},
    status::Slot,
};

/// Allocator over `capacity / partition_size` identical partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FixedPartitionAllocator {
    table: PartitionTable,
    partition_size: usize,
}

impl FixedPartitionAllocator {
    /// Creates an allocator with every partition free.
    ///
    /// `capacity` must be a non-zero multiple of `partition_size`.
    pub fn new(capacity: usize, partition_size: usize) -> Result<Self, ConfigError> {
        use config_error::{
            NotMultipleSnafu, UnitExceedsCapacitySnafu, ZeroCapacitySnafu, ZeroUnitSizeSnafu,
        };

        ensure!(capacity > 0, ZeroCapacitySnafu);
        ensure!(
            partition_size > 0,
            ZeroUnitSizeSnafu {
                unit: "partition size"
            }
        );
        ensure!(
            partition_size <= capacity,
            UnitExceedsCapacitySnafu {
                unit: "partition size",
                unit_size: partition_size,
                capacity,
            }
        );
        ensure!(
            capacity.is_multiple_of(partition_size),
            NotMultipleSnafu {
                capacity,
                unit: "partition size",
                unit_size: partition_size,
            }
        );

        let sizes = vec![partition_size; capacity / partition_size];
        Ok(Self {
            table: PartitionTable::new(&sizes),
            partition_size,
        })
    }

    #[must_use]
    pub fn partition_size(&self) -> usize {
        self.partition_size
    }

    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.table.partition_count()
    }
}

impl Allocator for FixedPartitionAllocator {
    fn capacity(&self) -> usize {
        self.table.capacity()
    }

    fn allocate(&mut self, process: &mut Process, policy: Policy) -> Result<(), AllocateError> {
        use allocate_error::{
            AlreadyAllocatedSnafu, EmptyRequestSnafu, OutOfSpaceSnafu, SizeExceedsPartitionSnafu,
        };

        let id = process.id();
        let requested = process.size();
        ensure!(requested > 0, EmptyRequestSnafu { id });
        ensure!(!self.table.contains(id), AlreadyAllocatedSnafu { id });
        ensure!(
            requested <= self.partition_size,
            SizeExceedsPartitionSnafu {
                id,
                requested,
                limit: self.partition_size,
            }
        );

        let Some(index) = self.table.claim_single(id, requested, policy) else {
            return OutOfSpaceSnafu { id, requested }.fail();
        };
        process.set_state(ProcessState::Allocated);
        debug!("fixed: process {id} ({requested}) -> partition {index} ({policy})");
        Ok(())
    }

    fn deallocate(&mut self, id: ProcessId) -> Result<(), DeallocateError> {
        let freed = self.table.release(id);
        ensure!(freed > 0, NotFoundSnafu { id });
        debug!("fixed: process {id} released {freed} partition(s)");
        Ok(())
    }

    fn status(&self) -> Vec<Slot> {
        self.table.status()
    }

    fn slots_of(&self, id: ProcessId) -> Vec<usize> {
        self.table.owned(id).collect()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::SlotState;

    fn allocator() -> FixedPartitionAllocator {
        FixedPartitionAllocator::new(1000, 250).unwrap()
    }

    #[test]
    fn test_construction() {
        let allocator = allocator();
        assert_eq!(allocator.partition_count(), 4);
        assert_eq!(allocator.partition_size(), 250);
        assert_eq!(allocator.capacity(), 1000);
        assert!(allocator.table.ledger().is_consistent());
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            FixedPartitionAllocator::new(0, 10),
            Err(ConfigError::ZeroCapacity { .. })
        ));
        assert!(matches!(
            FixedPartitionAllocator::new(100, 0),
            Err(ConfigError::ZeroUnitSize { .. })
        ));
        assert!(matches!(
            FixedPartitionAllocator::new(100, 200),
            Err(ConfigError::UnitExceedsCapacity { .. })
        ));
        assert!(matches!(
            FixedPartitionAllocator::new(1000, 300),
            Err(ConfigError::NotMultiple {
                unit_size: 300,
                ..
            })
        ));
    }

    #[test]
    fn test_allocate_first_fit() {
        let mut allocator = allocator();
        let mut a = Process::new(1, 100);
        let mut b = Process::new(2, 250);
        allocator.allocate(&mut a, Policy::FirstFit).unwrap();
        allocator.allocate(&mut b, Policy::FirstFit).unwrap();
        assert!(a.state().is_allocated());
        assert_eq!(allocator.slots_of(a.id()), vec![0]);
        assert_eq!(allocator.slots_of(b.id()), vec![1]);

        let status = allocator.status();
        assert_eq!(status[0].state, SlotState::Occupied(ProcessId::new(1)));
        assert_eq!(status[0].used, 100);
        assert!(status[2].state.is_free());
    }

    #[test]
    fn test_size_exceeds_partition() {
        let mut allocator = allocator();
        let mut process = Process::new(1, 251);
        let err = allocator
            .allocate(&mut process, Policy::FirstFit)
            .unwrap_err();
        assert!(matches!(
            err,
            AllocateError::SizeExceedsPartition {
                requested: 251,
                limit: 250,
                ..
            }
        ));
        assert!(process.state().is_unallocated());
        assert_eq!(allocator, self::allocator());
    }

    #[test]
    fn test_out_of_space() {
        let mut allocator = allocator();
        for id in 0..4_u32 {
            allocator
                .allocate(&mut Process::new(id, 10), Policy::FirstFit)
                .unwrap();
        }
        let before = allocator.clone();
        let mut process = Process::new(9, 10);
        let err = allocator
            .allocate(&mut process, Policy::BestFit)
            .unwrap_err();
        assert!(matches!(err, AllocateError::OutOfSpace { .. }));
        assert_eq!(allocator, before);
    }

    #[test]
    fn test_duplicate_and_empty_requests() {
        let mut allocator = allocator();
        allocator
            .allocate(&mut Process::new(1, 10), Policy::FirstFit)
            .unwrap();
        assert!(matches!(
            allocator.allocate(&mut Process::new(1, 10), Policy::FirstFit),
            Err(AllocateError::AlreadyAllocated { .. })
        ));
        assert!(matches!(
            allocator.allocate(&mut Process::new(2, 0), Policy::FirstFit),
            Err(AllocateError::EmptyRequest { .. })
        ));
    }

    #[test]
    fn test_deallocate() {
        let mut allocator = allocator();
        let mut process = Process::new(3, 200);
        allocator.allocate(&mut process, Policy::WorstFit).unwrap();
        allocator.release(&mut process).unwrap();
        assert!(process.state().is_unallocated());
        assert_eq!(allocator, self::allocator());

        assert!(matches!(
            allocator.deallocate(ProcessId::new(3)),
            Err(DeallocateError::NotFound { .. })
        ));
    }
}
