//! Unequal-size fixed partitioning.
//!
//! Partitions of caller-chosen sizes are laid out back to back at
//! construction and never split or merged. By default a process must fit in
//! a single partition; with spanning enabled a large process may occupy
//! several, and a request that cannot be completed is rolled back.

use alloc::vec::Vec;

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

/// Allocator over a fixed list of differently sized partitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnequalPartitionAllocator {
    table: PartitionTable,
    spanning: bool,
}

impl UnequalPartitionAllocator {
    /// The policy that keeps internal fragmentation lowest for
    /// heterogeneous partition sizes.
    pub const DEFAULT_POLICY: Policy = Policy::BestFit;

    /// Creates an allocator whose partitions have the given sizes, in
    /// address order. The capacity is their sum.
    pub fn new(sizes: &[usize]) -> Result<Self, ConfigError> {
        ensure!(!sizes.is_empty(), config_error::NoPartitionsSnafu);
        if let Some(index) = sizes.iter().position(|&size| size == 0) {
            return config_error::ZeroPartitionSnafu { index }.fail();
        }
        let capacity = sizes
            .iter()
            .try_fold(0_usize, |total, &size| total.checked_add(size));
        ensure!(capacity.is_some(), config_error::CapacityOverflowSnafu);
        Ok(Self {
            table: PartitionTable::new(sizes),
            spanning: false,
        })
    }

    /// Allows a single process to occupy several partitions.
    #[must_use]
    pub fn with_spanning(mut self, spanning: bool) -> Self {
        self.spanning = spanning;
        self
    }

    #[must_use]
    pub fn is_spanning(&self) -> bool {
        self.spanning
    }

    #[must_use]
    pub fn partition_count(&self) -> usize {
        self.table.partition_count()
    }

    /// Largest request a single process can make.
    fn request_limit(&self) -> usize {
        if self.spanning {
            self.table.capacity()
        } else {
            self.table.largest_partition()
        }
    }
}

impl Allocator for UnequalPartitionAllocator {
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
        let limit = self.request_limit();
        ensure!(
            requested <= limit,
            SizeExceedsPartitionSnafu {
                id,
                requested,
                limit,
            }
        );

        if self.spanning {
            let Some(partitions) = self.table.claim_spanning(id, requested, policy) else {
                return OutOfSpaceSnafu { id, requested }.fail();
            };
            debug!("unequal: process {id} ({requested}) -> partitions {partitions:?} ({policy})");
        } else {
            let Some(index) = self.table.claim_single(id, requested, policy) else {
                return OutOfSpaceSnafu { id, requested }.fail();
            };
            debug!("unequal: process {id} ({requested}) -> partition {index} ({policy})");
        }
        process.set_state(ProcessState::Allocated);
        Ok(())
    }

    fn deallocate(&mut self, id: ProcessId) -> Result<(), DeallocateError> {
        let freed = self.table.release(id);
        ensure!(freed > 0, NotFoundSnafu { id });
        debug!("unequal: process {id} released {freed} partition(s)");
        Ok(())
    }

    fn status(&self) -> Vec<Slot> {
        self.table.status()
    }

    fn slots_of(&self, id: ProcessId) -> Vec<usize> {
        self.table.owned(id).collect()
    }
}
