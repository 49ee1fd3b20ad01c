//! Shared bookkeeping for the fixed and unequal partition allocators.
//!
//! Partition boundaries are decided once at construction and never change:
//! the table only flips ownership of whole partitions.

use alloc::vec::Vec;

use log::trace;
use region_ledger::RegionLedger;

use crate::{
    placement::{self, Policy},
    process::{Claim, ProcessId},
    status::Slot,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PartitionTable {
    ledger: RegionLedger<Claim>,
    largest: usize,
}

impl PartitionTable {
    /// Builds a table from non-empty, non-zero partition sizes.
    pub(crate) fn new(sizes: &[usize]) -> Self {
        let ledger = RegionLedger::from_sizes(sizes.iter().copied());
        let largest = sizes.iter().copied().max().unwrap_or_default();
        Self { ledger, largest }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.ledger.capacity()
    }

    pub(crate) fn partition_count(&self) -> usize {
        self.ledger.region_count()
    }

    /// Size of the largest partition, free or not.
    pub(crate) fn largest_partition(&self) -> usize {
        self.largest
    }

    pub(crate) fn contains(&self, id: ProcessId) -> bool {
        self.owned(id).next().is_some()
    }

    pub(crate) fn owned(&self, id: ProcessId) -> impl Iterator<Item = usize> + '_ {
        self.ledger.owned_by(move |claim| claim.id == id)
    }

    /// Claims one free partition able to hold the whole request.
    pub(crate) fn claim_single(
        &mut self,
        id: ProcessId,
        requested: usize,
        policy: Policy,
    ) -> Option<usize> {
        let index = placement::select(self.ledger.free_candidates(), requested, policy)?;
        self.ledger.assign(index, Claim::new(id, requested));
        Some(index)
    }

    /// Claims as many free partitions as needed to hold the request.
    ///
    /// Each step asks the policy for a partition holding the remainder; when
    /// none is large enough the step asks for the largest free size instead.
    /// If free partitions run out, everything claimed so far is released.
    /// The claimed indices are returned in the order they were granted.
    pub(crate) fn claim_spanning(
        &mut self,
        id: ProcessId,
        requested: usize,
        policy: Policy,
    ) -> Option<Vec<usize>> {
        let mut claimed = Vec::new();
        let mut remaining = requested;
        while remaining > 0 {
            let Some(index) = self.select_for_remainder(remaining, policy) else {
                trace!("process {id}: rolling back {} partitions", claimed.len());
                for &index in &claimed {
                    self.ledger.release(index);
                }
                return None;
            };
            let size = self.ledger.get(index).map_or(0, |partition| partition.size);
            let used = remaining.min(size);
            self.ledger.assign(index, Claim::new(id, used));
            claimed.push(index);
            remaining -= used;
        }
        Some(claimed)
    }

    fn select_for_remainder(&self, remaining: usize, policy: Policy) -> Option<usize> {
        let largest_free = self.ledger.free_candidates().map(|(_, size)| size).max()?;
        let wanted = remaining.min(largest_free);
        placement::select(self.ledger.free_candidates(), wanted, policy)
    }

    /// Frees every partition owned by `id`, returning how many were freed.
    pub(crate) fn release(&mut self, id: ProcessId) -> usize {
        let owned: Vec<_> = self.owned(id).collect();
        for &index in &owned {
            self.ledger.release(index);
        }
        owned.len()
    }

    pub(crate) fn status(&self) -> Vec<Slot> {
        self.ledger
            .iter()
            .enumerate()
            .map(|(index, partition)| Slot::from_region(index, partition))
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn ledger(&self) -> &RegionLedger<Claim> {
        &self.ledger
    }
}
