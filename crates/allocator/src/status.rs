//! Status snapshots and memory statistics.

use derive_more::IsVariant;
use region_ledger::Region;

use crate::process::{Claim, ProcessId};

/// Ownership of a single slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum SlotState {
    Free,
    Occupied(ProcessId),
}

/// One entry of an allocator's status: a partition, a block, or a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Slot {
    /// Position of the slot in the status listing.
    pub index: usize,
    /// First address covered by the slot.
    pub start: usize,
    /// Number of units covered by the slot.
    pub size: usize,
    pub state: SlotState,
    /// Units of the slot the owning process asked for. Zero when free.
    pub used: usize,
}

impl Slot {
    pub(crate) fn from_region(index: usize, region: &Region<Claim>) -> Self {
        Self::new(index, region.start, region.size, region.owner.as_ref())
    }

    pub(crate) fn new(index: usize, start: usize, size: usize, claim: Option<&Claim>) -> Self {
        let (state, used) = match claim {
            Some(claim) => (SlotState::Occupied(claim.id), claim.used),
            None => (SlotState::Free, 0),
        };
        Self {
            index,
            start,
            size,
            state,
            used,
        }
    }

    /// Returns one past the last address covered by the slot.
    #[must_use]
    pub fn end(&self) -> usize {
        self.start + self.size
    }

    #[must_use]
    pub fn owner(&self) -> Option<ProcessId> {
        match self.state {
            SlotState::Free => None,
            SlotState::Occupied(id) => Some(id),
        }
    }
}

/// Aggregate view of an allocator's memory usage.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct MemoryStats {
    pub capacity: usize,
    /// Units handed out to processes, including rounding.
    pub allocated: usize,
    /// Units processes actually asked for.
    pub requested: usize,
    pub free: usize,
    pub free_slots: usize,
    pub largest_free_slot: usize,
}

impl MemoryStats {
    /// Summarizes a status listing.
    #[must_use]
    pub fn from_slots(capacity: usize, slots: &[Slot]) -> Self {
        let mut stats = Self {
            capacity,
            ..Self::default()
        };
        for slot in slots {
            if slot.state.is_free() {
                stats.free += slot.size;
                stats.free_slots += 1;
                stats.largest_free_slot = stats.largest_free_slot.max(slot.size);
            } else {
                stats.allocated += slot.size;
                stats.requested += slot.used;
            }
        }
        stats
    }

    /// Units granted to processes beyond what they asked for.
    #[must_use]
    pub fn internal_fragmentation(&self) -> usize {
        self.allocated - self.requested
    }

    /// Free units that cannot serve a request as large as the total free
    /// space, because they sit outside the largest free slot.
    #[must_use]
    pub fn external_fragmentation(&self) -> usize {
        self.free - self.largest_free_slot
    }
}
