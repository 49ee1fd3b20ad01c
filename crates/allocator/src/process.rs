//! Simulated processes submitted to an allocator.

use derive_more::{Display, From, IsVariant};

/// Identifies a simulated process.
///
/// Displays as the bare number, so `ProcessId::new(3)` renders as `3`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, From)]
pub struct ProcessId(u32);

impl ProcessId {
    #[must_use]
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

/// Where a process is in its allocation lifecycle.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, IsVariant)]
pub enum ProcessState {
    #[default]
    Unallocated,
    Allocated,
}

/// A request for memory on behalf of one process.
///
/// The caller creates a process, submits it to an allocator, and forgets it
/// after a successful deallocation. Only the allocator moves it between
/// [`ProcessState`]s.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Process {
    id: ProcessId,
    size: usize,
    state: ProcessState,
}

impl Process {
    /// Creates an unallocated process requesting `size` units.
    #[must_use]
    pub fn new(id: u32, size: usize) -> Self {
        Self {
            id: ProcessId::new(id),
            size,
            state: ProcessState::Unallocated,
        }
    }

    #[must_use]
    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Returns the number of units the process asked for.
    #[must_use]
    pub fn size(&self) -> usize {
        self.size
    }

    #[must_use]
    pub fn state(&self) -> ProcessState {
        self.state
    }

    pub(crate) fn set_state(&mut self, state: ProcessState) {
        self.state = state;
    }
}

/// Ownership record stored in the ledger for an owned region.
///
/// `used` is the part of the region the process actually requested; the
/// remainder is internal fragmentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct Claim {
    pub(crate) id: ProcessId,
    pub(crate) used: usize,
}

impl Claim {
    pub(crate) fn new(id: ProcessId, used: usize) -> Self {
        Self { id, used }
    }
}
