//! Paging.
//!
//! Memory is divided into equally sized frames. A process receives
//! `ceil(size / frame_size)` frames, which need not be contiguous, and a
//! page table maps its logical pages, in order, to the frames it got.

use alloc::{collections::BTreeMap, vec, vec::Vec};

use log::debug;
use snafu::ensure;

use crate::{
    Allocator,
    error::{
        AllocateError, ConfigError, DeallocateError, allocate_error, config_error,
        deallocate_error::NotFoundSnafu,
    },
    placement::Policy,
    process::{Claim, Process, ProcessId, ProcessState},
    status::Slot,
};

/// Frame-based allocator with one page table per process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PagingAllocator {
    frames: Vec<Option<Claim>>,
    frame_size: usize,
    page_tables: BTreeMap<ProcessId, Vec<usize>>,
}

impl PagingAllocator {
    /// Creates an allocator with every frame free.
    ///
    /// `capacity` must be a non-zero multiple of `frame_size`.
    pub fn new(capacity: usize, frame_size: usize) -> Result<Self, ConfigError> {
        use config_error::{
            NotMultipleSnafu, UnitExceedsCapacitySnafu, ZeroCapacitySnafu, ZeroUnitSizeSnafu,
        };

        ensure!(capacity > 0, ZeroCapacitySnafu);
        ensure!(frame_size > 0, ZeroUnitSizeSnafu { unit: "frame size" });
        ensure!(
            frame_size <= capacity,
            UnitExceedsCapacitySnafu {
                unit: "frame size",
                unit_size: frame_size,
                capacity,
            }
        );
        ensure!(
            capacity.is_multiple_of(frame_size),
            NotMultipleSnafu {
                capacity,
                unit: "frame size",
                unit_size: frame_size,
            }
        );

        Ok(Self {
            frames: vec![None; capacity / frame_size],
            frame_size,
            page_tables: BTreeMap::new(),
        })
    }

    #[must_use]
    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    #[must_use]
    pub fn free_frame_count(&self) -> usize {
        self.frames.iter().filter(|frame| frame.is_none()).count()
    }

    /// Returns the frames backing `id`'s logical pages, page 0 first.
    #[must_use]
    pub fn page_table(&self, id: ProcessId) -> Option<&[usize]> {
        self.page_tables.get(&id).map(Vec::as_slice)
    }

    /// Maps a logical address of process `id` to a physical address.
    ///
    /// Returns `None` if the process has no page table or the address lies
    /// beyond its last page.
    ///
    /// # Examples
    ///
    /// ```
    /// use allocator::{Allocator, Policy, Process, ProcessId, paging::PagingAllocator};
    ///
    /// let mut memory = PagingAllocator::new(1024, 256).unwrap();
    /// memory.allocate(&mut Process::new(1, 100), Policy::FirstFit).unwrap();
    /// memory.allocate(&mut Process::new(2, 500), Policy::FirstFit).unwrap();
    ///
    /// // Process 2 got frames 1 and 2; logical 300 is page 1, offset 44
    /// let id = ProcessId::new(2);
    /// assert_eq!(memory.translate(id, 300), Some(2 * 256 + 44));
    /// assert_eq!(memory.translate(id, 512), None);
    /// ```
    #[must_use]
    pub fn translate(&self, id: ProcessId, logical: usize) -> Option<usize> {
        let table = self.page_tables.get(&id)?;
        let frame = table.get(logical / self.frame_size)?;
        Some(frame * self.frame_size + logical % self.frame_size)
    }
}

impl Allocator for PagingAllocator {
    fn capacity(&self) -> usize {
        self.frames.len() * self.frame_size
    }

    /// Gives the process the lowest-numbered free frames.
    ///
    /// The policy is ignored.
    fn allocate(&mut self, process: &mut Process, _policy: Policy) -> Result<(), AllocateError> {
        use allocate_error::{AlreadyAllocatedSnafu, EmptyRequestSnafu, OutOfSpaceSnafu};

        let id = process.id();
        let requested = process.size();
        ensure!(requested > 0, EmptyRequestSnafu { id });
        ensure!(
            !self.page_tables.contains_key(&id),
            AlreadyAllocatedSnafu { id }
        );

        let pages = requested.div_ceil(self.frame_size);
        let free: Vec<_> = self
            .frames
            .iter()
            .enumerate()
            .filter(|(_, frame)| frame.is_none())
            .map(|(index, _)| index)
            .take(pages)
            .collect();
        ensure!(free.len() == pages, OutOfSpaceSnafu { id, requested });

        let mut remaining = requested;
        for &index in &free {
            let used = remaining.min(self.frame_size);
            self.frames[index] = Some(Claim::new(id, used));
            remaining -= used;
        }
        debug!("paging: process {id} ({requested}) -> {pages} page(s) in frames {free:?}");
        self.page_tables.insert(id, free);
        process.set_state(ProcessState::Allocated);
        Ok(())
    }

    fn deallocate(&mut self, id: ProcessId) -> Result<(), DeallocateError> {
        let Some(table) = self.page_tables.remove(&id) else {
            return NotFoundSnafu { id }.fail();
        };
        for &index in &table {
            self.frames[index] = None;
        }
        debug!("paging: process {id} released frames {table:?}");
        Ok(())
    }

    fn status(&self) -> Vec<Slot> {
        self.frames
            .iter()
            .enumerate()
            .map(|(index, frame)| {
                Slot::new(index, index * self.frame_size, self.frame_size, frame.as_ref())
            })
            .collect()
    }

    fn slots_of(&self, id: ProcessId) -> Vec<usize> {
        self.page_table(id).map(<[usize]>::to_vec).unwrap_or_default()
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;

    fn alloc(allocator: &mut PagingAllocator, id: u32, size: usize) {
        allocator
            .allocate(&mut Process::new(id, size), Policy::FirstFit)
            .unwrap();
    }

    #[test]
    fn test_invalid_configuration() {
        assert!(matches!(
            PagingAllocator::new(1000, 256),
            Err(ConfigError::NotMultiple { .. })
        ));
        assert!(matches!(
            PagingAllocator::new(1024, 0),
            Err(ConfigError::ZeroUnitSize { .. })
        ));
        assert!(matches!(
            PagingAllocator::new(128, 256),
            Err(ConfigError::UnitExceedsCapacity { .. })
        ));
    }

    #[test]
    fn test_frames_are_reused() {
        let mut allocator = PagingAllocator::new(1024, 256).unwrap();
        assert_eq!(allocator.frame_count(), 4);

        alloc(&mut allocator, 1, 500);
        alloc(&mut allocator, 2, 300);
        assert_eq!(allocator.page_table(ProcessId::new(1)), Some(&[0, 1][..]));
        assert_eq!(allocator.page_table(ProcessId::new(2)), Some(&[2, 3][..]));
        assert_eq!(allocator.free_frame_count(), 0);

        allocator.deallocate(ProcessId::new(1)).unwrap();
        assert_eq!(allocator.page_table(ProcessId::new(1)), None);
        assert_eq!(allocator.free_frame_count(), 2);

        alloc(&mut allocator, 3, 512);
        assert_eq!(allocator.slots_of(ProcessId::new(3)), vec![0, 1]);
    }

    #[test]
    fn test_non_contiguous_frames() {
        let mut allocator = PagingAllocator::new(1024, 256).unwrap();
        for id in 1..=4 {
            alloc(&mut allocator, id, 10);
        }
        allocator.deallocate(ProcessId::new(2)).unwrap();
        allocator.deallocate(ProcessId::new(4)).unwrap();

        alloc(&mut allocator, 5, 300);
        assert_eq!(allocator.page_table(ProcessId::new(5)), Some(&[1, 3][..]));
        assert_eq!(allocator.translate(ProcessId::new(5), 0), Some(256));
        assert_eq!(allocator.translate(ProcessId::new(5), 299), Some(768 + 43));
        assert_eq!(allocator.translate(ProcessId::new(2), 0), None);
    }

    #[test]
    fn test_used_per_frame() {
        let mut allocator = PagingAllocator::new(1024, 256).unwrap();
        alloc(&mut allocator, 1, 300);
        let status = allocator.status();
        assert_eq!(status[0].used, 256);
        assert_eq!(status[1].used, 44);
        assert_eq!(status[1].start, 256);
        assert!(status[2].state.is_free());

        let stats = allocator.stats();
        assert_eq!(stats.allocated, 512);
        assert_eq!(stats.internal_fragmentation(), 212);
    }

    #[test]
    fn test_out_of_space_claims_nothing() {
        let mut allocator = PagingAllocator::new(1024, 256).unwrap();
        alloc(&mut allocator, 1, 600);
        let before = allocator.clone();

        let mut process = Process::new(2, 257);
        assert!(matches!(
            allocator.allocate(&mut process, Policy::FirstFit),
            Err(AllocateError::OutOfSpace { .. })
        ));
        assert_eq!(allocator, before);
        assert!(process.state().is_unallocated());
    }

    #[test]
    fn test_duplicate_and_unknown() {
        let mut allocator = PagingAllocator::new(64, 16).unwrap();
        alloc(&mut allocator, 1, 16);
        assert!(matches!(
            allocator.allocate(&mut Process::new(1, 1), Policy::FirstFit),
            Err(AllocateError::AlreadyAllocated { .. })
        ));
        assert!(matches!(
            allocator.deallocate(ProcessId::new(7)),
            Err(DeallocateError::NotFound { .. })
        ));
    }
}
