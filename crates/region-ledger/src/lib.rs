//! An ordered ledger of contiguous memory regions.
//!
//! `RegionLedger` tracks a span of simulated memory `0..capacity` as a
//! sequence of regions sorted by their start address. Each region is either
//! free or owned by some value of type `O`. The regions never overlap, never
//! leave gaps, and always add up to the ledger's capacity.
//!
//! The ledger is the substrate shared by the partition, free-list, and buddy
//! allocators: it knows how to split and merge regions but has no opinion on
//! *which* region an allocation should land in.
//!
//! # Examples
//!
//! ```
//! use region_ledger::RegionLedger;
//!
//! let mut ledger = RegionLedger::<u32>::new(1000);
//!
//! // Carve 212 units off the front and hand them to owner 7
//! let tail = ledger.split(0, 212);
//! ledger.assign(0, 7);
//! assert_eq!(tail, 1);
//! assert_eq!(ledger.free_size(), 788);
//!
//! // Give them back; the two free neighbors collapse into one region
//! ledger.release(0);
//! ledger.coalesce();
//! assert_eq!(ledger.region_count(), 1);
//! assert!(ledger.is_consistent());
//! ```
//!
//! # Performance
//!
//! - Split / merge: O(n), where n is the number of regions
//! - Coalesce: O(n), rebuilding the sequence in a single pass
//! - Lookup by owner: O(n)

#![cfg_attr(not(test), no_std)]
#![cfg_attr(coverage_nightly, feature(coverage_attribute))]

extern crate alloc;

use alloc::vec::Vec;
use core::{mem, ops::Range, slice};

/// A contiguous span of memory and its ownership.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Region<O> {
    /// First address covered by the region.
    pub start: usize,
    /// Number of units covered by the region. Never zero.
    pub size: usize,
    /// Current owner, or `None` if the region is free.
    pub owner: Option<O>,
}

impl<O> Region<O> {
    /// Creates a free region.
    #[must_use]
    pub const fn free(start: usize, size: usize) -> Self {
        Self {
            start,
            size,
            owner: None,
        }
    }

    /// Returns one past the last address covered by the region.
    #[must_use]
    pub const fn end(&self) -> usize {
        self.start + self.size
    }

    /// Returns the covered addresses as a range.
    #[must_use]
    pub const fn range(&self) -> Range<usize> {
        self.start..self.end()
    }

    /// Returns `true` if nobody owns the region.
    #[must_use]
    pub const fn is_free(&self) -> bool {
        self.owner.is_none()
    }
}

/// An address-ordered, gap-free sequence of regions.
///
/// All mutating methods keep three properties intact:
///
/// - regions are sorted by `start` and each one begins where the previous
///   one ends,
/// - no region has size zero,
/// - the sizes add up to [`capacity`](Self::capacity).
///
/// Misuse (splitting an owned region, assigning an owned region, indexing
/// past the end) is a caller bug and panics.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionLedger<O> {
    regions: Vec<Region<O>>,
    capacity: usize,
}

impl<O> RegionLedger<O> {
    /// Creates a ledger holding a single free region of `capacity` units.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use region_ledger::RegionLedger;
    ///
    /// let ledger = RegionLedger::<u32>::new(64);
    /// assert_eq!(ledger.region_count(), 1);
    /// assert_eq!(ledger.free_size(), 64);
    /// ```
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "Ledger capacity must not be zero");
        let mut regions = Vec::new();
        regions.push(Region::free(0, capacity));
        Self { regions, capacity }
    }

    /// Creates a ledger of back-to-back free regions with the given sizes.
    ///
    /// # Panics
    ///
    /// Panics if `sizes` is empty or contains a zero.
    ///
    /// # Examples
    ///
    /// ```
    /// use region_ledger::RegionLedger;
    ///
    /// let ledger = RegionLedger::<u32>::from_sizes([100, 500, 200]);
    /// let starts: Vec<_> = ledger.iter().map(|r| r.start).collect();
    /// assert_eq!(starts, vec![0, 100, 600]);
    /// assert_eq!(ledger.capacity(), 800);
    /// ```
    #[must_use]
    pub fn from_sizes<I>(sizes: I) -> Self
    where
        I: IntoIterator<Item = usize>,
    {
        let mut regions = Vec::new();
        let mut start = 0;
        for size in sizes {
            assert!(size > 0, "Region size must not be zero");
            regions.push(Region::free(start, size));
            start += size;
        }
        assert!(!regions.is_empty(), "Ledger must hold at least one region");
        Self {
            regions,
            capacity: start,
        }
    }

    /// Returns the total number of units covered by the ledger.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Returns the number of regions, free and owned.
    #[must_use]
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    /// Returns an iterator over the regions in address order.
    pub fn iter(&self) -> slice::Iter<'_, Region<O>> {
        self.regions.iter()
    }

    /// Returns all regions in address order.
    #[must_use]
    pub fn as_slice(&self) -> &[Region<O>] {
        &self.regions
    }

    /// Returns the region at `index`, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Region<O>> {
        self.regions.get(index)
    }

    /// Returns `(index, size)` for every free region, in address order.
    ///
    /// This is the candidate list a placement policy chooses from.
    pub fn free_candidates(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.regions
            .iter()
            .enumerate()
            .filter(|(_, region)| region.is_free())
            .map(|(index, region)| (index, region.size))
    }

    /// Returns the index of the first region matching `pred`.
    pub fn position<P>(&self, mut pred: P) -> Option<usize>
    where
        P: FnMut(&Region<O>) -> bool,
    {
        self.regions.iter().position(|region| pred(region))
    }

    /// Returns the indices of all regions owned by an owner matching `pred`.
    pub fn owned_by<P>(&self, mut pred: P) -> impl Iterator<Item = usize> + '_
    where
        P: FnMut(&O) -> bool + 'static,
    {
        self.regions
            .iter()
            .enumerate()
            .filter(move |(_, region)| region.owner.as_ref().is_some_and(&mut pred))
            .map(|(index, _)| index)
    }

    /// Returns the number of units held by free regions.
    #[must_use]
    pub fn free_size(&self) -> usize {
        self.regions
            .iter()
            .filter(|region| region.is_free())
            .map(|region| region.size)
            .sum()
    }

    /// Hands the free region at `index` to `owner`.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds or the region is already owned.
    pub fn assign(&mut self, index: usize, owner: O) {
        let region = &mut self.regions[index];
        assert!(region.is_free(), "Region {index} is already owned");
        region.owner = Some(owner);
    }

    /// Returns the owner mutably, for updating owner bookkeeping in place.
    pub fn owner_mut(&mut self, index: usize) -> Option<&mut O> {
        self.regions.get_mut(index)?.owner.as_mut()
    }

    /// Marks the region at `index` free, returning its previous owner.
    ///
    /// Neighbors are left untouched; call [`coalesce`](Self::coalesce) or
    /// [`merge_with_next`](Self::merge_with_next) to join free regions.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds.
    pub fn release(&mut self, index: usize) -> Option<O> {
        self.regions[index].owner.take()
    }

    /// Splits the free region at `index` into a head of `head_size` units and
    /// a tail holding the rest, returning the index of the tail.
    ///
    /// Both halves stay free and the head keeps the original start address.
    ///
    /// # Panics
    ///
    /// Panics if `index` is out of bounds, the region is owned, or
    /// `head_size` is not strictly between zero and the region's size.
    pub fn split(&mut self, index: usize, head_size: usize) -> usize {
        let region = &mut self.regions[index];
        assert!(region.is_free(), "Cannot split owned region {index}");
        assert!(
            0 < head_size && head_size < region.size,
            "Invalid split of {}..{} at {head_size}",
            region.start,
            region.end()
        );

        let tail = Region::free(region.start + head_size, region.size - head_size);
        region.size = head_size;
        self.regions.insert(index + 1, tail);
        debug_assert!(self.is_consistent());
        index + 1
    }

    /// Merges the free region at `index` with the free region right after it.
    ///
    /// # Panics
    ///
    /// Panics if either region is missing or owned.
    pub fn merge_with_next(&mut self, index: usize) {
        assert!(
            index + 1 < self.regions.len(),
            "Region {index} has no successor"
        );
        let next = self.regions.remove(index + 1);
        let region = &mut self.regions[index];
        assert!(
            region.is_free() && next.is_free(),
            "Cannot merge owned regions {}..{} and {}..{}",
            region.start,
            region.end(),
            next.start,
            next.end()
        );
        region.size += next.size;
        debug_assert!(self.is_consistent());
    }

    /// Merges every run of adjacent free regions into a single region.
    ///
    /// Returns the number of merges performed. After this call no two
    /// neighboring regions are both free.
    pub fn coalesce(&mut self) -> usize {
        let mut merged = 0;
        let regions = mem::take(&mut self.regions);
        for region in regions {
            if let Some(last) = self.regions.last_mut()
                && last.is_free()
                && region.is_free()
            {
                last.size += region.size;
                merged += 1;
                continue;
            }
            self.regions.push(region);
        }
        debug_assert!(self.is_consistent());
        merged
    }

    /// Returns `true` if no two neighboring regions are both free.
    #[must_use]
    pub fn is_coalesced(&self) -> bool {
        self.regions
            .windows(2)
            .all(|pair| !(pair[0].is_free() && pair[1].is_free()))
    }

    /// Checks the structural invariants of the ledger.
    ///
    /// Regions must be non-empty, contiguous, start at zero, and sum to the
    /// capacity.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let mut expected_start = 0;
        for region in &self.regions {
            if region.size == 0 || region.start != expected_start {
                return false;
            }
            expected_start = region.end();
        }
        expected_start == self.capacity
    }
}

impl<'a, O> IntoIterator for &'a RegionLedger<O> {
    type Item = &'a Region<O>;
    type IntoIter = slice::Iter<'a, Region<O>>;

    fn into_iter(self) -> Self::IntoIter {
        self.regions.iter()
    }
}
