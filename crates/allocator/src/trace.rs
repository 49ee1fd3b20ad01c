//! Batch placement traces.

use alloc::vec::Vec;

use crate::{Allocator, placement::Policy, process::Process};

/// Submits one process per entry of `sizes`, with ids `0, 1, 2, ...`, and
/// reports where each one landed.
///
/// Each entry is the lowest status index among the slots granted to that
/// process, or `None` if its allocation failed. For every technique but
/// spanning unequal partitions this is the only slot, or the start of a
/// contiguous run. Processes stay allocated.
///
/// # Examples
///
/// ```
/// use allocator::{Policy, trace::trace, unequal::UnequalPartitionAllocator};
///
/// let mut memory = UnequalPartitionAllocator::new(&[100, 500, 200, 300, 600]).unwrap();
/// let placed = trace(&mut memory, &[212, 417, 112, 426], Policy::FirstFit);
/// assert_eq!(placed, [Some(1), Some(4), Some(2), None]);
/// ```
pub fn trace<A>(allocator: &mut A, sizes: &[usize], policy: Policy) -> Vec<Option<usize>>
where
    A: Allocator + ?Sized,
{
    (0_u32..)
        .zip(sizes)
        .map(|(id, &size)| {
            let mut process = Process::new(id, size);
            allocator.allocate(&mut process, policy).ok()?;
            allocator.slots_of(process.id()).first().copied()
        })
        .collect()
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::{dynamic::DynamicAllocator, fixed::FixedPartitionAllocator};

    #[test]
    fn test_trace_fixed() {
        let mut allocator = FixedPartitionAllocator::new(400, 100).unwrap();
        let placed = trace(&mut allocator, &[50, 150, 100, 1, 1, 1], Policy::FirstFit);
        assert_eq!(placed, vec![Some(0), None, Some(1), Some(2), Some(3), None]);
    }

    #[test]
    fn test_trace_dynamic_reports_region_index() {
        let mut allocator = DynamicAllocator::new(100).unwrap();
        let placed = trace(&mut allocator, &[30, 30, 50], Policy::FirstFit);
        assert_eq!(placed, vec![Some(0), Some(1), None]);
    }

    #[test]
    fn test_trace_through_trait_object() {
        let mut allocator = FixedPartitionAllocator::new(100, 50).unwrap();
        let allocator: &mut dyn Allocator = &mut allocator;
        assert_eq!(trace(allocator, &[10], Policy::BestFit), vec![Some(0)]);
    }
}
