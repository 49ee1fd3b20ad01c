//! The closed set of allocation techniques.
//!
//! [`Technique`] describes an allocator to build; [`Memory`] is the built
//! allocator, dispatching every [`Allocator`] call to the matching variant.

use alloc::vec::Vec;

use derive_more::{Display, From, IsVariant};

use crate::{
    Allocator,
    buddy::BuddyAllocator,
    dynamic::DynamicAllocator,
    error::{AllocateError, ConfigError, DeallocateError},
    fixed::FixedPartitionAllocator,
    paging::PagingAllocator,
    placement::Policy,
    process::{Process, ProcessId},
    status::Slot,
    unequal::UnequalPartitionAllocator,
};

/// Construction parameters for one allocator.
#[derive(Debug, Clone, PartialEq, Eq, Display, IsVariant)]
pub enum Technique {
    #[display("fixed partitioning")]
    Fixed {
        capacity: usize,
        partition_size: usize,
    },
    #[display("unequal partitioning")]
    Unequal {
        partitions: Vec<usize>,
        spanning: bool,
    },
    #[display("dynamic allocation")]
    Dynamic { capacity: usize },
    #[display("buddy system")]
    Buddy { capacity: usize, min_block: usize },
    #[display("paging")]
    Paging { capacity: usize, frame_size: usize },
}

impl Technique {
    /// Returns the policy used when the caller does not name one.
    #[must_use]
    pub fn default_policy(&self) -> Policy {
        match self {
            Self::Unequal { .. } => UnequalPartitionAllocator::DEFAULT_POLICY,
            _ => Policy::FirstFit,
        }
    }

    /// Returns `true` if the technique honors the placement policy.
    #[must_use]
    pub fn uses_policy(&self) -> bool {
        !matches!(self, Self::Buddy { .. } | Self::Paging { .. })
    }

    /// Returns the word used for one status slot, such as `"Partition"`.
    #[must_use]
    pub fn slot_label(&self) -> &'static str {
        match self {
            Self::Fixed { .. } | Self::Unequal { .. } => "Partition",
            Self::Dynamic { .. } | Self::Buddy { .. } => "Block",
            Self::Paging { .. } => "Frame",
        }
    }
}

/// An allocator of any technique.
///
/// # Examples
///
/// ```
/// use allocator::{Allocator, Memory, Policy, Process, Technique};
///
/// let technique = Technique::Dynamic { capacity: 1000 };
/// let mut memory = Memory::new(&technique).unwrap();
///
/// let mut a = Process::new(1, 212);
/// let mut b = Process::new(2, 417);
/// memory.allocate(&mut a, Policy::BestFit).unwrap();
/// memory.allocate(&mut b, Policy::BestFit).unwrap();
/// memory.release(&mut a).unwrap();
///
/// // The exact-size hole left by `a` wins over the larger tail
/// memory.allocate(&mut Process::new(3, 200), Policy::BestFit).unwrap();
/// assert_eq!(memory.status()[0].start, 0);
/// assert_eq!(memory.stats().free, 1000 - 200 - 417);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, From, IsVariant)]
pub enum Memory {
    Fixed(FixedPartitionAllocator),
    Unequal(UnequalPartitionAllocator),
    Dynamic(DynamicAllocator),
    Buddy(BuddyAllocator),
    Paging(PagingAllocator),
}

macro_rules! dispatch {
    ($self:ident, $inner:ident => $body:expr) => {
        match $self {
            Memory::Fixed($inner) => $body,
            Memory::Unequal($inner) => $body,
            Memory::Dynamic($inner) => $body,
            Memory::Buddy($inner) => $body,
            Memory::Paging($inner) => $body,
        }
    };
}

impl Memory {
    /// Builds the allocator described by `technique`.
    pub fn new(technique: &Technique) -> Result<Self, ConfigError> {
        let memory = match technique {
            Technique::Fixed {
                capacity,
                partition_size,
            } => FixedPartitionAllocator::new(*capacity, *partition_size)?.into(),
            Technique::Unequal {
                partitions,
                spanning,
            } => UnequalPartitionAllocator::new(partitions)?
                .with_spanning(*spanning)
                .into(),
            Technique::Dynamic { capacity } => DynamicAllocator::new(*capacity)?.into(),
            Technique::Buddy {
                capacity,
                min_block,
            } => BuddyAllocator::new(*capacity, *min_block)?.into(),
            Technique::Paging {
                capacity,
                frame_size,
            } => PagingAllocator::new(*capacity, *frame_size)?.into(),
        };
        Ok(memory)
    }

    #[must_use]
    pub fn as_paging(&self) -> Option<&PagingAllocator> {
        match self {
            Self::Paging(paging) => Some(paging),
            _ => None,
        }
    }
}

impl Allocator for Memory {
    fn capacity(&self) -> usize {
        dispatch!(self, inner => inner.capacity())
    }

    fn allocate(&mut self, process: &mut Process, policy: Policy) -> Result<(), AllocateError> {
        dispatch!(self, inner => inner.allocate(process, policy))
    }

    fn deallocate(&mut self, id: ProcessId) -> Result<(), DeallocateError> {
        dispatch!(self, inner => inner.deallocate(id))
    }

    fn status(&self) -> Vec<Slot> {
        dispatch!(self, inner => inner.status())
    }

    fn slots_of(&self, id: ProcessId) -> Vec<usize> {
        dispatch!(self, inner => inner.slots_of(id))
    }
}

#[cfg_attr(coverage_nightly, coverage(off))]
#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    /// Linear congruential generator with fixed constants, so every run sees
    /// the same operation sequence.
    struct Lcg(u64);

    impl Lcg {
        fn next(&mut self) -> u64 {
            self.0 = self
                .0
                .wrapping_mul(6_364_136_223_846_793_005)
                .wrapping_add(1_442_695_040_888_963_407);
            self.0 >> 33
        }

        fn below(&mut self, bound: usize) -> usize {
            usize::try_from(self.next()).unwrap() % bound
        }
    }

    fn techniques() -> Vec<Technique> {
        vec![
            Technique::Fixed {
                capacity: 1000,
                partition_size: 125,
            },
            Technique::Unequal {
                partitions: vec![100, 500, 200, 300, 600],
                spanning: false,
            },
            Technique::Unequal {
                partitions: vec![100, 500, 200, 300, 600],
                spanning: true,
            },
            Technique::Dynamic { capacity: 1000 },
            Technique::Buddy {
                capacity: 1024,
                min_block: 16,
            },
            Technique::Paging {
                capacity: 1024,
                frame_size: 64,
            },
        ]
    }

    fn assert_invariants(memory: &Memory) {
        let status = memory.status();
        let mut next = 0;
        for (index, slot) in status.iter().enumerate() {
            assert_eq!(slot.index, index);
            assert_eq!(slot.start, next, "gap or overlap before slot {index}");
            assert!(slot.size > 0);
            assert!(slot.used <= slot.size);
            next = slot.end();
        }
        assert_eq!(next, memory.capacity());

        match memory {
            Memory::Dynamic(_) => assert!(
                status
                    .windows(2)
                    .all(|pair| !(pair[0].state.is_free() && pair[1].state.is_free()))
            ),
            Memory::Buddy(buddy) => assert!(buddy.is_well_formed()),
            _ => {}
        }
    }

    #[test]
    fn test_new_rejects_bad_configuration() {
        assert!(Memory::new(&Technique::Dynamic { capacity: 0 }).is_err());
        assert!(
            Memory::new(&Technique::Buddy {
                capacity: 1000,
                min_block: 8
            })
            .is_err()
        );
        assert!(
            Memory::new(&Technique::Unequal {
                partitions: vec![],
                spanning: false
            })
            .is_err()
        );
    }

    #[test]
    fn test_technique_defaults() {
        let unequal = Technique::Unequal {
            partitions: vec![1],
            spanning: false,
        };
        assert_eq!(unequal.default_policy(), Policy::BestFit);
        assert_eq!(unequal.slot_label(), "Partition");
        assert_eq!(unequal.to_string(), "unequal partitioning");

        let paging = Technique::Paging {
            capacity: 4,
            frame_size: 1,
        };
        assert_eq!(paging.default_policy(), Policy::FirstFit);
        assert!(!paging.uses_policy());
        assert_eq!(paging.slot_label(), "Frame");
    }

    #[test]
    fn test_dispatch() {
        let mut memory = Memory::new(&Technique::Paging {
            capacity: 1024,
            frame_size: 256,
        })
        .unwrap();
        assert!(memory.is_paging());
        memory
            .allocate(&mut Process::new(1, 500), Policy::WorstFit)
            .unwrap();
        assert_eq!(memory.slots_of(ProcessId::new(1)), vec![0, 1]);
        assert_eq!(
            memory.as_paging().unwrap().page_table(ProcessId::new(1)),
            Some(&[0, 1][..])
        );
        assert_eq!(memory.capacity(), 1024);
    }

    #[test]
    fn test_random_sequences_keep_invariants() {
        let policies = [Policy::FirstFit, Policy::BestFit, Policy::WorstFit];
        for technique in techniques() {
            let mut memory = Memory::new(&technique).unwrap();
            let mut rng = Lcg(0x5eed);
            let mut live = BTreeMap::new();

            for step in 0..400 {
                let id = u32::try_from(rng.below(16)).unwrap();
                if live.contains_key(&id) {
                    memory.deallocate(ProcessId::new(id)).unwrap();
                    live.remove(&id);
                } else {
                    let size = 1 + rng.below(300);
                    let policy = policies[rng.below(3)];
                    let before = memory.clone();
                    let mut process = Process::new(id, size);
                    match memory.allocate(&mut process, policy) {
                        Ok(()) => {
                            assert!(process.state().is_allocated());
                            live.insert(id, size);
                        }
                        Err(err) => {
                            assert_eq!(memory, before, "{technique} step {step}: {err}");
                            assert!(process.state().is_unallocated());
                        }
                    }
                }
                assert_invariants(&memory);

                let stats = memory.stats();
                assert_eq!(stats.requested, live.values().sum::<usize>());
                assert_eq!(stats.allocated + stats.free, memory.capacity());
            }
        }
    }

    #[test]
    fn test_same_sequence_same_layout() {
        for technique in techniques() {
            let run = || {
                let mut memory = Memory::new(&technique).unwrap();
                let mut rng = Lcg(42);
                for id in 0..40 {
                    let size = 1 + rng.below(200);
                    let _ = memory.allocate(&mut Process::new(id, size), Policy::BestFit);
                    if rng.below(2) == 0 {
                        let _ = memory.deallocate(ProcessId::new(id / 2));
                    }
                }
                memory.status()
            };
            assert_eq!(run(), run(), "{technique}");
        }
    }
}
