//! Errors reported by the allocators.
//!
//! Every error leaves the allocator exactly as it was before the failing
//! call. None of them is fatal; the caller decides whether to retry with
//! other parameters or give up on the process.

use snafu::{Location, Snafu};

use crate::process::ProcessId;

/// Errors that can occur while placing a process.
#[derive(Debug, Snafu)]
#[snafu(module, visibility(pub(crate)))]
pub enum AllocateError {
    #[snafu(display("process {id} requested zero units"))]
    EmptyRequest {
        id: ProcessId,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("process {id} already owns an allocation"))]
    AlreadyAllocated {
        id: ProcessId,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display(
        "process {id} requested {requested} units, more than the largest grantable unit ({limit})"
    ))]
    SizeExceedsPartition {
        id: ProcessId,
        requested: usize,
        limit: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("not enough free memory for process {id} ({requested} units)"))]
    OutOfSpace {
        id: ProcessId,
        requested: usize,
        #[snafu(implicit)]
        location: Location,
    },
}

impl AllocateError {
    /// Returns the process the failed request was made for.
    #[must_use]
    pub fn process_id(&self) -> ProcessId {
        match self {
            Self::EmptyRequest { id, .. }
            | Self::AlreadyAllocated { id, .. }
            | Self::SizeExceedsPartition { id, .. }
            | Self::OutOfSpace { id, .. } => *id,
        }
    }
}

/// Errors that can occur while removing a process.
#[derive(Debug, Snafu)]
#[snafu(module, visibility(pub(crate)))]
pub enum DeallocateError {
    #[snafu(display("process {id} owns no allocation"))]
    NotFound {
        id: ProcessId,
        #[snafu(implicit)]
        location: Location,
    },
}

/// Errors that can occur while constructing an allocator from invalid
/// parameters.
#[derive(Debug, Snafu)]
#[snafu(module, visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("total capacity must not be zero"))]
    ZeroCapacity {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{unit} must not be zero"))]
    ZeroUnitSize {
        unit: &'static str,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("at least one partition is required"))]
    NoPartitions {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("partition sizes add up to more than the address space"))]
    CapacityOverflow {
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("partition {index} has size zero"))]
    ZeroPartition {
        index: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("capacity {capacity} is not a multiple of the {unit} ({unit_size})"))]
    NotMultiple {
        capacity: usize,
        unit: &'static str,
        unit_size: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{what} must be a power of two, got {value}"))]
    NotPowerOfTwo {
        what: &'static str,
        value: usize,
        #[snafu(implicit)]
        location: Location,
    },
    #[snafu(display("{unit} ({unit_size}) exceeds the capacity ({capacity})"))]
    UnitExceedsCapacity {
        unit: &'static str,
        unit_size: usize,
        capacity: usize,
        #[snafu(implicit)]
        location: Location,
    },
}
