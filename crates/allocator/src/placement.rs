//! Placement policies.
//!
//! A placement policy picks one free region out of a list of candidates for
//! a request of a given size. The choice is a pure function of the candidate
//! list, so identical operation sequences always produce identical layouts.
//!
//! | Policy | Picks the candidate that... |
//! |--------|-----------------------------|
//! | [`Policy::FirstFit`] | comes first in address order |
//! | [`Policy::BestFit`] | leaves the smallest leftover |
//! | [`Policy::WorstFit`] | leaves the largest leftover |
//!
//! Ties are always broken in favor of the lowest candidate index.

use alloc::string::String;
use core::{cmp::Reverse, str::FromStr};

use derive_more::{Display, IsVariant};
use snafu::Snafu;

/// Strategy for choosing among free regions that can hold a request.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Display, IsVariant)]
pub enum Policy {
    #[default]
    #[display("first-fit")]
    FirstFit,
    #[display("best-fit")]
    BestFit,
    #[display("worst-fit")]
    WorstFit,
}

/// Error returned when parsing an unknown policy name.
#[derive(Debug, Snafu)]
#[snafu(display("unknown placement policy {input:?}, expected first, best or worst"))]
pub struct ParsePolicyError {
    input: String,
}

impl FromStr for Policy {
    type Err = ParsePolicyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        let name = name
            .strip_suffix("-fit")
            .or_else(|| name.strip_suffix("_fit"))
            .unwrap_or(&name);
        match name {
            "first" => Ok(Self::FirstFit),
            "best" => Ok(Self::BestFit),
            "worst" => Ok(Self::WorstFit),
            _ => ParsePolicySnafu { input: s }.fail(),
        }
    }
}

/// Selects a candidate for a request of `requested` units.
///
/// `candidates` yields `(index, size)` pairs in ledger order. Only candidates
/// with `size >= requested` qualify. Returns the index of the chosen
/// candidate, or `None` if none qualifies.
///
/// # Examples
///
/// ```
/// use allocator::placement::{Policy, select};
///
/// let holes = [(0, 100), (1, 500), (2, 200), (3, 300), (4, 600)];
/// assert_eq!(select(holes, 212, Policy::FirstFit), Some(1));
/// assert_eq!(select(holes, 212, Policy::BestFit), Some(3));
/// assert_eq!(select(holes, 212, Policy::WorstFit), Some(4));
/// assert_eq!(select(holes, 700, Policy::FirstFit), None);
/// ```
pub fn select<I>(candidates: I, requested: usize, policy: Policy) -> Option<usize>
where
    I: IntoIterator<Item = (usize, usize)>,
{
    let mut fitting = candidates
        .into_iter()
        .filter(|&(_, size)| size >= requested);
    let chosen = match policy {
        Policy::FirstFit => fitting.next(),
        Policy::BestFit => fitting.min_by_key(|&(index, size)| (size - requested, index)),
        Policy::WorstFit => {
            fitting.min_by_key(|&(index, size)| (Reverse(size - requested), index))
        }
    };
    chosen.map(|(index, _)| index)
}
