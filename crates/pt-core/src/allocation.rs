//! Lossless time allocation.
//!
//! Splits a quantity of milliseconds (typically an idle interval) across
//! counters. Every function here is pure and conserves its input: the values
//! of the returned [`Allocation`] always sum to exactly `total`, except for
//! [`discard`], which allocates nothing by definition.
//!
//! Percentages are applied with scaled integer arithmetic rather than
//! floating point, so rounding can only ever move time to the remainder
//! counter, never lose or invent it.

use thiserror::Error;

use crate::types::CounterId;

/// Percentages are scaled by this factor before any multiplication.
const PERCENT_SCALE: u128 = 1000;

/// 100% expressed in scaled units.
const FULL_SCALED: u128 = 100 * PERCENT_SCALE;

/// Errors raised when an allocation request cannot be satisfied.
///
/// Allocation is all-or-nothing: on error no partial map is produced.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum AllocationError {
    /// Fixed amounts add up to more than the time available.
    #[error("fixed allocations exceed total time: {allocated}ms allocated, {total}ms available")]
    ExceedsTotal { allocated: u128, total: u64 },

    /// Percentages add up to more than 100.
    #[error("percentages exceed 100%: {sum}%")]
    PercentagesExceed { sum: f64 },

    /// A percentage was negative, NaN or infinite.
    #[error("invalid percentage for {id}: {value}")]
    InvalidPercentage { id: CounterId, value: f64 },
}

/// An insertion-ordered mapping from counter ID to milliseconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Allocation {
    entries: Vec<(CounterId, u64)>,
}

impl Allocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the amount for `id`, replacing any previous amount.
    pub fn insert(&mut self, id: CounterId, ms: u64) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, amount)) => *amount = ms,
            None => self.entries.push((id, ms)),
        }
    }

    /// Adds `ms` to the amount for `id`, creating the entry if needed.
    pub fn credit(&mut self, id: CounterId, ms: u64) {
        match self.entries.iter_mut().find(|(existing, _)| *existing == id) {
            Some((_, amount)) => *amount += ms,
            None => self.entries.push((id, ms)),
        }
    }

    pub fn get(&self, id: &str) -> Option<u64> {
        self.entries
            .iter()
            .find(|(existing, _)| existing.as_str() == id)
            .map(|(_, ms)| *ms)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&CounterId, u64)> {
        self.entries.iter().map(|(id, ms)| (id, *ms))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all allocated milliseconds.
    pub fn total(&self) -> u128 {
        self.entries.iter().map(|(_, ms)| u128::from(*ms)).sum()
    }
}

impl FromIterator<(CounterId, u64)> for Allocation {
    fn from_iter<I: IntoIterator<Item = (CounterId, u64)>>(iter: I) -> Self {
        let mut allocation = Self::new();
        for (id, ms) in iter {
            allocation.insert(id, ms);
        }
        allocation
    }
}

impl<'a> IntoIterator for &'a Allocation {
    type Item = (&'a CounterId, u64);
    type IntoIter = std::iter::Map<
        std::slice::Iter<'a, (CounterId, u64)>,
        fn(&'a (CounterId, u64)) -> (&'a CounterId, u64),
    >;

    fn into_iter(self) -> Self::IntoIter {
        let entry: fn(&'a (CounterId, u64)) -> (&'a CounterId, u64) = |(id, ms)| (id, *ms);
        self.entries.iter().map(entry)
    }
}

/// Everything to one counter.
pub fn to_single(total: u64, id: CounterId) -> Allocation {
    let mut allocation = Allocation::new();
    allocation.insert(id, total);
    allocation
}

/// Fixed amounts per counter, with whatever is left going to `remainder`.
///
/// The remainder entry is present even when it is zero. If `remainder` also
/// has a fixed amount, the remainder is added on top of it.
pub fn fixed(
    total: u64,
    amounts: &Allocation,
    remainder: &CounterId,
) -> Result<Allocation, AllocationError> {
    let allocated = amounts.total();
    if allocated > u128::from(total) {
        return Err(AllocationError::ExceedsTotal { allocated, total });
    }

    let mut result = amounts.clone();
    // allocated <= total, so the difference fits
    let rest = total - u64::try_from(allocated).unwrap_or(total);
    result.credit(remainder.clone(), rest);
    Ok(result)
}

/// Percentage shares per counter, with the unallocated rest going to `remainder`.
///
/// Each share is `floor(total * floor(pct * 1000) / 100_000)`; the remainder
/// absorbs every millisecond lost to flooring.
pub fn percentage(
    total: u64,
    percentages: &[(CounterId, f64)],
    remainder: &CounterId,
) -> Result<Allocation, AllocationError> {
    let mut scaled = Vec::with_capacity(percentages.len());
    for (id, pct) in percentages {
        if !pct.is_finite() || *pct < 0.0 {
            return Err(AllocationError::InvalidPercentage {
                id: id.clone(),
                value: *pct,
            });
        }
        scaled.push((id, scale_percentage(*pct)));
    }

    let scaled_sum = scaled
        .iter()
        .try_fold(0u128, |acc, (_, s)| acc.checked_add(*s));
    if scaled_sum.is_none_or(|sum| sum > FULL_SCALED) {
        return Err(AllocationError::PercentagesExceed {
            sum: percentages.iter().map(|(_, pct)| pct).sum(),
        });
    }

    let mut result = Allocation::new();
    let mut assigned: u64 = 0;
    for (id, s) in scaled {
        // s <= FULL_SCALED, so the share never exceeds total
        let share = u64::try_from(u128::from(total) * s / FULL_SCALED).unwrap_or(total);
        result.credit(id.clone(), share);
        assigned += share;
    }
    result.credit(remainder.clone(), total - assigned);
    Ok(result)
}

/// Allocates nothing; the time is dropped.
pub fn discard(_total: u64) -> Allocation {
    Allocation::new()
}

/// Converts an hours/minutes pair (as entered in a form) to milliseconds.
///
/// Returns `None` if the result does not fit in a `u64`.
pub fn hours_minutes_to_ms(hours: u64, minutes: u64) -> Option<u64> {
    hours
        .checked_mul(3600)?
        .checked_add(minutes.checked_mul(60)?)?
        .checked_mul(1000)
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "input is finite and non-negative; floor is the intended rounding"
)]
fn scale_percentage(pct: f64) -> u128 {
    (pct * 1000.0).floor() as u128
}
