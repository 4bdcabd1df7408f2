//! Turning a user's idle-time choice into an [`Allocation`].
//!
//! When an idle interval is detected the core hands the presentation layer a
//! [`PendingIdle`]. Whatever surface asks the user (a dialog, a prompt) comes
//! back with an optional [`AllocationStrategy`]; `None` means the choice was
//! cancelled and resolves exactly like [`AllocationStrategy::Discard`].

use crate::allocation::{self, Allocation, AllocationError};
use crate::types::CounterId;

/// The ways idle time can be assigned.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationStrategy {
    /// All of it to whichever counter was running when the host went hidden.
    PreviousTimer,
    /// All of it to a chosen counter.
    SelectedTimer(CounterId),
    /// Fixed amounts per counter, the rest to `remainder`.
    FixedDistribution {
        amounts: Allocation,
        remainder: CounterId,
    },
    /// Percentage shares per counter, the rest to `remainder`.
    PercentageDistribution {
        percentages: Vec<(CounterId, f64)>,
        remainder: CounterId,
    },
    /// Drop the idle time.
    Discard,
}

impl AllocationStrategy {
    /// Stable name for logs and prompts.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::PreviousTimer => "previous-timer",
            Self::SelectedTimer(_) => "selected-timer",
            Self::FixedDistribution { .. } => "fixed-distribution",
            Self::PercentageDistribution { .. } => "percentage-distribution",
            Self::Discard => "discard",
        }
    }
}

/// An idle interval waiting for the user's decision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingIdle {
    /// Length of the idle interval.
    pub idle_ms: u64,
    /// Counter that was running when the host went hidden, if any.
    pub previous_running: Option<CounterId>,
}

impl PendingIdle {
    pub const fn new(idle_ms: u64, previous_running: Option<CounterId>) -> Self {
        Self {
            idle_ms,
            previous_running,
        }
    }

    /// Computes the allocation for the user's choice.
    ///
    /// `None` (cancelled) and `PreviousTimer` without a previous counter both
    /// resolve to an empty allocation.
    pub fn resolve(
        &self,
        choice: Option<AllocationStrategy>,
    ) -> Result<Allocation, AllocationError> {
        let total = self.idle_ms;
        let Some(strategy) = choice else {
            tracing::debug!(idle_ms = total, "allocation cancelled; discarding idle time");
            return Ok(allocation::discard(total));
        };
        tracing::debug!(idle_ms = total, strategy = strategy.as_str(), "resolving idle time");

        match strategy {
            AllocationStrategy::PreviousTimer => Ok(self
                .previous_running
                .clone()
                .map_or_else(|| allocation::discard(total), |id| allocation::to_single(total, id))),
            AllocationStrategy::SelectedTimer(id) => Ok(allocation::to_single(total, id)),
            AllocationStrategy::FixedDistribution { amounts, remainder } => {
                allocation::fixed(total, &amounts, &remainder)
            }
            AllocationStrategy::PercentageDistribution {
                percentages,
                remainder,
            } => allocation::percentage(total, &percentages, &remainder),
            AllocationStrategy::Discard => Ok(allocation::discard(total)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(s: &str) -> CounterId {
        CounterId::new(s).unwrap()
    }

    #[test]
    fn cancel_resolves_like_discard() {
        let pending = PendingIdle::new(30_000, Some(id("t1")));
        assert_eq!(
            pending.resolve(None).unwrap(),
            pending.resolve(Some(AllocationStrategy::Discard)).unwrap()
        );
        assert!(pending.resolve(None).unwrap().is_empty());
    }

    #[test]
    fn previous_timer_uses_remembered_counter() {
        let pending = PendingIdle::new(15_000, Some(id("t1")));
        let result = pending.resolve(Some(AllocationStrategy::PreviousTimer)).unwrap();
        assert_eq!(result.get("t1"), Some(15_000));
    }

    #[test]
    fn previous_timer_without_previous_discards() {
        let pending = PendingIdle::new(15_000, None);
        let result = pending.resolve(Some(AllocationStrategy::PreviousTimer)).unwrap();
        assert!(result.is_empty());
    }

    #[test]
    fn fixed_distribution_errors_propagate() {
        let pending = PendingIdle::new(1_000, None);
        let amounts: Allocation = [(id("t1"), 2_000)].into_iter().collect();
        let result = pending.resolve(Some(AllocationStrategy::FixedDistribution {
            amounts,
            remainder: id("t2"),
        }));
        assert!(matches!(result, Err(AllocationError::ExceedsTotal { .. })));
    }

    #[test]
    fn percentage_distribution_conserves() {
        let pending = PendingIdle::new(90_000, None);
        let result = pending
            .resolve(Some(AllocationStrategy::PercentageDistribution {
                percentages: vec![(id("t1"), 25.0), (id("t2"), 25.0)],
                remainder: id("t3"),
            }))
            .unwrap();
        assert_eq!(result.total(), 90_000);
        assert_eq!(result.get("t3"), Some(45_000));
    }
}
