//! Stacking
//!
//! Applies an ordered set of eligible discounts to an amount.

use rust_decimal::Decimal;
use smallvec::SmallVec;

use crate::{config::StackingConfig, discounts::DiscountKind, eligibility::Candidate};

/// Result of stacking discounts onto one amount.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StackingOutcome<K> {
    /// Amount before any discount.
    pub amount_before: Decimal,

    /// Amount after percentages, fixed reductions, the zero floor and rounding.
    pub final_amount: Decimal,

    /// Summed percentage points, clamped to the configured cap.
    pub total_percentage: Decimal,

    /// Summed fixed reductions.
    pub total_fixed: Decimal,

    /// Discounts counted as used by this application, in stacking order.
    pub applied: SmallVec<[K; 4]>,
}

impl<K> StackingOutcome<K> {
    /// Whether any discount was counted as used.
    #[must_use]
    pub fn is_discounted(&self) -> bool {
        !self.applied.is_empty()
    }
}

/// Stack `candidates` (already in stacking order) onto `amount`.
///
/// Each candidate's assignment is re-checked first: revoked or capped ones are
/// skipped. Percentages are summed in order until the running total would pass
/// `max_percentage_cap`; the total is then pinned to the cap and later
/// percentages add nothing. Fixed reductions are always summed. The final
/// amount is `amount * (1 - pct / 100) - fixed`, floored at zero and rounded.
///
/// Every re-checked discount of a kind whose total is positive counts as
/// applied, including percentages that landed after the cap was reached.
///
/// `amount` is not validated. Arithmetic saturates at the `Decimal` bounds
/// instead of overflowing.
pub fn stack<K: Copy>(
    amount: Decimal,
    candidates: &[Candidate<K>],
    config: &StackingConfig,
) -> StackingOutcome<K> {
    let mut total_percentage = Decimal::ZERO;
    let mut total_fixed = Decimal::ZERO;
    let mut percentage_capped = false;
    let mut walked: SmallVec<[(K, DiscountKind); 4]> = SmallVec::new();

    for candidate in candidates {
        if !candidate.assignment.is_usable(candidate.rule.usage_cap) {
            continue;
        }

        walked.push((candidate.key, candidate.rule.kind));

        match candidate.rule.kind {
            DiscountKind::Percentage if !percentage_capped => {
                let running = total_percentage.saturating_add(candidate.rule.value);

                if running > config.max_percentage_cap {
                    total_percentage = config.max_percentage_cap;
                    percentage_capped = true;
                } else {
                    total_percentage = running;
                }
            }
            DiscountKind::Percentage => {}
            DiscountKind::Fixed => total_fixed = total_fixed.saturating_add(candidate.rule.value),
        }
    }

    // Saturates at the Decimal bounds; anything pushed below zero floors anyway.
    let after_percentage =
        amount.saturating_mul(Decimal::ONE - total_percentage / Decimal::ONE_HUNDRED);
    let final_amount = config.rounding.round(
        after_percentage
            .saturating_sub(total_fixed)
            .max(Decimal::ZERO),
    );

    let applied = walked
        .into_iter()
        .filter_map(|(key, kind)| {
            let total = match kind {
                DiscountKind::Percentage => total_percentage,
                DiscountKind::Fixed => total_fixed,
            };

            (total > Decimal::ZERO).then_some(key)
        })
        .collect();

    StackingOutcome {
        amount_before: amount,
        final_amount,
        total_percentage,
        total_fixed,
        applied,
    }
}
