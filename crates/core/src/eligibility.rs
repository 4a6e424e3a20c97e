//! Eligibility
//!
//! Decides which of a user's assigned discounts may be applied right now and in
//! which order they stack.

use jiff::Timestamp;

use crate::{assignments::AssignmentState, config::StackingConfig, discounts::DiscountRule};

/// A discount assigned to a user, paired with the user's ledger state for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate<K> {
    /// Identity of the discount.
    pub key: K,

    /// The catalog rule.
    pub rule: DiscountRule,

    /// The user's assignment of the discount.
    pub assignment: AssignmentState,
}

impl<K> Candidate<K> {
    /// Pair a discount with the user's assignment of it.
    pub const fn new(key: K, rule: DiscountRule, assignment: AssignmentState) -> Self {
        Self {
            key,
            rule,
            assignment,
        }
    }

    /// Open, switched on, unexpired at `now`, and under its usage cap.
    #[must_use]
    pub fn is_eligible_at(&self, now: Timestamp) -> bool {
        !self.assignment.is_revoked()
            && self.rule.is_live_at(now)
            && self.assignment.has_remaining_uses(self.rule.usage_cap)
    }
}

/// Filter `candidates` down to those eligible at `now` and put them in stacking order.
///
/// Candidates are expected in catalog order; the sort is stable, so discounts
/// of the same kind keep that order.
pub fn eligible<K, I>(candidates: I, config: &StackingConfig, now: Timestamp) -> Vec<Candidate<K>>
where
    I: IntoIterator<Item = Candidate<K>>,
{
    let mut eligible: Vec<Candidate<K>> = candidates
        .into_iter()
        .filter(|candidate| candidate.is_eligible_at(now))
        .collect();

    eligible.sort_by_key(|candidate| config.rank(candidate.rule.kind));

    eligible
}

#[cfg(test)]
mod tests {
    use jiff::ToSpan;
    use rust_decimal::Decimal;
    use smallvec::smallvec;
    use testresult::TestResult;

    use crate::discounts::DiscountKind;

    use super::*;

    fn keys(candidates: &[Candidate<u32>]) -> Vec<u32> {
        candidates.iter().map(|candidate| candidate.key).collect()
    }

    #[test]
    fn excludes_revoked_inactive_expired_and_capped() -> TestResult {
        let now = Timestamp::now();

        let candidates = [
            Candidate::new(1, DiscountRule::fixed(Decimal::TEN), AssignmentState::fresh()),
            Candidate::new(
                2,
                DiscountRule::fixed(Decimal::TEN),
                AssignmentState {
                    usage_count: 0,
                    revoked_at: Some(now),
                },
            ),
            Candidate::new(
                3,
                DiscountRule::fixed(Decimal::TEN).inactive(),
                AssignmentState::fresh(),
            ),
            Candidate::new(
                4,
                DiscountRule::fixed(Decimal::TEN).expiring_at(now),
                AssignmentState::fresh(),
            ),
            Candidate::new(
                5,
                DiscountRule::fixed(Decimal::TEN).with_usage_cap(2),
                AssignmentState::used(2),
            ),
            Candidate::new(
                6,
                DiscountRule::fixed(Decimal::TEN)
                    .with_usage_cap(2)
                    .expiring_at(now.checked_add(1.hour())?),
                AssignmentState::used(1),
            ),
        ];

        let eligible = eligible(candidates, &StackingConfig::default(), now);

        assert_eq!(keys(&eligible), vec![1, 6]);

        Ok(())
    }

    #[test]
    fn orders_by_stacking_order_and_keeps_catalog_order_within_a_kind() {
        let candidates = [
            Candidate::new(1, DiscountRule::fixed(Decimal::ONE), AssignmentState::fresh()),
            Candidate::new(2, DiscountRule::percentage(Decimal::ONE), AssignmentState::fresh()),
            Candidate::new(3, DiscountRule::fixed(Decimal::TWO), AssignmentState::fresh()),
            Candidate::new(4, DiscountRule::percentage(Decimal::TWO), AssignmentState::fresh()),
        ];

        let percentage_first = eligible(
            candidates.clone(),
            &StackingConfig::default(),
            Timestamp::now(),
        );

        assert_eq!(keys(&percentage_first), vec![2, 4, 1, 3]);

        let fixed_first = eligible(
            candidates,
            &StackingConfig {
                stacking_order: smallvec![DiscountKind::Fixed, DiscountKind::Percentage],
                ..StackingConfig::default()
            },
            Timestamp::now(),
        );

        assert_eq!(keys(&fixed_first), vec![1, 3, 2, 4]);
    }

    #[test]
    fn kinds_missing_from_the_order_sort_last() {
        let candidates = [
            Candidate::new(1, DiscountRule::percentage(Decimal::ONE), AssignmentState::fresh()),
            Candidate::new(2, DiscountRule::fixed(Decimal::ONE), AssignmentState::fresh()),
        ];

        let config = StackingConfig {
            stacking_order: smallvec![DiscountKind::Fixed],
            ..StackingConfig::default()
        };

        let eligible = eligible(candidates, &config, Timestamp::now());

        assert_eq!(keys(&eligible), vec![2, 1]);
    }

    #[test]
    fn no_candidates_yields_nothing() {
        let eligible = eligible(
            Vec::<Candidate<u32>>::new(),
            &StackingConfig::default(),
            Timestamp::now(),
        );

        assert!(eligible.is_empty());
    }
}
