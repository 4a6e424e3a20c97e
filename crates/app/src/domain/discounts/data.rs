//! Discounts Data

use std::{fmt, str::FromStr};

use rebate::discounts::DiscountRule;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::{discounts::records::DiscountUuid, users::records::UserUuid};

/// New Discount Data
#[derive(Debug, Clone, PartialEq)]
pub struct NewDiscount {
    pub uuid: DiscountUuid,
    pub name: String,
    pub rule: DiscountRule,
}

/// Decimal places kept for a stored discount value (`NUMERIC(10, 2)`).
pub const VALUE_SCALE: u32 = 2;

/// Largest value the `discounts.value` column can hold.
pub const MAX_VALUE: Decimal = Decimal::from_parts(1_410_065_407, 2, 0, false, 2);

impl NewDiscount {
    /// The value as the catalog column stores it: rounded half away from zero to
    /// [`VALUE_SCALE`] places, or `None` when it is negative or too large.
    #[must_use]
    pub fn stored_value(&self) -> Option<Decimal> {
        let value = self
            .rule
            .value
            .round_dp_with_strategy(VALUE_SCALE, RoundingStrategy::MidpointAwayFromZero);

        (Decimal::ZERO..=MAX_VALUE).contains(&value).then_some(value)
    }
}

/// Audit Action Data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    Assigned,
    Applied,
    Revoked,
}

impl AuditAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Assigned => "assigned",
            Self::Applied => "applied",
            Self::Revoked => "revoked",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuditAction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "assigned" => Ok(Self::Assigned),
            "applied" => Ok(Self::Applied),
            "revoked" => Ok(Self::Revoked),
            other => Err(format!("unknown audit action `{other}`")),
        }
    }
}

/// Amounts recorded against an `applied` audit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedAmounts {
    pub amount_before: Decimal,
    pub amount_after: Decimal,
}

/// New Audit Entry Data
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct NewAuditEntry {
    pub user: UserUuid,
    pub discount: DiscountUuid,
    pub action: AuditAction,
    pub metadata: Option<AppliedAmounts>,
}

impl NewAuditEntry {
    pub(crate) const fn new(user: UserUuid, discount: DiscountUuid, action: AuditAction) -> Self {
        Self {
            user,
            discount,
            action,
            metadata: None,
        }
    }

    pub(crate) const fn applied(
        user: UserUuid,
        discount: DiscountUuid,
        amounts: AppliedAmounts,
    ) -> Self {
        Self {
            user,
            discount,
            action: AuditAction::Applied,
            metadata: Some(amounts),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use testresult::TestResult;

    use super::*;

    fn new_discount(value: Decimal) -> NewDiscount {
        NewDiscount {
            uuid: DiscountUuid::new(),
            name: "Sample".to_string(),
            rule: DiscountRule::percentage(value),
        }
    }

    #[test]
    fn stored_value_rounds_to_the_column_scale() {
        assert_eq!(
            new_discount(Decimal::new(33_333, 3)).stored_value(),
            Some(Decimal::new(3_333, 2))
        );
        assert_eq!(
            new_discount(Decimal::new(12_345, 3)).stored_value(),
            Some(Decimal::new(1_235, 2))
        );
    }

    #[test]
    fn stored_value_rejects_values_outside_the_column_range() {
        assert_eq!(new_discount(Decimal::NEGATIVE_ONE).stored_value(), None);
        assert_eq!(new_discount(Decimal::from(100_000_000)).stored_value(), None);
        assert_eq!(MAX_VALUE, Decimal::new(9_999_999_999, 2));
        assert_eq!(new_discount(MAX_VALUE).stored_value(), Some(MAX_VALUE));
    }

    #[test]
    fn audit_actions_round_trip_through_their_storage_names() {
        for action in [
            AuditAction::Assigned,
            AuditAction::Applied,
            AuditAction::Revoked,
        ] {
            assert_eq!(action.as_str().parse::<AuditAction>(), Ok(action));
        }

        assert!("granted".parse::<AuditAction>().is_err());
    }

    #[test]
    fn applied_amounts_are_stored_under_stable_keys() -> TestResult {
        let amounts = AppliedAmounts {
            amount_before: Decimal::ONE_HUNDRED,
            amount_after: Decimal::from(90),
        };

        assert_eq!(
            serde_json::to_value(amounts)?,
            json!({ "amount_before": "100", "amount_after": "90" })
        );

        Ok(())
    }
}
