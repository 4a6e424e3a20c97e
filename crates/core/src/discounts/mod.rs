//! Discounts
//!
//! Catalog rules describing a percentage or fixed reduction granted to users.

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Returned when a discount kind string is not recognised.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown discount kind `{0}`")]
pub struct UnknownDiscountKind(pub String);

/// Kind of reduction a discount applies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscountKind {
    /// Reduce the amount by a percentage (e.g. "10% off").
    Percentage,

    /// Subtract a fixed amount once percentages are applied (e.g. "$10 off").
    Fixed,
}

impl DiscountKind {
    /// Storage and configuration name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Percentage => "percentage",
            Self::Fixed => "fixed",
        }
    }
}

impl fmt::Display for DiscountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DiscountKind {
    type Err = UnknownDiscountKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "percentage" => Ok(Self::Percentage),
            "fixed" => Ok(Self::Fixed),
            other => Err(UnknownDiscountKind(other.to_string())),
        }
    }
}

/// The rule part of a catalog discount.
///
/// The engine never mutates a rule; `active` is toggled by whoever owns the
/// catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscountRule {
    /// Percentage or fixed reduction.
    pub kind: DiscountKind,

    /// Percentage points for [`DiscountKind::Percentage`], an amount for
    /// [`DiscountKind::Fixed`].
    pub value: Decimal,

    /// Whether the discount is switched on in the catalog.
    pub active: bool,

    /// Instant from which the discount no longer applies.
    pub expires_at: Option<Timestamp>,

    /// Maximum number of applications per user, unbounded when `None`.
    pub usage_cap: Option<u32>,
}

impl DiscountRule {
    /// Active, non-expiring, uncapped percentage rule.
    #[must_use]
    pub fn percentage(value: Decimal) -> Self {
        Self::new(DiscountKind::Percentage, value)
    }

    /// Active, non-expiring, uncapped fixed amount rule.
    #[must_use]
    pub fn fixed(value: Decimal) -> Self {
        Self::new(DiscountKind::Fixed, value)
    }

    /// Active, non-expiring, uncapped rule of the given kind.
    #[must_use]
    pub fn new(kind: DiscountKind, value: Decimal) -> Self {
        Self {
            kind,
            value,
            active: true,
            expires_at: None,
            usage_cap: None,
        }
    }

    /// Limit the number of applications per user.
    #[must_use]
    pub fn with_usage_cap(self, usage_cap: u32) -> Self {
        Self {
            usage_cap: Some(usage_cap),
            ..self
        }
    }

    /// Stop the rule applying from `expires_at` onwards.
    #[must_use]
    pub fn expiring_at(self, expires_at: Timestamp) -> Self {
        Self {
            expires_at: Some(expires_at),
            ..self
        }
    }

    /// Switch the rule off.
    #[must_use]
    pub fn inactive(self) -> Self {
        Self {
            active: false,
            ..self
        }
    }

    /// Whether the rule is switched on and not yet expired at `now`.
    #[must_use]
    pub fn is_live_at(&self, now: Timestamp) -> bool {
        self.active && self.expires_at.is_none_or(|expires_at| expires_at > now)
    }
}
