//! Rounding

use std::{fmt, str::FromStr};

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Number of decimal places final amounts are rounded to.
pub const MONETARY_SCALE: u32 = 2;

/// Returned when a rounding policy string is not recognised.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown rounding policy `{0}`")]
pub struct UnknownRounding(pub String);

/// How a final amount is brought to [`MONETARY_SCALE`] decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rounding {
    /// Ceiling.
    Up,

    /// Floor.
    Down,

    /// Half away from zero.
    #[default]
    Nearest,
}

impl Rounding {
    /// Round `value` to two decimal places under this policy.
    #[must_use]
    pub fn round(self, value: Decimal) -> Decimal {
        let strategy = match self {
            Self::Up => RoundingStrategy::ToPositiveInfinity,
            Self::Down => RoundingStrategy::ToNegativeInfinity,
            Self::Nearest => RoundingStrategy::MidpointAwayFromZero,
        };

        value.round_dp_with_strategy(MONETARY_SCALE, strategy)
    }

    /// Configuration name of the policy.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Up => "up",
            Self::Down => "down",
            Self::Nearest => "nearest",
        }
    }
}

impl fmt::Display for Rounding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rounding {
    type Err = UnknownRounding;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "up" => Ok(Self::Up),
            "down" => Ok(Self::Down),
            "nearest" => Ok(Self::Nearest),
            other => Err(UnknownRounding(other.to_string())),
        }
    }
}
