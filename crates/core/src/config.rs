//! Stacking Configuration

use std::{fs, io, path::Path};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use smallvec::{SmallVec, smallvec};
use thiserror::Error;

use crate::{discounts::DiscountKind, rounding::Rounding};

/// Errors raised while loading or validating a [`StackingConfig`].
#[derive(Debug, Error)]
pub enum StackingConfigError {
    /// The percentage cap does not lie within `0..=100`.
    #[error("max percentage cap {0} is outside 0..=100")]
    CapOutOfRange(Decimal),

    /// A kind appears more than once in the stacking order.
    #[error("discount kind `{0}` appears more than once in the stacking order")]
    DuplicateKind(DiscountKind),

    /// The configuration document could not be parsed.
    #[error("failed to parse stacking configuration")]
    Yaml(#[from] serde_norway::Error),

    /// The configuration file could not be read.
    #[error("failed to read stacking configuration")]
    Io(#[from] io::Error),
}

/// How eligible discounts are ordered, capped and rounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StackingConfig {
    /// Kinds in the order they are consumed. Kinds missing here go last.
    pub stacking_order: SmallVec<[DiscountKind; 2]>,

    /// Upper bound on the summed percentage, in percentage points.
    pub max_percentage_cap: Decimal,

    /// Rounding applied to the final amount.
    pub rounding: Rounding,
}

impl Default for StackingConfig {
    fn default() -> Self {
        Self {
            stacking_order: smallvec![DiscountKind::Percentage, DiscountKind::Fixed],
            max_percentage_cap: Decimal::ONE_HUNDRED,
            rounding: Rounding::Nearest,
        }
    }
}

impl StackingConfig {
    /// Position of `kind` in the stacking order; absent kinds rank after every listed kind.
    #[must_use]
    pub fn rank(&self, kind: DiscountKind) -> usize {
        self.stacking_order
            .iter()
            .position(|listed| *listed == kind)
            .unwrap_or(self.stacking_order.len())
    }

    /// Check the cap range and that no kind is listed twice.
    ///
    /// # Errors
    ///
    /// - [`StackingConfigError::CapOutOfRange`]: the cap is negative or above 100.
    /// - [`StackingConfigError::DuplicateKind`]: a kind is listed more than once.
    pub fn validate(&self) -> Result<(), StackingConfigError> {
        if self.max_percentage_cap < Decimal::ZERO
            || self.max_percentage_cap > Decimal::ONE_HUNDRED
        {
            return Err(StackingConfigError::CapOutOfRange(self.max_percentage_cap));
        }

        for (index, kind) in self.stacking_order.iter().enumerate() {
            if self.stacking_order.iter().skip(index + 1).any(|other| other == kind) {
                return Err(StackingConfigError::DuplicateKind(*kind));
            }
        }

        Ok(())
    }

    /// Parse and validate a YAML document. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`StackingConfigError::Yaml`] for malformed documents, or any
    /// error from [`StackingConfig::validate`].
    pub fn from_yaml_str(yaml: &str) -> Result<Self, StackingConfigError> {
        let config: Self = serde_norway::from_str(yaml)?;

        config.validate()?;

        Ok(config)
    }

    /// Read, parse and validate a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`StackingConfigError::Io`] when the file cannot be read, or any
    /// error from [`StackingConfig::from_yaml_str`].
    pub fn from_yaml_file(path: impl AsRef<Path>) -> Result<Self, StackingConfigError> {
        Self::from_yaml_str(&fs::read_to_string(path)?)
    }
}
