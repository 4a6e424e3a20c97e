//! Stacking Config
//!
//! A YAML file supplies the base configuration; individual flags override it.

use std::path::PathBuf;

use clap::Args;
use rebate::{
    config::{StackingConfig, StackingConfigError},
    discounts::DiscountKind,
    rounding::Rounding,
};
use rust_decimal::Decimal;
use smallvec::SmallVec;

/// Stacking settings for `eligible` and `apply`.
#[derive(Debug, Default, Args)]
pub struct StackingArgs {
    /// YAML stacking configuration file
    #[arg(long, env = "STACKING_CONFIG")]
    pub stacking_config: Option<PathBuf>,

    /// Discount kinds in stacking order, comma separated (e.g. `percentage,fixed`)
    #[arg(long, env = "STACKING_ORDER", value_delimiter = ',')]
    pub stacking_order: Option<Vec<DiscountKind>>,

    /// Upper bound on the summed percentage, 0 to 100
    #[arg(long, env = "MAX_PERCENTAGE_CAP")]
    pub max_percentage_cap: Option<Decimal>,

    /// Rounding policy for the final amount (up, down, nearest)
    #[arg(long, env = "ROUNDING")]
    pub rounding: Option<Rounding>,
}

impl StackingArgs {
    /// Build the effective configuration.
    ///
    /// # Errors
    ///
    /// Returns an error when the file cannot be loaded or the merged
    /// configuration fails validation.
    pub fn resolve(&self) -> Result<StackingConfig, StackingConfigError> {
        let mut config = match &self.stacking_config {
            Some(path) => StackingConfig::from_yaml_file(path)?,
            None => StackingConfig::default(),
        };

        if let Some(order) = &self.stacking_order {
            config.stacking_order = order.iter().copied().collect::<SmallVec<_>>();
        }

        if let Some(cap) = self.max_percentage_cap {
            config.max_percentage_cap = cap;
        }

        if let Some(rounding) = self.rounding {
            config.rounding = rounding;
        }

        config.validate()?;

        Ok(config)
    }
}
