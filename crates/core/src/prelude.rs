//! Rebate prelude.
//!
//! Convenience exports for common library consumers.

pub use crate::{
    assignments::AssignmentState,
    config::{StackingConfig, StackingConfigError},
    discounts::{DiscountKind, DiscountRule, UnknownDiscountKind},
    eligibility::{Candidate, eligible},
    rounding::{MONETARY_SCALE, Rounding, UnknownRounding},
    stacking::{StackingOutcome, stack},
};
