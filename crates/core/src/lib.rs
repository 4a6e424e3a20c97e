//! Rebate
//!
//! Rebate computes the price reductions a user is entitled to: which of their
//! assigned discounts are eligible, the order in which they stack, how
//! percentages are capped, and how the result is rounded.
//!
//! Everything here is pure. Persisting assignments, locking them while they
//! are used and recording audit entries is left to the caller.

pub mod assignments;
pub mod config;
pub mod discounts;
pub mod eligibility;
pub mod prelude;
pub mod rounding;
pub mod stacking;
