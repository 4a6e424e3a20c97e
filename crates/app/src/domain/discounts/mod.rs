//! Discounts
//!
//! The discount manager: catalog, per-user assignment ledger, audit trail and
//! the assign / revoke / eligibility / apply operations over them.

pub mod data;
mod errors;
pub mod memory;
pub mod notifications;
pub mod records;
mod repositories;
pub mod service;

pub use errors::DiscountsServiceError;
pub use service::*;
