//! Discount Ledger Domain Concerns

pub mod discounts;
pub mod users;
