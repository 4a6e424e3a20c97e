//! Users
//!
//! Users are owned by the storefront; only what the discount ledger references
//! is kept here.

pub mod data;
pub mod errors;
pub mod records;
pub(crate) mod repository;
pub mod service;

pub use errors::UsersServiceError;
pub use service::*;
