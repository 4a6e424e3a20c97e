//! Discount ledger application: users, catalog, assignments, audit trail and
//! the services that apply discounts over them.

pub mod config;
pub mod context;
pub mod database;
pub mod domain;
pub mod observability;

#[cfg(test)]
mod test;

mod uuids;
