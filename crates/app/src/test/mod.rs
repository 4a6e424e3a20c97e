//! Test support: a shared `PostgreSQL` container with one database per test.

mod db;
pub(crate) mod helpers;

pub(crate) use context::TestContext;
