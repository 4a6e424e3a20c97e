//! Command-line and environment configuration

mod db;
mod logging;
mod stacking;

pub use db::DatabaseConfig;
pub use logging::{LogFormat, LoggingConfig};
pub use stacking::StackingArgs;
