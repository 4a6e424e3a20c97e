//! Discount Repositories

mod assignments;
mod audits;
mod discounts;

use sqlx::{Row, postgres::PgRow};

pub(crate) use assignments::PgAssignmentsRepository;
pub(crate) use audits::PgAuditsRepository;
pub(crate) use discounts::{AssignedDiscount, PgDiscountsRepository};

/// Counters are stored as `INTEGER` and surfaced as `u32`.
fn try_i32_from_u32(value: u32, column: &'static str) -> Result<i32, sqlx::Error> {
    i32::try_from(value).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn try_optional_i32_from_u32(
    value: Option<u32>,
    column: &'static str,
) -> Result<Option<i32>, sqlx::Error> {
    value.map(|v| try_i32_from_u32(v, column)).transpose()
}

fn try_get_count(row: &PgRow, column: &str) -> Result<u32, sqlx::Error> {
    let count: i32 = row.try_get(column)?;

    u32::try_from(count).map_err(|e| sqlx::Error::ColumnDecode {
        index: column.to_string(),
        source: Box::new(e),
    })
}

fn try_get_optional_count(row: &PgRow, column: &str) -> Result<Option<u32>, sqlx::Error> {
    row.try_get::<Option<i32>, _>(column)?
        .map(u32::try_from)
        .transpose()
        .map_err(|e| sqlx::Error::ColumnDecode {
            index: column.to_string(),
            source: Box::new(e),
        })
}
