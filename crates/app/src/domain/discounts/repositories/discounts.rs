//! Discounts Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use rebate::{
    assignments::AssignmentState,
    discounts::{DiscountKind, DiscountRule},
};
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as};

use crate::domain::{
    discounts::{
        data::NewDiscount,
        records::{DiscountRecord, DiscountUuid},
    },
    users::records::UserUuid,
};

use super::{try_get_count, try_get_optional_count, try_optional_i32_from_u32};

const CREATE_DISCOUNT_SQL: &str = include_str!("../sql/create_discount.sql");
const GET_DISCOUNT_SQL: &str = include_str!("../sql/get_discount.sql");
const SET_DISCOUNT_ACTIVE_SQL: &str = include_str!("../sql/set_discount_active.sql");
const LIST_ASSIGNED_DISCOUNTS_SQL: &str = include_str!("../sql/list_assigned_discounts.sql");

const COLUMN_USAGE_CAP: &str = "usage_cap";

/// A catalog discount joined with the user's open assignment of it.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct AssignedDiscount {
    pub discount: DiscountRecord,
    pub assignment: AssignmentState,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct PgDiscountsRepository;

impl PgDiscountsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: NewDiscount,
    ) -> Result<DiscountRecord, sqlx::Error> {
        let usage_cap = try_optional_i32_from_u32(discount.rule.usage_cap, COLUMN_USAGE_CAP)?;

        query_as::<Postgres, DiscountRecord>(CREATE_DISCOUNT_SQL)
            .bind(discount.uuid.into_uuid())
            .bind(discount.name)
            .bind(discount.rule.kind.as_str())
            .bind(discount.rule.value)
            .bind(discount.rule.active)
            .bind(discount.rule.expires_at.map(SqlxTimestamp::from))
            .bind(usage_cap)
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn get_discount(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: DiscountUuid,
    ) -> Result<DiscountRecord, sqlx::Error> {
        query_as::<Postgres, DiscountRecord>(GET_DISCOUNT_SQL)
            .bind(discount.into_uuid())
            .fetch_one(&mut **tx)
            .await
    }

    pub(crate) async fn set_discount_active(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        discount: DiscountUuid,
        active: bool,
    ) -> Result<DiscountRecord, sqlx::Error> {
        query_as::<Postgres, DiscountRecord>(SET_DISCOUNT_ACTIVE_SQL)
            .bind(discount.into_uuid())
            .bind(active)
            .fetch_one(&mut **tx)
            .await
    }

    /// Open assignments of live discounts, in catalog order.
    ///
    /// Usage caps are not filtered here; callers decide with the row's count.
    pub(crate) async fn list_assigned_discounts(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        now: Timestamp,
    ) -> Result<Vec<AssignedDiscount>, sqlx::Error> {
        query_as::<Postgres, AssignedDiscount>(LIST_ASSIGNED_DISCOUNTS_SQL)
            .bind(user.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_all(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for DiscountRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let kind: String = row.try_get("kind")?;

        let kind = kind
            .parse::<DiscountKind>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "kind".to_string(),
                source: Box::new(e),
            })?;

        Ok(Self {
            uuid: DiscountUuid::from_uuid(row.try_get("uuid")?),
            name: row.try_get("name")?,
            rule: DiscountRule {
                kind,
                value: row.try_get("value")?,
                active: row.try_get("active")?,
                expires_at: row
                    .try_get::<Option<SqlxTimestamp>, _>("expires_at")?
                    .map(SqlxTimestamp::to_jiff),
                usage_cap: try_get_optional_count(row, COLUMN_USAGE_CAP)?,
            },
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
            updated_at: row.try_get::<SqlxTimestamp, _>("updated_at")?.to_jiff(),
        })
    }
}

impl<'r> FromRow<'r, PgRow> for AssignedDiscount {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            discount: DiscountRecord::from_row(row)?,
            assignment: AssignmentState {
                usage_count: try_get_count(row, "usage_count")?,
                revoked_at: row
                    .try_get::<Option<SqlxTimestamp>, _>("revoked_at")?
                    .map(SqlxTimestamp::to_jiff),
            },
        })
    }
}
