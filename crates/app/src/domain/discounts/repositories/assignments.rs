//! Assignments Repository

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as, query_scalar};
use uuid::Uuid;

use crate::domain::{
    discounts::records::{AssignmentRecord, DiscountUuid},
    users::records::UserUuid,
};

use super::{try_get_count, try_optional_i32_from_u32};

const UPSERT_ASSIGNMENT_SQL: &str = include_str!("../sql/upsert_assignment.sql");
const REVOKE_ASSIGNMENT_SQL: &str = include_str!("../sql/revoke_assignment.sql");
const GET_ASSIGNMENT_SQL: &str = include_str!("../sql/get_assignment.sql");
const LOCK_ASSIGNMENTS_SQL: &str = include_str!("../sql/lock_assignments.sql");
const INCREMENT_USAGE_SQL: &str = include_str!("../sql/increment_usage.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgAssignmentsRepository;

impl PgAssignmentsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    /// Open the pair with a zeroed counter, creating or reopening the row.
    pub(crate) async fn upsert_assignment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        discount: DiscountUuid,
        now: Timestamp,
    ) -> Result<AssignmentRecord, sqlx::Error> {
        query_as::<Postgres, AssignmentRecord>(UPSERT_ASSIGNMENT_SQL)
            .bind(user.into_uuid())
            .bind(discount.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await
    }

    /// Close the pair's open assignment. `None` when nothing was open.
    pub(crate) async fn revoke_assignment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        discount: DiscountUuid,
        now: Timestamp,
    ) -> Result<Option<AssignmentRecord>, sqlx::Error> {
        query_as::<Postgres, AssignmentRecord>(REVOKE_ASSIGNMENT_SQL)
            .bind(user.into_uuid())
            .bind(discount.into_uuid())
            .bind(SqlxTimestamp::from(now))
            .fetch_optional(&mut **tx)
            .await
    }

    pub(crate) async fn get_assignment(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        discount: DiscountUuid,
    ) -> Result<Option<AssignmentRecord>, sqlx::Error> {
        query_as::<Postgres, AssignmentRecord>(GET_ASSIGNMENT_SQL)
            .bind(user.into_uuid())
            .bind(discount.into_uuid())
            .fetch_optional(&mut **tx)
            .await
    }

    /// Take exclusive row locks on the user's assignments of `discounts`.
    ///
    /// Rows are locked in discount UUID order so concurrent callers cannot
    /// deadlock on each other.
    pub(crate) async fn lock_assignments(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        discounts: &[DiscountUuid],
    ) -> Result<Vec<AssignmentRecord>, sqlx::Error> {
        let discounts: Vec<Uuid> = discounts.iter().map(|d| d.into_uuid()).collect();

        query_as::<Postgres, AssignmentRecord>(LOCK_ASSIGNMENTS_SQL)
            .bind(user.into_uuid())
            .bind(discounts)
            .fetch_all(&mut **tx)
            .await
    }

    /// Bump the usage counter if the row is open and still under `usage_cap`.
    ///
    /// Returns the new count, or `None` when the guard refused the increment.
    pub(crate) async fn increment_usage(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
        discount: DiscountUuid,
        usage_cap: Option<u32>,
    ) -> Result<Option<u32>, sqlx::Error> {
        let usage_cap = try_optional_i32_from_u32(usage_cap, "usage_cap")?;

        let count: Option<i32> = query_scalar(INCREMENT_USAGE_SQL)
            .bind(user.into_uuid())
            .bind(discount.into_uuid())
            .bind(usage_cap)
            .fetch_optional(&mut **tx)
            .await?;

        count
            .map(u32::try_from)
            .transpose()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "usage_count".to_string(),
                source: Box::new(e),
            })
    }
}

impl<'r> FromRow<'r, PgRow> for AssignmentRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        Ok(Self {
            user_uuid: UserUuid::from_uuid(row.try_get("user_uuid")?),
            discount_uuid: DiscountUuid::from_uuid(row.try_get("discount_uuid")?),
            usage_count: try_get_count(row, "usage_count")?,
            assigned_at: row.try_get::<SqlxTimestamp, _>("assigned_at")?.to_jiff(),
            revoked_at: row
                .try_get::<Option<SqlxTimestamp>, _>("revoked_at")?
                .map(SqlxTimestamp::to_jiff),
        })
    }
}
