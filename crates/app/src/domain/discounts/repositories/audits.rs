//! Audits Repository
//!
//! Append-only: entries are inserted and listed, never updated.

use jiff::Timestamp;
use jiff_sqlx::Timestamp as SqlxTimestamp;
use sqlx::{FromRow, Postgres, Row, Transaction, postgres::PgRow, query_as, types::Json};

use crate::domain::{
    discounts::{
        data::{AppliedAmounts, AuditAction, NewAuditEntry},
        records::{AuditEntryRecord, AuditEntryUuid, DiscountUuid},
    },
    users::records::UserUuid,
};

const CREATE_AUDIT_SQL: &str = include_str!("../sql/create_audit.sql");
const LIST_AUDITS_SQL: &str = include_str!("../sql/list_audits.sql");

#[derive(Debug, Clone, Default)]
pub(crate) struct PgAuditsRepository;

impl PgAuditsRepository {
    #[must_use]
    pub(crate) fn new() -> Self {
        Self
    }

    pub(crate) async fn create_audit(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        entry: NewAuditEntry,
        now: Timestamp,
    ) -> Result<AuditEntryRecord, sqlx::Error> {
        query_as::<Postgres, AuditEntryRecord>(CREATE_AUDIT_SQL)
            .bind(AuditEntryUuid::new().into_uuid())
            .bind(entry.user.into_uuid())
            .bind(entry.discount.into_uuid())
            .bind(entry.action.as_str())
            .bind(entry.metadata.map(Json))
            .bind(SqlxTimestamp::from(now))
            .fetch_one(&mut **tx)
            .await
    }

    /// Every entry for `user`, oldest first.
    pub(crate) async fn list_audits(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<Vec<AuditEntryRecord>, sqlx::Error> {
        query_as::<Postgres, AuditEntryRecord>(LIST_AUDITS_SQL)
            .bind(user.into_uuid())
            .fetch_all(&mut **tx)
            .await
    }
}

impl<'r> FromRow<'r, PgRow> for AuditEntryRecord {
    fn from_row(row: &'r PgRow) -> sqlx::Result<Self> {
        let action: String = row.try_get("action")?;

        let action = action
            .parse::<AuditAction>()
            .map_err(|e| sqlx::Error::ColumnDecode {
                index: "action".to_string(),
                source: e.into(),
            })?;

        Ok(Self {
            uuid: AuditEntryUuid::from_uuid(row.try_get("uuid")?),
            user_uuid: UserUuid::from_uuid(row.try_get("user_uuid")?),
            discount_uuid: DiscountUuid::from_uuid(row.try_get("discount_uuid")?),
            action,
            metadata: row
                .try_get::<Option<Json<AppliedAmounts>>, _>("metadata")?
                .map(|Json(amounts)| amounts),
            created_at: row.try_get::<SqlxTimestamp, _>("created_at")?.to_jiff(),
        })
    }
}
