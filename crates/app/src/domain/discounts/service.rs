//! Discounts service.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use mockall::automock;
use rebate::{
    assignments::AssignmentState,
    config::StackingConfig,
    eligibility::{Candidate, eligible},
    stacking::stack,
};
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use sqlx::{Postgres, Transaction};
use tracing::{info, warn};

use crate::{
    database::Db,
    domain::{
        discounts::{
            data::{AppliedAmounts, AuditAction, NewAuditEntry, NewDiscount},
            errors::DiscountsServiceError,
            notifications::{DiscountEvent, NotificationSink},
            records::{AssignmentRecord, AuditEntryRecord, DiscountRecord, DiscountUuid},
            repositories::{
                AssignedDiscount, PgAssignmentsRepository, PgAuditsRepository,
                PgDiscountsRepository,
            },
        },
        users::{records::UserUuid, repository::PgUsersRepository},
    },
};

#[derive(Debug, Clone)]
pub struct PgDiscountsService {
    db: Db,
    discounts: PgDiscountsRepository,
    assignments: PgAssignmentsRepository,
    audits: PgAuditsRepository,
    users: PgUsersRepository,
    notifications: Arc<dyn NotificationSink>,
}

impl PgDiscountsService {
    #[must_use]
    pub fn new(db: Db, notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            db,
            discounts: PgDiscountsRepository::new(),
            assignments: PgAssignmentsRepository::new(),
            audits: PgAuditsRepository::new(),
            users: PgUsersRepository::new(),
            notifications,
        }
    }

    async fn ensure_user(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        user: UserUuid,
    ) -> Result<(), DiscountsServiceError> {
        if self.users.user_exists(tx, user).await? {
            Ok(())
        } else {
            Err(DiscountsServiceError::UserNotFound)
        }
    }

    fn notify_all(&self, events: Vec<DiscountEvent>) {
        for event in events {
            self.notifications.notify(event);
        }
    }
}

/// Split assigned rows into engine candidates and a lookup of their catalog records.
pub(crate) fn into_candidates(
    rows: Vec<AssignedDiscount>,
) -> (
    Vec<Candidate<DiscountUuid>>,
    FxHashMap<DiscountUuid, DiscountRecord>,
) {
    let mut candidates = Vec::with_capacity(rows.len());
    let mut records = FxHashMap::default();

    for AssignedDiscount {
        discount,
        assignment,
    } in rows
    {
        candidates.push(Candidate::new(
            discount.uuid,
            discount.rule.clone(),
            assignment,
        ));
        records.insert(discount.uuid, discount);
    }

    (candidates, records)
}

/// Replace each candidate's assignment with the state read under lock.
///
/// Candidates whose row has vanished are dropped.
pub(crate) fn with_locked_state(
    candidates: Vec<Candidate<DiscountUuid>>,
    locked: &FxHashMap<DiscountUuid, AssignmentState>,
) -> Vec<Candidate<DiscountUuid>> {
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let state = *locked.get(&candidate.key)?;

            Some(Candidate::new(candidate.key, candidate.rule, state))
        })
        .collect()
}

#[async_trait]
impl DiscountsService for PgDiscountsService {
    #[tracing::instrument(
        name = "discounts.service.create_discount",
        skip(self, discount),
        fields(discount_uuid = %discount.uuid, kind = %discount.rule.kind),
        err
    )]
    async fn create_discount(
        &self,
        discount: NewDiscount,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self.discounts.create_discount(&mut tx, discount).await?;

        tx.commit().await?;

        info!(discount_uuid = %record.uuid, "created discount");

        Ok(record)
    }

    async fn get_discount(
        &self,
        discount: DiscountUuid,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self.discounts.get_discount(&mut tx, discount).await?;

        tx.commit().await?;

        Ok(record)
    }

    #[tracing::instrument(
        name = "discounts.service.set_discount_active",
        skip(self, discount),
        fields(discount_uuid = %discount),
        err
    )]
    async fn set_discount_active(
        &self,
        discount: DiscountUuid,
        active: bool,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let record = self
            .discounts
            .set_discount_active(&mut tx, discount, active)
            .await?;

        tx.commit().await?;

        info!(discount_uuid = %record.uuid, active, "toggled discount");

        Ok(record)
    }

    #[tracing::instrument(
        name = "discounts.service.assign",
        skip(self, user, discount, now),
        fields(user_uuid = %user, discount_uuid = %discount),
        err
    )]
    async fn assign(
        &self,
        user: UserUuid,
        discount: DiscountUuid,
        now: Timestamp,
    ) -> Result<AssignmentRecord, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.ensure_user(&mut tx, user).await?;
        self.discounts.get_discount(&mut tx, discount).await?;

        let assignment = self
            .assignments
            .upsert_assignment(&mut tx, user, discount, now)
            .await?;

        self.audits
            .create_audit(
                &mut tx,
                NewAuditEntry::new(user, discount, AuditAction::Assigned),
                now,
            )
            .await?;

        tx.commit().await?;

        self.notifications
            .notify(DiscountEvent::Assigned { user, discount });

        info!("assigned discount");

        Ok(assignment)
    }

    #[tracing::instrument(
        name = "discounts.service.revoke",
        skip(self, user, discount, now),
        fields(user_uuid = %user, discount_uuid = %discount),
        err
    )]
    async fn revoke(
        &self,
        user: UserUuid,
        discount: DiscountUuid,
        now: Timestamp,
    ) -> Result<bool, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.ensure_user(&mut tx, user).await?;
        self.discounts.get_discount(&mut tx, discount).await?;

        let Some(_revoked) = self
            .assignments
            .revoke_assignment(&mut tx, user, discount, now)
            .await?
        else {
            tx.commit().await?;

            info!("no open assignment to revoke");

            return Ok(false);
        };

        self.audits
            .create_audit(
                &mut tx,
                NewAuditEntry::new(user, discount, AuditAction::Revoked),
                now,
            )
            .await?;

        tx.commit().await?;

        self.notifications
            .notify(DiscountEvent::Revoked { user, discount });

        info!("revoked discount");

        Ok(true)
    }

    async fn eligible_for(
        &self,
        user: UserUuid,
        now: Timestamp,
        config: StackingConfig,
    ) -> Result<Vec<DiscountRecord>, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.ensure_user(&mut tx, user).await?;

        let rows = self
            .discounts
            .list_assigned_discounts(&mut tx, user, now)
            .await?;

        tx.commit().await?;

        let (candidates, mut records) = into_candidates(rows);

        Ok(eligible(candidates, &config, now)
            .into_iter()
            .filter_map(|candidate| records.remove(&candidate.key))
            .collect())
    }

    #[tracing::instrument(
        name = "discounts.service.apply",
        skip(self, user, amount, now, config),
        fields(user_uuid = %user, %amount),
        err
    )]
    async fn apply(
        &self,
        user: UserUuid,
        amount: Decimal,
        now: Timestamp,
        config: StackingConfig,
    ) -> Result<Decimal, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.ensure_user(&mut tx, user).await?;

        let rows = self
            .discounts
            .list_assigned_discounts(&mut tx, user, now)
            .await?;

        let (candidates, _) = into_candidates(rows);
        let candidates = eligible(candidates, &config, now);

        let keys: Vec<DiscountUuid> = candidates.iter().map(|c| c.key).collect();

        let locked: FxHashMap<DiscountUuid, AssignmentState> = self
            .assignments
            .lock_assignments(&mut tx, user, &keys)
            .await?
            .into_iter()
            .map(|record| (record.discount_uuid, record.state()))
            .collect();

        let candidates = with_locked_state(candidates, &locked);
        let outcome = stack(amount, &candidates, &config);

        let amounts = AppliedAmounts {
            amount_before: outcome.amount_before,
            amount_after: outcome.final_amount,
        };

        let mut events = Vec::with_capacity(outcome.applied.len());

        for candidate in candidates
            .iter()
            .filter(|candidate| outcome.applied.contains(&candidate.key))
        {
            let discount = candidate.key;

            let incremented = self
                .assignments
                .increment_usage(&mut tx, user, discount, candidate.rule.usage_cap)
                .await?;

            if incremented.is_none() {
                warn!(discount_uuid = %discount, "usage increment refused under lock");

                continue;
            }

            self.audits
                .create_audit(
                    &mut tx,
                    NewAuditEntry::applied(user, discount, amounts),
                    now,
                )
                .await?;

            events.push(DiscountEvent::Applied {
                user,
                discount,
                amount_before: amounts.amount_before,
                amount_after: amounts.amount_after,
            });
        }

        tx.commit().await?;

        let applied = events.len();

        self.notify_all(events);

        info!(
            applied,
            final_amount = %outcome.final_amount,
            "applied discounts"
        );

        Ok(outcome.final_amount)
    }

    async fn get_assignment(
        &self,
        user: UserUuid,
        discount: DiscountUuid,
    ) -> Result<Option<AssignmentRecord>, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        let assignment = self
            .assignments
            .get_assignment(&mut tx, user, discount)
            .await?;

        tx.commit().await?;

        Ok(assignment)
    }

    async fn audit_trail(
        &self,
        user: UserUuid,
    ) -> Result<Vec<AuditEntryRecord>, DiscountsServiceError> {
        let mut tx = self.db.begin_transaction().await?;

        self.ensure_user(&mut tx, user).await?;

        let entries = self.audits.list_audits(&mut tx, user).await?;

        tx.commit().await?;

        Ok(entries)
    }
}

#[automock]
#[async_trait]
/// Catalog, assignment ledger and audit trail operations.
pub trait DiscountsService: Send + Sync {
    /// Adds a discount to the catalog.
    async fn create_discount(
        &self,
        discount: NewDiscount,
    ) -> Result<DiscountRecord, DiscountsServiceError>;

    /// Fetches a catalog discount.
    async fn get_discount(
        &self,
        discount: DiscountUuid,
    ) -> Result<DiscountRecord, DiscountsServiceError>;

    /// Switches a catalog discount on or off.
    async fn set_discount_active(
        &self,
        discount: DiscountUuid,
        active: bool,
    ) -> Result<DiscountRecord, DiscountsServiceError>;

    /// Grants `discount` to `user`, reopening a revoked assignment and zeroing
    /// its usage count. Always writes an `assigned` audit entry.
    async fn assign(
        &self,
        user: UserUuid,
        discount: DiscountUuid,
        now: Timestamp,
    ) -> Result<AssignmentRecord, DiscountsServiceError>;

    /// Closes the open assignment of `discount` to `user`.
    ///
    /// Returns `false`, writing nothing, when no open assignment exists.
    async fn revoke(
        &self,
        user: UserUuid,
        discount: DiscountUuid,
        now: Timestamp,
    ) -> Result<bool, DiscountsServiceError>;

    /// The user's discounts eligible at `now`, in stacking order.
    async fn eligible_for(
        &self,
        user: UserUuid,
        now: Timestamp,
        config: StackingConfig,
    ) -> Result<Vec<DiscountRecord>, DiscountsServiceError>;

    /// Stacks the user's eligible discounts onto `amount` and returns the
    /// final amount.
    ///
    /// Usage counts and `applied` audit entries are written atomically; on
    /// error nothing is written.
    async fn apply(
        &self,
        user: UserUuid,
        amount: Decimal,
        now: Timestamp,
        config: StackingConfig,
    ) -> Result<Decimal, DiscountsServiceError>;

    /// Fetches the assignment row for a pair, open or revoked.
    async fn get_assignment(
        &self,
        user: UserUuid,
        discount: DiscountUuid,
    ) -> Result<Option<AssignmentRecord>, DiscountsServiceError>;

    /// The user's audit entries, oldest first.
    async fn audit_trail(
        &self,
        user: UserUuid,
    ) -> Result<Vec<AuditEntryRecord>, DiscountsServiceError>;
}
