//! In-memory Ledger
//!
//! Catalog, users, assignments and audit trail behind one async mutex. Every
//! operation runs entirely under the guard, so operations are serialised and
//! `apply` never observes another call's partial state.

use std::sync::Arc;

use async_trait::async_trait;
use jiff::Timestamp;
use rebate::{
    config::StackingConfig, discounts::DiscountRule, eligibility::eligible, stacking::stack,
};
use rust_decimal::Decimal;
use rustc_hash::FxHashMap;
use tokio::sync::Mutex;
use tracing::info;

use crate::domain::{
    discounts::{
        DiscountsService,
        data::{AppliedAmounts, AuditAction, NewAuditEntry, NewDiscount},
        errors::DiscountsServiceError,
        notifications::{DiscountEvent, NotificationSink},
        records::{AssignmentRecord, AuditEntryRecord, AuditEntryUuid, DiscountRecord, DiscountUuid},
        repositories::AssignedDiscount,
        service::into_candidates,
    },
    users::{
        UsersService,
        data::NewUser,
        errors::UsersServiceError,
        records::{UserRecord, UserUuid},
    },
};

#[derive(Debug, Default)]
struct MemoryState {
    users: FxHashMap<UserUuid, UserRecord>,

    /// Catalog in creation order.
    discounts: Vec<DiscountRecord>,

    assignments: FxHashMap<(UserUuid, DiscountUuid), AssignmentRecord>,
    audits: Vec<AuditEntryRecord>,
}

impl MemoryState {
    fn ensure_user(&self, user: UserUuid) -> Result<(), DiscountsServiceError> {
        if self.users.contains_key(&user) {
            Ok(())
        } else {
            Err(DiscountsServiceError::UserNotFound)
        }
    }

    fn discount(&self, discount: DiscountUuid) -> Result<&DiscountRecord, DiscountsServiceError> {
        self.discounts
            .iter()
            .find(|record| record.uuid == discount)
            .ok_or(DiscountsServiceError::DiscountNotFound)
    }

    /// Open assignments of live discounts, in catalog order.
    fn assigned_discounts(&self, user: UserUuid, now: Timestamp) -> Vec<AssignedDiscount> {
        self.discounts
            .iter()
            .filter(|discount| discount.rule.is_live_at(now))
            .filter_map(|discount| {
                let assignment = self.assignments.get(&(user, discount.uuid))?;

                (!assignment.is_revoked()).then(|| AssignedDiscount {
                    discount: discount.clone(),
                    assignment: assignment.state(),
                })
            })
            .collect()
    }

    fn append_audit(&mut self, entry: NewAuditEntry, now: Timestamp) {
        self.audits.push(AuditEntryRecord {
            uuid: AuditEntryUuid::new(),
            user_uuid: entry.user,
            discount_uuid: entry.discount,
            action: entry.action,
            metadata: entry.metadata,
            created_at: now,
        });
    }
}

/// Ledger kept in process memory.
///
/// Clones share the same state.
#[derive(Debug, Clone)]
pub struct MemoryDiscountsService {
    state: Arc<Mutex<MemoryState>>,
    notifications: Arc<dyn NotificationSink>,
}

impl MemoryDiscountsService {
    #[must_use]
    pub fn new(notifications: Arc<dyn NotificationSink>) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            notifications,
        }
    }
}

#[async_trait]
impl UsersService for MemoryDiscountsService {
    async fn create_user(&self, user: NewUser) -> Result<UserRecord, UsersServiceError> {
        let mut state = self.state.lock().await;

        if state.users.contains_key(&user.uuid) {
            return Err(UsersServiceError::AlreadyExists);
        }

        let now = Timestamp::now();

        let record = UserRecord {
            uuid: user.uuid,
            name: user.name,
            created_at: now,
            updated_at: now,
        };

        state.users.insert(record.uuid, record.clone());

        Ok(record)
    }

    async fn get_user(&self, user: UserUuid) -> Result<UserRecord, UsersServiceError> {
        let state = self.state.lock().await;

        state
            .users
            .get(&user)
            .cloned()
            .ok_or(UsersServiceError::NotFound)
    }
}

#[async_trait]
impl DiscountsService for MemoryDiscountsService {
    async fn create_discount(
        &self,
        discount: NewDiscount,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let Some(value) = discount.stored_value() else {
            return Err(DiscountsServiceError::InvalidData);
        };

        if discount.rule.usage_cap == Some(0) {
            return Err(DiscountsServiceError::InvalidData);
        }

        let mut state = self.state.lock().await;

        if state.discount(discount.uuid).is_ok() {
            return Err(DiscountsServiceError::AlreadyExists);
        }

        let now = Timestamp::now();

        let record = DiscountRecord {
            uuid: discount.uuid,
            name: discount.name,
            rule: DiscountRule {
                value,
                ..discount.rule
            },
            created_at: now,
            updated_at: now,
        };

        state.discounts.push(record.clone());

        Ok(record)
    }

    async fn get_discount(
        &self,
        discount: DiscountUuid,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let state = self.state.lock().await;

        state.discount(discount).cloned()
    }

    async fn set_discount_active(
        &self,
        discount: DiscountUuid,
        active: bool,
    ) -> Result<DiscountRecord, DiscountsServiceError> {
        let mut state = self.state.lock().await;

        let record = state
            .discounts
            .iter_mut()
            .find(|record| record.uuid == discount)
            .ok_or(DiscountsServiceError::DiscountNotFound)?;

        record.rule.active = active;
        record.updated_at = Timestamp::now();

        Ok(record.clone())
    }

    async fn assign(
        &self,
        user: UserUuid,
        discount: DiscountUuid,
        now: Timestamp,
    ) -> Result<AssignmentRecord, DiscountsServiceError> {
        let mut state = self.state.lock().await;

        state.ensure_user(user)?;
        state.discount(discount)?;

        let assignment = AssignmentRecord {
            user_uuid: user,
            discount_uuid: discount,
            usage_count: 0,
            assigned_at: now,
            revoked_at: None,
        };

        state.assignments.insert((user, discount), assignment.clone());
        state.append_audit(NewAuditEntry::new(user, discount, AuditAction::Assigned), now);

        drop(state);

        self.notifications
            .notify(DiscountEvent::Assigned { user, discount });

        info!(user_uuid = %user, discount_uuid = %discount, "assigned discount");

        Ok(assignment)
    }

    async fn revoke(
        &self,
        user: UserUuid,
        discount: DiscountUuid,
        now: Timestamp,
    ) -> Result<bool, DiscountsServiceError> {
        let mut state = self.state.lock().await;

        state.ensure_user(user)?;
        state.discount(discount)?;

        let Some(assignment) = state
            .assignments
            .get_mut(&(user, discount))
            .filter(|assignment| !assignment.is_revoked())
        else {
            return Ok(false);
        };

        assignment.revoked_at = Some(now);

        state.append_audit(NewAuditEntry::new(user, discount, AuditAction::Revoked), now);

        drop(state);

        self.notifications
            .notify(DiscountEvent::Revoked { user, discount });

        info!(user_uuid = %user, discount_uuid = %discount, "revoked discount");

        Ok(true)
    }

    async fn eligible_for(
        &self,
        user: UserUuid,
        now: Timestamp,
        config: StackingConfig,
    ) -> Result<Vec<DiscountRecord>, DiscountsServiceError> {
        let state = self.state.lock().await;

        state.ensure_user(user)?;

        let (candidates, mut records) = into_candidates(state.assigned_discounts(user, now));

        Ok(eligible(candidates, &config, now)
            .into_iter()
            .filter_map(|candidate| records.remove(&candidate.key))
            .collect())
    }

    async fn apply(
        &self,
        user: UserUuid,
        amount: Decimal,
        now: Timestamp,
        config: StackingConfig,
    ) -> Result<Decimal, DiscountsServiceError> {
        let mut state = self.state.lock().await;

        state.ensure_user(user)?;

        let (candidates, _) = into_candidates(state.assigned_discounts(user, now));
        let candidates = eligible(candidates, &config, now);
        let outcome = stack(amount, &candidates, &config);

        let amounts = AppliedAmounts {
            amount_before: outcome.amount_before,
            amount_after: outcome.final_amount,
        };

        let mut increments = Vec::with_capacity(outcome.applied.len());

        for candidate in candidates
            .iter()
            .filter(|candidate| outcome.applied.contains(&candidate.key))
        {
            if !candidate.assignment.is_usable(candidate.rule.usage_cap) {
                continue;
            }

            let usage_count = candidate
                .assignment
                .usage_count
                .checked_add(1)
                .ok_or(DiscountsServiceError::InvalidData)?;

            increments.push((candidate.key, usage_count));
        }

        let mut events = Vec::with_capacity(increments.len());

        for (discount, usage_count) in increments {
            if let Some(assignment) = state.assignments.get_mut(&(user, discount)) {
                assignment.usage_count = usage_count;
            }

            state.append_audit(NewAuditEntry::applied(user, discount, amounts), now);

            events.push(DiscountEvent::Applied {
                user,
                discount,
                amount_before: amounts.amount_before,
                amount_after: amounts.amount_after,
            });
        }

        drop(state);

        let applied = events.len();

        for event in events {
            self.notifications.notify(event);
        }

        info!(
            user_uuid = %user,
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
        let state = self.state.lock().await;

        Ok(state.assignments.get(&(user, discount)).cloned())
    }

    async fn audit_trail(
        &self,
        user: UserUuid,
    ) -> Result<Vec<AuditEntryRecord>, DiscountsServiceError> {
        let state = self.state.lock().await;

        state.ensure_user(user)?;

        Ok(state
            .audits
            .iter()
            .filter(|entry| entry.user_uuid == user)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use jiff::ToSpan;
    use rebate::{
        discounts::{DiscountKind, DiscountRule},
        rounding::Rounding,
    };
    use smallvec::smallvec;
    use testresult::TestResult;
    use tokio::sync::{Barrier, mpsc::UnboundedReceiver};

    use crate::domain::discounts::notifications::ChannelSink;

    use super::*;

    fn ledger() -> (MemoryDiscountsService, UnboundedReceiver<DiscountEvent>) {
        let (sink, events) = ChannelSink::new();

        (MemoryDiscountsService::new(Arc::new(sink)), events)
    }

    async fn user(ledger: &MemoryDiscountsService) -> Result<UserUuid, UsersServiceError> {
        let record = ledger
            .create_user(NewUser {
                uuid: UserUuid::new(),
                name: "Ada".to_string(),
            })
            .await?;

        Ok(record.uuid)
    }

    async fn discount(
        ledger: &MemoryDiscountsService,
        rule: DiscountRule,
    ) -> Result<DiscountUuid, DiscountsServiceError> {
        let record = ledger
            .create_discount(NewDiscount {
                uuid: DiscountUuid::new(),
                name: format!("{} {}", rule.value, rule.kind),
                rule,
            })
            .await?;

        Ok(record.uuid)
    }

    fn actions(entries: &[AuditEntryRecord]) -> Vec<AuditAction> {
        entries.iter().map(|entry| entry.action).collect()
    }

    #[tokio::test]
    async fn discount_values_are_stored_at_two_decimal_places() -> TestResult {
        let (ledger, _events) = ledger();
        let user = user(&ledger).await?;
        let discount = discount(&ledger, DiscountRule::percentage(Decimal::new(33_333, 3))).await?;

        assert_eq!(
            ledger.get_discount(discount).await?.rule.value,
            Decimal::new(3_333, 2)
        );

        ledger.assign(user, discount, Timestamp::now()).await?;

        let amount = ledger
            .apply(
                user,
                Decimal::from(1_000),
                Timestamp::now(),
                StackingConfig::default(),
            )
            .await?;

        assert_eq!(amount, Decimal::new(66_670, 2));

        Ok(())
    }

    #[tokio::test]
    async fn discount_values_beyond_the_column_range_are_invalid() {
        let (ledger, _events) = ledger();

        let result = ledger
            .create_discount(NewDiscount {
                uuid: DiscountUuid::new(),
                name: "Huge".to_string(),
                rule: DiscountRule::fixed(Decimal::from(100_000_000)),
            })
            .await;

        assert!(
            matches!(result, Err(DiscountsServiceError::InvalidData)),
            "expected InvalidData, got {result:?}"
        );
    }

    #[tokio::test]
    async fn capped_fixed_discount_applies_until_its_cap() -> TestResult {
        let (ledger, _events) = ledger();
        let user = user(&ledger).await?;
        let discount = discount(&ledger, DiscountRule::fixed(Decimal::TEN).with_usage_cap(2)).await?;

        ledger.assign(user, discount, Timestamp::now()).await?;

        let mut amounts = Vec::new();

        for _ in 0..3 {
            amounts.push(
                ledger
                    .apply(
                        user,
                        Decimal::ONE_HUNDRED,
                        Timestamp::now(),
                        StackingConfig::default(),
                    )
                    .await?,
            );
        }

        assert_eq!(
            amounts,
            vec![Decimal::from(90), Decimal::from(90), Decimal::ONE_HUNDRED]
        );

        let assignment = ledger.get_assignment(user, discount).await?;

        assert_eq!(assignment.map(|a| a.usage_count), Some(2));

        Ok(())
    }

    #[tokio::test]
    async fn percentages_past_the_cap_are_clamped_and_rounded_down() -> TestResult {
        let (ledger, mut events) = ledger();
        let user = user(&ledger).await?;
        let ten = discount(&ledger, DiscountRule::percentage(Decimal::TEN)).await?;
        let twenty = discount(&ledger, DiscountRule::percentage(Decimal::from(20))).await?;

        ledger.assign(user, ten, Timestamp::now()).await?;
        ledger.assign(user, twenty, Timestamp::now()).await?;

        while events.try_recv().is_ok() {}

        let config = StackingConfig {
            stacking_order: smallvec![DiscountKind::Percentage, DiscountKind::Fixed],
            max_percentage_cap: Decimal::from(25),
            rounding: Rounding::Down,
        };

        let amount = ledger
            .apply(user, Decimal::ONE_HUNDRED, Timestamp::now(), config)
            .await?;

        assert_eq!(amount, Decimal::new(7_500, 2));

        let expected = AppliedAmounts {
            amount_before: Decimal::ONE_HUNDRED,
            amount_after: Decimal::new(7_500, 2),
        };

        assert_eq!(
            events.try_recv().ok(),
            Some(DiscountEvent::Applied {
                user,
                discount: ten,
                amount_before: expected.amount_before,
                amount_after: expected.amount_after,
            })
        );
        assert_eq!(events.try_recv().ok().map(|e| e.discount()), Some(twenty));

        let trail = ledger.audit_trail(user).await?;

        assert_eq!(
            trail.last().and_then(|entry| entry.metadata),
            Some(expected)
        );

        Ok(())
    }

    #[tokio::test]
    async fn revoke_without_an_assignment_returns_false_and_writes_nothing() -> TestResult {
        let (ledger, mut events) = ledger();
        let user = user(&ledger).await?;
        let discount = discount(&ledger, DiscountRule::fixed(Decimal::TEN)).await?;

        assert!(!ledger.revoke(user, discount, Timestamp::now()).await?);
        assert!(ledger.audit_trail(user).await?.is_empty());
        assert!(events.try_recv().is_err());

        Ok(())
    }

    #[tokio::test]
    async fn revoke_is_idempotent_and_reassign_reopens() -> TestResult {
        let (ledger, _events) = ledger();
        let user = user(&ledger).await?;
        let discount = discount(&ledger, DiscountRule::fixed(Decimal::TEN)).await?;

        ledger.assign(user, discount, Timestamp::now()).await?;
        ledger
            .apply(
                user,
                Decimal::ONE_HUNDRED,
                Timestamp::now(),
                StackingConfig::default(),
            )
            .await?;

        assert!(ledger.revoke(user, discount, Timestamp::now()).await?);
        assert!(!ledger.revoke(user, discount, Timestamp::now()).await?);

        let reopened = ledger.assign(user, discount, Timestamp::now()).await?;

        assert_eq!(reopened.usage_count, 0);
        assert!(!reopened.is_revoked());

        assert_eq!(
            actions(&ledger.audit_trail(user).await?),
            vec![
                AuditAction::Assigned,
                AuditAction::Applied,
                AuditAction::Revoked,
                AuditAction::Assigned
            ]
        );

        Ok(())
    }

    #[tokio::test]
    async fn eligible_for_filters_and_orders_by_stacking_order() -> TestResult {
        let (ledger, _events) = ledger();
        let now = Timestamp::now();
        let user = user(&ledger).await?;

        let fixed = discount(&ledger, DiscountRule::fixed(Decimal::from(5))).await?;
        let percentage = discount(&ledger, DiscountRule::percentage(Decimal::TEN)).await?;
        let expired = discount(
            &ledger,
            DiscountRule::percentage(Decimal::TEN).expiring_at(now - 1.minute()),
        )
        .await?;
        let inactive = discount(&ledger, DiscountRule::percentage(Decimal::TEN).inactive()).await?;
        let exhausted = discount(&ledger, DiscountRule::fixed(Decimal::ONE).with_usage_cap(1)).await?;

        for discount in [fixed, percentage, expired, inactive, exhausted] {
            ledger.assign(user, discount, now).await?;
        }

        if let Some(assignment) = ledger
            .state
            .lock()
            .await
            .assignments
            .get_mut(&(user, exhausted))
        {
            assignment.usage_count = 1;
        }

        let eligible = ledger
            .eligible_for(user, now, StackingConfig::default())
            .await?;
        let uuids: Vec<DiscountUuid> = eligible.iter().map(|d| d.uuid).collect();

        assert_eq!(uuids, vec![percentage, fixed]);

        Ok(())
    }

    #[tokio::test]
    async fn unknown_references_return_not_found() -> TestResult {
        let (ledger, _events) = ledger();
        let user = user(&ledger).await?;

        let result = ledger
            .assign(user, DiscountUuid::new(), Timestamp::now())
            .await;

        assert!(
            matches!(result, Err(DiscountsServiceError::DiscountNotFound)),
            "expected DiscountNotFound, got {result:?}"
        );

        let result = ledger
            .apply(
                UserUuid::new(),
                Decimal::ONE_HUNDRED,
                Timestamp::now(),
                StackingConfig::default(),
            )
            .await;

        assert!(
            matches!(result, Err(DiscountsServiceError::UserNotFound)),
            "expected UserNotFound, got {result:?}"
        );

        Ok(())
    }

    #[tokio::test]
    async fn create_discount_rejects_negative_values_and_duplicates() -> TestResult {
        let (ledger, _events) = ledger();

        let negative = discount(&ledger, DiscountRule::fixed(Decimal::NEGATIVE_ONE)).await;

        assert!(
            matches!(negative, Err(DiscountsServiceError::InvalidData)),
            "expected InvalidData, got {negative:?}"
        );

        let uuid = discount(&ledger, DiscountRule::fixed(Decimal::ONE)).await?;

        let duplicate = ledger
            .create_discount(NewDiscount {
                uuid,
                name: "again".to_string(),
                rule: DiscountRule::fixed(Decimal::ONE),
            })
            .await;

        assert!(
            matches!(duplicate, Err(DiscountsServiceError::AlreadyExists)),
            "expected AlreadyExists, got {duplicate:?}"
        );

        Ok(())
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_applies_never_exceed_the_usage_cap() -> TestResult {
        let (ledger, _events) = ledger();
        let user = user(&ledger).await?;
        let discount = discount(&ledger, DiscountRule::fixed(Decimal::TEN).with_usage_cap(3)).await?;

        ledger.assign(user, discount, Timestamp::now()).await?;

        let tasks = 8;
        let barrier = Arc::new(Barrier::new(tasks));

        let handles: Vec<_> = (0..tasks)
            .map(|_| {
                let ledger = ledger.clone();
                let barrier = Arc::clone(&barrier);

                tokio::spawn(async move {
                    barrier.wait().await;

                    ledger
                        .apply(
                            user,
                            Decimal::ONE_HUNDRED,
                            Timestamp::now(),
                            StackingConfig::default(),
                        )
                        .await
                })
            })
            .collect();

        let mut discounted = 0;

        for handle in handles {
            if handle.await?? == Decimal::from(90) {
                discounted += 1;
            }
        }

        assert_eq!(discounted, 3);

        let assignment = ledger.get_assignment(user, discount).await?;

        assert_eq!(assignment.map(|a| a.usage_count), Some(3));

        Ok(())
    }
}
