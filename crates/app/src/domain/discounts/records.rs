//! Discounts Records

use jiff::Timestamp;
use rebate::{assignments::AssignmentState, discounts::DiscountRule};

use crate::{
    domain::{
        discounts::data::{AppliedAmounts, AuditAction},
        users::records::UserUuid,
    },
    uuids::TypedUuid,
};

/// Discount UUID
pub type DiscountUuid = TypedUuid<DiscountRecord>;

/// Discount Record
#[derive(Debug, Clone, PartialEq)]
pub struct DiscountRecord {
    pub uuid: DiscountUuid,
    pub name: String,
    pub rule: DiscountRule,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// Assignment Record
///
/// One row per (user, discount) pair. Revocation closes the row; a later
/// assignment reopens it.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentRecord {
    pub user_uuid: UserUuid,
    pub discount_uuid: DiscountUuid,
    pub usage_count: u32,
    pub assigned_at: Timestamp,
    pub revoked_at: Option<Timestamp>,
}

impl AssignmentRecord {
    #[must_use]
    pub const fn state(&self) -> AssignmentState {
        AssignmentState {
            usage_count: self.usage_count,
            revoked_at: self.revoked_at,
        }
    }

    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }
}

/// Audit Entry UUID
pub type AuditEntryUuid = TypedUuid<AuditEntryRecord>;

/// Audit Entry Record
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEntryRecord {
    pub uuid: AuditEntryUuid,
    pub user_uuid: UserUuid,
    pub discount_uuid: DiscountUuid,
    pub action: AuditAction,
    pub metadata: Option<AppliedAmounts>,
    pub created_at: Timestamp,
}
