//! Assignment State

use jiff::Timestamp;

/// Ledger state of one (user, discount) assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AssignmentState {
    /// Number of times the discount has been applied for the user.
    pub usage_count: u32,

    /// When the assignment was revoked; `None` while it is open.
    pub revoked_at: Option<Timestamp>,
}

impl AssignmentState {
    /// A freshly assigned, unused state.
    #[must_use]
    pub const fn fresh() -> Self {
        Self {
            usage_count: 0,
            revoked_at: None,
        }
    }

    /// Open assignment that has been used `usage_count` times.
    #[must_use]
    pub const fn used(usage_count: u32) -> Self {
        Self {
            usage_count,
            revoked_at: None,
        }
    }

    /// Whether the assignment has been closed.
    #[must_use]
    pub const fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Whether another application fits under `usage_cap`.
    #[must_use]
    pub fn has_remaining_uses(&self, usage_cap: Option<u32>) -> bool {
        usage_cap.is_none_or(|cap| self.usage_count < cap)
    }

    /// Open and under its cap.
    #[must_use]
    pub fn is_usable(&self, usage_cap: Option<u32>) -> bool {
        !self.is_revoked() && self.has_remaining_uses(usage_cap)
    }
}
