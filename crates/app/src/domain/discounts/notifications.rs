//! Discount Notifications
//!
//! Fire-and-forget delivery of ledger transitions. Events are only handed to a
//! sink once the transaction that produced them has committed.

use std::fmt::Debug;

use rust_decimal::Decimal;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tracing::{debug, info};

use crate::domain::{discounts::records::DiscountUuid, users::records::UserUuid};

/// A committed ledger transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscountEvent {
    Assigned {
        user: UserUuid,
        discount: DiscountUuid,
    },
    Revoked {
        user: UserUuid,
        discount: DiscountUuid,
    },
    Applied {
        user: UserUuid,
        discount: DiscountUuid,
        amount_before: Decimal,
        amount_after: Decimal,
    },
}

impl DiscountEvent {
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::Assigned { .. } => "assigned",
            Self::Revoked { .. } => "revoked",
            Self::Applied { .. } => "applied",
        }
    }

    #[must_use]
    pub const fn user(&self) -> UserUuid {
        match self {
            Self::Assigned { user, .. } | Self::Revoked { user, .. } | Self::Applied { user, .. } => {
                *user
            }
        }
    }

    #[must_use]
    pub const fn discount(&self) -> DiscountUuid {
        match self {
            Self::Assigned { discount, .. }
            | Self::Revoked { discount, .. }
            | Self::Applied { discount, .. } => *discount,
        }
    }
}

/// Receives ledger events. Delivery must not block and cannot fail the caller.
pub trait NotificationSink: Debug + Send + Sync {
    fn notify(&self, event: DiscountEvent);
}

/// Drops every event.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopSink;

impl NotificationSink for NoopSink {
    fn notify(&self, _event: DiscountEvent) {}
}

/// Writes one structured log line per event.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl NotificationSink for TracingSink {
    fn notify(&self, event: DiscountEvent) {
        match event {
            DiscountEvent::Applied {
                user,
                discount,
                amount_before,
                amount_after,
            } => info!(
                event = event.name(),
                user_uuid = %user,
                discount_uuid = %discount,
                %amount_before,
                %amount_after,
                "discount notification"
            ),
            DiscountEvent::Assigned { user, discount } | DiscountEvent::Revoked { user, discount } => {
                info!(
                    event = event.name(),
                    user_uuid = %user,
                    discount_uuid = %discount,
                    "discount notification"
                );
            }
        }
    }
}

/// Forwards events to an unbounded channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: UnboundedSender<DiscountEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving half of its channel.
    #[must_use]
    pub fn new() -> (Self, UnboundedReceiver<DiscountEvent>) {
        let (sender, receiver) = unbounded_channel();

        (Self { sender }, receiver)
    }
}

impl NotificationSink for ChannelSink {
    fn notify(&self, event: DiscountEvent) {
        if self.sender.send(event).is_err() {
            debug!(event = event.name(), "notification receiver closed; event dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_sink_forwards_events_in_order() {
        let (sink, mut receiver) = ChannelSink::new();
        let user = UserUuid::new();
        let discount = DiscountUuid::new();

        sink.notify(DiscountEvent::Assigned { user, discount });
        sink.notify(DiscountEvent::Revoked { user, discount });

        assert_eq!(
            receiver.try_recv().ok(),
            Some(DiscountEvent::Assigned { user, discount })
        );
        assert_eq!(
            receiver.try_recv().ok(),
            Some(DiscountEvent::Revoked { user, discount })
        );
        assert!(receiver.try_recv().is_err());
    }

    #[test]
    fn channel_sink_ignores_a_closed_receiver() {
        let (sink, receiver) = ChannelSink::new();

        drop(receiver);

        sink.notify(DiscountEvent::Assigned {
            user: UserUuid::new(),
            discount: DiscountUuid::new(),
        });
    }

    #[test]
    fn events_expose_their_subjects() {
        let user = UserUuid::new();
        let discount = DiscountUuid::new();

        let event = DiscountEvent::Applied {
            user,
            discount,
            amount_before: Decimal::ONE_HUNDRED,
            amount_after: Decimal::from(90),
        };

        assert_eq!(event.name(), "applied");
        assert_eq!(event.user(), user);
        assert_eq!(event.discount(), discount);
    }
}
