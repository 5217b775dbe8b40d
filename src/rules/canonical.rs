//! The canonical order lifecycle and its side effects.
//!
//! | from | to | condition | delay |
//! |---|---|---|---|
//! | pending | processing | payment is `paid` | - |
//! | processing | ready_to_ship | every item prepared | 30 min |
//! | ready_to_ship | shipped | tracking number present | - |
//! | shipped | delivered | estimated delivery reached | - |
//! | delivered | completed | delivered at least 7 days ago | 7 days |
//!
//! Customer-facing messages for each step come from the
//! [`NotificationTable`](crate::notify::NotificationTable); the actions here
//! cover the remaining side effects.

use crate::model::{Order, OrderStatus, PaymentStatus, Shipping};
use crate::notify::Channel;
use crate::rules::{ActionContext, ActionError, ConditionError, RuleAction, StatusRule};
use crate::store::OrderStore;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tracing::info;

pub const PREPARATION_DWELL_MINUTES: i64 = 30;
pub const COMPLETION_DWELL_MINUTES: i64 = 7 * 24 * 60;

pub fn canonical_rules(review_delay: Duration) -> Vec<StatusRule> {
    vec![
        StatusRule::when("payment_confirmed", OrderStatus::Pending, OrderStatus::Processing, payment_received)
            .with_action(NotifyFulfillment),
        StatusRule::new(
            "items_prepared",
            OrderStatus::Processing,
            OrderStatus::ReadyToShip,
            all_items_prepared,
        )
        .with_delay_minutes(PREPARATION_DWELL_MINUTES),
        StatusRule::when("tracking_assigned", OrderStatus::ReadyToShip, OrderStatus::Shipped, has_tracking_number),
        StatusRule::when("delivery_due", OrderStatus::Shipped, OrderStatus::Delivered, estimated_delivery_reached)
            .with_action(RecordDelivery { review_delay }),
        StatusRule::when("delivery_settled", OrderStatus::Delivered, OrderStatus::Completed, delivered_a_week_ago)
            .with_delay_minutes(COMPLETION_DWELL_MINUTES),
    ]
}

pub fn payment_received(order: &Order, _now: DateTime<Utc>) -> bool {
    order.payment_status == PaymentStatus::Paid
}

/// An order with nothing on it cannot be prepared; that is a data error, not `false`.
pub fn all_items_prepared(order: &Order, _now: DateTime<Utc>) -> Result<bool, ConditionError> {
    if order.items.is_empty() {
        return Err(ConditionError(format!("{} has no line items", order.id)));
    }
    Ok(order.items.iter().all(|item| item.prepared))
}

pub fn has_tracking_number(order: &Order, _now: DateTime<Utc>) -> bool {
    order.tracking_number().is_some()
}

/// Without an estimate the order stays `shipped`; no default is assumed.
pub fn estimated_delivery_reached(order: &Order, now: DateTime<Utc>) -> bool {
    order.estimated_delivery().is_some_and(|eta| now >= eta)
}

pub fn delivered_a_week_ago(order: &Order, now: DateTime<Utc>) -> bool {
    let delivered = order.delivered_at().unwrap_or_else(|| order.status_changed_at());
    now - delivered >= Duration::days(7)
}

/// Alerts the warehouse roster that a paid order is ready for picking.
#[derive(Debug, Clone, Copy)]
pub struct NotifyFulfillment;

pub const FULFILLMENT_TEMPLATE: &str = "fulfillment_new_order";

#[async_trait]
impl RuleAction for NotifyFulfillment {
    fn name(&self) -> &'static str {
        "notify_fulfillment"
    }

    async fn run(&self, order: &mut Order, ctx: &ActionContext) -> Result<(), ActionError> {
        let roster = &ctx.notifier.recipients().fulfillment;
        if roster.is_empty() {
            return Err(ActionError::Failed("fulfillment roster is empty".into()));
        }
        let report = ctx
            .notifier
            .dispatch_to(Channel::Admin, roster, FULFILLMENT_TEMPLATE, order)
            .await;
        match report.failures.into_iter().next() {
            Some(failure) => Err(failure.error.into()),
            None => Ok(()),
        }
    }
}

/// Stamps the delivery time and schedules the review request.
#[derive(Debug, Clone, Copy)]
pub struct RecordDelivery {
    pub review_delay: Duration,
}

#[async_trait]
impl RuleAction for RecordDelivery {
    fn name(&self) -> &'static str {
        "record_delivery"
    }

    async fn run(&self, order: &mut Order, ctx: &ActionContext) -> Result<(), ActionError> {
        let now = ctx.clock.now();
        let mut updated = order.clone();
        let shipping = updated.shipping.get_or_insert_with(Shipping::default);
        let delivered_at = *shipping.delivered_at.get_or_insert(now);
        let review_due_at = delivered_at.checked_add_signed(self.review_delay).ok_or_else(|| {
            ActionError::Failed(format!("review delay {} overflows from {delivered_at}", self.review_delay))
        })?;
        updated.metadata.review_due_at = Some(review_due_at);
        updated.updated_at = now;

        *order = ctx.store.save(updated).await?;
        info!(order_id = %order.id, %delivered_at, "Delivery recorded");
        Ok(())
    }
}
