/// Represents a customer order as seen by the automation engine.
///
/// The engine reads everything and writes only `status`, the status
/// metadata, and (through the delivery action) `shipping.delivered_at`.
/// Orders are created by the checkout collaborator from a [`NewOrder`].
use crate::model::{OrderStatus, PaymentStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Type-safe identifier for Orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OrderId(pub u64);

impl From<u64> for OrderId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl Display for OrderId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "order_{}", self.0)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Customer {
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineItem {
    pub sku: String,
    pub name: String,
    pub quantity: u32,
    /// Set by the fulfillment desk once the item is picked and packed.
    pub prepared: bool,
}

impl LineItem {
    pub fn new(sku: impl Into<String>, name: impl Into<String>, quantity: u32) -> Self {
        Self {
            sku: sku.into(),
            name: name.into(),
            quantity,
            prepared: false,
        }
    }

    pub fn prepared(mut self) -> Self {
        self.prepared = true;
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shipping {
    pub carrier: Option<String>,
    pub tracking_number: Option<String>,
    pub estimated_delivery: Option<DateTime<Utc>>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// One `{from, to, timestamp}` entry of the status history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: OrderStatus,
    pub to: OrderStatus,
    pub at: DateTime<Utc>,
}

/// Append-only log of status transitions.
///
/// Entries can be read by anyone but only appended from inside the crate,
/// by the transition executor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StatusHistory(Vec<StatusChange>);

impl StatusHistory {
    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn entries(&self) -> &[StatusChange] {
        &self.0
    }

    pub fn last(&self) -> Option<&StatusChange> {
        self.0.last()
    }

    pub(crate) fn append(&mut self, change: StatusChange) {
        self.0.push(change);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderMetadata {
    pub last_status_change: Option<DateTime<Utc>>,
    pub status_history: StatusHistory,
    /// When a review request becomes due; stamped by the delivery action.
    pub review_due_at: Option<DateTime<Utc>>,
    pub review_requested_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub id: OrderId,
    pub customer: Customer,
    pub status: OrderStatus,
    pub payment_status: PaymentStatus,
    pub items: Vec<LineItem>,
    pub shipping: Option<Shipping>,
    pub metadata: OrderMetadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Bumped by the store on every successful save (compare-and-save).
    pub version: u64,
}

/// Payload for creating a new order.
#[derive(Debug, Clone, Default)]
pub struct NewOrder {
    pub customer: Customer,
    pub status: Option<OrderStatus>,
    pub payment_status: PaymentStatus,
    pub items: Vec<LineItem>,
    pub shipping: Option<Shipping>,
}

impl Order {
    /// Builds a fresh order. New orders start `pending` unless told otherwise.
    pub fn from_new(id: OrderId, params: NewOrder, now: DateTime<Utc>) -> Self {
        Self {
            id,
            customer: params.customer,
            status: params.status.unwrap_or(OrderStatus::Pending),
            payment_status: params.payment_status,
            items: params.items,
            shipping: params.shipping,
            metadata: OrderMetadata::default(),
            created_at: now,
            updated_at: now,
            version: 0,
        }
    }

    pub fn tracking_number(&self) -> Option<&str> {
        self.shipping
            .as_ref()
            .and_then(|s| s.tracking_number.as_deref())
            .filter(|t| !t.trim().is_empty())
    }

    pub fn estimated_delivery(&self) -> Option<DateTime<Utc>> {
        self.shipping.as_ref().and_then(|s| s.estimated_delivery)
    }

    pub fn delivered_at(&self) -> Option<DateTime<Utc>> {
        self.shipping.as_ref().and_then(|s| s.delivered_at)
    }

    /// The instant dwell time is measured from.
    ///
    /// Falls back to `updated_at` when no transition has been recorded yet.
    pub fn status_changed_at(&self) -> DateTime<Utc> {
        self.metadata.last_status_change.unwrap_or(self.updated_at)
    }

    /// Moves the order to `to` and appends the matching history entry.
    pub(crate) fn apply_transition(&mut self, to: OrderStatus, at: DateTime<Utc>) -> StatusChange {
        let change = StatusChange {
            from: self.status,
            to,
            at,
        };
        self.status = to;
        self.metadata.last_status_change = Some(at);
        self.metadata.status_history.append(change);
        self.updated_at = at;
        change
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 9, minute, 0).unwrap()
    }

    #[test]
    fn apply_transition_appends_history() {
        let mut order = Order::from_new(OrderId(1), NewOrder::default(), at(0));
        order.apply_transition(OrderStatus::Processing, at(5));
        order.apply_transition(OrderStatus::ReadyToShip, at(40));

        let history = order.metadata.status_history.entries();
        assert_eq!(history.len(), 2);
        assert_eq!((history[0].from, history[0].to), (OrderStatus::Pending, OrderStatus::Processing));
        assert_eq!((history[1].from, history[1].to), (OrderStatus::Processing, OrderStatus::ReadyToShip));
        assert_eq!(order.metadata.last_status_change, Some(at(40)));
        assert_eq!(order.status, OrderStatus::ReadyToShip);
    }

    #[test]
    fn status_changed_at_falls_back_to_updated_at() {
        let mut order = Order::from_new(OrderId(1), NewOrder::default(), at(0));
        order.updated_at = at(10);
        assert_eq!(order.status_changed_at(), at(10));

        order.metadata.last_status_change = Some(at(3));
        assert_eq!(order.status_changed_at(), at(3));
    }

    #[test]
    fn blank_tracking_number_is_absent() {
        let mut order = Order::from_new(OrderId(1), NewOrder::default(), at(0));
        order.shipping = Some(Shipping {
            tracking_number: Some("  ".into()),
            ..Shipping::default()
        });
        assert_eq!(order.tracking_number(), None);
    }

    #[test]
    fn display_id() {
        assert_eq!(OrderId(42).to_string(), "order_42");
    }
}
