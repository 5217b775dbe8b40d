//! Fan-out of one transition's notifications.
//!
//! Each `{channel, template}` entry is resolved, rendered and sent on its
//! own. A missing recipient or a failed `send` is logged and recorded in the
//! [`FanOutReport`]; it never stops the remaining entries and never reaches
//! the caller as an error. Nothing is retried here.

use crate::model::{Order, OrderStatus};
use crate::notify::{Channel, DispatchError, NotificationDispatcher, NotificationTable};
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::{debug, warn};

/// Where operator and integration messages go.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipientDirectory {
    /// Back-office roster for the `admin` channel.
    pub operators: Vec<String>,
    /// Warehouse roster alerted when an order enters fulfillment.
    pub fulfillment: Vec<String>,
    pub webhook_url: Option<String>,
}

impl RecipientDirectory {
    /// Recipients for `channel` about `order`.
    pub fn resolve(&self, channel: Channel, order: &Order) -> Result<Vec<String>, String> {
        let present = |value: &Option<String>| value.as_ref().filter(|v| !v.trim().is_empty()).cloned();
        match channel {
            Channel::Email => present(&order.customer.email)
                .map(|email| vec![email])
                .ok_or_else(|| "customer has no email address".to_string()),
            Channel::Sms => present(&order.customer.phone)
                .map(|phone| vec![phone])
                .ok_or_else(|| "customer has no phone number".to_string()),
            Channel::Admin if self.operators.is_empty() => Err("operator roster is empty".to_string()),
            Channel::Admin => Ok(self.operators.clone()),
            Channel::Webhook => present(&self.webhook_url)
                .map(|url| vec![url])
                .ok_or_else(|| "no webhook url configured".to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryFailure {
    pub channel: Channel,
    pub template: String,
    pub recipient: String,
    pub error: DispatchError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkippedDelivery {
    pub channel: Channel,
    pub template: String,
    pub reason: String,
}

/// What happened to each message of one fan-out.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FanOutReport {
    pub delivered: usize,
    pub failures: Vec<DeliveryFailure>,
    pub skipped: Vec<SkippedDelivery>,
}

impl FanOutReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty() && self.skipped.is_empty()
    }

    fn merge(&mut self, other: FanOutReport) {
        self.delivered += other.delivered;
        self.failures.extend(other.failures);
        self.skipped.extend(other.skipped);
    }
}

/// Builds the channel-specific payload from an order snapshot.
pub fn build_payload(channel: Channel, order: &Order) -> Value {
    let shipping = order.shipping.clone().unwrap_or_default();
    match channel {
        Channel::Email => json!({
            "orderId": order.id.to_string(),
            "status": order.status,
            "customerName": order.customer.name,
            "items": order.items.iter().map(|i| json!({"name": i.name, "quantity": i.quantity})).collect::<Vec<_>>(),
            "carrier": shipping.carrier,
            "trackingNumber": shipping.tracking_number,
            "estimatedDelivery": shipping.estimated_delivery,
            "deliveredAt": shipping.delivered_at,
        }),
        Channel::Sms => json!({
            "orderId": order.id.to_string(),
            "status": order.status,
            "trackingNumber": shipping.tracking_number,
        }),
        Channel::Admin => json!({
            "orderId": order.id.to_string(),
            "status": order.status,
            "paymentStatus": order.payment_status,
            "customer": order.customer.name,
            "itemCount": order.items.iter().map(|i| i.quantity).sum::<u32>(),
            "lastStatusChange": order.metadata.last_status_change,
        }),
        Channel::Webhook => json!({
            "event": "order.status_changed",
            "orderId": order.id.to_string(),
            "status": order.status,
            "order": order,
        }),
    }
}

/// Resolves, renders and sends notifications, one isolated call at a time.
#[derive(Clone)]
pub struct Notifier {
    table: Arc<NotificationTable>,
    dispatcher: Arc<dyn NotificationDispatcher>,
    recipients: RecipientDirectory,
}

impl Notifier {
    pub fn new(
        table: NotificationTable,
        dispatcher: Arc<dyn NotificationDispatcher>,
        recipients: RecipientDirectory,
    ) -> Self {
        Self {
            table: Arc::new(table),
            dispatcher,
            recipients,
        }
    }

    pub fn recipients(&self) -> &RecipientDirectory {
        &self.recipients
    }

    /// Sends every notification registered for `status`, in declared order.
    pub async fn notify(&self, order: &Order, status: OrderStatus) -> FanOutReport {
        let mut report = FanOutReport::default();
        for route in self.table.for_status(status) {
            match self.recipients.resolve(route.channel, order) {
                Ok(to) => {
                    report.merge(self.dispatch_to(route.channel, &to, &route.template, order).await);
                }
                Err(reason) => {
                    warn!(order_id = %order.id, channel = %route.channel, template = %route.template, %reason, "Notification skipped");
                    report.skipped.push(SkippedDelivery {
                        channel: route.channel,
                        template: route.template.clone(),
                        reason,
                    });
                }
            }
        }
        report
    }

    /// Sends one template on one channel to an explicit recipient list.
    pub async fn dispatch_to(&self, channel: Channel, recipients: &[String], template: &str, order: &Order) -> FanOutReport {
        let mut report = FanOutReport::default();
        let payload = build_payload(channel, order);
        for recipient in recipients {
            match self.dispatcher.send(channel, recipient, template, &payload).await {
                Ok(()) => {
                    debug!(order_id = %order.id, %channel, template, "Notification sent");
                    report.delivered += 1;
                }
                Err(error) => {
                    warn!(order_id = %order.id, %channel, template, error = %error, "Notification dispatch failed");
                    report.failures.push(DeliveryFailure {
                        channel,
                        template: template.to_string(),
                        recipient: recipient.clone(),
                        error,
                    });
                }
            }
        }
        report
    }
}
