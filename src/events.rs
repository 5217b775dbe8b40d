//! Lifecycle events published by the engine.
//!
//! The [`EventBus`] is an injected broadcast channel. Collaborators such as
//! points accrual or cache invalidation call [`EventBus::subscribe`]; the
//! engine only publishes and never learns who is listening. Publishing with
//! no subscribers is not an error.

use crate::model::{OrderId, OrderStatus};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;
use tracing::trace;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EngineEvent {
    #[serde(rename_all = "camelCase")]
    StatusChanged {
        order_id: OrderId,
        previous_status: OrderStatus,
        new_status: OrderStatus,
        at: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    DailyStats {
        date: NaiveDate,
        orders_by_status: BTreeMap<OrderStatus, usize>,
        transitions: u64,
        failures: u64,
    },
    #[serde(rename_all = "camelCase")]
    LowInventory {
        sku: String,
        name: String,
        on_hand: u32,
        threshold: u32,
    },
    #[serde(rename_all = "camelCase")]
    ReviewRequested { order_id: OrderId, at: DateTime<Utc> },
}

#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _rx) = broadcast::channel(capacity);
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: EngineEvent) {
        trace!(?event, "Publish");
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(1024)
    }
}
