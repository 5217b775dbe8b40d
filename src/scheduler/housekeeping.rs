//! The ancillary job: review reminders, daily statistics, inventory check.
//!
//! Each [`HousekeepingTask`] runs in turn; a failing task is logged and the
//! rest still run.

use crate::clock::Clock;
use crate::engine::AutomationJournal;
use crate::error::{EngineError, Result};
use crate::events::{EngineEvent, EventBus};
use crate::model::{Order, OrderStatus};
use crate::notify::{Channel, Notifier};
use crate::scheduler::Job;
use crate::store::{OrderStore, PersistenceError};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info, instrument, warn};

#[async_trait]
pub trait HousekeepingTask: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self) -> Result<()>;
}

pub struct HousekeepingJob {
    tasks: Vec<Arc<dyn HousekeepingTask>>,
}

impl HousekeepingJob {
    pub fn new(tasks: Vec<Arc<dyn HousekeepingTask>>) -> Self {
        Self { tasks }
    }
}

#[async_trait]
impl Job for HousekeepingJob {
    fn name(&self) -> &str {
        "housekeeping"
    }

    async fn run(&self) -> Result<()> {
        let mut failed = Vec::new();
        for task in &self.tasks {
            if let Err(e) = task.run().await {
                warn!(task = task.name(), error = %e, "Housekeeping task failed");
                failed.push(task.name());
            }
        }
        if failed.is_empty() {
            Ok(())
        } else {
            Err(EngineError::Job {
                job: "housekeeping".into(),
                reason: format!("failed tasks: {}", failed.join(", ")),
            })
        }
    }
}

pub const REVIEW_TEMPLATE: &str = "review_request";

/// Emails a review request once `review_due_at` has passed.
///
/// The request is stamped on the order so it goes out once. A customer
/// without an email address is stamped too, since there is nothing to retry.
pub struct ReviewReminderTask {
    store: Arc<dyn OrderStore>,
    notifier: Notifier,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl ReviewReminderTask {
    pub fn new(store: Arc<dyn OrderStore>, notifier: Notifier, events: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            notifier,
            events,
            clock,
        }
    }

    async fn remind(&self, mut order: Order) -> Result<()> {
        let now = self.clock.now();
        match self.notifier.recipients().resolve(Channel::Email, &order) {
            Ok(to) => {
                let report = self.notifier.dispatch_to(Channel::Email, &to, REVIEW_TEMPLATE, &order).await;
                if let Some(failure) = report.failures.into_iter().next() {
                    return Err(EngineError::Job {
                        job: "review_reminders".into(),
                        reason: format!("{}: {}", order.id, failure.error),
                    });
                }
            }
            Err(reason) => debug!(order_id = %order.id, %reason, "Review request not sent"),
        }

        order.metadata.review_requested_at = Some(now);
        order.updated_at = now;
        let order = self.store.save(order).await?;
        self.events.publish(EngineEvent::ReviewRequested { order_id: order.id, at: now });
        info!(order_id = %order.id, "Review requested");
        Ok(())
    }
}

#[async_trait]
impl HousekeepingTask for ReviewReminderTask {
    fn name(&self) -> &'static str {
        "review_reminders"
    }

    #[instrument(skip(self), name = "review_reminders")]
    async fn run(&self) -> Result<()> {
        let now = self.clock.now();
        let due: Vec<Order> = self
            .store
            .find_by_statuses(&[OrderStatus::Delivered, OrderStatus::Completed])
            .await?
            .into_iter()
            .filter(|o| o.metadata.review_requested_at.is_none())
            .filter(|o| o.metadata.review_due_at.is_some_and(|due| due <= now))
            .collect();

        let mut failures = 0;
        for order in due {
            let id = order.id;
            if let Err(e) = self.remind(order).await {
                warn!(order_id = %id, error = %e, "Review reminder failed");
                failures += 1;
            }
        }
        if failures > 0 {
            return Err(EngineError::Job {
                job: self.name().into(),
                reason: format!("{failures} reminder(s) failed"),
            });
        }
        Ok(())
    }
}

/// Publishes per-status order counts and rule execution totals.
pub struct DailyStatsTask {
    store: Arc<dyn OrderStore>,
    journal: Arc<AutomationJournal>,
    events: EventBus,
    clock: Arc<dyn Clock>,
}

impl DailyStatsTask {
    pub fn new(store: Arc<dyn OrderStore>, journal: Arc<AutomationJournal>, events: EventBus, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            journal,
            events,
            clock,
        }
    }
}

#[async_trait]
impl HousekeepingTask for DailyStatsTask {
    fn name(&self) -> &'static str {
        "daily_stats"
    }

    async fn run(&self) -> Result<()> {
        let orders = self.store.find_by_statuses(&OrderStatus::ALL).await?;
        let mut orders_by_status: BTreeMap<OrderStatus, usize> = OrderStatus::ALL.into_iter().map(|s| (s, 0)).collect();
        for order in &orders {
            *orders_by_status.entry(order.status).or_default() += 1;
        }

        let stats = self.journal.stats();
        let date = self.clock.now().date_naive();
        info!(%date, orders = orders.len(), executions = stats.total_executions, failures = stats.failures, "Daily stats");
        self.events.publish(EngineEvent::DailyStats {
            date,
            orders_by_status,
            transitions: stats.total_executions,
            failures: stats.failures,
        });
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StockLevel {
    pub sku: String,
    pub name: String,
    pub on_hand: u32,
}

/// Read access to current stock, owned by the catalogue collaborator.
#[async_trait]
pub trait InventorySource: Send + Sync {
    async fn stock_levels(&self) -> std::result::Result<Vec<StockLevel>, PersistenceError>;
}

/// Stock levels kept in memory, keyed by SKU.
#[derive(Debug, Default)]
pub struct InMemoryInventory {
    levels: Mutex<BTreeMap<String, StockLevel>>,
}

impl InMemoryInventory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, sku: impl Into<String>, name: impl Into<String>, on_hand: u32) {
        let sku = sku.into();
        let level = StockLevel {
            sku: sku.clone(),
            name: name.into(),
            on_hand,
        };
        self.levels.lock().unwrap_or_else(|e| e.into_inner()).insert(sku, level);
    }
}

#[async_trait]
impl InventorySource for InMemoryInventory {
    async fn stock_levels(&self) -> std::result::Result<Vec<StockLevel>, PersistenceError> {
        let levels = self.levels.lock().unwrap_or_else(|e| e.into_inner());
        Ok(levels.values().cloned().collect())
    }
}

/// Publishes one `LowInventory` event per SKU below the threshold.
pub struct InventoryCheckTask {
    source: Arc<dyn InventorySource>,
    threshold: u32,
    events: EventBus,
}

impl InventoryCheckTask {
    pub fn new(source: Arc<dyn InventorySource>, threshold: u32, events: EventBus) -> Self {
        Self {
            source,
            threshold,
            events,
        }
    }
}

#[async_trait]
impl HousekeepingTask for InventoryCheckTask {
    fn name(&self) -> &'static str {
        "inventory_check"
    }

    async fn run(&self) -> Result<()> {
        let low: Vec<StockLevel> = self
            .source
            .stock_levels()
            .await?
            .into_iter()
            .filter(|level| level.on_hand < self.threshold)
            .collect();
        if !low.is_empty() {
            warn!(count = low.len(), threshold = self.threshold, "Low stock detected");
        }
        for level in low {
            self.events.publish(EngineEvent::LowInventory {
                sku: level.sku,
                name: level.name,
                on_hand: level.on_hand,
                threshold: self.threshold,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{Customer, NewOrder};
    use crate::notify::mock::RecordingDispatcher;
    use crate::notify::{NotificationTable, RecipientDirectory};
    use crate::store::OrderStoreActor;
    use chrono::{Duration, TimeZone, Utc};

    struct Failing;

    #[async_trait]
    impl HousekeepingTask for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        async fn run(&self) -> Result<()> {
            Err(EngineError::Job {
                job: "failing".into(),
                reason: "always".into(),
            })
        }
    }

    #[tokio::test]
    async fn one_failing_task_does_not_cancel_the_others() {
        let inventory = Arc::new(InMemoryInventory::new());
        inventory.set("VIT-C", "Vitamin C", 2);
        inventory.set("ZINC", "Zinc", 50);
        let events = EventBus::default();
        let mut rx = events.subscribe();

        let job = HousekeepingJob::new(vec![
            Arc::new(Failing),
            Arc::new(InventoryCheckTask::new(inventory, 10, events.clone())),
        ]);
        let err = job.run().await.unwrap_err();
        assert!(err.to_string().contains("failing"));

        match rx.try_recv().unwrap() {
            EngineEvent::LowInventory { sku, on_hand, .. } => {
                assert_eq!(sku, "VIT-C");
                assert_eq!(on_hand, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn review_request_goes_out_once() {
        let start = Utc.with_ymd_and_hms(2024, 9, 1, 12, 0, 0).unwrap();
        let clock = Arc::new(ManualClock::new(start));
        let (actor, store) = OrderStoreActor::new(8, clock.clone());
        tokio::spawn(actor.run());

        let mut order = store
            .create(NewOrder {
                customer: Customer {
                    name: "Ana".into(),
                    email: Some("ana@example.org".into()),
                    phone: None,
                },
                status: Some(OrderStatus::Delivered),
                ..NewOrder::default()
            })
            .await
            .unwrap();
        order.metadata.review_due_at = Some(start + Duration::hours(72));
        store.save(order).await.unwrap();

        let dispatcher = Arc::new(RecordingDispatcher::new());
        let notifier = Notifier::new(NotificationTable::empty(), dispatcher.clone(), RecipientDirectory::default());
        let task = ReviewReminderTask::new(Arc::new(store.clone()), notifier, EventBus::default(), clock.clone());

        task.run().await.unwrap();
        assert_eq!(dispatcher.count(REVIEW_TEMPLATE), 0, "not due yet");

        clock.advance(Duration::hours(73));
        task.run().await.unwrap();
        task.run().await.unwrap();
        assert_eq!(dispatcher.count(REVIEW_TEMPLATE), 1);
    }

    #[tokio::test]
    async fn daily_stats_counts_every_status() {
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 9, 2, 0, 5, 0).unwrap()));
        let (actor, store) = OrderStoreActor::new(8, clock.clone());
        tokio::spawn(actor.run());
        store.create(NewOrder::default()).await.unwrap();
        store
            .create(NewOrder {
                status: Some(OrderStatus::Cancelled),
                ..NewOrder::default()
            })
            .await
            .unwrap();

        let events = EventBus::default();
        let mut rx = events.subscribe();
        let task = DailyStatsTask::new(Arc::new(store), Arc::new(AutomationJournal::default()), events, clock);
        task.run().await.unwrap();

        match rx.try_recv().unwrap() {
            EngineEvent::DailyStats { date, orders_by_status, .. } => {
                assert_eq!(date.to_string(), "2024-09-02");
                assert_eq!(orders_by_status[&OrderStatus::Pending], 1);
                assert_eq!(orders_by_status[&OrderStatus::Cancelled], 1);
                assert_eq!(orders_by_status[&OrderStatus::Shipped], 0);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }
}
