use crate::engine::{Evaluation, TransitionExecutor};
use crate::error::{EngineError, Result};
use crate::model::{OrderId, OrderStatus};
use crate::store::OrderStore;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Counts from one pass over the non-terminal orders.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub examined: usize,
    pub transitioned: usize,
    pub unchanged: usize,
    pub failed: usize,
}

/// One tick of the engine: load every non-terminal order, evaluate each once.
///
/// Orders are evaluated concurrently up to `max_concurrency`, and a failure on
/// one order never affects another. An order advances by at most one step per
/// sweep, because every evaluation works on the snapshot loaded at the start.
pub struct StatusSweep {
    executor: Arc<TransitionExecutor>,
    store: Arc<dyn OrderStore>,
    max_concurrency: usize,
}

impl StatusSweep {
    pub fn new(executor: Arc<TransitionExecutor>, store: Arc<dyn OrderStore>, max_concurrency: usize) -> Self {
        Self {
            executor,
            store,
            max_concurrency: max_concurrency.max(1),
        }
    }

    pub fn executor(&self) -> &Arc<TransitionExecutor> {
        &self.executor
    }

    /// Only the initial query can fail the sweep as a whole.
    #[instrument(skip(self), name = "status_sweep")]
    pub async fn run_once(&self) -> Result<SweepReport> {
        let started = Instant::now();
        let orders = self.store.find_by_statuses(&OrderStatus::NON_TERMINAL).await?;
        let examined = orders.len();
        debug!(examined, "Sweep loaded orders");

        let outcomes: Vec<_> = stream::iter(orders)
            .map(|order| self.executor.evaluate(order))
            .buffer_unordered(self.max_concurrency)
            .collect()
            .await;

        let mut report = SweepReport {
            examined,
            ..SweepReport::default()
        };
        for outcome in outcomes {
            match outcome {
                Ok(Evaluation::NoOp) => report.unchanged += 1,
                Ok(Evaluation::Transitioned(_)) => report.transitioned += 1,
                Err(e) => {
                    debug!(error = %e, "Order skipped this sweep");
                    report.failed += 1;
                }
            }
        }

        info!(
            examined = report.examined,
            transitioned = report.transitioned,
            failed = report.failed,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Sweep finished"
        );
        Ok(report)
    }

    /// Evaluates a single order on demand, outside the periodic sweep.
    #[instrument(skip(self))]
    pub async fn process_order(&self, id: OrderId) -> Result<Evaluation> {
        let order = self
            .store
            .find_by_id(id)
            .await?
            .ok_or(crate::store::PersistenceError::NotFound(id))?;
        self.executor.evaluate(order).await.map_err(|e| {
            warn!(error = %e, "On-demand evaluation failed");
            EngineError::from(e)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::engine::AutomationJournal;
    use crate::events::EventBus;
    use crate::model::{NewOrder, Order, PaymentStatus};
    use crate::notify::mock::RecordingDispatcher;
    use crate::notify::{NotificationTable, Notifier, RecipientDirectory};
    use crate::rules::RuleTable;
    use crate::store::mock::MockOrderStore;
    use crate::store::PersistenceError;
    use chrono::{Duration, TimeZone, Utc};

    fn sweep_over(mock: &MockOrderStore) -> StatusSweep {
        let store: Arc<dyn OrderStore> = Arc::new(mock.client());
        let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2024, 8, 1, 9, 0, 0).unwrap()));
        let executor = TransitionExecutor::new(
            RuleTable::canonical(Duration::hours(72)),
            store.clone(),
            Notifier::new(
                NotificationTable::empty(),
                Arc::new(RecordingDispatcher::new()),
                RecipientDirectory::default(),
            ),
            EventBus::default(),
            clock,
            Arc::new(AutomationJournal::default()),
        );
        StatusSweep::new(Arc::new(executor), store, 4)
    }

    #[tokio::test]
    async fn query_failure_fails_the_whole_sweep() {
        let mut mock = MockOrderStore::new();
        mock.expect_find().return_err(PersistenceError::Unavailable("replica lag".into()));
        let sweep = sweep_over(&mock);

        let err = sweep.run_once().await.unwrap_err();
        assert!(matches!(err, EngineError::Persistence(PersistenceError::Unavailable(_))));
        mock.verify();
    }

    #[tokio::test]
    async fn save_failure_counts_as_failed_not_fatal() {
        let mut mock = MockOrderStore::new();
        let now = Utc.with_ymd_and_hms(2024, 8, 1, 9, 0, 0).unwrap();
        let paid = Order::from_new(
            OrderId(1),
            NewOrder {
                payment_status: PaymentStatus::Paid,
                ..NewOrder::default()
            },
            now,
        );
        let unpaid = Order::from_new(OrderId(2), NewOrder::default(), now);
        mock.expect_find().return_ok(vec![paid, unpaid]);
        mock.expect_save().return_err(PersistenceError::Unavailable("db down".into()));
        let sweep = sweep_over(&mock);

        let report = sweep.run_once().await.unwrap();
        assert_eq!(
            report,
            SweepReport {
                examined: 2,
                transitioned: 0,
                unchanged: 1,
                failed: 1
            }
        );
        mock.verify();
    }

    #[tokio::test]
    async fn process_order_reports_missing_ids() {
        let mut mock = MockOrderStore::new();
        mock.expect_get().return_ok(None);
        let sweep = sweep_over(&mock);

        let err = sweep.process_order(OrderId(77)).await.unwrap_err();
        assert!(matches!(err, EngineError::Persistence(PersistenceError::NotFound(OrderId(77)))));
    }
}
