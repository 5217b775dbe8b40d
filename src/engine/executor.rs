use crate::clock::Clock;
use crate::engine::{AutomationJournal, JournalEntry, Outcome};
use crate::events::{EngineEvent, EventBus};
use crate::model::{Order, OrderId, OrderStatus, StatusChange};
use crate::notify::{FanOutReport, Notifier};
use crate::rules::{ActionContext, ActionError, ConditionError, RuleTable, StatusRule};
use crate::store::{OrderStore, PersistenceError};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

/// Failures that leave the order's status untouched for this tick.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum TransitionError {
    #[error("Condition of rule '{rule}' failed for {order_id}: {source}")]
    Condition {
        order_id: OrderId,
        rule: String,
        source: ConditionError,
    },

    #[error("Could not persist {order_id} {from} -> {to}: {source}")]
    Persistence {
        order_id: OrderId,
        from: OrderStatus,
        to: OrderStatus,
        source: PersistenceError,
    },
}

/// A committed transition and what followed it.
#[derive(Debug, Clone)]
pub struct TransitionResult {
    /// The order as last persisted (after the action, if it saved).
    pub order: Order,
    pub change: StatusChange,
    pub rule: String,
    /// The action failed; the transition itself is kept.
    pub action_error: Option<ActionError>,
    pub notifications: FanOutReport,
}

#[derive(Debug, Clone)]
pub enum Evaluation {
    NoOp,
    Transitioned(Box<TransitionResult>),
}

impl Evaluation {
    pub fn is_noop(&self) -> bool {
        matches!(self, Evaluation::NoOp)
    }

    pub fn transition(&self) -> Option<&TransitionResult> {
        match self {
            Evaluation::NoOp => None,
            Evaluation::Transitioned(result) => Some(result.as_ref()),
        }
    }
}

/// Advances a single order by at most one rule per call.
///
/// Order of effects for a firing rule is strict: save the new status, run the
/// rule's action, fan out notifications for the new status, publish
/// `StatusChanged`. Only a failed save aborts; everything after it is
/// best-effort and recorded in the [`TransitionResult`].
pub struct TransitionExecutor {
    rules: Arc<RuleTable>,
    store: Arc<dyn OrderStore>,
    notifier: Notifier,
    events: EventBus,
    clock: Arc<dyn Clock>,
    journal: Arc<AutomationJournal>,
}

impl TransitionExecutor {
    pub fn new(
        rules: RuleTable,
        store: Arc<dyn OrderStore>,
        notifier: Notifier,
        events: EventBus,
        clock: Arc<dyn Clock>,
        journal: Arc<AutomationJournal>,
    ) -> Self {
        Self {
            rules: Arc::new(rules),
            store,
            notifier,
            events,
            clock,
            journal,
        }
    }

    pub fn rules(&self) -> &RuleTable {
        &self.rules
    }

    pub fn journal(&self) -> &Arc<AutomationJournal> {
        &self.journal
    }

    fn action_context(&self) -> ActionContext {
        ActionContext {
            store: self.store.clone(),
            notifier: self.notifier.clone(),
            clock: self.clock.clone(),
        }
    }

    #[instrument(skip_all, fields(order_id = %order.id, status = %order.status))]
    pub async fn evaluate(&self, order: Order) -> Result<Evaluation, TransitionError> {
        let now = self.clock.now();
        let started = Instant::now();

        let Some(rule) = self.select_rule(&order, now, started)? else {
            debug!("No applicable rule");
            return Ok(Evaluation::NoOp);
        };

        let order_id = order.id;
        let mut next = order;
        let change = next.apply_transition(rule.to, now);

        let mut persisted = match self.store.save(next).await {
            Ok(saved) => saved,
            Err(source) => {
                warn!(rule = %rule.name, from = %change.from, to = %change.to, error = %source, "Status save failed");
                self.record(rule, &change, order_id, Some(source.to_string()), started);
                return Err(TransitionError::Persistence {
                    order_id,
                    from: change.from,
                    to: change.to,
                    source,
                });
            }
        };
        info!(rule = %rule.name, from = %change.from, to = %change.to, "Status advanced");

        let action_error = match rule.action() {
            Some(action) => match action.run(&mut persisted, &self.action_context()).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(rule = %rule.name, action = action.name(), error = %e, "Action failed");
                    Some(e)
                }
            },
            None => None,
        };

        let notifications = self.notifier.notify(&persisted, rule.to).await;

        self.events.publish(EngineEvent::StatusChanged {
            order_id,
            previous_status: change.from,
            new_status: change.to,
            at: change.at,
        });

        let failure = action_error
            .as_ref()
            .map(|e| e.to_string())
            .or_else(|| notifications.failures.first().map(|f| f.error.to_string()));
        self.record(rule, &change, order_id, failure, started);

        Ok(Evaluation::Transitioned(Box::new(TransitionResult {
            order: persisted,
            change,
            rule: rule.name.clone(),
            action_error,
            notifications,
        })))
    }

    /// First rule leaving the current status whose condition holds and whose
    /// dwell time has elapsed.
    fn select_rule(
        &self,
        order: &Order,
        now: DateTime<Utc>,
        started: Instant,
    ) -> Result<Option<&StatusRule>, TransitionError> {
        for rule in self.rules.candidates(order.status) {
            match rule.condition_holds(order, now) {
                Ok(false) => continue,
                Ok(true) if !rule.dwell_satisfied(order, now) => {
                    debug!(rule = %rule.name, since = %order.status_changed_at(), "Dwell time not reached");
                    continue;
                }
                Ok(true) => return Ok(Some(rule)),
                Err(source) => {
                    warn!(rule = %rule.name, error = %source, "Condition evaluation failed");
                    let change = StatusChange {
                        from: order.status,
                        to: rule.to,
                        at: now,
                    };
                    self.record(rule, &change, order.id, Some(source.to_string()), started);
                    return Err(TransitionError::Condition {
                        order_id: order.id,
                        rule: rule.name.clone(),
                        source,
                    });
                }
            }
        }
        Ok(None)
    }

    fn record(&self, rule: &StatusRule, change: &StatusChange, order_id: OrderId, error: Option<String>, started: Instant) {
        self.journal.record(JournalEntry {
            order_id,
            rule: rule.name.clone(),
            from: change.from,
            to: change.to,
            outcome: if error.is_some() { Outcome::Failure } else { Outcome::Success },
            error,
            at: change.at,
            elapsed: started.elapsed(),
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{Customer, LineItem, NewOrder, PaymentStatus};
    use crate::notify::mock::RecordingDispatcher;
    use crate::notify::{NotificationTable, RecipientDirectory};
    use crate::store::mock::MockOrderStore;
    use crate::store::OrderStoreActor;
    use chrono::{Duration, TimeZone};

    fn start() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 10, 0, 0).unwrap()
    }

    fn new_order(status: OrderStatus, payment: PaymentStatus) -> NewOrder {
        NewOrder {
            customer: Customer {
                name: "Lee".into(),
                email: Some("lee@example.org".into()),
                phone: None,
            },
            status: Some(status),
            payment_status: payment,
            items: vec![LineItem::new("SKU-1", "Ibuprofen", 1)],
            shipping: None,
        }
    }

    struct Harness {
        executor: TransitionExecutor,
        clock: Arc<ManualClock>,
        dispatcher: Arc<RecordingDispatcher>,
    }

    fn harness(store: Arc<dyn OrderStore>, rules: RuleTable) -> Harness {
        let clock = Arc::new(ManualClock::new(start()));
        let dispatcher = Arc::new(RecordingDispatcher::new());
        let notifier = Notifier::new(
            NotificationTable::canonical(),
            dispatcher.clone(),
            RecipientDirectory {
                operators: vec!["ops@example.org".into()],
                fulfillment: vec!["warehouse@example.org".into()],
                webhook_url: None,
            },
        );
        let executor = TransitionExecutor::new(
            rules,
            store,
            notifier,
            EventBus::default(),
            clock.clone(),
            Arc::new(AutomationJournal::default()),
        );
        Harness {
            executor,
            clock,
            dispatcher,
        }
    }

    #[tokio::test]
    async fn persistence_failure_leaves_status_unchanged() {
        let mut mock = MockOrderStore::new();
        mock.expect_save().return_err(PersistenceError::Unavailable("db down".into()));
        let h = harness(Arc::new(mock.client()), RuleTable::canonical(Duration::hours(72)));

        let order = Order::from_new(OrderId(1), new_order(OrderStatus::Pending, PaymentStatus::Paid), start());
        let err = h.executor.evaluate(order).await.unwrap_err();

        assert!(matches!(err, TransitionError::Persistence { to: OrderStatus::Processing, .. }));
        assert!(h.dispatcher.sent().is_empty(), "no notifications without a committed status");
        let stats = h.executor.journal().rule_stats("payment_confirmed").unwrap();
        assert_eq!(stats.failures, 1);
        mock.verify();
    }

    #[tokio::test]
    async fn dwell_gate_holds_then_releases() {
        let (actor, store) = OrderStoreActor::new(8, Arc::new(ManualClock::new(start())));
        tokio::spawn(actor.run());
        let h = harness(Arc::new(store.clone()), RuleTable::canonical(Duration::hours(72)));

        let mut params = new_order(OrderStatus::Processing, PaymentStatus::Paid);
        params.items[0].prepared = true;
        let mut order = store.create(params).await.unwrap();
        order.metadata.last_status_change = Some(start());
        let order = store.save(order).await.unwrap();

        h.clock.advance_minutes(29);
        assert!(h.executor.evaluate(order.clone()).await.unwrap().is_noop());

        h.clock.advance_minutes(2);
        let result = h.executor.evaluate(order).await.unwrap();
        let transition = result.transition().expect("rule should fire after 31 minutes");
        assert_eq!(transition.change.to, OrderStatus::ReadyToShip);
    }

    #[tokio::test]
    async fn overflowing_review_delay_is_an_action_error() {
        let (actor, store) = OrderStoreActor::new(8, Arc::new(ManualClock::new(start())));
        tokio::spawn(actor.run());
        let h = harness(Arc::new(store.clone()), RuleTable::canonical(Duration::days(365 * 1_000_000)));

        let mut params = new_order(OrderStatus::Shipped, PaymentStatus::Paid);
        params.shipping = Some(crate::model::Shipping {
            tracking_number: Some("TRK-9".into()),
            estimated_delivery: Some(start()),
            ..Default::default()
        });
        let order = store.create(params).await.unwrap();

        let result = h.executor.evaluate(order.clone()).await.unwrap();
        let transition = result.transition().expect("delivery rule should fire");
        assert_eq!(transition.change.to, OrderStatus::Delivered);
        assert!(matches!(transition.action_error, Some(ActionError::Failed(_))));

        let stored = store.find_by_id(order.id).await.unwrap().unwrap();
        assert_eq!(stored.status, OrderStatus::Delivered);
        assert_eq!(stored.metadata.review_due_at, None);
    }

    #[tokio::test]
    async fn condition_error_is_reported_without_saving() {
        let mock = MockOrderStore::new();
        let h = harness(Arc::new(mock.client()), RuleTable::canonical(Duration::hours(72)));

        let mut order = Order::from_new(OrderId(4), new_order(OrderStatus::Processing, PaymentStatus::Paid), start());
        order.items.clear();
        h.clock.advance_minutes(60);

        let err = h.executor.evaluate(order).await.unwrap_err();
        assert!(matches!(err, TransitionError::Condition { ref rule, .. } if rule == "items_prepared"));
        mock.verify();
    }

    #[tokio::test]
    async fn terminal_orders_are_never_touched() {
        let mock = MockOrderStore::new();
        let h = harness(Arc::new(mock.client()), RuleTable::canonical(Duration::hours(72)));

        for status in [OrderStatus::Completed, OrderStatus::Cancelled] {
            let order = Order::from_new(OrderId(5), new_order(status, PaymentStatus::Paid), start());
            h.clock.advance(Duration::days(30));
            assert!(h.executor.evaluate(order).await.unwrap().is_noop());
        }
        assert!(h.dispatcher.sent().is_empty());
    }
}
