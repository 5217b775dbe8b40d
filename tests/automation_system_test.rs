use chrono::{Duration, TimeZone, Utc};
use order_automation::clock::{Clock, ManualClock};
use order_automation::config::{EngineConfig, RouteConfig};
use order_automation::error::EngineError;
use order_automation::events::EngineEvent;
use order_automation::lifecycle::{AutomationSystem, Collaborators};
use order_automation::model::{Customer, LineItem, NewOrder, OrderStatus, PaymentStatus, Shipping};
use order_automation::notify::mock::RecordingDispatcher;
use order_automation::notify::Channel;
use order_automation::scheduler::{InMemoryInventory, REVIEW_TEMPLATE};
use order_automation::store::OrderStore;
use std::sync::Arc;

struct Harness {
    system: AutomationSystem,
    clock: Arc<ManualClock>,
    dispatcher: Arc<RecordingDispatcher>,
    inventory: Arc<InMemoryInventory>,
}

fn harness(config: EngineConfig) -> Harness {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 6, 8, 0, 0).unwrap()));
    let dispatcher = Arc::new(RecordingDispatcher::new());
    let inventory = Arc::new(InMemoryInventory::new());
    let system = AutomationSystem::new(
        &config,
        Collaborators {
            dispatcher: dispatcher.clone(),
            clock: clock.clone(),
            inventory: inventory.clone(),
        },
    )
    .expect("valid config");
    Harness {
        system,
        clock,
        dispatcher,
        inventory,
    }
}

fn config() -> EngineConfig {
    let mut config = EngineConfig::default();
    config.notifications.operators = vec!["ops@example.org".into()];
    config.notifications.fulfillment = vec!["warehouse@example.org".into()];
    config
}

fn ready_order() -> NewOrder {
    NewOrder {
        customer: Customer {
            name: "Mo".into(),
            email: Some("mo@example.org".into()),
            phone: Some("+4671111111".into()),
        },
        status: None,
        payment_status: PaymentStatus::Paid,
        items: vec![LineItem::new("VIT-C-500", "Vitamin C 500mg", 3).prepared()],
        shipping: None,
    }
}

/// End-to-end through the system facade, from checkout to review request.
#[tokio::test]
async fn test_full_automation_system_integration() {
    let h = harness(config());
    let mut events = h.system.subscribe();

    let mut params = ready_order();
    params.shipping = Some(Shipping {
        carrier: Some("UPS".into()),
        tracking_number: Some("1Z999".into()),
        estimated_delivery: Some(h.clock.now() + Duration::days(1)),
        delivered_at: None,
    });
    let id = h.system.store().create(params).await.unwrap().id;

    for _ in 0..6 {
        h.system.run_sweep().await.unwrap();
        h.clock.advance(Duration::days(4));
    }
    let order = h.system.store().find_by_id(id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Completed);
    assert_eq!(order.metadata.status_history.len(), 5);

    h.system.run_housekeeping().await.unwrap();
    assert_eq!(h.dispatcher.count(REVIEW_TEMPLATE), 1);
    // Already requested: not sent again.
    h.system.run_housekeeping().await.unwrap();
    assert_eq!(h.dispatcher.count(REVIEW_TEMPLATE), 1);

    let mut saw_review = false;
    let mut saw_stats = false;
    while let Ok(event) = events.try_recv() {
        match event {
            EngineEvent::ReviewRequested { order_id, .. } => {
                assert_eq!(order_id, id);
                saw_review = true;
            }
            EngineEvent::DailyStats { orders_by_status, .. } => {
                assert_eq!(orders_by_status[&OrderStatus::Completed], 1);
                saw_stats = true;
            }
            _ => {}
        }
    }
    assert!(saw_review && saw_stats);

    let stats = h.system.stats();
    assert_eq!(stats.total_executions, 5);
    assert_eq!(stats.failures, 0);
    assert_eq!(stats.success_rate, 100.0);

    h.system.shutdown().await.expect("clean shutdown");
}

#[tokio::test]
async fn process_order_advances_one_order_immediately() {
    let h = harness(config());
    let order = h.system.store().create(ready_order()).await.unwrap();

    let evaluation = h.system.process_order(order.id).await.unwrap();
    assert_eq!(evaluation.transition().unwrap().order.status, OrderStatus::Processing);

    // Second call: preparation dwell not yet elapsed.
    assert!(h.system.process_order(order.id).await.unwrap().is_noop());

    h.system.shutdown().await.unwrap();
}

#[tokio::test]
async fn low_stock_is_published() {
    let h = harness(config());
    h.inventory.set("VIT-C-500", "Vitamin C 500mg", 3);
    h.inventory.set("IBU-200", "Ibuprofen 200mg", 300);
    let mut events = h.system.subscribe();

    h.system.run_housekeeping().await.unwrap();

    let low: Vec<_> = std::iter::from_fn(|| events.try_recv().ok())
        .filter_map(|e| match e {
            EngineEvent::LowInventory { sku, threshold, .. } => Some((sku, threshold)),
            _ => None,
        })
        .collect();
    assert_eq!(low, vec![("VIT-C-500".to_string(), 10)]);

    h.system.shutdown().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn scheduled_sweep_runs_without_being_asked() {
    let mut h = harness(config());
    let order = h.system.store().create(ready_order()).await.unwrap();

    h.system.start();
    tokio::time::sleep(std::time::Duration::from_secs(1)).await;

    let order = h.system.store().find_by_id(order.id).await.unwrap().unwrap();
    assert_eq!(order.status, OrderStatus::Processing);

    h.system.shutdown().await.unwrap();
}

#[tokio::test]
async fn invalid_routes_are_rejected_at_startup() {
    let mut config = config();
    config.notifications.routes = vec![RouteConfig {
        status: OrderStatus::Shipped,
        channel: Channel::Email,
        template: " ".into(),
    }];
    let result = AutomationSystem::new(
        &config,
        Collaborators {
            dispatcher: Arc::new(RecordingDispatcher::new()),
            clock: Arc::new(ManualClock::new(Utc::now())),
            inventory: Arc::new(InMemoryInventory::new()),
        },
    );
    assert!(matches!(result, Err(EngineError::NotificationTable(_))));
}
