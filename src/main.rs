use anyhow::Context;
use chrono::{Duration, Utc};
use order_automation::cli::{self, CliArgs};
use order_automation::clock::{Clock, ManualClock, SystemClock};
use order_automation::config::{default_config_path, load_and_validate, EngineConfig};
use order_automation::lifecycle::{setup_tracing, AutomationSystem, Collaborators};
use order_automation::model::{Customer, LineItem, NewOrder, PaymentStatus, Shipping};
use order_automation::notify::LoggingDispatcher;
use order_automation::scheduler::InMemoryInventory;
use order_automation::store::OrderStoreClient;
use std::sync::Arc;
use tracing::info;

#[tokio::main]
async fn main() {
    if let Err(err) = run_main().await {
        eprintln!("order-automation error: {err:?}");
        std::process::exit(1);
    }
}

async fn run_main() -> anyhow::Result<()> {
    let args = cli::parse();
    setup_tracing(args.log_level.map(|l| l.as_str()));
    let config = load_config(&args)?;

    if args.serve {
        serve(&config).await
    } else {
        demo(&config, &args).await
    }
}

fn load_config(args: &CliArgs) -> anyhow::Result<EngineConfig> {
    let path = match &args.config {
        Some(path) => path.clone(),
        None => {
            let path = default_config_path();
            if !path.exists() {
                info!("No config file found, using defaults");
                return Ok(EngineConfig::default());
            }
            path
        }
    };
    let config = load_and_validate(&path).with_context(|| format!("loading config from {path:?}"))?;
    info!(?path, "Config loaded");
    Ok(config)
}

async fn serve(config: &EngineConfig) -> anyhow::Result<()> {
    let mut system = AutomationSystem::new(
        config,
        Collaborators {
            dispatcher: Arc::new(LoggingDispatcher),
            clock: Arc::new(SystemClock),
            inventory: Arc::new(InMemoryInventory::new()),
        },
    )?;
    system.start();
    tokio::signal::ctrl_c().await.context("waiting for Ctrl-C")?;
    system.shutdown().await?;
    Ok(())
}

/// Seeds a few orders and replays several days of sweeps on a simulated clock.
async fn demo(config: &EngineConfig, args: &CliArgs) -> anyhow::Result<()> {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let inventory = Arc::new(InMemoryInventory::new());
    inventory.set("VIT-C-500", "Vitamin C 500mg", 4);
    inventory.set("IBU-200", "Ibuprofen 200mg", 120);

    let mut config = config.clone();
    if config.notifications.operators.is_empty() {
        config.notifications.operators = vec!["ops@example.org".into()];
    }
    if config.notifications.fulfillment.is_empty() {
        config.notifications.fulfillment = vec!["warehouse@example.org".into()];
    }

    let system = AutomationSystem::new(
        &config,
        Collaborators {
            dispatcher: Arc::new(LoggingDispatcher),
            clock: clock.clone(),
            inventory,
        },
    )?;
    seed(system.store(), clock.now() + Duration::days(3)).await?;

    let cancelled = system.store().create(demo_order("Noor", PaymentStatus::Unpaid, None)).await?;
    system.store().cancel(cancelled.id).await?;

    for sweep in 1..=args.sweeps {
        let report = system.run_sweep().await?;
        info!(sweep, transitioned = report.transitioned, unchanged = report.unchanged, "Demo sweep");
        clock.advance(Duration::hours(i64::from(args.step_hours)));
    }
    if let Err(e) = system.run_housekeeping().await {
        info!(error = %e, "Housekeeping reported failures");
    }

    let stats = system.stats();
    println!(
        "rules executed: {}, failures: {}, success rate: {:.1}%",
        stats.total_executions, stats.failures, stats.success_rate
    );
    for (reason, count) in &stats.top_failure_reasons {
        println!("  {count} x {reason}");
    }

    system.shutdown().await?;
    Ok(())
}

async fn seed(store: &OrderStoreClient, eta: chrono::DateTime<Utc>) -> anyhow::Result<()> {
    let shipping = Shipping {
        carrier: Some("PostNord".into()),
        tracking_number: Some("PN-20931".into()),
        estimated_delivery: Some(eta),
        delivered_at: None,
    };
    store.create(demo_order("Ada", PaymentStatus::Paid, Some(shipping))).await?;
    // Paid but no delivery estimate: stops at `shipped`.
    let no_eta = Shipping {
        tracking_number: Some("PN-20932".into()),
        ..Shipping::default()
    };
    store.create(demo_order("Bo", PaymentStatus::Paid, Some(no_eta))).await?;
    // Never paid: stays `pending`.
    store.create(demo_order("Cy", PaymentStatus::Pending, None)).await?;
    Ok(())
}

fn demo_order(name: &str, payment_status: PaymentStatus, shipping: Option<Shipping>) -> NewOrder {
    NewOrder {
        customer: Customer {
            name: name.into(),
            email: Some(format!("{}@example.org", name.to_lowercase())),
            phone: None,
        },
        status: None,
        payment_status,
        items: vec![LineItem::new("IBU-200", "Ibuprofen 200mg", 2).prepared()],
        shipping,
    }
}
