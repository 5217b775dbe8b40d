use crate::clock::Clock;
use crate::config::EngineConfig;
use crate::engine::{AutomationJournal, Evaluation, JournalStats, StatusSweep, SweepReport, TransitionExecutor};
use crate::error::Result;
use crate::events::{EngineEvent, EventBus};
use crate::model::OrderId;
use crate::notify::{NotificationDispatcher, Notifier};
use crate::rules::RuleTable;
use crate::scheduler::{
    DailyStatsTask, HousekeepingJob, HousekeepingTask, InventoryCheckTask, InventorySource, JobTrigger,
    ReviewReminderTask, Scheduler,
};
use crate::store::{OrderStore, OrderStoreActor, OrderStoreClient};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{error, info};

/// Collaborators the engine does not own.
pub struct Collaborators {
    pub dispatcher: Arc<dyn NotificationDispatcher>,
    pub clock: Arc<dyn Clock>,
    pub inventory: Arc<dyn InventorySource>,
}

/// Wires the order store, the transition engine and the recurring jobs.
///
/// `AutomationSystem` is responsible for:
/// - **Wiring**: building the rule table, notifier, executor and housekeeping tasks from an [`EngineConfig`]
/// - **Lifecycle**: spawning the store actor, starting the scheduler, and shutting both down in order
///
/// # Example
///
/// ```ignore
/// let mut system = AutomationSystem::new(&config, collaborators)?;
/// system.store().create(new_order).await?;
/// system.start();
/// // ...
/// system.shutdown().await?;
/// ```
pub struct AutomationSystem {
    config: EngineConfig,
    store: OrderStoreClient,
    events: EventBus,
    journal: Arc<AutomationJournal>,
    sweep: Arc<StatusSweep>,
    sweep_job: JobTrigger,
    housekeeping_job: JobTrigger,
    scheduler: Option<Scheduler>,
    store_handle: JoinHandle<()>,
}

impl AutomationSystem {
    /// Builds every component and spawns the store actor. Jobs do not run
    /// until [`start`](Self::start) is called.
    pub fn new(config: &EngineConfig, collaborators: Collaborators) -> Result<Self> {
        let Collaborators {
            dispatcher,
            clock,
            inventory,
        } = collaborators;

        let notifier = Notifier::new(config.notification_table()?, dispatcher, config.recipient_directory());
        let rules = RuleTable::new(crate::rules::canonical_rules(config.reviews.request_delay()))?;

        let (store_actor, store) = OrderStoreActor::new(256, clock.clone());
        let store_handle = tokio::spawn(store_actor.run());
        let shared_store: Arc<dyn OrderStore> = Arc::new(store.clone());

        let events = EventBus::default();
        let journal = Arc::new(AutomationJournal::default());

        let executor = Arc::new(TransitionExecutor::new(
            rules,
            shared_store.clone(),
            notifier.clone(),
            events.clone(),
            clock.clone(),
            journal.clone(),
        ));
        let sweep = Arc::new(StatusSweep::new(
            executor,
            shared_store.clone(),
            config.scheduler.max_concurrency,
        ));

        let tasks: Vec<Arc<dyn HousekeepingTask>> = vec![
            Arc::new(ReviewReminderTask::new(
                shared_store.clone(),
                notifier,
                events.clone(),
                clock.clone(),
            )),
            Arc::new(DailyStatsTask::new(shared_store, journal.clone(), events.clone(), clock)),
            Arc::new(InventoryCheckTask::new(
                inventory,
                config.inventory.low_stock_threshold,
                events.clone(),
            )),
        ];

        info!(
            max_concurrency = config.scheduler.max_concurrency,
            sweep_interval_secs = config.scheduler.sweep_interval_secs,
            "Automation system ready"
        );
        Ok(Self {
            config: config.clone(),
            store,
            events,
            journal,
            sweep_job: JobTrigger::new(sweep.clone()),
            sweep,
            housekeeping_job: JobTrigger::new(Arc::new(HousekeepingJob::new(tasks))),
            scheduler: None,
            store_handle,
        })
    }

    /// Handle for the checkout flow and for out-of-band cancellation.
    pub fn store(&self) -> &OrderStoreClient {
        &self.store
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.events.subscribe()
    }

    pub fn journal(&self) -> &AutomationJournal {
        &self.journal
    }

    pub fn stats(&self) -> JournalStats {
        self.journal.stats()
    }

    /// Starts the sweep and housekeeping timers. Calling it twice is a no-op.
    pub fn start(&mut self) {
        if self.scheduler.is_some() {
            return;
        }
        let mut scheduler = Scheduler::new();
        scheduler.schedule(self.sweep_job.clone(), self.config.scheduler.sweep_interval());
        scheduler.schedule(self.housekeeping_job.clone(), self.config.scheduler.housekeeping_interval());
        self.scheduler = Some(scheduler);
    }

    /// Runs one sweep now, never concurrently with a scheduled one.
    pub async fn run_sweep(&self) -> Result<SweepReport> {
        let _guard = self.sweep_job.exclusive().await;
        self.sweep.run_once().await
    }

    pub async fn run_housekeeping(&self) -> Result<()> {
        self.housekeeping_job.run_now().await
    }

    /// Evaluates one order immediately, e.g. right after a payment callback.
    pub async fn process_order(&self, id: OrderId) -> Result<Evaluation> {
        self.sweep.process_order(id).await
    }

    /// Stops the timers, then closes the store.
    ///
    /// Every [`OrderStoreClient`] cloned from [`store`](Self::store) must be
    /// dropped first, or the store actor never sees its channel close.
    pub async fn shutdown(self) -> Result<()> {
        info!("Shutting down automation system...");
        let Self {
            store,
            sweep,
            sweep_job,
            housekeeping_job,
            scheduler,
            store_handle,
            ..
        } = self;

        if let Some(scheduler) = scheduler {
            scheduler.shutdown().await?;
        }

        // Every remaining store client lives in these; dropping them closes the channel.
        drop(sweep_job);
        drop(housekeeping_job);
        drop(sweep);
        drop(store);

        if let Err(e) = store_handle.await {
            error!(error = %e, "Order store task failed");
            return Err(e.into());
        }
        info!("Automation system shutdown complete.");
        Ok(())
    }
}
