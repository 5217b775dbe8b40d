use crate::model::OrderStatus;
use crate::notify::Channel;
use serde::Deserialize;
use std::time::Duration;

/// Top-level engine configuration as read from a TOML file.
///
/// ```toml
/// [scheduler]
/// sweep_interval_secs = 60
/// max_concurrency = 4
///
/// [notifications]
/// operators = ["ops@example.org"]
/// webhook_url = "https://hooks.example.org/orders"
///
/// [[notifications.routes]]
/// status = "shipped"
/// channel = "email"
/// template = "order_shipped"
/// ```
///
/// Every section is optional; an empty file yields the defaults.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EngineConfig {
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub notifications: NotificationConfig,

    #[serde(default)]
    pub inventory: InventoryConfig,

    #[serde(default)]
    pub reviews: ReviewConfig,
}

/// `[scheduler]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SchedulerConfig {
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// Review reminders, daily statistics and the inventory check.
    #[serde(default = "default_housekeeping_interval_secs")]
    pub housekeeping_interval_secs: u64,

    /// Orders evaluated in parallel within one sweep. `1` is sequential.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_housekeeping_interval_secs() -> u64 {
    3600
}

fn default_max_concurrency() -> usize {
    4
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval_secs(),
            housekeeping_interval_secs: default_housekeeping_interval_secs(),
            max_concurrency: default_max_concurrency(),
        }
    }
}

impl SchedulerConfig {
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs)
    }

    pub fn housekeeping_interval(&self) -> Duration {
        Duration::from_secs(self.housekeeping_interval_secs)
    }
}

/// `[notifications]` section.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    #[serde(default)]
    pub operators: Vec<String>,

    #[serde(default)]
    pub fulfillment: Vec<String>,

    #[serde(default)]
    pub webhook_url: Option<String>,

    /// When non-empty, replaces the built-in notification table entirely.
    #[serde(default)]
    pub routes: Vec<RouteConfig>,
}

/// One `[[notifications.routes]]` entry.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RouteConfig {
    pub status: OrderStatus,
    pub channel: Channel,
    pub template: String,
}

/// `[inventory]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InventoryConfig {
    #[serde(default = "default_low_stock_threshold")]
    pub low_stock_threshold: u32,
}

fn default_low_stock_threshold() -> u32 {
    10
}

impl Default for InventoryConfig {
    fn default() -> Self {
        Self {
            low_stock_threshold: default_low_stock_threshold(),
        }
    }
}

/// `[reviews]` section.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ReviewConfig {
    /// Delay between delivery and the review request.
    #[serde(default = "default_request_delay_hours")]
    pub request_delay_hours: u32,
}

/// Upper bound accepted by validation: one year.
pub const MAX_REQUEST_DELAY_HOURS: u32 = 24 * 365;

fn default_request_delay_hours() -> u32 {
    72
}

impl Default for ReviewConfig {
    fn default() -> Self {
        Self {
            request_delay_hours: default_request_delay_hours(),
        }
    }
}

impl ReviewConfig {
    pub fn request_delay(&self) -> chrono::Duration {
        chrono::Duration::hours(i64::from(self.request_delay_hours))
    }
}
