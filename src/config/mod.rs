//! Configuration loading and validation.
//!
//! - TOML-backed data model (`model.rs`)
//! - loading from disk (`loader.rs`)
//! - semantic validation (`validate.rs`)

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_and_validate, load_from_path, CONFIG_PATH_ENV};
pub use model::{EngineConfig, InventoryConfig, MAX_REQUEST_DELAY_HOURS, NotificationConfig, ReviewConfig, RouteConfig, SchedulerConfig};
pub use validate::validate_config;

use crate::notify::{NotificationRoute, NotificationTable, NotificationTableError, RecipientDirectory};
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse TOML config {path:?}: {source}")]
    Toml {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid config: {0}")]
    Invalid(String),

    #[error("Invalid notification routes: {0}")]
    NotificationTable(#[from] NotificationTableError),
}

impl EngineConfig {
    /// The configured routes, or the built-in table when none are given.
    pub fn notification_table(&self) -> Result<NotificationTable, NotificationTableError> {
        if self.notifications.routes.is_empty() {
            return Ok(NotificationTable::canonical());
        }
        NotificationTable::new(
            self.notifications
                .routes
                .iter()
                .map(|r| (r.status, NotificationRoute::new(r.channel, r.template.clone()))),
        )
    }

    pub fn recipient_directory(&self) -> RecipientDirectory {
        RecipientDirectory {
            operators: self.notifications.operators.clone(),
            fulfillment: self.notifications.fulfillment.clone(),
            webhook_url: self.notifications.webhook_url.clone(),
        }
    }
}
