//! Notification side of a transition.
//!
//! - [`NotificationTable`] - which `{channel, template}` pairs fire for each resulting status
//! - [`NotificationDispatcher`] - the external sender (email/SMS gateway, pager, webhook client)
//! - [`Notifier`] - resolves recipients, builds payloads and fans out, isolating every failure

pub mod fanout;
pub mod logging;
pub mod mock;
pub mod table;

pub use fanout::*;
pub use logging::*;
pub use table::*;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt::Display;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Email,
    Sms,
    /// Operator alert (back-office roster).
    Admin,
    Webhook,
}

impl Display for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Channel::Email => "email",
            Channel::Sms => "sms",
            Channel::Admin => "admin",
            Channel::Webhook => "webhook",
        };
        f.write_str(s)
    }
}

/// One entry of the Notification Table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRoute {
    pub channel: Channel,
    pub template: String,
}

impl NotificationRoute {
    pub fn new(channel: Channel, template: impl Into<String>) -> Self {
        Self {
            channel,
            template: template.into(),
        }
    }
}

/// Failure of a single `send` call.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum DispatchError {
    /// The provider refused the message (bad address, template missing, ...).
    #[error("{channel} dispatch rejected: {reason}")]
    Rejected { channel: Channel, reason: String },

    /// The provider could not be reached or timed out.
    #[error("{channel} provider unavailable: {reason}")]
    Unavailable { channel: Channel, reason: String },
}

/// Sends one message on one channel to one recipient.
///
/// Implementations own their timeouts; the engine never waits on a
/// dispatcher for longer than the dispatcher itself allows.
#[async_trait]
pub trait NotificationDispatcher: Send + Sync {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<(), DispatchError>;
}
