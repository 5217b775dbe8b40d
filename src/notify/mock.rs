//! # Recording Dispatcher
//!
//! A [`NotificationDispatcher`] for tests: every `send` is recorded, and
//! individual channels can be told to fail.

use crate::notify::{Channel, DispatchError, NotificationDispatcher};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

/// One recorded `send` call.
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub channel: Channel,
    pub recipient: String,
    pub template: String,
    pub data: serde_json::Value,
}

#[derive(Debug, Default)]
pub struct RecordingDispatcher {
    sent: Mutex<Vec<SentMessage>>,
    failing: Mutex<HashSet<Channel>>,
}

impl RecordingDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every subsequent send on `channel` fails with [`DispatchError::Unavailable`].
    pub fn fail_channel(&self, channel: Channel) {
        self.failing.lock().unwrap().insert(channel);
    }

    pub fn heal_channel(&self, channel: Channel) {
        self.failing.lock().unwrap().remove(&channel);
    }

    /// Successfully sent messages, in order.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.sent.lock().unwrap().clone()
    }

    /// How many successful sends used `template`.
    pub fn count(&self, template: &str) -> usize {
        self.sent.lock().unwrap().iter().filter(|m| m.template == template).count()
    }
}

#[async_trait]
impl NotificationDispatcher for RecordingDispatcher {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<(), DispatchError> {
        if self.failing.lock().unwrap().contains(&channel) {
            return Err(DispatchError::Unavailable {
                channel,
                reason: "provider offline".into(),
            });
        }
        self.sent.lock().unwrap().push(SentMessage {
            channel,
            recipient: recipient.to_string(),
            template: template.to_string(),
            data: data.clone(),
        });
        Ok(())
    }
}
