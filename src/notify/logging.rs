use crate::notify::{Channel, DispatchError, NotificationDispatcher};
use async_trait::async_trait;
use tracing::info;

/// A dispatcher that only writes each message to the log.
///
/// Used by the demo binary and in environments without real providers.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingDispatcher;

#[async_trait]
impl NotificationDispatcher for LoggingDispatcher {
    async fn send(
        &self,
        channel: Channel,
        recipient: &str,
        template: &str,
        data: &serde_json::Value,
    ) -> Result<(), DispatchError> {
        info!(%channel, recipient, template, order_id = %data["orderId"], "Dispatch");
        Ok(())
    }
}
