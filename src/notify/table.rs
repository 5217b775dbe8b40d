use crate::model::OrderStatus;
use crate::notify::{Channel, NotificationRoute};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq)]
pub enum NotificationTableError {
    #[error("Empty template for {channel} notification on {status}")]
    EmptyTemplate { status: OrderStatus, channel: Channel },

    #[error("Duplicate {channel} notification '{template}' on {status}")]
    Duplicate {
        status: OrderStatus,
        channel: Channel,
        template: String,
    },
}

/// Ordered notification routes keyed by the *resulting* status.
///
/// Backed by a fixed array indexed by [`OrderStatus`], so every status has a
/// (possibly empty) slot and lookups cannot miss on a misspelled key.
#[derive(Debug, Clone)]
pub struct NotificationTable {
    routes: [Vec<NotificationRoute>; OrderStatus::COUNT],
}

impl NotificationTable {
    pub fn empty() -> Self {
        Self {
            routes: std::array::from_fn(|_| Vec::new()),
        }
    }

    /// Builds a table from `(status, route)` pairs, keeping declaration order
    /// within each status.
    pub fn new(
        entries: impl IntoIterator<Item = (OrderStatus, NotificationRoute)>,
    ) -> Result<Self, NotificationTableError> {
        let mut table = Self::empty();
        for (status, route) in entries {
            if route.template.trim().is_empty() {
                return Err(NotificationTableError::EmptyTemplate {
                    status,
                    channel: route.channel,
                });
            }
            let slot = &mut table.routes[status.index()];
            if slot.contains(&route) {
                return Err(NotificationTableError::Duplicate {
                    status,
                    channel: route.channel,
                    template: route.template,
                });
            }
            slot.push(route);
        }
        Ok(table)
    }

    /// The default customer and operator messages for each lifecycle step.
    pub fn canonical() -> Self {
        use Channel::*;
        use OrderStatus::*;

        let entries = [
            (Processing, NotificationRoute::new(Email, "order_confirmation")),
            (Processing, NotificationRoute::new(Sms, "order_confirmation_sms")),
            (ReadyToShip, NotificationRoute::new(Admin, "order_ready_to_ship")),
            (Shipped, NotificationRoute::new(Email, "order_shipped")),
            (Shipped, NotificationRoute::new(Sms, "order_shipped_sms")),
            (Shipped, NotificationRoute::new(Webhook, "order_shipped")),
            (Delivered, NotificationRoute::new(Email, "order_delivered")),
            (Completed, NotificationRoute::new(Webhook, "order_completed")),
        ];
        let mut table = Self::empty();
        for (status, route) in entries {
            table.routes[status.index()].push(route);
        }
        table
    }

    pub fn for_status(&self, status: OrderStatus) -> &[NotificationRoute] {
        &self.routes[status.index()]
    }

    /// Every `(status, route)` pair, in status then declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (OrderStatus, &NotificationRoute)> + '_ {
        OrderStatus::ALL
            .into_iter()
            .flat_map(move |status| self.for_status(status).iter().map(move |route| (status, route)))
    }
}

impl Default for NotificationTable {
    fn default() -> Self {
        Self::canonical()
    }
}
