//! # In-memory Order Store Actor
//!
//! The actor owns every order and the receiver half of a channel. Requests are
//! processed one at a time, so the map needs no lock: exclusive ownership
//! inside the task gives the same guarantee.
//!
//! Compare-and-save is enforced here: a save carrying a stale `version` is
//! rejected with [`PersistenceError::Conflict`].

use crate::clock::Clock;
use crate::model::{NewOrder, Order, OrderId, OrderStatus};
use crate::store::{OrderStoreClient, PersistenceError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Type alias for the one-shot response channel used by the store actor.
pub type Response<T> = oneshot::Sender<Result<T, PersistenceError>>;

/// Messages understood by [`OrderStoreActor`].
#[derive(Debug)]
pub enum StoreRequest {
    Create {
        params: NewOrder,
        respond_to: Response<Order>,
    },
    Get {
        id: OrderId,
        respond_to: Response<Option<Order>>,
    },
    FindByStatuses {
        statuses: Vec<OrderStatus>,
        respond_to: Response<Vec<Order>>,
    },
    Save {
        order: Order,
        respond_to: Response<Order>,
    },
    /// Out-of-band cancellation by an external collaborator.
    Cancel {
        id: OrderId,
        respond_to: Response<Order>,
    },
}

pub struct OrderStoreActor {
    receiver: mpsc::Receiver<StoreRequest>,
    orders: BTreeMap<OrderId, Order>,
    next_id: u64,
    clock: Arc<dyn Clock>,
}

impl OrderStoreActor {
    pub fn new(buffer_size: usize, clock: Arc<dyn Clock>) -> (Self, OrderStoreClient) {
        let (sender, receiver) = mpsc::channel(buffer_size);
        let actor = Self {
            receiver,
            orders: BTreeMap::new(),
            next_id: 1,
            clock,
        };
        (actor, OrderStoreClient::new(sender))
    }

    /// Runs the actor's event loop until every client has been dropped.
    pub async fn run(mut self) {
        info!("Order store started");

        while let Some(msg) = self.receiver.recv().await {
            match msg {
                StoreRequest::Create { params, respond_to } => {
                    debug!(?params, "Create");
                    let id = OrderId(self.next_id);
                    self.next_id += 1;
                    let order = Order::from_new(id, params, self.clock.now());
                    self.orders.insert(id, order.clone());
                    info!(order_id = %id, status = %order.status, size = self.orders.len(), "Created");
                    let _ = respond_to.send(Ok(order));
                }
                StoreRequest::Get { id, respond_to } => {
                    let order = self.orders.get(&id).cloned();
                    debug!(order_id = %id, found = order.is_some(), "Get");
                    let _ = respond_to.send(Ok(order));
                }
                StoreRequest::FindByStatuses { statuses, respond_to } => {
                    let found: Vec<Order> = self
                        .orders
                        .values()
                        .filter(|o| statuses.contains(&o.status))
                        .cloned()
                        .collect();
                    debug!(?statuses, count = found.len(), "FindByStatuses");
                    let _ = respond_to.send(Ok(found));
                }
                StoreRequest::Save { order, respond_to } => {
                    let result = self.save(order);
                    if let Err(e) = &result {
                        warn!(error = %e, "Save rejected");
                    }
                    let _ = respond_to.send(result);
                }
                StoreRequest::Cancel { id, respond_to } => {
                    let now = self.clock.now();
                    let result = match self.orders.get_mut(&id) {
                        Some(order) if order.status.is_terminal() => Ok(order.clone()),
                        Some(order) => {
                            order.status = OrderStatus::Cancelled;
                            order.updated_at = now;
                            order.version += 1;
                            info!(order_id = %id, "Cancelled");
                            Ok(order.clone())
                        }
                        None => Err(PersistenceError::NotFound(id)),
                    };
                    let _ = respond_to.send(result);
                }
            }
        }

        info!(size = self.orders.len(), "Order store shutdown");
    }

    fn save(&mut self, mut order: Order) -> Result<Order, PersistenceError> {
        let stored = self
            .orders
            .get_mut(&order.id)
            .ok_or(PersistenceError::NotFound(order.id))?;
        if stored.version != order.version {
            return Err(PersistenceError::Conflict {
                id: order.id,
                expected: order.version,
                found: stored.version,
            });
        }
        order.version += 1;
        *stored = order.clone();
        debug!(order_id = %order.id, status = %order.status, version = order.version, "Saved");
        Ok(order)
    }
}
