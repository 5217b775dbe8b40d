use crate::model::{NewOrder, Order, OrderId, OrderStatus};
use crate::store::{OrderStore, PersistenceError, StoreRequest};
use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, instrument};

/// A cloneable handle to an [`OrderStoreActor`](crate::store::OrderStoreActor).
#[derive(Clone)]
pub struct OrderStoreClient {
    sender: mpsc::Sender<StoreRequest>,
}

impl OrderStoreClient {
    pub fn new(sender: mpsc::Sender<StoreRequest>) -> Self {
        Self { sender }
    }

    /// Checkout entry point: stores a new order and returns it with its id.
    #[instrument(skip(self, params))]
    pub async fn create(&self, params: NewOrder) -> Result<Order, PersistenceError> {
        debug!("Sending request");
        self.request(|respond_to| StoreRequest::Create { params, respond_to }).await
    }

    /// Cancels an order out-of-band. Terminal orders are returned unchanged.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: OrderId) -> Result<Order, PersistenceError> {
        debug!("Sending request");
        self.request(|respond_to| StoreRequest::Cancel { id, respond_to }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<Result<T, PersistenceError>>) -> StoreRequest,
    ) -> Result<T, PersistenceError> {
        let (respond_to, response) = oneshot::channel();
        self.sender
            .send(build(respond_to))
            .await
            .map_err(|_| PersistenceError::Unavailable("order store closed".into()))?;
        response
            .await
            .map_err(|_| PersistenceError::Unavailable("order store dropped response channel".into()))?
    }
}

#[async_trait]
impl OrderStore for OrderStoreClient {
    async fn find_by_statuses(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, PersistenceError> {
        let statuses = statuses.to_vec();
        self.request(|respond_to| StoreRequest::FindByStatuses { statuses, respond_to })
            .await
    }

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, PersistenceError> {
        self.request(|respond_to| StoreRequest::Get { id, respond_to }).await
    }

    async fn save(&self, order: Order) -> Result<Order, PersistenceError> {
        self.request(|respond_to| StoreRequest::Save { order, respond_to }).await
    }
}
