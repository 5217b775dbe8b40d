//! Order persistence boundary.
//!
//! The engine only ever sees the [`OrderStore`] trait. This module also ships
//! an actor-backed in-memory implementation ([`OrderStoreActor`] +
//! [`OrderStoreClient`]) and an expectation-driven [`mock::MockOrderStore`].
//!
//! # Main Components
//!
//! - [`OrderStore`] - query-by-status, lookup and compare-and-save
//! - [`OrderStoreActor`] - owns the orders, processes requests sequentially
//! - [`OrderStoreClient`] - cloneable handle that talks to the actor
//!
//! # Testing
//!
//! See [`mock`] for a store whose responses are scripted by the test.

pub mod actor;
pub mod client;
pub mod mock;

pub use actor::*;
pub use client::*;

use crate::model::{Order, OrderId, OrderStatus};
use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by an [`OrderStore`].
#[derive(Debug, Clone, Error, PartialEq)]
pub enum PersistenceError {
    /// The requested order was not found.
    #[error("Order not found: {0}")]
    NotFound(OrderId),

    /// The order was saved by someone else since it was loaded.
    #[error("Write conflict on {id}: expected version {expected}, stored version {found}")]
    Conflict {
        id: OrderId,
        expected: u64,
        found: u64,
    },

    /// The backing store could not be reached.
    #[error("Order store unavailable: {0}")]
    Unavailable(String),
}

/// The narrow slice of order persistence the engine depends on.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// All orders whose status is one of `statuses`.
    async fn find_by_statuses(&self, statuses: &[OrderStatus]) -> Result<Vec<Order>, PersistenceError>;

    async fn find_by_id(&self, id: OrderId) -> Result<Option<Order>, PersistenceError>;

    /// Compare-and-save: succeeds only if `order.version` matches the stored
    /// version, and returns the order with its version bumped.
    async fn save(&self, order: Order) -> Result<Order, PersistenceError>;
}
