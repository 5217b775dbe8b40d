//! # Mock Order Store
//!
//! Utilities for testing the engine against scripted persistence behaviour.
//!
//! [`MockOrderStore`] hands out a real [`OrderStoreClient`] whose channel is
//! served by a background task that pops expectations in order. Use it to
//! inject query failures or write conflicts the in-memory actor would never
//! produce on its own.

use crate::model::Order;
use crate::store::{OrderStoreClient, PersistenceError, StoreRequest};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// Represents an expected request to the mock store.
enum Expectation {
    Find {
        response: Result<Vec<Order>, PersistenceError>,
    },
    Get {
        response: Result<Option<Order>, PersistenceError>,
    },
    Save {
        /// `None` echoes the saved order back with its version bumped.
        response: Option<Result<Order, PersistenceError>>,
    },
}

/// A mock store with expectation tracking for fluent testing.
///
/// # Example
/// ```ignore
/// let mut mock = MockOrderStore::new();
/// mock.expect_find().return_ok(vec![order]);
/// mock.expect_save().return_err(PersistenceError::Unavailable("db down".into()));
///
/// let store = mock.client();
/// // Hand `store` to the engine...
/// mock.verify(); // Ensures all expectations were met
/// ```
pub struct MockOrderStore {
    client: OrderStoreClient,
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
    saved: Arc<Mutex<Vec<Order>>>,
    _handle: tokio::task::JoinHandle<()>,
}

impl MockOrderStore {
    /// Creates a new mock store with no expectations.
    pub fn new() -> Self {
        let (sender, mut receiver) = mpsc::channel::<StoreRequest>(100);
        let expectations: Arc<Mutex<VecDeque<Expectation>>> = Arc::new(Mutex::new(VecDeque::new()));
        let saved = Arc::new(Mutex::new(Vec::new()));
        let expectations_clone = expectations.clone();
        let saved_clone = saved.clone();

        let handle = tokio::spawn(async move {
            while let Some(request) = receiver.recv().await {
                let expectation = expectations_clone.lock().unwrap().pop_front();

                match (request, expectation) {
                    (StoreRequest::FindByStatuses { respond_to, .. }, Some(Expectation::Find { response })) => {
                        let _ = respond_to.send(response);
                    }
                    (StoreRequest::Get { respond_to, .. }, Some(Expectation::Get { response })) => {
                        let _ = respond_to.send(response);
                    }
                    (StoreRequest::Save { order, respond_to }, Some(Expectation::Save { response })) => {
                        let response = response.unwrap_or_else(|| {
                            let mut order = order.clone();
                            order.version += 1;
                            Ok(order)
                        });
                        if let Ok(stored) = &response {
                            saved_clone.lock().unwrap().push(stored.clone());
                        }
                        let _ = respond_to.send(response);
                    }
                    _ => {
                        panic!("Unexpected request or expectation mismatch");
                    }
                }
            }
        });

        Self {
            client: OrderStoreClient::new(sender),
            expectations,
            saved,
            _handle: handle,
        }
    }

    /// Returns the client for use in tests.
    pub fn client(&self) -> OrderStoreClient {
        self.client.clone()
    }

    /// Expects a `find_by_statuses` query.
    pub fn expect_find(&mut self) -> FindExpectationBuilder {
        FindExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    /// Expects a `find_by_id` lookup.
    pub fn expect_get(&mut self) -> GetExpectationBuilder {
        GetExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    /// Expects a `save`.
    pub fn expect_save(&mut self) -> SaveExpectationBuilder {
        SaveExpectationBuilder {
            expectations: self.expectations.clone(),
        }
    }

    /// Orders accepted by successful saves, in arrival order.
    pub fn saved(&self) -> Vec<Order> {
        self.saved.lock().unwrap().clone()
    }

    /// Verifies that all expectations were met.
    pub fn verify(&self) {
        let exps = self.expectations.lock().unwrap();
        if !exps.is_empty() {
            panic!("Not all expectations were met. {} remaining", exps.len());
        }
    }
}

impl Default for MockOrderStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `find_by_statuses` expectations.
pub struct FindExpectationBuilder {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl FindExpectationBuilder {
    pub fn return_ok(self, orders: Vec<Order>) {
        self.expectations.lock().unwrap().push_back(Expectation::Find { response: Ok(orders) });
    }

    pub fn return_err(self, error: PersistenceError) {
        self.expectations.lock().unwrap().push_back(Expectation::Find { response: Err(error) });
    }
}

/// Builder for `find_by_id` expectations.
pub struct GetExpectationBuilder {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl GetExpectationBuilder {
    pub fn return_ok(self, order: Option<Order>) {
        self.expectations.lock().unwrap().push_back(Expectation::Get { response: Ok(order) });
    }

    pub fn return_err(self, error: PersistenceError) {
        self.expectations.lock().unwrap().push_back(Expectation::Get { response: Err(error) });
    }
}

/// Builder for `save` expectations.
pub struct SaveExpectationBuilder {
    expectations: Arc<Mutex<VecDeque<Expectation>>>,
}

impl SaveExpectationBuilder {
    /// Accepts the save and echoes the order back with its version bumped.
    pub fn accept(self) {
        self.expectations.lock().unwrap().push_back(Expectation::Save { response: None });
    }

    pub fn return_err(self, error: PersistenceError) {
        self.expectations
            .lock()
            .unwrap()
            .push_back(Expectation::Save { response: Some(Err(error)) });
    }
}
