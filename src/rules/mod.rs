//! Status rules: the directed edges of the order state machine.
//!
//! A [`StatusRule`] binds `from → to` to a pure condition, an optional
//! minimum dwell time and an optional side-effecting [`RuleAction`]. Rules
//! live in a [`RuleTable`], validated once at construction and never mutated
//! afterwards.

pub mod canonical;
pub mod table;

pub use canonical::*;
pub use table::*;

use crate::clock::Clock;
use crate::model::{Order, OrderStatus};
use crate::notify::{DispatchError, Notifier};
use crate::store::{OrderStore, PersistenceError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use thiserror::Error;

/// A condition could not be evaluated (malformed order, missing data).
#[derive(Debug, Clone, Error, PartialEq)]
#[error("Condition could not be evaluated: {0}")]
pub struct ConditionError(pub String);

/// Pure predicate over an order snapshot at a given instant.
pub type Condition = Arc<dyn Fn(&Order, DateTime<Utc>) -> Result<bool, ConditionError> + Send + Sync>;

/// Errors raised by a rule's side effect. They never undo the transition.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum ActionError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    #[error("Action failed: {0}")]
    Failed(String),
}

/// Collaborators handed to every [`RuleAction`].
#[derive(Clone)]
pub struct ActionContext {
    pub store: Arc<dyn OrderStore>,
    pub notifier: Notifier,
    pub clock: Arc<dyn Clock>,
}

/// Side effect run once, after the transition is persisted and before
/// notifications go out.
///
/// The order passed in is the persisted post-transition snapshot. An action
/// that changes it must save it through `ctx.store` and leave the saved copy
/// in place, so the notifications that follow see the same data.
#[async_trait]
pub trait RuleAction: Send + Sync {
    fn name(&self) -> &'static str;

    async fn run(&self, order: &mut Order, ctx: &ActionContext) -> Result<(), ActionError>;
}

#[derive(Clone)]
pub struct StatusRule {
    pub name: String,
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Minimum time since the last status change before the rule may fire.
    pub delay: Option<Duration>,
    condition: Condition,
    action: Option<Arc<dyn RuleAction>>,
}

impl StatusRule {
    /// A rule whose condition may fail to evaluate.
    pub fn new(
        name: impl Into<String>,
        from: OrderStatus,
        to: OrderStatus,
        condition: impl Fn(&Order, DateTime<Utc>) -> Result<bool, ConditionError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            from,
            to,
            delay: None,
            condition: Arc::new(condition),
            action: None,
        }
    }

    /// A rule with an infallible predicate.
    pub fn when(
        name: impl Into<String>,
        from: OrderStatus,
        to: OrderStatus,
        predicate: impl Fn(&Order, DateTime<Utc>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self::new(name, from, to, move |order, now| Ok(predicate(order, now)))
    }

    pub fn with_delay_minutes(mut self, minutes: i64) -> Self {
        self.delay = Some(Duration::minutes(minutes));
        self
    }

    pub fn with_action(mut self, action: impl RuleAction + 'static) -> Self {
        self.action = Some(Arc::new(action));
        self
    }

    pub fn condition_holds(&self, order: &Order, now: DateTime<Utc>) -> Result<bool, ConditionError> {
        (self.condition)(order, now)
    }

    /// True when no delay is set or the order has dwelt in its status long enough.
    pub fn dwell_satisfied(&self, order: &Order, now: DateTime<Utc>) -> bool {
        match self.delay {
            None => true,
            Some(delay) => now - order.status_changed_at() >= delay,
        }
    }

    pub fn action(&self) -> Option<&Arc<dyn RuleAction>> {
        self.action.as_ref()
    }
}

impl Debug for StatusRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StatusRule")
            .field("name", &self.name)
            .field("from", &self.from)
            .field("to", &self.to)
            .field("delay", &self.delay)
            .field("action", &self.action.as_ref().map(|a| a.name()))
            .finish_non_exhaustive()
    }
}
