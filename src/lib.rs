//! # Order Automation
//!
//! > **A timer-driven state machine that moves orders through their lifecycle.**
//!
//! On every tick the engine loads all orders in a non-terminal status,
//! evaluates an ordered rule table against each one, commits at most one
//! transition per order, runs the rule's side effect, and fans out
//! notifications for the new status.
//!
//! ```text
//! pending → processing → ready_to_ship → shipped → delivered → completed
//! ```
//!
//! Any non-terminal order may also be cancelled out-of-band through the store.
//!
//! ## Architecture Notes
//!
//! ### 1. Failure isolation
//! Nothing that goes wrong with one order reaches another. A condition that
//! cannot be evaluated or a failed save leaves that order untouched until the
//! next tick. A failing action or notification is logged and recorded, and
//! the committed transition stands. Only a failed sweep query skips a tick.
//!
//! ### 2. Closed tables
//! The [`RuleTable`](rules::RuleTable) is validated once (no rule leaves a
//! terminal status, no cycles) and never mutated. The
//! [`NotificationTable`](notify::NotificationTable) is indexed by the
//! [`OrderStatus`](model::OrderStatus) enum, not by strings.
//!
//! ### 3. Injected collaborators
//! Persistence ([`OrderStore`](store::OrderStore)), delivery
//! ([`NotificationDispatcher`](notify::NotificationDispatcher)), time
//! ([`Clock`](clock::Clock)) and subscribers ([`EventBus`](events::EventBus))
//! are all passed in. The engine has no globals.
//!
//! ### 4. Observability
//! `tracing` everywhere, with `order_id` spans around every evaluation. See
//! [`lifecycle::tracing`].
//!
//! ## Module Tour
//!
//! - [`model`] - orders, statuses and the append-only status history
//! - [`rules`] - status rules, actions and the canonical lifecycle
//! - [`engine`] - the transition executor, the sweep and the execution journal
//! - [`notify`] - notification table, recipient resolution and fan-out
//! - [`store`] - the persistence boundary, an actor-backed in-memory store and a mock
//! - [`scheduler`] - fixed-interval jobs and the housekeeping tasks
//! - [`lifecycle`] - [`AutomationSystem`](lifecycle::AutomationSystem) wiring and shutdown
//!
//! ## Running the Demo
//!
//! ```bash
//! RUST_LOG=info cargo run
//! cargo run -- --serve --config OrderAutomation.toml
//! ```

pub mod cli;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod events;
pub mod lifecycle;
pub mod model;
pub mod notify;
pub mod rules;
pub mod scheduler;
pub mod store;
