//! # Transition Engine
//!
//! - [`TransitionExecutor`] - evaluates one order against the rule table and commits at most one transition
//! - [`StatusSweep`] - one pass over every non-terminal order, bounded concurrency
//! - [`AutomationJournal`] - per-rule execution counters and a bounded log of outcomes

pub mod executor;
pub mod journal;
pub mod sweep;

pub use executor::*;
pub use journal::*;
pub use sweep::*;
