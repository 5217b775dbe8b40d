//! Runtime orchestration and lifecycle management.
//!
//! # Main Components
//!
//! - [`AutomationSystem`] - wires the store actor, engine and scheduler, and shuts them down in order
//! - [`setup_tracing`] - initializes the tracing/logging infrastructure

pub mod automation_system;
pub mod tracing;

pub use automation_system::*;
pub use tracing::*;
