//! Order aggregate and its value types.

pub mod order;
pub mod status;

pub use order::*;
pub use status::*;
