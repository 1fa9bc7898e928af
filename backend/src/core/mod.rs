//! Core infrastructure: simulation clock, event queue, calendar helpers

pub mod queue;
pub mod time;

pub use queue::{EventQueue, QueueError};
pub use time::SimTime;
