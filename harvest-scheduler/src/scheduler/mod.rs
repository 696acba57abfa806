//! Scheduler layer
//!
//! The recurrence engine is the process's main control loop: on every tick
//! it evaluates the daily trigger rules and hands due actions to the
//! dispatcher without waiting for them.

pub mod clock;
pub mod engine;

pub use clock::{Clock, LocalClock};
pub use engine::RecurrenceEngine;
