//! Time-driven sweeps for the leadflow execution engine.
//!
//! Two things in the system move forward by clock rather than by event:
//! executions parked on a Wait node, and pending inputs whose reply never
//! arrived. The [`Sweeper`] handles both on a periodic tick.

pub mod sweeper;

pub use sweeper::{SweepReport, Sweeper};
