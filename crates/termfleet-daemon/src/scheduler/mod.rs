//! Periodic reconciliation of recorded workstation state

mod reconciler;

pub use reconciler::{Reconciler, TickOutcome, TickReport};
