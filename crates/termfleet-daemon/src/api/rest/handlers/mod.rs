//! API request handlers

mod system;
mod workstations;

pub use system::*;
pub use workstations::*;
