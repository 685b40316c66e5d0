//! Termfleet Types - Workstation model and lifecycle rules
//!
//! Termfleet tracks a fleet of ephemeral remote-access hosts ("workstations"),
//! each reachable at a generated subdomain of the fleet's base domain.
//!
//! ## Key Concepts
//!
//! - **Workstation**: A tracked host with a lifecycle status and a DNS-backed address
//! - **WorkstationEvent**: Append-only audit entry for registrations and status changes
//! - **Lifecycle**: The pure transition rules applied after every health probe
//!
//! Nothing in this crate performs I/O. Storage, probing and DNS live in
//! `termfleet-health` and `termfleet-daemon`.

#![deny(unsafe_code)]
#![cfg_attr(feature = "strict-docs", warn(missing_docs))]
#![cfg_attr(not(feature = "strict-docs"), allow(missing_docs))]

pub mod events;
pub mod lifecycle;
pub mod workstation;

pub use events::{NewWorkstationEvent, WorkstationEvent, WorkstationEventType};
pub use lifecycle::{decide, should_prune, GracePeriods, Transition};
pub use workstation::{
    ParseStatusError, Workstation, WorkstationPatch, WorkstationStatus, WorkstationView,
};
