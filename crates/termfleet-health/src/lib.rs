//! # Termfleet Health - Workstation reachability probes
//!
//! A probe is a single, time-boxed HTTP check against a workstation's public
//! endpoint. HTTP 200 is a success; timeouts, connection errors and any other
//! status are failures. Probes never retry: retrying is the reconciliation
//! cadence's job.
//!
//! ## Key Components
//!
//! - [`HealthProber`]: trait implemented by probe backends
//! - [`HttpProber`]: reqwest-backed prober used in production
//! - [`probe_all`]: bounded concurrent fan-out over a batch of targets
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::time::Duration;
//! use termfleet_health::{HealthProber, HttpProber, HttpProberConfig};
//!
//! # async fn example() -> termfleet_health::HealthResult<()> {
//! let prober = HttpProber::new(&HttpProberConfig::default())?;
//! let result = prober.probe("desk1.fleet.example", Duration::from_secs(10)).await;
//! println!("reachable: {}", result.success);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod fanout;
pub mod probes;

pub use error::{HealthError, HealthResult};
pub use fanout::probe_all;
pub use probes::{probe_target, HealthProber, HttpProber, HttpProberConfig, ProbeResult};
