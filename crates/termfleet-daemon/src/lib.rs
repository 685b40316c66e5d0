//! Termfleet Daemon library
//!
//! This module provides the core components for the termfleet daemon:
//! - REST API handlers
//! - Storage backends
//! - DNS providers and the registration coordinator
//! - Reconciliation loop
//! - Server lifecycle management

pub mod api;
pub mod config;
pub mod dns;
pub mod error;
pub mod scheduler;
pub mod server;
pub mod storage;
pub mod validation;

pub use config::DaemonConfig;
pub use dns::{DnsProvider, DnsRegistrar, DnsResolver};
pub use error::{ApiError, DaemonError, DnsError, RegistrarError, StorageError};
pub use scheduler::{Reconciler, TickOutcome, TickReport};
pub use server::Server;
pub use storage::{InMemoryStorage, SqliteStorage, Storage};
