//! Daemon configuration and service control.

pub mod reconcile;
pub mod service;

pub use reconcile::{reconcile, Reconciliation};
pub use service::{restart_daemon, wait_active, ServiceState};
