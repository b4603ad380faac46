//! Network reachability tracking
//!
//! [`ConnectivityMonitor`] holds the latest observed [`NetworkPath`] and is the
//! process-wide answer to "are we online right now". Path observations come
//! from an external source (a platform path monitor, or the reachability probe
//! in the infra crate); the monitor only records and publishes them.
//!
//! [`ConnectivityGate`] is the narrow view the retry executor needs.

pub mod monitor;

pub use monitor::{ConnectionType, ConnectivityGate, ConnectivityMonitor, NetworkPath};
