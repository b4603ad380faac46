//! Network reachability sources

pub mod reachability_probe;

pub use reachability_probe::{probe_once, ReachabilityProbe};
