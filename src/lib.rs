//! Beam-Spot Monitor Library
//!
//! Exposes the consistency monitor for use by the replay binary and tests.

pub mod beam_monitor;

pub use beam_monitor::{BeamSpotMonitor, MonitorConfig, MonitorReport};
