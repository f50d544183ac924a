//! Beam-Spot Consistency Monitor
//!
//! Compares the beam-spot position and width delivered by four independent
//! sources (conditions database, online scalers, track-based fit and
//! primary-vertex fit) interval by interval, and records values and pairwise
//! differences as interval-indexed series.
//!
//! Features:
//! - Interval-scoped cache written concurrently by event workers
//! - Merge of all sources at interval close with quadrature error propagation
//! - Static, enum-indexed catalog of distributions and time series
//! - End-of-run display range normalization
//! - JSON report export and offline replay
//!
//! ## Usage
//!
//! ```rust,ignore
//! use beamspot_monitor::beam_monitor::{BeamSpotMonitor, MonitorConfig};
//!
//! let monitor = BeamSpotMonitor::new(MonitorConfig::default(), database, track_fitter, vertex_fitter);
//! monitor.begin_interval(1)?;
//! events.par_iter().try_for_each(|event| monitor.analyze_event(event))?;
//! monitor.end_interval(1)?;
//! monitor.end_run();
//! let report = monitor.report();
//! ```

pub mod catalog;
pub mod config;
pub mod consistency;
pub mod error;
pub mod estimate;
pub mod histogram;
pub mod interval_cache;
pub mod monitor;
pub mod normalizer;
pub mod providers;
pub mod replay;
pub mod report;
pub mod sampling;
pub mod series;

pub use catalog::*;
pub use config::*;
pub use consistency::*;
pub use error::*;
pub use estimate::*;
pub use histogram::*;
pub use interval_cache::*;
pub use monitor::*;
pub use normalizer::*;
pub use providers::*;
pub use replay::*;
pub use report::*;
pub use sampling::*;
pub use series::*;
