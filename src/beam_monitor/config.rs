//! Beam-spot monitor configuration

use serde::{Deserialize, Serialize};

/// Main configuration for the beam-spot monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitorConfig {
    /// Folder prefix for every series ("<name>/Debug", "<name>/Validation")
    pub monitor_name: String,

    /// Minimum number of tracks for a vertex to be sampled
    pub min_vertex_tracks: usize,

    /// Per-interval saving mode: no series catalog is booked
    pub per_interval_saving: bool,

    /// First interval of the time-series binning
    pub first_interval: u32,

    /// Last interval of the time-series binning
    pub last_interval: u32,

    /// Panic on protocol misuse instead of logging and returning an error
    pub strict_protocol: bool,

    /// End-of-run display range settings
    pub normalization: NormalizationConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            monitor_name: "AlcaBeamMonitor".into(),
            min_vertex_tracks: 10,
            per_interval_saving: false,
            first_interval: 1,
            last_interval: 3000,
            strict_protocol: cfg!(debug_assertions),
            normalization: NormalizationConfig::default(),
        }
    }
}

impl MonitorConfig {
    /// Folder for a series, e.g. "AlcaBeamMonitor/Debug".
    pub fn folder(&self, leaf: &str) -> String {
        if self.monitor_name.is_empty() {
            leaf.to_string()
        } else {
            format!("{}/{}", self.monitor_name, leaf)
        }
    }
}

/// Display range padding applied at the end of the run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizationConfig {
    /// Padding factor for absolute-value series
    pub absolute_padding: f64,
    /// Padding factor for difference series
    pub difference_padding: f64,
    /// Margin added around degenerate (empty or flat) series
    pub degenerate_margin: f64,
}

impl Default for NormalizationConfig {
    fn default() -> Self {
        Self {
            absolute_padding: 0.1,
            difference_padding: 2.0,
            degenerate_margin: 0.01,
        }
    }
}
