//! Offline replay of recorded runs.
//!
//! A [`ReplayInput`] carries everything one run needs: the published database
//! estimates, the fit results recorded for both fitters, and the events. It is
//! replayed interval by interval, with the events of each interval processed in
//! parallel.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::config::MonitorConfig;
use super::consistency::IntervalSummary;
use super::error::MonitorError;
use super::estimate::Estimate;
use super::monitor::BeamSpotMonitor;
use super::providers::{RecordedEstimates, RecordedFitter};
use super::sampling::EventData;

/// Recorded input of one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayInput {
    pub run: u32,
    /// Database estimates, by interval.
    pub database: HashMap<u32, Estimate>,
    /// Track-based fit results, by interval.
    pub track_fits: HashMap<u32, Estimate>,
    /// Vertex-based fit results, by interval.
    pub vertex_fits: HashMap<u32, Estimate>,
    /// Minimum number of events an interval needs for a fit result.
    pub min_fit_events: usize,
    pub events: Vec<EventData>,
}

impl ReplayInput {
    /// Events grouped by interval, in interval order.
    pub fn events_by_interval(&self) -> BTreeMap<u32, Vec<&EventData>> {
        let mut grouped: BTreeMap<u32, Vec<&EventData>> = BTreeMap::new();
        for event in &self.events {
            grouped.entry(event.interval).or_default().push(event);
        }
        grouped
    }

    /// Build a monitor wired to the recorded providers and fitters.
    pub fn monitor(&self, config: MonitorConfig) -> BeamSpotMonitor {
        BeamSpotMonitor::new(
            config,
            Arc::new(RecordedEstimates::new(self.database.clone())),
            Arc::new(RecordedFitter::new(self.track_fits.clone(), self.min_fit_events)),
            Arc::new(RecordedFitter::new(self.vertex_fits.clone(), self.min_fit_events)),
        )
    }
}

/// Outcome of a replay.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReplayOutcome {
    pub intervals: Vec<IntervalSummary>,
    pub rejected_events: usize,
    pub normalized_series: usize,
}

/// Replay `input` through `monitor`, ending the run afterwards.
///
/// Every interval from the first to the last one seen in the events is opened
/// and closed, so intervals without events still produce gap bins.
pub fn replay(monitor: &BeamSpotMonitor, input: &ReplayInput) -> Result<ReplayOutcome, MonitorError> {
    let grouped = input.events_by_interval();
    let mut outcome = ReplayOutcome::default();

    let (Some(first), Some(last)) = (grouped.keys().next().copied(), grouped.keys().last().copied())
    else {
        warn!("Run {} has no events", input.run);
        return Ok(outcome);
    };

    info!(
        "Replaying run {}: {} events over intervals {}..={}",
        input.run,
        input.events.len(),
        first,
        last
    );

    for interval in first..=last {
        monitor.begin_interval(interval)?;
        let events = grouped.get(&interval).map(Vec::as_slice).unwrap_or(&[]);
        let rejected: usize = events
            .par_iter()
            .map(|event| usize::from(monitor.analyze_event(event).is_err()))
            .sum();
        outcome.rejected_events += rejected;
        outcome.intervals.push(monitor.end_interval(interval)?);
    }

    outcome.normalized_series = monitor.end_run();
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam_monitor::catalog::TrendCategory;
    use crate::beam_monitor::estimate::{BeamSpotKind, Measurement, SourceKey, Variable};
    use crate::beam_monitor::sampling::Vertex;

    fn event(interval: u32) -> EventData {
        EventData {
            interval,
            vertices: Some(vec![Vertex {
                x: Measurement::new(0.011, 0.003),
                y: Measurement::new(0.0, 0.003),
                z: Measurement::new(0.0, 0.01),
                tracks_size: 20,
                is_fake: false,
            }]),
            ..EventData::default()
        }
    }

    #[test]
    fn test_replay_fills_gaps_between_intervals() {
        let db = Estimate::at_position(0.01, 0.0, 0.0, BeamSpotKind::Tracker);
        let input = ReplayInput {
            run: 1,
            database: HashMap::from([(1, db), (2, db), (3, db)]),
            events: vec![event(1), event(3), event(3)],
            ..ReplayInput::default()
        };
        let monitor = input.monitor(MonitorConfig {
            strict_protocol: false,
            ..MonitorConfig::default()
        });

        let outcome = replay(&monitor, &input).unwrap();
        assert_eq!(outcome.intervals.len(), 3);
        assert_eq!(outcome.intervals[1].vertices, 0);
        assert_eq!(outcome.intervals[2].vertices, 2);
        assert_eq!(outcome.rejected_events, 0);
        assert!(outcome.normalized_series > 0);

        let bins: Vec<u32> = monitor.with_store(|store| {
            store
                .query(Variable::X, TrendCategory::Source(SourceKey::Database))
                .unwrap()
                .iter()
                .map(|e| e.bin)
                .collect()
        });
        assert_eq!(bins, vec![1, 2, 3]);
    }

    #[test]
    fn test_empty_replay() {
        let input = ReplayInput::default();
        let monitor = input.monitor(MonitorConfig::default());
        let outcome = replay(&monitor, &input).unwrap();
        assert!(outcome.intervals.is_empty());
        assert_eq!(outcome.normalized_series, 0);
    }

    #[test]
    fn test_replay_input_from_json() {
        let input: ReplayInput = serde_json::from_str(
            r#"{
                "run": 12,
                "database": {"1": {
                    "x": {"value": 0.01, "error": 0.001},
                    "y": {"value": 0.02, "error": 0.001},
                    "z": {"value": 0.5, "error": 0.1},
                    "sigma_x": {"value": 0.002, "error": 0.0001},
                    "sigma_y": {"value": 0.002, "error": 0.0001},
                    "sigma_z": {"value": 4.0, "error": 0.2},
                    "kind": "Tracker"
                }},
                "events": [{"interval": 1, "tracks": [{"phi": 0.1, "vx": 0.0, "vy": 0.01}]}]
            }"#,
        )
        .unwrap();

        assert_eq!(input.run, 12);
        assert_eq!(input.database[&1].z.value, 0.5);
        assert_eq!(input.events[0].vertices, None);
        assert_eq!(input.events_by_interval().len(), 1);
    }
}
