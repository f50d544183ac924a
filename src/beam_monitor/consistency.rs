//! Interval-close merge of all sources into the series store.
//!
//! For every variable the sources are projected to `(value, error)` pairs,
//! keeping tracker-kind estimates only. Each booked catalog entry is then
//! computed from that projection; an entry whose operands are missing is
//! skipped for this interval and leaves a gap in its series.

use std::sync::Arc;

use tracing::{debug, info};

use super::catalog::{DistributionCategory, Reference, TrendCategory};
use super::error::MonitorError;
use super::estimate::{Measurement, SourceKey, SourceValues, Variable};
use super::interval_cache::{IntervalCache, IntervalHandle, IntervalState};
use super::providers::BeamSpotFitter;
use super::sampling::{EventData, VertexSample};
use super::series::SeriesStore;

/// What one interval contributed to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IntervalSummary {
    pub interval: u32,
    pub sources: usize,
    pub vertices: usize,
    pub distribution_fills: usize,
    pub trend_bins: usize,
}

/// Drives the two fitters and computes every catalog entry at interval close.
pub struct ConsistencyEngine {
    track_fitter: Arc<dyn BeamSpotFitter>,
    vertex_fitter: Arc<dyn BeamSpotFitter>,
}

impl ConsistencyEngine {
    pub fn new(track_fitter: Arc<dyn BeamSpotFitter>, vertex_fitter: Arc<dyn BeamSpotFitter>) -> Self {
        Self {
            track_fitter,
            vertex_fitter,
        }
    }

    /// Hand one event to both fitters.
    pub fn submit(&self, event: &EventData) {
        self.track_fitter.submit(event);
        self.vertex_fitter.submit(event);
    }

    /// Run both fitters for a closing interval, install their results, and
    /// reset them. Insufficient data leaves the source absent.
    pub fn resolve_fits(
        &self,
        cache: &IntervalCache,
        handle: &IntervalHandle,
    ) -> Result<(), MonitorError> {
        let fits = [
            (SourceKey::TrackFit, &self.track_fitter),
            (SourceKey::VertexFit, &self.vertex_fitter),
        ];
        let mut outcome = Ok(());
        for (key, fitter) in fits {
            match fitter.fit() {
                Some(estimate) => {
                    if let Err(err) = cache.set_source_estimate(handle, key, estimate) {
                        outcome = Err(err);
                    }
                }
                None => info!("No {} result for interval {}", key, handle.id()),
            }
            fitter.reset();
        }
        outcome
    }

    /// Write the closed interval into the store.
    pub fn process(&self, state: &IntervalState, store: &mut SeriesStore) -> IntervalSummary {
        let mut summary = IntervalSummary {
            interval: state.id,
            sources: state.sources.len(),
            vertices: state.vertex_count(),
            ..IntervalSummary::default()
        };

        let fill_distributions = store.claim_distribution_fill(state.id);
        if !fill_distributions {
            debug!(
                "Interval {} already counted in the distributions, refreshing trends only",
                state.id
            );
        }

        for variable in Variable::ALL {
            let values = state.sources.project(variable);
            let vertices: Vec<Measurement> = state
                .vertex_samples()
                .filter_map(|sample: &VertexSample| sample.measurement(variable))
                .collect();

            if fill_distributions {
                for category in DistributionCategory::ALL {
                    for value in distribution_values(category, &values, &vertices) {
                        if store.fill(variable, category, value) {
                            summary.distribution_fills += 1;
                        }
                    }
                }
            }

            for category in TrendCategory::ALL {
                let Some(points) = trend_points(category, &values, &vertices) else {
                    continue;
                };
                if store.append(variable, category, state.id, points) {
                    summary.trend_bins += 1;
                }
            }
        }

        debug!(
            "Interval {}: {} sources, {} vertices, {} distribution fills, {} trend bins",
            summary.interval,
            summary.sources,
            summary.vertices,
            summary.distribution_fills,
            summary.trend_bins
        );
        summary
    }
}

/// Values a run-scope distribution receives for one interval.
fn distribution_values(
    category: DistributionCategory,
    values: &SourceValues,
    vertices: &[Measurement],
) -> Vec<f64> {
    let fit = values.get(SourceKey::VertexFit);
    match category {
        DistributionCategory::Coordinate => values
            .get(SourceKey::Database)
            .map(|db| vec![db.value])
            .unwrap_or_default(),
        DistributionCategory::FitMinus(reference) => values
            .difference(SourceKey::VertexFit, reference.source())
            .map(|d| vec![d.value])
            .unwrap_or_default(),
        DistributionCategory::VertexMinus(reference) => match (fit, values.get(reference.source())) {
            (Some(_), Some(other)) => vertices.iter().map(|v| v.value - other.value).collect(),
            _ => Vec::new(),
        },
    }
}

/// Points a time series receives for one interval, or `None` for a gap.
fn trend_points(
    category: TrendCategory,
    values: &SourceValues,
    vertices: &[Measurement],
) -> Option<Vec<Measurement>> {
    let per_vertex = |reference: Reference| -> Option<Vec<Measurement>> {
        let other = values.get(reference.source())?;
        if vertices.is_empty() {
            return None;
        }
        Some(vertices.iter().map(|v| v.minus(other)).collect())
    };

    match category {
        TrendCategory::Source(key) => values.get(key).map(|m| vec![m]),
        TrendCategory::FitMinusDatabase => values
            .difference(SourceKey::VertexFit, SourceKey::Database)
            .map(|d| vec![d]),
        TrendCategory::FitMinusOnline => values
            .difference(SourceKey::VertexFit, SourceKey::OnlineScaler)
            .map(|d| vec![d]),
        TrendCategory::OnlineMinusDatabase => values
            .difference(SourceKey::OnlineScaler, SourceKey::Database)
            .map(|d| vec![d]),
        TrendCategory::VertexMinusDatabase => per_vertex(Reference::Database),
        TrendCategory::VertexMinusOnline => per_vertex(Reference::OnlineScaler),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam_monitor::config::MonitorConfig;
    use crate::beam_monitor::estimate::{BeamSpotKind, Estimate, SourceSet};
    use parking_lot::Mutex;

    #[derive(Default)]
    struct FixedFitter {
        result: Option<Estimate>,
        submitted: Mutex<usize>,
        resets: Mutex<usize>,
    }

    impl BeamSpotFitter for FixedFitter {
        fn submit(&self, _event: &EventData) {
            *self.submitted.lock() += 1;
        }

        fn fit(&self) -> Option<Estimate> {
            self.result
        }

        fn reset(&self) {
            *self.resets.lock() += 1;
        }
    }

    fn engine() -> ConsistencyEngine {
        ConsistencyEngine::new(Arc::new(FixedFitter::default()), Arc::new(FixedFitter::default()))
    }

    fn estimate_x(value: f64, error: f64) -> Estimate {
        Estimate {
            x: Measurement::new(value, error),
            z: Measurement::new(value * 100.0, error * 10.0),
            sigma_x: Measurement::new(0.002, 0.0001),
            kind: BeamSpotKind::Tracker,
            ..Estimate::default()
        }
    }

    fn vertex_x(x: f64) -> VertexSample {
        VertexSample {
            x: Measurement::new(x, 0.003),
            y: Measurement::new(0.0, 0.003),
            z: Measurement::new(0.0, 0.01),
        }
    }

    #[test]
    fn test_empty_interval_leaves_gaps() {
        let mut store = SeriesStore::new(&MonitorConfig::default());
        let summary = engine().process(&IntervalState { id: 3, ..IntervalState::default() }, &mut store);

        assert_eq!(summary.trend_bins, 0);
        assert_eq!(summary.distribution_fills, 0);
        assert!(store.trends().all(|(_, _, t)| t.series.is_empty()));
    }

    #[test]
    fn test_differences_use_quadrature_errors() {
        let mut sources = SourceSet::default();
        sources.insert(SourceKey::VertexFit, estimate_x(0.012, 0.002));
        sources.insert(SourceKey::OnlineScaler, estimate_x(0.015, 0.004));
        sources.insert(SourceKey::Database, estimate_x(0.01, 0.001));
        let state = IntervalState {
            id: 12,
            sources,
            vertices: Vec::new(),
        };
        let mut store = SeriesStore::new(&MonitorConfig::default());
        engine().process(&state, &mut store);

        let cases = [
            (TrendCategory::FitMinusDatabase, 0.012 - 0.01, 0.002f64.hypot(0.001)),
            (TrendCategory::FitMinusOnline, 0.012 - 0.015, 0.002f64.hypot(0.004)),
            (TrendCategory::OnlineMinusDatabase, 0.015 - 0.01, 0.004f64.hypot(0.001)),
        ];
        for (category, value, error) in cases {
            let entries = store.query(Variable::X, category).unwrap();
            assert_eq!(entries.len(), 1, "{:?}", category);
            assert_eq!(entries[0].bin, 12);
            assert_eq!(entries[0].value, value);
            assert!((entries[0].error - error).abs() < 1e-15);
        }
        // No vertices: per-vertex series stay empty.
        assert!(store
            .query(Variable::X, TrendCategory::VertexMinusDatabase)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_non_tracker_sources_are_ignored() {
        let mut sources = SourceSet::default();
        sources.insert(SourceKey::VertexFit, estimate_x(0.012, 0.002));
        sources.insert(
            SourceKey::Database,
            estimate_x(0.01, 0.001).with_kind(BeamSpotKind::Fake),
        );
        let state = IntervalState {
            id: 2,
            sources,
            vertices: vec![vec![vertex_x(0.011)]],
        };
        let mut store = SeriesStore::new(&MonitorConfig::default());
        engine().process(&state, &mut store);

        assert!(store
            .query(Variable::X, TrendCategory::Source(SourceKey::Database))
            .unwrap()
            .is_empty());
        assert!(store
            .query(Variable::X, TrendCategory::FitMinusDatabase)
            .unwrap()
            .is_empty());
        assert_eq!(
            store
                .query(Variable::X, TrendCategory::Source(SourceKey::VertexFit))
                .unwrap()
                .len(),
            1
        );
    }

    #[test]
    fn test_widths_only_fill_absolute_entries() {
        let mut sources = SourceSet::default();
        sources.insert(SourceKey::VertexFit, estimate_x(0.012, 0.002));
        sources.insert(SourceKey::Database, estimate_x(0.01, 0.001));
        let state = IntervalState {
            id: 7,
            sources,
            vertices: vec![vec![vertex_x(0.011)]],
        };
        let mut store = SeriesStore::new(&MonitorConfig::default());
        engine().process(&state, &mut store);

        let db_width = store
            .query(Variable::SigmaX, TrendCategory::Source(SourceKey::Database))
            .unwrap();
        assert_eq!(db_width.len(), 1);
        assert_eq!(db_width[0].value, 0.002);
        assert!(store
            .query(Variable::SigmaX, TrendCategory::FitMinusDatabase)
            .is_none());
        let coordinate = store
            .distribution(Variable::SigmaX, DistributionCategory::Coordinate)
            .unwrap();
        assert_eq!(coordinate.histogram.entries(), 1);
    }

    #[test]
    fn test_vertex_distribution_requires_vertex_fit() {
        let mut sources = SourceSet::default();
        sources.insert(SourceKey::Database, estimate_x(0.01, 0.001));
        let state = IntervalState {
            id: 4,
            sources,
            vertices: vec![vec![vertex_x(0.011), vertex_x(0.013)]],
        };
        let mut store = SeriesStore::new(&MonitorConfig::default());
        engine().process(&state, &mut store);

        let dist = store
            .distribution(Variable::X, DistributionCategory::VertexMinus(Reference::Database))
            .unwrap();
        assert_eq!(dist.histogram.entries(), 0);
        // The per-vertex trend only needs the reference source.
        assert_eq!(
            store
                .query(Variable::X, TrendCategory::VertexMinusDatabase)
                .unwrap()
                .len(),
            2
        );
    }

    #[test]
    fn test_reprocessing_overwrites_instead_of_duplicating() {
        let mut sources = SourceSet::default();
        sources.insert(SourceKey::Database, estimate_x(0.01, 0.001));
        let state = IntervalState {
            id: 9,
            sources,
            vertices: vec![vec![vertex_x(0.011)], vec![vertex_x(0.009)]],
        };
        let mut store = SeriesStore::new(&MonitorConfig::default());
        let engine = engine();
        engine.process(&state, &mut store);
        let first: Vec<_> = store.trends().map(|(_, _, t)| t.series.entries()).collect();
        let again = engine.process(&state, &mut store);
        assert_eq!(again.distribution_fills, 0);
        let second: Vec<_> = store.trends().map(|(_, _, t)| t.series.entries()).collect();

        assert_eq!(first, second);
        assert_eq!(
            store
                .query(Variable::X, TrendCategory::VertexMinusDatabase)
                .unwrap()
                .len(),
            2
        );
        let coordinate = store
            .distribution(Variable::X, DistributionCategory::Coordinate)
            .unwrap();
        assert_eq!(coordinate.histogram.entries(), 1);
    }

    #[test]
    fn test_resolve_fits_installs_results_and_resets() {
        let track = Arc::new(FixedFitter::default());
        let vertex = Arc::new(FixedFitter {
            result: Some(estimate_x(0.012, 0.002)),
            ..FixedFitter::default()
        });
        let engine = ConsistencyEngine::new(track.clone(), vertex.clone());
        let cache = IntervalCache::new(
            Arc::new(crate::beam_monitor::providers::UnavailableProvider),
            false,
        );
        let handle = cache.open(1).unwrap();

        engine.submit(&EventData::default());
        engine.resolve_fits(&cache, &handle).unwrap();

        assert!(!handle.has_source(SourceKey::TrackFit));
        assert!(handle.has_source(SourceKey::VertexFit));
        assert_eq!(*track.submitted.lock(), 1);
        assert_eq!(*track.resets.lock(), 1);
        assert_eq!(*vertex.resets.lock(), 1);
    }
}
