//! Run-level driver: interval lifecycle, event sampling and the end-of-run pass.
//!
//! `analyze_event` may be called from any number of threads. `begin_interval`,
//! `end_interval` and `end_run` are expected from a single driver thread, and an
//! interval is only ended once no worker records into it anymore.

use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{info, warn};

use super::config::MonitorConfig;
use super::consistency::{ConsistencyEngine, IntervalSummary};
use super::error::MonitorError;
use super::estimate::{BeamSpotKind, Estimate, SourceKey};
use super::interval_cache::{IntervalCache, IntervalHandle};
use super::normalizer::{RangeNormalizer, RunAccumulator};
use super::providers::{BeamSpotFitter, EstimateProvider};
use super::report::MonitorReport;
use super::sampling::{select_vertices, AuxiliaryDistributions, EventData};
use super::series::SeriesStore;

/// Classify an online scaler beam spot: a zero width means no real measurement.
pub fn classify_online_scaler(estimate: Estimate) -> Estimate {
    let kind = if estimate.sigma_x.value != 0.0 {
        BeamSpotKind::Tracker
    } else {
        BeamSpotKind::Fake
    };
    estimate.with_kind(kind)
}

/// The beam-spot consistency monitor.
pub struct BeamSpotMonitor {
    config: MonitorConfig,
    cache: IntervalCache,
    engine: ConsistencyEngine,
    normalizer: RangeNormalizer,
    store: Mutex<SeriesStore>,
    auxiliary: Mutex<AuxiliaryDistributions>,
    run: Mutex<RunAccumulator>,
}

impl BeamSpotMonitor {
    pub fn new(
        config: MonitorConfig,
        database: Arc<dyn EstimateProvider>,
        track_fitter: Arc<dyn BeamSpotFitter>,
        vertex_fitter: Arc<dyn BeamSpotFitter>,
    ) -> Self {
        let store = SeriesStore::new(&config);
        info!(
            "Booked {} time series for monitor {}",
            store.booked_trends(),
            config.monitor_name
        );
        Self {
            cache: IntervalCache::new(database, config.strict_protocol),
            engine: ConsistencyEngine::new(track_fitter, vertex_fitter),
            normalizer: RangeNormalizer::new(config.normalization.clone()),
            store: Mutex::new(store),
            auxiliary: Mutex::new(AuxiliaryDistributions::default()),
            run: Mutex::new(RunAccumulator::default()),
            config,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn cache(&self) -> &IntervalCache {
        &self.cache
    }

    /// Open an interval. Always creates the interval state, even if no event
    /// will ever reach it.
    pub fn begin_interval(&self, interval: u32) -> Result<IntervalHandle, MonitorError> {
        self.cache.open(interval)
    }

    /// Process one event of an open interval.
    pub fn analyze_event(&self, event: &EventData) -> Result<(), MonitorError> {
        let handle = self.cache.handle(event.interval)?;
        self.engine.submit(event);

        // A missing scaler turns track sampling off from this event onwards.
        if !handle.has_source(SourceKey::OnlineScaler) {
            match event.online_scaler {
                Some(scaler) => {
                    self.cache.set_source_if_absent(
                        &handle,
                        SourceKey::OnlineScaler,
                        classify_online_scaler(scaler),
                    )?;
                }
                None => {
                    if handle.mark_scaler_missing() {
                        warn!(
                            "No beam spot from scalers is available for interval {}",
                            handle.id()
                        );
                    }
                }
            }
        }

        if !handle.scaler_missing() {
            if let Some(database) = handle.source(SourceKey::Database) {
                self.auxiliary.lock().fill_tracks(&event.tracks, &database);
            }
        }

        if let Some(vertices) = &event.vertices {
            let selected = select_vertices(vertices, self.config.min_vertex_tracks);
            self.cache.record_event(&handle, selected)?;
        }
        Ok(())
    }

    /// Close an interval: run the fits, merge all sources and append the
    /// results to the store.
    pub fn end_interval(&self, interval: u32) -> Result<IntervalSummary, MonitorError> {
        let handle = self.cache.handle(interval)?;
        let fitted = self.engine.resolve_fits(&self.cache, &handle);
        let state = self.cache.close(handle)?;
        self.run.lock().record(interval);
        fitted?;

        let summary = self.engine.process(&state, &mut self.store.lock());
        info!(
            "Interval {} closed: {} sources, {} vertices, {} trend bins",
            interval, summary.sources, summary.vertices, summary.trend_bins
        );
        Ok(summary)
    }

    /// Normalize every series' display range. Returns the number of series
    /// updated; zero when no interval was processed.
    pub fn end_run(&self) -> usize {
        let run = self.run.lock();
        let mut store = self.store.lock();
        let updated = self.normalizer.normalize(&mut store, &run);
        if !run.is_empty() {
            info!(
                "Run ended after {} intervals, {} series normalized",
                run.len(),
                updated
            );
        }
        updated
    }

    /// Read access to the store.
    pub fn with_store<R>(&self, f: impl FnOnce(&SeriesStore) -> R) -> R {
        f(&self.store.lock())
    }

    pub fn auxiliary(&self) -> AuxiliaryDistributions {
        self.auxiliary.lock().clone()
    }

    pub fn processed_intervals(&self) -> RunAccumulator {
        self.run.lock().clone()
    }

    /// Snapshot of everything the monitor produced.
    pub fn report(&self) -> MonitorReport {
        let run = self.run.lock().clone();
        let auxiliary = self.auxiliary.lock().clone();
        let store = self.store.lock();
        MonitorReport::build(&self.config, &store, &run, auxiliary)
    }
}
