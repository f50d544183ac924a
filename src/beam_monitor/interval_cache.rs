//! Interval-scoped shared state.
//!
//! Each open interval owns one [`IntervalEntry`]. Event workers append vertex
//! samples and install source estimates concurrently through an
//! [`IntervalHandle`]; closing the interval moves the accumulated data out as an
//! owned, read-only [`IntervalState`].
//!
//! Lock order is accumulator, then sources. `closed` only changes while both
//! locks are held, so a write observed under either lock sees a consistent flag.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::error::{MonitorError, ProviderError};
use super::estimate::{Estimate, SourceKey, SourceSet};
use super::providers::EstimateProvider;
use super::sampling::VertexSample;

#[derive(Debug, Default)]
struct EventAccumulator {
    /// One group of selected vertices per recorded event.
    vertices: Vec<Vec<VertexSample>>,
}

/// Shared state of one open interval.
#[derive(Debug)]
pub struct IntervalEntry {
    id: u32,
    accumulator: Mutex<EventAccumulator>,
    sources: RwLock<SourceSet>,
    closed: AtomicBool,
    scaler_missing: AtomicBool,
}

impl IntervalEntry {
    fn new(id: u32, sources: SourceSet) -> Self {
        Self {
            id,
            accumulator: Mutex::new(EventAccumulator::default()),
            sources: RwLock::new(sources),
            closed: AtomicBool::new(false),
            scaler_missing: AtomicBool::new(false),
        }
    }
}

/// Cheap, cloneable reference to an open interval.
#[derive(Debug, Clone)]
pub struct IntervalHandle {
    entry: Arc<IntervalEntry>,
}

impl IntervalHandle {
    pub fn id(&self) -> u32 {
        self.entry.id
    }

    pub fn is_closed(&self) -> bool {
        self.entry.closed.load(Ordering::Acquire)
    }

    pub fn has_source(&self, key: SourceKey) -> bool {
        self.entry.sources.read().contains(key)
    }

    pub fn source(&self, key: SourceKey) -> Option<Estimate> {
        self.entry.sources.read().get(key).copied()
    }

    /// Flag the online scaler as missing. Returns `true` only for the first call
    /// of the interval, so the caller can warn once.
    pub fn mark_scaler_missing(&self) -> bool {
        !self.entry.scaler_missing.swap(true, Ordering::AcqRel)
    }

    pub fn scaler_missing(&self) -> bool {
        self.entry.scaler_missing.load(Ordering::Acquire)
    }

    /// Number of events recorded so far.
    pub fn event_count(&self) -> usize {
        self.entry.accumulator.lock().vertices.len()
    }
}

/// Read-only result of a closed interval.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct IntervalState {
    pub id: u32,
    pub sources: SourceSet,
    /// Selected vertices, grouped per event in recording order.
    pub vertices: Vec<Vec<VertexSample>>,
}

impl IntervalState {
    pub fn event_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn vertex_samples(&self) -> impl Iterator<Item = &VertexSample> {
        self.vertices.iter().flatten()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.iter().map(Vec::len).sum()
    }
}

/// Registry of open intervals.
pub struct IntervalCache {
    intervals: RwLock<HashMap<u32, Arc<IntervalEntry>>>,
    database: Arc<dyn EstimateProvider>,
    strict: bool,
}

impl IntervalCache {
    /// `strict` turns protocol misuse into a panic.
    pub fn new(database: Arc<dyn EstimateProvider>, strict: bool) -> Self {
        Self {
            intervals: RwLock::new(HashMap::new()),
            database,
            strict,
        }
    }

    fn misuse(&self, err: MonitorError) -> MonitorError {
        error!("Interval protocol misuse: {}", err);
        if self.strict {
            panic!("interval protocol misuse: {}", err);
        }
        err
    }

    /// Open an interval and resolve its database estimate.
    ///
    /// A failed lookup leaves the interval without a database entry.
    pub fn open(&self, id: u32) -> Result<IntervalHandle, MonitorError> {
        if self.intervals.read().contains_key(&id) {
            return Err(self.misuse(MonitorError::IntervalAlreadyOpen(id)));
        }

        let mut sources = SourceSet::default();
        match self.database.lookup(id) {
            Ok(estimate) => {
                sources.insert(SourceKey::Database, estimate);
            }
            Err(ProviderError::NoRecord(_)) => {
                info!("Database beam spot is not valid at interval {}", id);
            }
            Err(err) => {
                warn!("Database beam spot lookup failed at interval {}: {}", id, err);
            }
        }

        let entry = Arc::new(IntervalEntry::new(id, sources));
        let mut intervals = self.intervals.write();
        if intervals.contains_key(&id) {
            drop(intervals);
            return Err(self.misuse(MonitorError::IntervalAlreadyOpen(id)));
        }
        intervals.insert(id, entry.clone());
        debug!("Opened interval {}", id);
        Ok(IntervalHandle { entry })
    }

    /// Handle of an open interval.
    pub fn handle(&self, id: u32) -> Result<IntervalHandle, MonitorError> {
        match self.intervals.read().get(&id) {
            Some(entry) => Ok(IntervalHandle {
                entry: entry.clone(),
            }),
            None => Err(self.misuse(MonitorError::UnknownInterval(id))),
        }
    }

    pub fn is_open(&self, id: u32) -> bool {
        self.intervals.read().contains_key(&id)
    }

    pub fn open_intervals(&self) -> usize {
        self.intervals.read().len()
    }

    /// Append the selected vertices of one event.
    pub fn record_event(
        &self,
        handle: &IntervalHandle,
        samples: Vec<VertexSample>,
    ) -> Result<(), MonitorError> {
        let mut accumulator = handle.entry.accumulator.lock();
        if handle.is_closed() {
            drop(accumulator);
            return Err(self.misuse(MonitorError::IntervalClosed(handle.id())));
        }
        accumulator.vertices.push(samples);
        Ok(())
    }

    /// Install or overwrite one source's estimate. The database entry is only
    /// set by `open`.
    pub fn set_source_estimate(
        &self,
        handle: &IntervalHandle,
        key: SourceKey,
        estimate: Estimate,
    ) -> Result<(), MonitorError> {
        if key == SourceKey::Database {
            return Err(self.misuse(MonitorError::DatabaseFixed(handle.id())));
        }
        let mut sources = handle.entry.sources.write();
        if handle.is_closed() {
            drop(sources);
            return Err(self.misuse(MonitorError::IntervalClosed(handle.id())));
        }
        sources.insert(key, estimate);
        Ok(())
    }

    /// Install `estimate` unless the source is already present. Returns whether
    /// it was installed.
    pub fn set_source_if_absent(
        &self,
        handle: &IntervalHandle,
        key: SourceKey,
        estimate: Estimate,
    ) -> Result<bool, MonitorError> {
        if key == SourceKey::Database {
            return Err(self.misuse(MonitorError::DatabaseFixed(handle.id())));
        }
        let mut sources = handle.entry.sources.write();
        if handle.is_closed() {
            drop(sources);
            return Err(self.misuse(MonitorError::IntervalClosed(handle.id())));
        }
        if sources.contains(key) {
            return Ok(false);
        }
        sources.insert(key, estimate);
        Ok(true)
    }

    /// Close the interval and take ownership of its state.
    pub fn close(&self, handle: IntervalHandle) -> Result<IntervalState, MonitorError> {
        let id = handle.id();
        let removed = {
            let mut intervals = self.intervals.write();
            match intervals.get(&id) {
                Some(entry) if Arc::ptr_eq(entry, &handle.entry) => intervals.remove(&id),
                _ => None,
            }
        };
        if removed.is_none() {
            let err = if handle.is_closed() {
                MonitorError::IntervalClosed(id)
            } else {
                MonitorError::UnknownInterval(id)
            };
            return Err(self.misuse(err));
        }

        let mut accumulator = handle.entry.accumulator.lock();
        let mut sources = handle.entry.sources.write();
        handle.entry.closed.store(true, Ordering::Release);
        let state = IntervalState {
            id,
            sources: std::mem::take(&mut *sources),
            vertices: std::mem::take(&mut accumulator.vertices),
        };
        debug!(
            "Closed interval {} with {} events and {} sources",
            id,
            state.event_count(),
            state.sources.len()
        );
        Ok(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam_monitor::estimate::{BeamSpotKind, Measurement};
    use crate::beam_monitor::providers::{RecordedEstimates, UnavailableProvider};
    use rayon::prelude::*;

    fn sample(x: f64) -> VertexSample {
        VertexSample {
            x: Measurement::new(x, 0.003),
            y: Measurement::new(0.0, 0.003),
            z: Measurement::new(0.0, 0.01),
        }
    }

    fn lenient(provider: impl EstimateProvider + 'static) -> IntervalCache {
        IntervalCache::new(Arc::new(provider), false)
    }

    #[test]
    fn test_open_then_close_without_events() {
        let cache = lenient(UnavailableProvider);
        let handle = cache.open(1).unwrap();
        let state = cache.close(handle).unwrap();

        assert_eq!(state.id, 1);
        assert!(state.sources.is_empty());
        assert_eq!(state.event_count(), 0);
        assert_eq!(cache.open_intervals(), 0);
    }

    #[test]
    fn test_open_resolves_database() {
        let db = Estimate::at_position(0.01, 0.02, 0.1, BeamSpotKind::Tracker);
        let cache = lenient(RecordedEstimates::new(HashMap::from([(4, db)])));

        let with_db = cache.open(4).unwrap();
        let without_db = cache.open(5).unwrap();
        assert_eq!(with_db.source(SourceKey::Database), Some(db));
        assert!(!without_db.has_source(SourceKey::Database));
    }

    #[test]
    fn test_double_open_is_rejected() {
        let cache = lenient(UnavailableProvider);
        cache.open(2).unwrap();
        assert_eq!(cache.open(2).unwrap_err(), MonitorError::IntervalAlreadyOpen(2));
        assert_eq!(cache.open_intervals(), 1);
    }

    #[test]
    fn test_concurrent_record_event_keeps_every_event() {
        let cache = lenient(UnavailableProvider);
        let handle = cache.open(9).unwrap();

        let pool = rayon::ThreadPoolBuilder::new().num_threads(8).build().unwrap();
        pool.install(|| {
            (0..1000).into_par_iter().for_each(|i| {
                cache
                    .record_event(&handle, vec![sample(i as f64)])
                    .unwrap();
            });
        });

        let state = cache.close(handle).unwrap();
        assert_eq!(state.event_count(), 1000);
        let mut seen: Vec<i64> = state.vertex_samples().map(|s| s.x.value as i64).collect();
        seen.sort_unstable();
        assert_eq!(seen, (0..1000).collect::<Vec<i64>>());
    }

    #[test]
    fn test_writes_after_close_are_rejected() {
        let cache = lenient(UnavailableProvider);
        let handle = cache.open(3).unwrap();
        cache.record_event(&handle, vec![sample(0.1)]).unwrap();
        let stale = handle.clone();
        let state = cache.close(handle).unwrap();

        assert_eq!(
            cache.record_event(&stale, vec![sample(0.2)]),
            Err(MonitorError::IntervalClosed(3))
        );
        assert_eq!(
            cache.set_source_estimate(&stale, SourceKey::TrackFit, Estimate::default()),
            Err(MonitorError::IntervalClosed(3))
        );
        assert_eq!(cache.close(stale).unwrap_err(), MonitorError::IntervalClosed(3));
        assert_eq!(state.vertex_count(), 1);
    }

    #[test]
    fn test_unknown_interval() {
        let cache = lenient(UnavailableProvider);
        assert_eq!(cache.handle(8).unwrap_err(), MonitorError::UnknownInterval(8));
    }

    #[test]
    fn test_reopened_interval_does_not_accept_stale_close() {
        let cache = lenient(UnavailableProvider);
        let first = cache.open(6).unwrap();
        cache.close(first.clone()).unwrap();
        let second = cache.open(6).unwrap();

        assert_eq!(cache.close(first).unwrap_err(), MonitorError::IntervalClosed(6));
        assert!(cache.is_open(6));
        assert!(cache.close(second).is_ok());
    }

    #[test]
    fn test_set_source_if_absent() {
        let cache = lenient(UnavailableProvider);
        let handle = cache.open(1).unwrap();
        let first = Estimate::at_position(0.1, 0.0, 0.0, BeamSpotKind::Tracker);
        let second = Estimate::at_position(0.2, 0.0, 0.0, BeamSpotKind::Tracker);

        assert!(cache
            .set_source_if_absent(&handle, SourceKey::OnlineScaler, first)
            .unwrap());
        assert!(!cache
            .set_source_if_absent(&handle, SourceKey::OnlineScaler, second)
            .unwrap());
        assert_eq!(handle.source(SourceKey::OnlineScaler), Some(first));
    }

    #[test]
    fn test_database_estimate_is_fixed_after_open() {
        let db = Estimate::at_position(0.01, 0.02, 0.1, BeamSpotKind::Tracker);
        let cache = lenient(RecordedEstimates::new(HashMap::from([(4, db)])));
        let with_db = cache.open(4).unwrap();
        let without_db = cache.open(5).unwrap();
        let other = Estimate::at_position(0.5, 0.0, 0.0, BeamSpotKind::Tracker);

        assert_eq!(
            cache.set_source_estimate(&with_db, SourceKey::Database, other),
            Err(MonitorError::DatabaseFixed(4))
        );
        assert_eq!(
            cache.set_source_if_absent(&without_db, SourceKey::Database, other),
            Err(MonitorError::DatabaseFixed(5))
        );
        assert_eq!(with_db.source(SourceKey::Database), Some(db));
        assert!(!without_db.has_source(SourceKey::Database));
    }

    #[test]
    fn test_scaler_missing_reported_once() {
        let cache = lenient(UnavailableProvider);
        let handle = cache.open(1).unwrap();
        assert!(!handle.scaler_missing());
        assert!(handle.mark_scaler_missing());
        assert!(!handle.mark_scaler_missing());
        assert!(handle.scaler_missing());
    }

    #[test]
    #[should_panic(expected = "interval protocol misuse")]
    fn test_strict_mode_panics_on_misuse() {
        let cache = IntervalCache::new(Arc::new(UnavailableProvider), true);
        let _ = cache.handle(42);
    }
}
