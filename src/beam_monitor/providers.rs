//! Seams to the external collaborators: estimate providers and fitters.

use std::collections::HashMap;

use parking_lot::Mutex;

use super::error::ProviderError;
use super::estimate::Estimate;
use super::sampling::EventData;

/// Source of an already-published per-interval estimate (database, scaler).
pub trait EstimateProvider: Send + Sync {
    fn lookup(&self, interval: u32) -> Result<Estimate, ProviderError>;
}

/// A beam-spot fitting engine.
///
/// `submit` is called concurrently by the event workers; `fit` and `reset`
/// run once per interval close.
pub trait BeamSpotFitter: Send + Sync {
    fn submit(&self, event: &EventData);

    /// The fitted estimate, or `None` when the data was insufficient.
    fn fit(&self) -> Option<Estimate>;

    fn reset(&self);
}

/// Provider answering from a fixed per-interval table.
#[derive(Debug, Default, Clone)]
pub struct RecordedEstimates {
    estimates: HashMap<u32, Estimate>,
}

impl RecordedEstimates {
    pub fn new(estimates: HashMap<u32, Estimate>) -> Self {
        Self { estimates }
    }
}

impl EstimateProvider for RecordedEstimates {
    fn lookup(&self, interval: u32) -> Result<Estimate, ProviderError> {
        self.estimates
            .get(&interval)
            .copied()
            .ok_or(ProviderError::NoRecord(interval))
    }
}

/// Provider that is never reachable.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableProvider;

impl EstimateProvider for UnavailableProvider {
    fn lookup(&self, _interval: u32) -> Result<Estimate, ProviderError> {
        Err(ProviderError::Unavailable("no provider configured".into()))
    }
}

#[derive(Debug, Default)]
struct RecordedFitState {
    interval: Option<u32>,
    submitted: usize,
}

/// Fitter replaying results recorded offline, one per interval.
///
/// A result is only returned when at least `min_events` events of that interval
/// were submitted since the last reset.
#[derive(Debug, Default)]
pub struct RecordedFitter {
    results: HashMap<u32, Estimate>,
    min_events: usize,
    state: Mutex<RecordedFitState>,
}

impl RecordedFitter {
    pub fn new(results: HashMap<u32, Estimate>, min_events: usize) -> Self {
        Self {
            results,
            min_events,
            state: Mutex::new(RecordedFitState::default()),
        }
    }
}

impl BeamSpotFitter for RecordedFitter {
    fn submit(&self, event: &EventData) {
        let mut state = self.state.lock();
        state.interval = Some(event.interval);
        state.submitted += 1;
    }

    fn fit(&self) -> Option<Estimate> {
        let state = self.state.lock();
        if state.submitted < self.min_events {
            return None;
        }
        state
            .interval
            .and_then(|interval| self.results.get(&interval).copied())
    }

    fn reset(&self) {
        *self.state.lock() = RecordedFitState::default();
    }
}
