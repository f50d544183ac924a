//! Series store: the booked distributions and interval-indexed time series.
//!
//! Entries are booked once, at construction, from the static catalog. A time
//! series bin holds every point recorded for that interval; writing a bin again
//! replaces its content, so re-processing an interval never duplicates points.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::catalog::{
    distribution_binning, trend_is_active, DistributionCategory, EntryMetadata, TrendCategory,
    DEBUG_FOLDER,
};
use super::config::MonitorConfig;
use super::estimate::{Measurement, Variable};
use super::histogram::Histogram1D;

/// One recorded point of a time series.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BinEntry {
    pub bin: u32,
    pub value: f64,
    pub error: f64,
}

/// Display range of a series' value axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DisplayBounds {
    pub min: f64,
    pub max: f64,
}

/// Interval-indexed series over `[first_bin, last_bin]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    first_bin: u32,
    bins: Vec<Vec<Measurement>>,
    display: Option<DisplayBounds>,
    domain: (f64, f64),
}

impl TimeSeries {
    pub fn new(first_bin: u32, last_bin: u32) -> Self {
        let nbins = last_bin.saturating_sub(first_bin) as usize + 1;
        Self {
            first_bin,
            bins: vec![Vec::new(); nbins],
            display: None,
            domain: (first_bin as f64 - 0.5, last_bin as f64 + 0.5),
        }
    }

    pub fn first_bin(&self) -> u32 {
        self.first_bin
    }

    pub fn last_bin(&self) -> u32 {
        self.first_bin + self.bins.len() as u32 - 1
    }

    fn slot(&self, bin: u32) -> Option<usize> {
        let offset = bin.checked_sub(self.first_bin)? as usize;
        (offset < self.bins.len()).then_some(offset)
    }

    /// Replace the content of `bin`. Returns `false` when `bin` is outside the
    /// binning; such points are dropped.
    pub fn set_bin(&mut self, bin: u32, points: Vec<Measurement>) -> bool {
        match self.slot(bin) {
            Some(slot) => {
                self.bins[slot] = points;
                true
            }
            None => false,
        }
    }

    pub fn bin(&self, bin: u32) -> &[Measurement] {
        self.slot(bin).map(|slot| self.bins[slot].as_slice()).unwrap_or(&[])
    }

    /// All recorded points in bin order.
    pub fn entries(&self) -> Vec<BinEntry> {
        self.bins
            .iter()
            .enumerate()
            .flat_map(|(offset, points)| {
                let bin = self.first_bin + offset as u32;
                points.iter().map(move |m| BinEntry {
                    bin,
                    value: m.value,
                    error: m.error,
                })
            })
            .collect()
    }

    pub fn populated_bins(&self) -> usize {
        self.bins.iter().filter(|points| !points.is_empty()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.populated_bins() == 0
    }

    /// Min and max over all recorded values.
    pub fn value_range(&self) -> Option<(f64, f64)> {
        self.bins.iter().flatten().fold(None, |range, m| match range {
            None => Some((m.value, m.value)),
            Some((lo, hi)) => Some((lo.min(m.value), hi.max(m.value))),
        })
    }

    /// Explicit bounds if set, else the recorded value range (zero when empty).
    pub fn display_bounds(&self) -> DisplayBounds {
        self.display.unwrap_or_else(|| {
            let (min, max) = self.value_range().unwrap_or((0.0, 0.0));
            DisplayBounds { min, max }
        })
    }

    pub fn set_display_bounds(&mut self, bounds: DisplayBounds) {
        self.display = Some(bounds);
    }

    /// Visible range of the interval axis.
    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    pub fn set_domain(&mut self, low: f64, high: f64) {
        self.domain = (low, high);
    }
}

/// A booked run-scope distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Distribution {
    pub metadata: EntryMetadata,
    pub histogram: Histogram1D,
}

/// A booked time series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trend {
    pub metadata: EntryMetadata,
    pub series: TimeSeries,
}

/// Every booked entry, indexed by variable and category.
#[derive(Debug, Clone)]
pub struct SeriesStore {
    distributions: [[Option<Distribution>; DistributionCategory::COUNT]; Variable::COUNT],
    trends: [[Option<Trend>; TrendCategory::COUNT]; Variable::COUNT],
    /// Intervals already counted in the distributions.
    filled_intervals: BTreeSet<u32>,
}

impl SeriesStore {
    /// Book the catalog. In per-interval saving mode nothing is booked.
    pub fn new(config: &MonitorConfig) -> Self {
        let book = !config.per_interval_saving;
        let distributions = std::array::from_fn(|v| {
            let variable = Variable::ALL[v];
            std::array::from_fn(|c| {
                let category = DistributionCategory::ALL[c];
                let binning = distribution_binning(variable, category).filter(|_| book)?;
                Some(Distribution {
                    metadata: EntryMetadata::distribution(
                        variable,
                        category,
                        config.folder(DEBUG_FOLDER),
                    ),
                    histogram: Histogram1D::new(binning.nbins, binning.low, binning.high),
                })
            })
        });
        let trends = std::array::from_fn(|v| {
            let variable = Variable::ALL[v];
            std::array::from_fn(|c| {
                let category = TrendCategory::ALL[c];
                if !book || !trend_is_active(variable, category) {
                    return None;
                }
                Some(Trend {
                    metadata: EntryMetadata::trend(
                        variable,
                        category,
                        config.folder(category.folder_leaf()),
                    ),
                    series: TimeSeries::new(config.first_interval, config.last_interval),
                })
            })
        });
        Self {
            distributions,
            trends,
            filled_intervals: BTreeSet::new(),
        }
    }

    pub fn distribution(
        &self,
        variable: Variable,
        category: DistributionCategory,
    ) -> Option<&Distribution> {
        self.distributions[variable.index()][category.index()].as_ref()
    }

    pub fn trend(&self, variable: Variable, category: TrendCategory) -> Option<&Trend> {
        self.trends[variable.index()][category.index()].as_ref()
    }

    pub fn trend_mut(&mut self, variable: Variable, category: TrendCategory) -> Option<&mut Trend> {
        self.trends[variable.index()][category.index()].as_mut()
    }

    /// Claim the distribution fills of `interval`. Returns `false` when the
    /// interval was already counted, so a re-close never fills twice.
    pub fn claim_distribution_fill(&mut self, interval: u32) -> bool {
        self.filled_intervals.insert(interval)
    }

    /// Fill a distribution. Returns `false` for a reserved entry.
    pub fn fill(&mut self, variable: Variable, category: DistributionCategory, value: f64) -> bool {
        match self.distributions[variable.index()][category.index()].as_mut() {
            Some(distribution) => {
                distribution.histogram.fill(value);
                true
            }
            None => false,
        }
    }

    /// Replace the points of one time-series bin. Returns `false` when the
    /// entry is reserved or the bin lies outside the binning.
    pub fn append(
        &mut self,
        variable: Variable,
        category: TrendCategory,
        bin: u32,
        points: Vec<Measurement>,
    ) -> bool {
        let Some(trend) = self.trend_mut(variable, category) else {
            return false;
        };
        let stored = trend.series.set_bin(bin, points);
        if !stored {
            debug!(
                "Interval {} outside the binning of {}, point dropped",
                bin, trend.metadata.name
            );
        }
        stored
    }

    /// Recorded points of a time series, or `None` for a reserved entry.
    pub fn query(&self, variable: Variable, category: TrendCategory) -> Option<Vec<BinEntry>> {
        self.trend(variable, category).map(|t| t.series.entries())
    }

    pub fn distributions(
        &self,
    ) -> impl Iterator<Item = (Variable, DistributionCategory, &Distribution)> {
        Variable::ALL.into_iter().flat_map(move |variable| {
            DistributionCategory::ALL.into_iter().filter_map(move |category| {
                self.distribution(variable, category)
                    .map(|d| (variable, category, d))
            })
        })
    }

    pub fn trends(&self) -> impl Iterator<Item = (Variable, TrendCategory, &Trend)> {
        Variable::ALL.into_iter().flat_map(move |variable| {
            TrendCategory::ALL.into_iter().filter_map(move |category| {
                self.trend(variable, category).map(|t| (variable, category, t))
            })
        })
    }

    pub fn booked_trends(&self) -> usize {
        self.trends().count()
    }
}
