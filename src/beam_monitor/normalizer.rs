//! End-of-run display range normalization.
//!
//! Value bounds are pooled per variable, scope and category group: every
//! absolute-value trend of one variable in one scope shares a range, and so
//! does every difference trend. Differences get much wider padding so outliers
//! remain visible.

use std::collections::BTreeSet;

use tracing::{debug, info};

use super::catalog::{CategoryGroup, TrendCategory, TrendScope};
use super::config::NormalizationConfig;
use super::estimate::Variable;
use super::series::{DisplayBounds, SeriesStore};

/// Intervals processed during the run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunAccumulator {
    intervals: BTreeSet<u32>,
}

impl RunAccumulator {
    pub fn record(&mut self, interval: u32) {
        self.intervals.insert(interval);
    }

    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }

    /// `(first, last)` processed interval.
    pub fn domain(&self) -> Option<(u32, u32)> {
        Some((*self.intervals.first()?, *self.intervals.last()?))
    }

    pub fn intervals(&self) -> impl Iterator<Item = u32> + '_ {
        self.intervals.iter().copied()
    }
}

/// Rewrites display bounds of every trend once the run has ended.
#[derive(Debug, Clone)]
pub struct RangeNormalizer {
    config: NormalizationConfig,
}

impl RangeNormalizer {
    pub fn new(config: NormalizationConfig) -> Self {
        Self { config }
    }

    fn padding(&self, group: CategoryGroup) -> f64 {
        match group {
            CategoryGroup::Absolute => self.config.absolute_padding,
            CategoryGroup::Difference => self.config.difference_padding,
        }
    }

    /// Normalize all trends. Does nothing when no interval was processed.
    /// Returns the number of series updated.
    pub fn normalize(&self, store: &mut SeriesStore, run: &RunAccumulator) -> usize {
        let Some((first, last)) = run.domain() else {
            info!("No interval processed, skipping range normalization");
            return 0;
        };

        let mut updated = 0;
        for variable in Variable::ALL {
            for scope in [TrendScope::Lumi, TrendScope::Validation] {
                for group in [CategoryGroup::Absolute, CategoryGroup::Difference] {
                    let members: Vec<TrendCategory> = TrendCategory::ALL
                        .into_iter()
                        .filter(|c| c.scope() == scope && c.group() == group)
                        .collect();
                    updated += self.normalize_group(store, variable, &members, group, first, last);
                }
            }
        }
        debug!(
            "Normalized {} series over intervals {}..={}",
            updated, first, last
        );
        updated
    }

    fn normalize_group(
        &self,
        store: &mut SeriesStore,
        variable: Variable,
        members: &[TrendCategory],
        group: CategoryGroup,
        first: u32,
        last: u32,
    ) -> usize {
        let pooled = members
            .iter()
            .filter_map(|c| store.trend(variable, *c))
            .filter_map(|t| t.series.value_range())
            .reduce(|(lo, hi), (min, max)| (lo.min(min), hi.max(max)));

        let k = self.padding(group);
        let margin = self.config.degenerate_margin;
        let mut updated = 0;
        for category in members {
            let Some(trend) = store.trend_mut(variable, *category) else {
                continue;
            };
            let bounds = match pooled {
                Some((min, max)) if max > min => {
                    let span = max - min;
                    DisplayBounds {
                        min: min - k * span,
                        max: max + k * span,
                    }
                }
                _ => {
                    let (min, max) = trend.series.value_range().unwrap_or((0.0, 0.0));
                    DisplayBounds {
                        min: min - margin,
                        max: max + margin,
                    }
                }
            };
            trend.series.set_display_bounds(bounds);
            trend
                .series
                .set_domain(first as f64 - 0.5, last as f64 + 0.5);
            updated += 1;
        }
        updated
    }
}
