//! Exportable snapshot of the monitor output.

use chrono::Utc;
use serde::{Deserialize, Serialize};

use super::catalog::{CategoryGroup, DistributionCategory, EntryMetadata, TrendCategory};
use super::config::MonitorConfig;
use super::estimate::Variable;
use super::histogram::Profile1D;
use super::normalizer::RunAccumulator;
use super::sampling::AuxiliaryDistributions;
use super::series::{BinEntry, DisplayBounds, SeriesStore};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendReport {
    pub variable: Variable,
    pub category: TrendCategory,
    pub group: CategoryGroup,
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub display: DisplayBounds,
    pub domain: (f64, f64),
    pub points: Vec<BinEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionReport {
    pub variable: Variable,
    pub category: DistributionCategory,
    #[serde(flatten)]
    pub metadata: EntryMetadata,
    pub nbins: usize,
    pub low: f64,
    pub high: f64,
    pub entries: u64,
    pub mean: Option<f64>,
    pub rms: Option<f64>,
    pub contents: Vec<f64>,
}

/// One bin of the d0 vs φ0 profile.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProfileBin {
    pub phi: f64,
    pub mean_d0: f64,
    pub error: f64,
    pub entries: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryReport {
    pub d0_phi0: Vec<ProfileBin>,
    pub dxy_beam_spot: Vec<f64>,
    pub dxy_beam_spot_mean: Option<f64>,
    pub track_entries: u64,
}

impl AuxiliaryReport {
    fn from_distributions(aux: &AuxiliaryDistributions) -> Self {
        Self {
            d0_phi0: profile_bins(&aux.d0_phi0),
            dxy_beam_spot: aux.dxy_beam_spot.contents().to_vec(),
            dxy_beam_spot_mean: aux.dxy_beam_spot.mean(),
            track_entries: aux.dxy_beam_spot.entries(),
        }
    }
}

fn profile_bins(profile: &Profile1D) -> Vec<ProfileBin> {
    (1..=profile.nbins())
        .filter_map(|bin| {
            Some(ProfileBin {
                phi: profile.bin_center(bin),
                mean_d0: profile.bin_mean(bin)?,
                error: profile.bin_error(bin)?,
                entries: profile.bin_entries(bin),
            })
        })
        .collect()
}

/// Everything the monitor produced over one run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonitorReport {
    pub monitor_name: String,
    pub generated_at: String,
    pub processed_intervals: Vec<u32>,
    pub trends: Vec<TrendReport>,
    pub distributions: Vec<DistributionReport>,
    pub auxiliary: AuxiliaryReport,
}

impl MonitorReport {
    pub fn build(
        config: &MonitorConfig,
        store: &SeriesStore,
        run: &RunAccumulator,
        auxiliary: AuxiliaryDistributions,
    ) -> Self {
        let trends = store
            .trends()
            .map(|(variable, category, trend)| TrendReport {
                variable,
                category,
                group: category.group(),
                metadata: trend.metadata.clone(),
                display: trend.series.display_bounds(),
                domain: trend.series.domain(),
                points: trend.series.entries(),
            })
            .collect();
        let distributions = store
            .distributions()
            .map(|(variable, category, distribution)| {
                let h = &distribution.histogram;
                DistributionReport {
                    variable,
                    category,
                    metadata: distribution.metadata.clone(),
                    nbins: h.nbins(),
                    low: h.low(),
                    high: h.high(),
                    entries: h.entries(),
                    mean: h.mean(),
                    rms: h.rms(),
                    contents: h.contents().to_vec(),
                }
            })
            .collect();

        Self {
            monitor_name: config.monitor_name.clone(),
            generated_at: Utc::now().to_rfc3339(),
            processed_intervals: run.intervals().collect(),
            trends,
            distributions,
            auxiliary: AuxiliaryReport::from_distributions(&auxiliary),
        }
    }

    pub fn trend(&self, variable: Variable, category: TrendCategory) -> Option<&TrendReport> {
        self.trends
            .iter()
            .find(|t| t.variable == variable && t.category == category)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}
