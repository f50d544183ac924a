//! Static catalog of consistency categories.
//!
//! Two kinds of entries exist for every [`Variable`]:
//! - run-scope [`DistributionCategory`] histograms, filled once per interval;
//! - interval-indexed [`TrendCategory`] time series.
//!
//! Which (variable, category) pairs are booked is fixed by [`distribution_binning`]
//! and [`trend_is_active`]. Width variables only carry absolute values; their
//! difference entries are reserved and never populated.

use serde::{Deserialize, Serialize};

use super::estimate::{SourceKey, Variable};

/// Folder leaf for run-scope distributions and the debug trends.
pub const DEBUG_FOLDER: &str = "Debug";
/// Folder leaf for the validation trends.
pub const VALIDATION_FOLDER: &str = "Validation";

/// Absolute value or difference between sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CategoryGroup {
    Absolute,
    Difference,
}

/// Where a trend is reported; the range normalizer pools bounds per scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrendScope {
    Lumi,
    Validation,
}

/// Source the vertex fit and the sampled vertices are compared against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Reference {
    Database,
    TrackFit,
    OnlineScaler,
}

impl Reference {
    pub const fn source(self) -> SourceKey {
        match self {
            Reference::Database => SourceKey::Database,
            Reference::TrackFit => SourceKey::TrackFit,
            Reference::OnlineScaler => SourceKey::OnlineScaler,
        }
    }
}

/// Run-scope distributions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum DistributionCategory {
    /// Database value.
    Coordinate,
    /// Vertex fit minus another source.
    FitMinus(Reference),
    /// Every sampled vertex minus another source.
    VertexMinus(Reference),
}

impl DistributionCategory {
    pub const COUNT: usize = 7;

    pub const ALL: [DistributionCategory; Self::COUNT] = [
        DistributionCategory::Coordinate,
        DistributionCategory::FitMinus(Reference::Database),
        DistributionCategory::FitMinus(Reference::TrackFit),
        DistributionCategory::FitMinus(Reference::OnlineScaler),
        DistributionCategory::VertexMinus(Reference::Database),
        DistributionCategory::VertexMinus(Reference::TrackFit),
        DistributionCategory::VertexMinus(Reference::OnlineScaler),
    ];

    pub fn index(self) -> usize {
        match self {
            DistributionCategory::Coordinate => 0,
            DistributionCategory::FitMinus(reference) => 1 + reference as usize,
            DistributionCategory::VertexMinus(reference) => 4 + reference as usize,
        }
    }

    pub fn label(self) -> String {
        match self {
            DistributionCategory::Coordinate => "Coordinate".to_string(),
            DistributionCategory::FitMinus(other) => {
                format!("PrimaryVertex fit-{}", other.source())
            }
            DistributionCategory::VertexMinus(other) => format!("PrimaryVertex-{}", other.source()),
        }
    }

    pub fn group(self) -> CategoryGroup {
        match self {
            DistributionCategory::Coordinate => CategoryGroup::Absolute,
            _ => CategoryGroup::Difference,
        }
    }
}

/// Interval-indexed time series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum TrendCategory {
    /// Value of one source.
    Source(SourceKey),
    /// Vertex fit minus database.
    FitMinusDatabase,
    /// Vertex fit minus online scaler.
    FitMinusOnline,
    /// Online scaler minus database.
    OnlineMinusDatabase,
    /// Every sampled vertex minus database.
    VertexMinusDatabase,
    /// Every sampled vertex minus online scaler.
    VertexMinusOnline,
}

impl TrendCategory {
    pub const COUNT: usize = 9;

    pub const ALL: [TrendCategory; Self::COUNT] = [
        TrendCategory::Source(SourceKey::TrackFit),
        TrendCategory::Source(SourceKey::VertexFit),
        TrendCategory::Source(SourceKey::Database),
        TrendCategory::Source(SourceKey::OnlineScaler),
        TrendCategory::FitMinusDatabase,
        TrendCategory::FitMinusOnline,
        TrendCategory::OnlineMinusDatabase,
        TrendCategory::VertexMinusDatabase,
        TrendCategory::VertexMinusOnline,
    ];

    pub fn index(self) -> usize {
        match self {
            TrendCategory::Source(SourceKey::TrackFit) => 0,
            TrendCategory::Source(SourceKey::VertexFit) => 1,
            TrendCategory::Source(SourceKey::Database) => 2,
            TrendCategory::Source(SourceKey::OnlineScaler) => 3,
            TrendCategory::FitMinusDatabase => 4,
            TrendCategory::FitMinusOnline => 5,
            TrendCategory::OnlineMinusDatabase => 6,
            TrendCategory::VertexMinusDatabase => 7,
            TrendCategory::VertexMinusOnline => 8,
        }
    }

    pub fn label(self) -> String {
        match self {
            TrendCategory::Source(SourceKey::TrackFit) => "Lumibased BeamSpotFit".to_string(),
            TrendCategory::Source(key) => format!("Lumibased {}", key),
            TrendCategory::FitMinusDatabase => "Lumibased PrimaryVertex-DataBase fit".to_string(),
            TrendCategory::FitMinusOnline => "Lumibased PrimaryVertex-Online fit".to_string(),
            TrendCategory::OnlineMinusDatabase => "Lumibased Online-DataBase fit".to_string(),
            TrendCategory::VertexMinusDatabase => "Lumibased PrimaryVertex-DataBase".to_string(),
            TrendCategory::VertexMinusOnline => "Lumibased PrimaryVertex-Online".to_string(),
        }
    }

    pub fn group(self) -> CategoryGroup {
        match self {
            TrendCategory::Source(_) => CategoryGroup::Absolute,
            _ => CategoryGroup::Difference,
        }
    }

    pub fn scope(self) -> TrendScope {
        match self {
            TrendCategory::OnlineMinusDatabase
            | TrendCategory::VertexMinusDatabase
            | TrendCategory::VertexMinusOnline => TrendScope::Validation,
            _ => TrendScope::Lumi,
        }
    }

    pub fn folder_leaf(self) -> &'static str {
        match self.scope() {
            TrendScope::Lumi => DEBUG_FOLDER,
            TrendScope::Validation => VALIDATION_FOLDER,
        }
    }
}

/// Binning of a run-scope distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Binning {
    pub nbins: usize,
    pub low: f64,
    pub high: f64,
}

const fn binning(nbins: usize, low: f64, high: f64) -> Option<Binning> {
    Some(Binning { nbins, low, high })
}

/// Binning of a booked distribution, or `None` for a reserved entry.
pub fn distribution_binning(variable: Variable, category: DistributionCategory) -> Option<Binning> {
    use DistributionCategory::*;
    match (variable, category) {
        (Variable::X | Variable::Y, Coordinate) => binning(1001, -0.2525, 0.2525),
        (Variable::X | Variable::Y, _) => binning(1001, -0.02525, 0.02525),
        (Variable::Z, Coordinate) => binning(101, -5.05, 5.05),
        (Variable::Z, FitMinus(_)) => binning(101, -0.505, 0.505),
        (Variable::Z, VertexMinus(_)) => binning(1001, -5.005, 5.005),
        (Variable::SigmaX | Variable::SigmaY, Coordinate) => binning(100, 0.0, 0.015),
        (Variable::SigmaZ, Coordinate) => binning(110, 0.0, 11.0),
        (Variable::SigmaX | Variable::SigmaY | Variable::SigmaZ, _) => None,
    }
}

/// Whether a trend is booked for `variable`.
pub fn trend_is_active(variable: Variable, category: TrendCategory) -> bool {
    !variable.is_width() || category.group() == CategoryGroup::Absolute
}

/// Naming and axis metadata for one booked entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    pub name: String,
    pub title: String,
    pub folder: String,
    pub x_axis_title: String,
    pub y_axis_title: String,
}

impl EntryMetadata {
    pub fn distribution(variable: Variable, category: DistributionCategory, folder: String) -> Self {
        let label = category.label();
        let x_axis_title = match category {
            DistributionCategory::Coordinate => format!("{}_{{0}} (cm)", variable),
            _ => format!("{} {}_{{0}} (cm)", label, variable),
        };
        Self {
            name: format!("h{}{}", variable, label),
            title: format!("{}_{{0}} {}", variable, label),
            folder,
            x_axis_title,
            y_axis_title: "Entries".to_string(),
        }
    }

    pub fn trend(variable: Variable, category: TrendCategory, folder: String) -> Self {
        let label = category.label();
        let y_axis_title = match category.group() {
            CategoryGroup::Difference => format!("#Delta {}_{{0}} (cm)", variable),
            CategoryGroup::Absolute => format!("{}_{{0}} (cm)", variable),
        };
        Self {
            name: format!("h{}{}", variable, label),
            title: format!("{}_{{0}} {}", variable, label),
            folder,
            x_axis_title: "Lumisection".to_string(),
            y_axis_title,
        }
    }
}
