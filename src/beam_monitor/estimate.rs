//! Beam-spot estimates and the sources that produce them.
//!
//! Every source delivers at most one [`Estimate`] per interval. The per-interval
//! collection is a [`SourceSet`], an array indexed by [`SourceKey`], so a missing
//! source is an explicit `None` rather than a failed map lookup.

use serde::{Deserialize, Serialize};

/// Beam type code the conditions database uses for a tracker-derived beam spot.
pub const DATABASE_TRACKER_BEAM_TYPE: i32 = 2;

/// Whether an estimate is physically meaningful.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum BeamSpotKind {
    /// Measured from tracker data; the only kind that enters comparisons.
    Tracker,
    /// Placeholder or default beam spot.
    Fake,
    #[default]
    Unknown,
}

impl BeamSpotKind {
    /// Classify a database record by its beam type code.
    pub fn from_beam_type(beam_type: i32) -> Self {
        if beam_type == DATABASE_TRACKER_BEAM_TYPE {
            Self::Tracker
        } else {
            Self::Fake
        }
    }
}

/// A value with its uncertainty.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Measurement {
    pub value: f64,
    pub error: f64,
}

impl Measurement {
    pub const fn new(value: f64, error: f64) -> Self {
        Self { value, error }
    }

    /// `self - other` with the errors added in quadrature.
    pub fn minus(self, other: Measurement) -> Measurement {
        Measurement {
            value: self.value - other.value,
            error: self.error.hypot(other.error),
        }
    }
}

/// The six quantities tracked for every source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Variable {
    X,
    Y,
    Z,
    SigmaX,
    SigmaY,
    SigmaZ,
}

impl Variable {
    pub const COUNT: usize = 6;

    pub const ALL: [Variable; Self::COUNT] = [
        Variable::X,
        Variable::Y,
        Variable::Z,
        Variable::SigmaX,
        Variable::SigmaY,
        Variable::SigmaZ,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    /// Short name used in series names and axis titles.
    pub const fn name(self) -> &'static str {
        match self {
            Variable::X => "x",
            Variable::Y => "y",
            Variable::Z => "z",
            Variable::SigmaX => "sigmaX",
            Variable::SigmaY => "sigmaY",
            Variable::SigmaZ => "sigmaZ",
        }
    }

    /// True for the beam widths σx, σy, σz.
    pub const fn is_width(self) -> bool {
        matches!(self, Variable::SigmaX | Variable::SigmaY | Variable::SigmaZ)
    }
}

impl std::fmt::Display for Variable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Beam-spot estimate delivered by one source for one interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct Estimate {
    pub x: Measurement,
    pub y: Measurement,
    pub z: Measurement,
    pub sigma_x: Measurement,
    pub sigma_y: Measurement,
    pub sigma_z: Measurement,
    #[serde(default)]
    pub kind: BeamSpotKind,
}

impl Estimate {
    /// Estimate at a position with zero widths and errors.
    pub fn at_position(x: f64, y: f64, z: f64, kind: BeamSpotKind) -> Self {
        Self {
            x: Measurement::new(x, 0.0),
            y: Measurement::new(y, 0.0),
            z: Measurement::new(z, 0.0),
            kind,
            ..Self::default()
        }
    }

    pub fn with_kind(mut self, kind: BeamSpotKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn measurement(&self, variable: Variable) -> Measurement {
        match variable {
            Variable::X => self.x,
            Variable::Y => self.y,
            Variable::Z => self.z,
            Variable::SigmaX => self.sigma_x,
            Variable::SigmaY => self.sigma_y,
            Variable::SigmaZ => self.sigma_z,
        }
    }

    pub fn is_tracker(&self) -> bool {
        self.kind == BeamSpotKind::Tracker
    }
}

/// The four independent beam-spot estimators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum SourceKey {
    /// Published conditions database value.
    Database = 0,
    /// Online scaler value carried by the events.
    OnlineScaler = 1,
    /// Track-based fit (Fitter-A).
    TrackFit = 2,
    /// Primary-vertex fit (Fitter-B).
    VertexFit = 3,
}

impl SourceKey {
    pub const COUNT: usize = 4;

    pub const ALL: [SourceKey; Self::COUNT] = [
        SourceKey::Database,
        SourceKey::OnlineScaler,
        SourceKey::TrackFit,
        SourceKey::VertexFit,
    ];

    pub const fn index(self) -> usize {
        self as usize
    }

    pub const fn label(self) -> &'static str {
        match self {
            SourceKey::Database => "DataBase",
            SourceKey::OnlineScaler => "Online",
            SourceKey::TrackFit => "BeamFit",
            SourceKey::VertexFit => "PrimaryVertex",
        }
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// At most one estimate per source.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct SourceSet {
    estimates: [Option<Estimate>; SourceKey::COUNT],
}

impl SourceSet {
    pub fn get(&self, key: SourceKey) -> Option<&Estimate> {
        self.estimates[key.index()].as_ref()
    }

    pub fn contains(&self, key: SourceKey) -> bool {
        self.estimates[key.index()].is_some()
    }

    /// Install or overwrite the estimate for `key`, returning the previous one.
    pub fn insert(&mut self, key: SourceKey, estimate: Estimate) -> Option<Estimate> {
        self.estimates[key.index()].replace(estimate)
    }

    pub fn iter(&self) -> impl Iterator<Item = (SourceKey, &Estimate)> {
        SourceKey::ALL
            .into_iter()
            .filter_map(move |key| self.get(key).map(|estimate| (key, estimate)))
    }

    pub fn len(&self) -> usize {
        self.estimates.iter().filter(|e| e.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Project one variable, keeping only tracker-kind estimates.
    pub fn project(&self, variable: Variable) -> SourceValues {
        let mut values = SourceValues::default();
        for (key, estimate) in self.iter() {
            if estimate.is_tracker() {
                values.values[key.index()] = Some(estimate.measurement(variable));
            }
        }
        values
    }
}

/// Per-variable projection of a [`SourceSet`]: physically meaningful sources only.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SourceValues {
    values: [Option<Measurement>; SourceKey::COUNT],
}

impl SourceValues {
    pub fn get(&self, key: SourceKey) -> Option<Measurement> {
        self.values[key.index()]
    }

    /// `a - b` with quadrature error when both sources are present.
    pub fn difference(&self, a: SourceKey, b: SourceKey) -> Option<Measurement> {
        Some(self.get(a)?.minus(self.get(b)?))
    }
}
