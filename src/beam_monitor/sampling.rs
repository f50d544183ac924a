//! Per-event track and vertex sampling.
//!
//! Events carry reconstructed tracks and primary vertices. Vertices passing the
//! selection become [`VertexSample`]s in the interval cache; tracks feed the two
//! full-statistics auxiliary distributions.

use serde::{Deserialize, Serialize};

use super::estimate::{Estimate, Measurement, Variable};
use super::histogram::{Histogram1D, Profile1D};

/// Reconstructed track, reduced to what the monitor reads.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Track {
    /// Azimuthal angle of the momentum at the reference point (rad).
    pub phi: f64,
    /// Reference point x (cm).
    pub vx: f64,
    /// Reference point y (cm).
    pub vy: f64,
}

impl Track {
    /// Transverse impact parameter with respect to `(x, y)`.
    pub fn dxy_from(&self, x: f64, y: f64) -> f64 {
        -(self.vx - x) * self.phi.sin() + (self.vy - y) * self.phi.cos()
    }

    /// Transverse impact parameter with respect to the origin.
    pub fn dxy(&self) -> f64 {
        self.dxy_from(0.0, 0.0)
    }
}

/// Reconstructed primary vertex.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: Measurement,
    pub y: Measurement,
    pub z: Measurement,
    pub tracks_size: usize,
    #[serde(default)]
    pub is_fake: bool,
}

/// Position of one selected vertex, kept in the interval cache.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VertexSample {
    pub x: Measurement,
    pub y: Measurement,
    pub z: Measurement,
}

impl VertexSample {
    /// Position coordinate for `variable`; widths have no per-vertex value.
    pub fn measurement(&self, variable: Variable) -> Option<Measurement> {
        match variable {
            Variable::X => Some(self.x),
            Variable::Y => Some(self.y),
            Variable::Z => Some(self.z),
            Variable::SigmaX | Variable::SigmaY | Variable::SigmaZ => None,
        }
    }
}

impl From<&Vertex> for VertexSample {
    fn from(vertex: &Vertex) -> Self {
        Self {
            x: vertex.x,
            y: vertex.y,
            z: vertex.z,
        }
    }
}

/// One processed event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct EventData {
    /// Interval (luminosity section) the event belongs to.
    pub interval: u32,
    #[serde(default)]
    pub tracks: Vec<Track>,
    /// `None` when the event has no vertex collection at all.
    #[serde(default)]
    pub vertices: Option<Vec<Vertex>>,
    /// Online scaler beam spot, if the event carries one.
    #[serde(default)]
    pub online_scaler: Option<Estimate>,
}

/// Vertex selection: not fake, and at least `min_tracks` tracks.
pub fn select_vertices(vertices: &[Vertex], min_tracks: usize) -> Vec<VertexSample> {
    vertices
        .iter()
        .filter(|pv| !pv.is_fake && pv.tracks_size >= min_tracks)
        .map(VertexSample::from)
        .collect()
}

/// Full-statistics track distributions, independent of the interval binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuxiliaryDistributions {
    /// d0 vs φ0 for all tracks.
    pub d0_phi0: Profile1D,
    /// dxy with respect to the database beam spot.
    pub dxy_beam_spot: Histogram1D,
}

impl Default for AuxiliaryDistributions {
    fn default() -> Self {
        Self {
            d0_phi0: Profile1D::new(63, -3.15, 3.15, -0.5, 0.5),
            dxy_beam_spot: Histogram1D::new(100, -0.1, 0.1),
        }
    }
}

impl AuxiliaryDistributions {
    /// Fill both distributions for every track of one event.
    pub fn fill_tracks(&mut self, tracks: &[Track], beam_spot: &Estimate) {
        for track in tracks {
            self.d0_phi0.fill(track.phi, -track.dxy());
            self.dxy_beam_spot
                .fill(-track.dxy_from(beam_spot.x.value, beam_spot.y.value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::beam_monitor::estimate::BeamSpotKind;
    use std::f64::consts::FRAC_PI_2;

    fn vertex(x: f64, tracks_size: usize, is_fake: bool) -> Vertex {
        Vertex {
            x: Measurement::new(x, 0.003),
            y: Measurement::new(0.0, 0.003),
            z: Measurement::new(0.0, 0.01),
            tracks_size,
            is_fake,
        }
    }

    #[test]
    fn test_vertex_selection() {
        let vertices = vec![
            vertex(0.011, 10, false),
            vertex(0.012, 9, false),
            vertex(0.013, 40, true),
            vertex(0.014, 25, false),
        ];
        let selected = select_vertices(&vertices, 10);
        let xs: Vec<f64> = selected.iter().map(|s| s.x.value).collect();
        assert_eq!(xs, vec![0.011, 0.014]);
    }

    #[test]
    fn test_dxy_relative_to_point() {
        // Track along +x passing through y = 0.02: dxy is the y offset.
        let track = Track { phi: 0.0, vx: 0.3, vy: 0.02 };
        assert!((track.dxy() - 0.02).abs() < 1e-12);
        assert!((track.dxy_from(0.0, 0.01) - 0.01).abs() < 1e-12);

        // Track along +y: dxy is minus the x offset.
        let track = Track { phi: FRAC_PI_2, vx: 0.05, vy: 1.0 };
        assert!((track.dxy() + 0.05).abs() < 1e-12);
    }

    #[test]
    fn test_widths_have_no_vertex_value() {
        let sample = VertexSample::from(&vertex(0.01, 12, false));
        assert_eq!(sample.measurement(Variable::X).map(|m| m.value), Some(0.01));
        assert_eq!(sample.measurement(Variable::SigmaZ), None);
    }

    #[test]
    fn test_auxiliary_fill_uses_beam_spot_position() {
        let mut aux = AuxiliaryDistributions::default();
        let beam_spot = Estimate::at_position(0.0, 0.01, 0.0, BeamSpotKind::Tracker);
        aux.fill_tracks(&[Track { phi: 0.0, vx: 0.0, vy: 0.03 }], &beam_spot);

        assert_eq!(aux.d0_phi0.entries(), 1);
        assert_eq!(aux.dxy_beam_spot.entries(), 1);
        assert!((aux.dxy_beam_spot.mean().unwrap() + 0.02).abs() < 1e-12);
    }
}
