//! Fixed-binning 1-D histogram and profile.

use serde::{Deserialize, Serialize};

/// Uniformly binned 1-D histogram with underflow and overflow slots.
///
/// Bin `0` is underflow, bins `1..=nbins` are in range and `nbins + 1` is
/// overflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Histogram1D {
    nbins: usize,
    low: f64,
    high: f64,
    counts: Vec<f64>,
    entries: u64,
    sum: f64,
    sum_sq: f64,
}

impl Histogram1D {
    pub fn new(nbins: usize, low: f64, high: f64) -> Self {
        debug_assert!(nbins > 0 && high > low);
        Self {
            nbins,
            low,
            high,
            counts: vec![0.0; nbins + 2],
            entries: 0,
            sum: 0.0,
            sum_sq: 0.0,
        }
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }

    pub fn low(&self) -> f64 {
        self.low
    }

    pub fn high(&self) -> f64 {
        self.high
    }

    pub fn bin_width(&self) -> f64 {
        (self.high - self.low) / self.nbins as f64
    }

    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x < self.low {
            0
        } else if x >= self.high {
            self.nbins + 1
        } else {
            let bin = ((x - self.low) / self.bin_width()) as usize + 1;
            bin.min(self.nbins)
        }
    }

    pub fn fill(&mut self, x: f64) {
        let bin = self.find_bin(x);
        self.counts[bin] += 1.0;
        self.entries += 1;
        if (1..=self.nbins).contains(&bin) {
            self.sum += x;
            self.sum_sq += x * x;
        }
    }

    pub fn bin_content(&self, bin: usize) -> f64 {
        self.counts.get(bin).copied().unwrap_or(0.0)
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.low + (bin as f64 - 0.5) * self.bin_width()
    }

    /// All fills, including under- and overflow.
    pub fn entries(&self) -> u64 {
        self.entries
    }

    pub fn underflow(&self) -> f64 {
        self.counts[0]
    }

    pub fn overflow(&self) -> f64 {
        self.counts[self.nbins + 1]
    }

    /// In-range contents, without the under/overflow slots.
    pub fn contents(&self) -> &[f64] {
        &self.counts[1..=self.nbins]
    }

    fn in_range(&self) -> f64 {
        self.contents().iter().sum()
    }

    /// Mean of the in-range fills.
    pub fn mean(&self) -> Option<f64> {
        let n = self.in_range();
        (n > 0.0).then(|| self.sum / n)
    }

    pub fn rms(&self) -> Option<f64> {
        let n = self.in_range();
        if n <= 0.0 {
            return None;
        }
        let mean = self.sum / n;
        Some((self.sum_sq / n - mean * mean).max(0.0).sqrt())
    }
}

/// Per-bin mean of `y` as a function of `x`.
///
/// Fills whose `y` lies outside `[y_low, y_high]` are rejected, as are fills
/// whose `x` lies outside the binning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile1D {
    axis: Histogram1D,
    y_low: f64,
    y_high: f64,
    sum_y: Vec<f64>,
    sum_y_sq: Vec<f64>,
    rejected: u64,
}

impl Profile1D {
    pub fn new(nbins: usize, low: f64, high: f64, y_low: f64, y_high: f64) -> Self {
        Self {
            axis: Histogram1D::new(nbins, low, high),
            y_low,
            y_high,
            sum_y: vec![0.0; nbins + 2],
            sum_y_sq: vec![0.0; nbins + 2],
            rejected: 0,
        }
    }

    pub fn fill(&mut self, x: f64, y: f64) {
        let bin = self.axis.find_bin(x);
        if !(self.y_low..=self.y_high).contains(&y) || bin == 0 || bin > self.axis.nbins() {
            self.rejected += 1;
            return;
        }
        self.axis.fill(x);
        self.sum_y[bin] += y;
        self.sum_y_sq[bin] += y * y;
    }

    pub fn nbins(&self) -> usize {
        self.axis.nbins()
    }

    pub fn entries(&self) -> u64 {
        self.axis.entries()
    }

    pub fn rejected(&self) -> u64 {
        self.rejected
    }

    pub fn bin_entries(&self, bin: usize) -> f64 {
        self.axis.bin_content(bin)
    }

    pub fn bin_center(&self, bin: usize) -> f64 {
        self.axis.bin_center(bin)
    }

    pub fn bin_mean(&self, bin: usize) -> Option<f64> {
        let n = self.axis.bin_content(bin);
        (n > 0.0).then(|| self.sum_y[bin] / n)
    }

    /// Error on the bin mean (spread over √n).
    pub fn bin_error(&self, bin: usize) -> Option<f64> {
        let n = self.axis.bin_content(bin);
        if n <= 0.0 {
            return None;
        }
        let mean = self.sum_y[bin] / n;
        let variance = (self.sum_y_sq[bin] / n - mean * mean).max(0.0);
        Some((variance / n).sqrt())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_bin_edges() {
        let h = Histogram1D::new(10, 0.0, 1.0);
        assert_eq!(h.find_bin(-0.1), 0);
        assert_eq!(h.find_bin(0.0), 1);
        assert_eq!(h.find_bin(0.05), 1);
        assert_eq!(h.find_bin(0.95), 10);
        assert_eq!(h.find_bin(1.0), 11);
        assert_eq!(h.find_bin(f64::NAN), 0);
    }

    #[test]
    fn test_fill_tracks_under_and_overflow() {
        let mut h = Histogram1D::new(4, -1.0, 1.0);
        h.fill(-2.0);
        h.fill(0.25);
        h.fill(0.75);
        h.fill(5.0);

        assert_eq!(h.entries(), 4);
        assert_eq!(h.underflow(), 1.0);
        assert_eq!(h.overflow(), 1.0);
        assert_eq!(h.contents(), &[0.0, 0.0, 1.0, 1.0]);
        assert!((h.mean().unwrap() - 0.5).abs() < 1e-12);
        assert!((h.rms().unwrap() - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_empty_histogram_has_no_mean() {
        let h = Histogram1D::new(4, -1.0, 1.0);
        assert_eq!(h.mean(), None);
        assert_eq!(h.rms(), None);
    }

    #[test]
    fn test_profile_rejects_out_of_range_y() {
        let mut p = Profile1D::new(2, -1.0, 1.0, -0.5, 0.5);
        p.fill(-0.5, 0.1);
        p.fill(-0.5, 0.3);
        p.fill(0.5, 0.9);
        p.fill(3.0, 0.0);

        assert_eq!(p.entries(), 2);
        assert_eq!(p.rejected(), 2);
        assert!((p.bin_mean(1).unwrap() - 0.2).abs() < 1e-12);
        assert_eq!(p.bin_mean(2), None);
        assert!((p.bin_error(1).unwrap() - (0.01f64 / 2.0).sqrt()).abs() < 1e-12);
    }
}
