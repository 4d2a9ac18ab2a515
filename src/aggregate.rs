//! Grid-based spatial binning.
//!
//! Samples are keyed by `round(coord / cell_size)` on both axes. Each cell
//! accumulates intensity-weighted position sums, so its centroid is pulled
//! toward its hottest members rather than sitting at the arithmetic mean.
//! A cell's intensity is the clamped *sum* of member intensities: corroborated
//! areas glow hotter than any single report.
//!
//! Accumulation is commutative and accumulators merge, so binning can be
//! split across batches (or threads with the `parallel` feature).

use std::collections::BTreeMap;

use geo::Coord;
use log::debug;

use crate::scoring::{point_intensity, score_samples};
use crate::{HeatConfig, HeatEntry, RawSample};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Integer grid indices `(lat_index, lng_index)`.
///
/// Two samples share a cell iff both indices match exactly; there is no
/// fuzzy matching across cell boundaries.
pub type CellKey = (i64, i64);

/// Compute the grid key for a coordinate.
#[inline]
pub fn cell_key(lat: f64, lng: f64, cell_size: f64) -> CellKey {
    (
        (lat / cell_size).round() as i64,
        (lng / cell_size).round() as i64,
    )
}

/// Running sums for one grid cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridCell {
    /// Σ position × intensity, with `x = lng`, `y = lat`
    pub weighted_sum: Coord<f64>,
    /// Σ intensity
    pub weight_sum: f64,
    pub member_count: u32,
}

impl Default for GridCell {
    fn default() -> Self {
        Self {
            weighted_sum: Coord { x: 0.0, y: 0.0 },
            weight_sum: 0.0,
            member_count: 0,
        }
    }
}

impl GridCell {
    fn add(&mut self, lat: f64, lng: f64, intensity: f64) {
        self.weighted_sum = self.weighted_sum + Coord { x: lng, y: lat } * intensity;
        self.weight_sum += intensity;
        self.member_count += 1;
    }

    fn absorb(&mut self, other: &GridCell) {
        self.weighted_sum = self.weighted_sum + other.weighted_sum;
        self.weight_sum += other.weight_sum;
        self.member_count += other.member_count;
    }

    /// Intensity-weighted mean position as `(lat, lng)`.
    pub fn centroid(&self) -> (f64, f64) {
        let c = self.weighted_sum / self.weight_sum;
        (c.y, c.x)
    }

    /// Summed member intensity, clamped to `max_intensity`.
    pub fn intensity(&self, max_intensity: f64) -> f64 {
        self.weight_sum.min(max_intensity)
    }
}

/// Sparse grid of accumulating cells.
///
/// Cells are kept in key order so output is deterministic regardless of
/// insertion order.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAccumulator {
    cell_size: f64,
    cells: BTreeMap<CellKey, GridCell>,
}

impl GridAccumulator {
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size,
            cells: BTreeMap::new(),
        }
    }

    pub fn cell_size(&self) -> f64 {
        self.cell_size
    }

    /// Add a position with an already-computed point intensity.
    ///
    /// Non-finite coordinates and non-positive or non-finite weights are ignored.
    pub fn add(&mut self, lat: f64, lng: f64, intensity: f64) {
        if !lat.is_finite() || !lng.is_finite() || !(intensity.is_finite() && intensity > 0.0) {
            return;
        }
        let key = cell_key(lat, lng, self.cell_size);
        self.cells.entry(key).or_default().add(lat, lng, intensity);
    }

    /// Score a sample and add it. Returns false if the sample was dropped.
    pub fn add_sample(&mut self, sample: &RawSample, config: &HeatConfig) -> bool {
        if !sample.has_valid_coords() {
            return false;
        }
        self.add(sample.lat, sample.lng, point_intensity(sample, config));
        true
    }

    /// Fold another accumulator's sums into this one.
    ///
    /// Both accumulators must use the same cell size.
    pub fn merge(mut self, other: GridAccumulator) -> GridAccumulator {
        debug_assert_eq!(self.cell_size, other.cell_size);
        for (key, cell) in other.cells {
            self.cells.entry(key).or_default().absorb(&cell);
        }
        self
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn get(&self, key: &CellKey) -> Option<&GridCell> {
        self.cells.get(key)
    }

    pub fn cells(&self) -> impl Iterator<Item = (&CellKey, &GridCell)> {
        self.cells.iter()
    }

    /// One entry per cell at its weighted centroid.
    pub fn to_entries(&self, max_intensity: f64) -> Vec<HeatEntry> {
        self.cells
            .values()
            .map(|cell| {
                let (lat, lng) = cell.centroid();
                HeatEntry::new(lat, lng, cell.intensity(max_intensity))
            })
            .collect()
    }
}

/// Bin all valid samples into a fresh accumulator.
pub fn aggregate(samples: &[RawSample], config: &HeatConfig) -> GridAccumulator {
    let mut grid = GridAccumulator::new(config.cell_size_deg);
    let mut dropped = 0usize;
    for sample in samples {
        if !grid.add_sample(sample, config) {
            dropped += 1;
        }
    }
    if dropped > 0 {
        debug!("[aggregate] Skipped {} samples with invalid coordinates", dropped);
    }
    grid
}

/// Parallel binning: per-thread accumulators reduced with [`GridAccumulator::merge`].
#[cfg(feature = "parallel")]
pub fn aggregate_parallel(samples: &[RawSample], config: &HeatConfig) -> GridAccumulator {
    let cell_size = config.cell_size_deg;
    samples
        .par_iter()
        .fold(
            || GridAccumulator::new(cell_size),
            |mut grid, sample| {
                grid.add_sample(sample, config);
                grid
            },
        )
        .reduce(|| GridAccumulator::new(cell_size), GridAccumulator::merge)
}

/// Produce the render payload entries for a point set.
///
/// With aggregation on this yields one entry per cell; otherwise one per
/// valid sample.
pub fn build_heat_entries(samples: &[RawSample], config: &HeatConfig) -> Vec<HeatEntry> {
    if !config.aggregate {
        return score_samples(samples, config);
    }

    #[cfg(feature = "parallel")]
    let grid = aggregate_parallel(samples, config);
    #[cfg(not(feature = "parallel"))]
    let grid = aggregate(samples, config);

    debug!(
        "[aggregate] {} samples -> {} cells (cell size {}°)",
        samples.len(),
        grid.len(),
        config.cell_size_deg
    );
    grid.to_entries(config.max_intensity)
}
