//! # Safeheat
//!
//! Spatial intensity aggregation for geotagged safety-audit samples.
//!
//! This library provides:
//! - An intensity scorer turning a safety score and sample count into bounded heat
//! - Grid-based spatial binning with intensity-weighted centroids
//! - A gradient mapper for the discrete-marker fallback
//! - A debounced, latest-wins refresh scheduler driving fetch → aggregate → render
//!
//! ## Features
//!
//! - **`parallel`** - Enable parallel grid aggregation with rayon
//! - **`http`** - Enable the reqwest-backed point source
//! - **`synthetic`** - Enable the seeded synthetic audit generator
//! - **`full`** - Enable all features
//!
//! ## Quick Start
//!
//! ```rust
//! use safeheat::{build_heat_entries, HeatConfig, RawSample};
//!
//! let samples = vec![
//!     RawSample::new(13.052, 77.592).with_score(0.1).with_samples(6),
//!     RawSample::new(13.0521, 77.5921).with_score(0.2),
//! ];
//!
//! // Both samples fall in the same ~150 m cell, so they merge into one entry
//! let entries = build_heat_entries(&samples, &HeatConfig::default());
//! assert_eq!(entries.len(), 1);
//! assert!(entries[0].intensity <= 4.0);
//! ```

use serde::{Deserialize, Serialize};

// Unified error handling
pub mod error;
pub use error::{HeatError, OptionExt, Result};

// Engine and renderer configuration
pub mod config;
pub use config::{HeatConfig, LayerConfig};

// Raw sample -> intensity
pub mod scoring;
pub use scoring::{base_risk, point_intensity, sample_boost, score_sample, score_samples};

// Grid binning with weighted centroids
pub mod aggregate;
#[cfg(feature = "parallel")]
pub use aggregate::aggregate_parallel;
pub use aggregate::{aggregate, build_heat_entries, cell_key, CellKey, GridAccumulator, GridCell};

// Normalized scalar -> color stop
pub mod gradient;
pub use gradient::{GradientStop, GradientTable, Rgb};

// Wire normalization at the fetch boundary
pub mod ingest;
pub use ingest::{normalize_record, parse_response, parse_response_with_report, IngestReport};

// Fetch contract
pub mod source;
pub use source::{Band, FetchRequest, PointSource};

// HTTP point source
#[cfg(feature = "http")]
pub mod http;
#[cfg(feature = "http")]
pub use http::HttpPointSource;

// Hand-off to the rendering collaborator
pub mod render;
pub use render::{present, FallbackMarker, HeatFrame, RenderPath, RenderTarget};

// CSV export and point-set summary
pub mod export;
pub use export::{parse_csv, to_csv, PointSetSummary};

// Nearest-sample lookup for popups
pub mod index;
pub use index::SampleIndex;

// Viewport-driven refresh cycles
pub mod scheduler;
pub use scheduler::{RefreshEvent, RefreshEvents, RefreshScheduler};

// Seeded audit generator for demos and load tests
#[cfg(feature = "synthetic")]
pub mod synthetic;
#[cfg(feature = "synthetic")]
pub use synthetic::{ClusterSpec, SyntheticAudit, SyntheticScenario};

// ============================================================================
// Core Types
// ============================================================================

/// A geotagged safety-audit sample in canonical form.
///
/// Produced once at ingestion by [`normalize_record`]; every alias the wire
/// format accepts has already been resolved.
///
/// # Example
/// ```
/// use safeheat::RawSample;
/// let sample = RawSample::new(13.052, 77.592).with_score(0.08).with_samples(6);
/// assert_eq!(sample.effective_samples(), 6);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawSample {
    pub lat: f64,
    pub lng: f64,
    /// Safety score in [0, 1]. `None` means unknown safety, not zero.
    pub score: Option<f64>,
    /// Number of underlying observations. `None` counts as one.
    pub samples: Option<u32>,
    /// Carried through untouched; never computed here.
    pub confidence: Option<f64>,
}

impl RawSample {
    /// Create a sample with only coordinates set.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self {
            lat,
            lng,
            score: None,
            samples: None,
            confidence: None,
        }
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score);
        self
    }

    pub fn with_samples(mut self, samples: u32) -> Self {
        self.samples = Some(samples);
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = Some(confidence);
        self
    }

    /// Check that both coordinates are finite.
    ///
    /// Samples failing this check are dropped by every consumer; they are
    /// never scored, binned or exported as heat.
    pub fn has_valid_coords(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Observation count with the floor of one applied.
    pub fn effective_samples(&self) -> u32 {
        self.samples.unwrap_or(1).max(1)
    }
}

/// A renderable heat point.
///
/// `intensity` is always finite and inside the configured clamp bounds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatEntry {
    pub lat: f64,
    pub lng: f64,
    pub intensity: f64,
}

impl HeatEntry {
    pub fn new(lat: f64, lng: f64, intensity: f64) -> Self {
        Self {
            lat,
            lng,
            intensity,
        }
    }

    /// `[lat, lng, intensity]`, the shape heat layers consume.
    pub fn to_triple(&self) -> [f64; 3] {
        [self.lat, self.lng, self.intensity]
    }
}

/// Viewport bounds in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Parse a `west,south,east,north` bbox string.
    ///
    /// # Example
    /// ```
    /// use safeheat::Bounds;
    /// let b = Bounds::parse_bbox("77.58,12.98,77.60,13.09").unwrap();
    /// assert_eq!(b.to_bbox_string(), "77.58,12.98,77.6,13.09");
    /// ```
    pub fn parse_bbox(bbox: &str) -> Result<Self> {
        let parts: Vec<&str> = bbox.split(',').map(str::trim).collect();
        if parts.len() != 4 {
            return Err(HeatError::InvalidBbox {
                message: format!("expected 4 comma-separated values, got {}", parts.len()),
            });
        }

        let mut values = [0.0_f64; 4];
        for (slot, part) in values.iter_mut().zip(&parts) {
            let value: f64 = part.parse().map_err(|_| HeatError::InvalidBbox {
                message: format!("'{}' is not a number", part),
            })?;
            if !value.is_finite() {
                return Err(HeatError::InvalidBbox {
                    message: format!("'{}' is not finite", part),
                });
            }
            *slot = value;
        }

        Ok(Self::new(values[0], values[1], values[2], values[3]))
    }

    /// Format as `west,south,east,north`.
    pub fn to_bbox_string(&self) -> String {
        format!("{},{},{},{}", self.west, self.south, self.east, self.north)
    }

    /// Inclusive containment test.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        lat >= self.south && lat <= self.north && lng >= self.west && lng <= self.east
    }

    /// Centre as `(lat, lng)`.
    pub fn center(&self) -> (f64, f64) {
        (
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }
}
