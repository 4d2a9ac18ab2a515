//! Engine and renderer configuration.
//!
//! All values are constants chosen by the host application. `HeatConfig`
//! drives the scorer, the aggregator and the refresh scheduler;
//! `LayerConfig` is passed through untouched to the rendering collaborator.

use serde::{Deserialize, Serialize};

use crate::{HeatError, Result};

/// Configuration for intensity scoring, aggregation and refresh timing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeatConfig {
    /// Merge nearby samples into grid cells before rendering (default: true)
    pub aggregate: bool,
    /// Grid cell size in degrees (default: 0.0015, roughly 150 m)
    pub cell_size_deg: f64,
    /// Final multiplier applied to risk × boost (default: 2.0)
    pub visual_amplifier: f64,
    /// Lower intensity clamp (default: 0.01)
    pub min_intensity: f64,
    /// Upper intensity clamp, for points and cells alike (default: 4.0)
    pub max_intensity: f64,
    /// Risk assumed for samples without a score (default: 0.75)
    pub unknown_score_risk: f64,
    /// Quiet period after the last viewport change before fetching (default: 300 ms)
    pub debounce_ms: u64,
    /// Drop fetch results older than the newest applied cycle (default: true)
    pub discard_stale_responses: bool,
}

impl Default for HeatConfig {
    fn default() -> Self {
        Self {
            aggregate: true,
            cell_size_deg: 0.0015,
            visual_amplifier: 2.0,
            min_intensity: 0.01,
            max_intensity: 4.0,
            unknown_score_risk: 0.75,
            debounce_ms: 300,
            discard_stale_responses: true,
        }
    }
}

impl HeatConfig {
    /// Defaults with grid aggregation switched off (one entry per sample).
    pub fn unaggregated() -> Self {
        Self {
            aggregate: false,
            ..Self::default()
        }
    }

    /// Override the grid cell size.
    pub fn with_cell_size(mut self, cell_size_deg: f64) -> Self {
        self.cell_size_deg = cell_size_deg;
        self
    }

    /// Load a (possibly partial) JSON document over the defaults.
    ///
    /// # Example
    /// ```
    /// use safeheat::HeatConfig;
    /// let config = HeatConfig::from_json(r#"{"aggregate": false, "debounce_ms": 150}"#).unwrap();
    /// assert!(!config.aggregate);
    /// assert_eq!(config.debounce_ms, 150);
    /// assert_eq!(config.max_intensity, 4.0);
    /// ```
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would break the clamp or binning invariants.
    pub fn validate(&self) -> Result<()> {
        let finite = [
            ("cell_size_deg", self.cell_size_deg),
            ("visual_amplifier", self.visual_amplifier),
            ("min_intensity", self.min_intensity),
            ("max_intensity", self.max_intensity),
            ("unknown_score_risk", self.unknown_score_risk),
        ];
        for (name, value) in finite {
            if !value.is_finite() {
                return Err(HeatError::config(format!("{} must be finite", name)));
            }
        }

        if self.cell_size_deg <= 0.0 {
            return Err(HeatError::config("cell_size_deg must be positive"));
        }
        if self.visual_amplifier <= 0.0 {
            return Err(HeatError::config("visual_amplifier must be positive"));
        }
        // Every accepted sample must contribute positive weight to its cell
        if self.min_intensity <= 0.0 {
            return Err(HeatError::config("min_intensity must be positive"));
        }
        if self.min_intensity > self.max_intensity {
            return Err(HeatError::config(format!(
                "min_intensity {} exceeds max_intensity {}",
                self.min_intensity, self.max_intensity
            )));
        }
        if !(0.0..=1.0).contains(&self.unknown_score_risk) {
            return Err(HeatError::config("unknown_score_risk must be within [0, 1]"));
        }
        Ok(())
    }
}

/// Heat layer parameters for the rendering collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerConfig {
    /// Point radius in pixels
    pub radius: u32,
    /// Blur radius in pixels
    pub blur: u32,
    /// Zoom level at which points reach full intensity
    pub max_zoom: u8,
    /// Intensity mapped to the top gradient stop
    pub max_intensity: f64,
    /// Minimum layer opacity
    pub min_opacity: f64,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            radius: 25,
            blur: 15,
            max_zoom: 17,
            max_intensity: 4.0,
            min_opacity: 0.35,
        }
    }
}
