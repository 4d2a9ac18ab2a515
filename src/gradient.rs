//! Gradient mapping from a normalized scalar to a color.
//!
//! The same table is handed to the heat layer as its gradient and consulted
//! directly by the discrete-marker fallback.

use once_cell::sync::Lazy;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::{HeatError, Result};

/// Default heat gradient: cold blue through lime to hot red.
pub static DEFAULT_GRADIENT: Lazy<GradientTable> = Lazy::new(|| {
    GradientTable::new(vec![
        GradientStop::new(0.0, Rgb::new(0, 0, 255)),
        GradientStop::new(0.25, Rgb::new(0, 255, 255)),
        GradientStop::new(0.5, Rgb::new(0, 255, 0)),
        GradientStop::new(0.75, Rgb::new(255, 255, 0)),
        GradientStop::new(1.0, Rgb::new(255, 0, 0)),
    ])
});

/// An sRGB color, serialized as `#rrggbb`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(hex: &str) -> Result<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(HeatError::config(format!("invalid color '{}'", hex)));
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&digits[range], 16)
                .map_err(|_| HeatError::config(format!("invalid color '{}'", hex)))
        };
        Ok(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    fn lerp(self, other: Rgb, t: f64) -> Rgb {
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Rgb::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Rgb {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let hex = String::deserialize(deserializer)?;
        Rgb::from_hex(&hex).map_err(serde::de::Error::custom)
    }
}

/// A color anchored at a normalized position in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GradientStop {
    pub stop: f64,
    pub color: Rgb,
}

impl GradientStop {
    pub const fn new(stop: f64, color: Rgb) -> Self {
        Self { stop, color }
    }
}

/// Ordered color stops. Never empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "StopList")]
pub struct GradientTable {
    stops: Vec<GradientStop>,
}

#[derive(Deserialize)]
struct StopList {
    stops: Vec<GradientStop>,
}

impl From<StopList> for GradientTable {
    fn from(list: StopList) -> Self {
        GradientTable::new(list.stops)
    }
}

impl Default for GradientTable {
    fn default() -> Self {
        DEFAULT_GRADIENT.clone()
    }
}

impl GradientTable {
    /// Build a table; stops are clamped to [0, 1] and sorted.
    ///
    /// An empty list falls back to the default table.
    pub fn new(mut stops: Vec<GradientStop>) -> Self {
        stops.retain(|s| s.stop.is_finite());
        if stops.is_empty() {
            return DEFAULT_GRADIENT.clone();
        }
        for s in &mut stops {
            s.stop = s.stop.clamp(0.0, 1.0);
        }
        stops.sort_by(|a, b| a.stop.total_cmp(&b.stop));
        Self { stops }
    }

    pub fn stops(&self) -> &[GradientStop] {
        &self.stops
    }

    /// `(stop, "#rrggbb")` pairs for the heat layer.
    pub fn as_pairs(&self) -> Vec<(f64, String)> {
        self.stops.iter().map(|s| (s.stop, s.color.to_hex())).collect()
    }

    /// Color of the highest stop at or below `t`.
    ///
    /// `t` is clamped to [0, 1]; non-finite input maps to the first stop.
    ///
    /// # Example
    /// ```
    /// use safeheat::{GradientTable, Rgb};
    /// let table = GradientTable::default();
    /// assert_eq!(table.color_for(0.6), Rgb::new(0, 255, 0));
    /// assert_eq!(table.color_for(1.0), Rgb::new(255, 0, 0));
    /// ```
    pub fn color_for(&self, t: f64) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        self.stops
            .iter()
            .take_while(|s| s.stop <= t)
            .last()
            .unwrap_or(&self.stops[0])
            .color
    }

    /// Linear blend between the neighbouring stops around `t`.
    pub fn interpolate(&self, t: f64) -> Rgb {
        let t = if t.is_finite() { t.clamp(0.0, 1.0) } else { 0.0 };
        let upper = match self.stops.iter().position(|s| s.stop >= t) {
            Some(i) => i,
            None => return self.stops[self.stops.len() - 1].color,
        };
        if upper == 0 {
            return self.stops[0].color;
        }
        let lo = self.stops[upper - 1];
        let hi = self.stops[upper];
        let span = hi.stop - lo.stop;
        if span <= 0.0 {
            return hi.color;
        }
        lo.color.lerp(hi.color, (t - lo.stop) / span)
    }

    /// Color for a safety score; higher safety sits lower on the ramp.
    pub fn color_for_score(&self, score: Option<f64>, unknown_risk: f64) -> Rgb {
        self.color_for(crate::scoring::base_risk(score, unknown_risk))
    }

    /// Color for an intensity relative to `max_intensity`.
    pub fn color_for_intensity(&self, intensity: f64, max_intensity: f64) -> Rgb {
        if max_intensity <= 0.0 {
            return self.stops[0].color;
        }
        self.color_for(intensity / max_intensity)
    }
}
