//! Hand-off to the rendering collaborator.
//!
//! The engine never draws. It produces a [`HeatFrame`] (triples, gradient,
//! layer parameters) and asks a [`RenderTarget`] to draw it. Targets without
//! a heat layer get discrete markers instead; that is a normal path, not an
//! error.

use log::debug;
use serde::{Deserialize, Serialize};

use crate::scoring::sample_boost;
use crate::{GradientTable, HeatEntry, LayerConfig, RawSample, Rgb};

/// Base radius of a fallback marker in pixels.
const MARKER_BASE_RADIUS: f64 = 6.0;
/// Extra pixels per unit of sample boost.
const MARKER_BOOST_RADIUS: f64 = 4.0;

/// Everything a heat layer needs for one refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatFrame {
    pub entries: Vec<HeatEntry>,
    pub gradient: GradientTable,
    pub layer: LayerConfig,
    /// Whether entries are grid cells (true) or individual samples (false)
    pub aggregated: bool,
}

impl HeatFrame {
    /// `[lat, lng, intensity]` triples in entry order.
    pub fn triples(&self) -> Vec<[f64; 3]> {
        self.entries.iter().map(HeatEntry::to_triple).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A colored circle for renderers without a heat layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FallbackMarker {
    pub lat: f64,
    pub lng: f64,
    pub color: Rgb,
    pub radius: f64,
}

impl FallbackMarker {
    /// Marker for one sample, colored by its safety score.
    ///
    /// Returns `None` for samples with invalid coordinates.
    pub fn from_sample(
        sample: &RawSample,
        gradient: &GradientTable,
        unknown_risk: f64,
    ) -> Option<Self> {
        if !sample.has_valid_coords() {
            return None;
        }
        Some(Self {
            lat: sample.lat,
            lng: sample.lng,
            color: gradient.color_for_score(sample.score, unknown_risk),
            radius: MARKER_BASE_RADIUS
                + sample_boost(sample.effective_samples()) * MARKER_BOOST_RADIUS,
        })
    }
}

/// Which path [`present`] took.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderPath {
    HeatLayer,
    Markers,
}

/// The external drawing surface.
pub trait RenderTarget {
    /// Whether a heat layer is available.
    fn supports_heat_layer(&self) -> bool;

    fn draw_heat(&mut self, frame: &HeatFrame);

    fn draw_markers(&mut self, markers: &[FallbackMarker]);
}

/// Draw a frame, falling back to per-sample markers when the target has no
/// heat layer.
pub fn present<T: RenderTarget + ?Sized>(
    target: &mut T,
    frame: &HeatFrame,
    samples: &[RawSample],
    unknown_risk: f64,
) -> RenderPath {
    if target.supports_heat_layer() {
        target.draw_heat(frame);
        return RenderPath::HeatLayer;
    }

    let markers: Vec<FallbackMarker> = samples
        .iter()
        .filter_map(|s| FallbackMarker::from_sample(s, &frame.gradient, unknown_risk))
        .collect();
    debug!(
        "[render] No heat layer, drawing {} fallback markers",
        markers.len()
    );
    target.draw_markers(&markers);
    RenderPath::Markers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        heat: bool,
        frames: Vec<HeatFrame>,
        markers: Vec<FallbackMarker>,
    }

    impl RenderTarget for Recorder {
        fn supports_heat_layer(&self) -> bool {
            self.heat
        }

        fn draw_heat(&mut self, frame: &HeatFrame) {
            self.frames.push(frame.clone());
        }

        fn draw_markers(&mut self, markers: &[FallbackMarker]) {
            self.markers.extend_from_slice(markers);
        }
    }

    fn frame() -> HeatFrame {
        HeatFrame {
            entries: vec![HeatEntry::new(13.0, 77.5, 1.2)],
            gradient: GradientTable::default(),
            layer: LayerConfig::default(),
            aggregated: true,
        }
    }

    #[test]
    fn test_triples() {
        assert_eq!(frame().triples(), vec![[13.0, 77.5, 1.2]]);
    }

    #[test]
    fn test_heat_layer_path() {
        let mut target = Recorder {
            heat: true,
            ..Default::default()
        };
        let path = present(&mut target, &frame(), &[], 0.75);
        assert_eq!(path, RenderPath::HeatLayer);
        assert_eq!(target.frames.len(), 1);
        assert!(target.markers.is_empty());
    }

    #[test]
    fn test_marker_fallback_path() {
        let mut target = Recorder::default();
        let samples = vec![
            RawSample::new(13.0, 77.5).with_score(0.0).with_samples(9),
            RawSample::new(13.1, 77.6).with_score(1.0),
            RawSample::new(f64::NAN, 77.6),
        ];
        let path = present(&mut target, &frame(), &samples, 0.75);
        assert_eq!(path, RenderPath::Markers);
        assert!(target.frames.is_empty());
        assert_eq!(target.markers.len(), 2);
        assert_eq!(target.markers[0].color, Rgb::new(255, 0, 0));
        assert_eq!(target.markers[1].color, Rgb::new(0, 0, 255));
        assert!(target.markers[0].radius > target.markers[1].radius);
    }
}
