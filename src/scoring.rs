//! Intensity scoring.
//!
//! A safety score is inverted to risk, boosted by how many observations back
//! it, amplified, then clamped:
//!
//! ```text
//! base      = score is None ? 0.75 : clamp(1 - score, 0, 1)
//! boost     = min(2.0, 0.45 + log10(samples + 1) * 0.32)
//! intensity = clamp(base * boost * amplifier, min_intensity, max_intensity)
//! ```
//!
//! Unscored locations default to a moderately high risk so they are not
//! suppressed on the map.

use log::debug;

use crate::{HeatConfig, HeatEntry, RawSample};

/// Boost for a single observation before the log term.
pub const BOOST_BASE: f64 = 0.45;
/// Weight of `log10(samples + 1)` in the boost.
pub const BOOST_SLOPE: f64 = 0.32;
/// Saturation point of the boost.
pub const BOOST_CEILING: f64 = 2.0;

/// Risk in [0, 1] for a safety score.
///
/// `None` (or a non-finite score) maps to `unknown_risk`.
#[inline]
pub fn base_risk(score: Option<f64>, unknown_risk: f64) -> f64 {
    match score {
        Some(s) if s.is_finite() => (1.0 - s).clamp(0.0, 1.0),
        _ => unknown_risk,
    }
}

/// Corroboration boost, monotonically increasing and saturating at 2.0.
///
/// Counts of zero are floored to one.
#[inline]
pub fn sample_boost(samples: u32) -> f64 {
    let n = samples.max(1) as f64;
    (BOOST_BASE + (n + 1.0).log10() * BOOST_SLOPE).min(BOOST_CEILING)
}

/// Clamped intensity of one sample. Coordinates are not inspected.
///
/// Never panics, even for a config that fails [`HeatConfig::validate`]:
/// with `min_intensity > max_intensity` the upper bound wins.
pub fn point_intensity(sample: &RawSample, config: &HeatConfig) -> f64 {
    let base = base_risk(sample.score, config.unknown_score_risk);
    let boost = sample_boost(sample.effective_samples());
    (base * boost * config.visual_amplifier)
        .max(config.min_intensity)
        .min(config.max_intensity)
}

/// Score one sample, rejecting non-finite coordinates.
pub fn score_sample(sample: &RawSample, config: &HeatConfig) -> Option<HeatEntry> {
    if !sample.has_valid_coords() {
        return None;
    }
    Some(HeatEntry::new(
        sample.lat,
        sample.lng,
        point_intensity(sample, config),
    ))
}

/// One heat entry per valid sample, in input order.
pub fn score_samples(samples: &[RawSample], config: &HeatConfig) -> Vec<HeatEntry> {
    let entries: Vec<HeatEntry> = samples
        .iter()
        .filter_map(|s| score_sample(s, config))
        .collect();

    let dropped = samples.len() - entries.len();
    if dropped > 0 {
        debug!("[scoring] Skipped {} samples with invalid coordinates", dropped);
    }
    entries
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn intensity(score: Option<f64>, samples: u32) -> f64 {
        let mut sample = RawSample::new(13.0, 77.5).with_samples(samples);
        sample.score = score;
        point_intensity(&sample, &HeatConfig::default())
    }

    #[test]
    fn test_base_risk() {
        assert_eq!(base_risk(None, 0.75), 0.75);
        assert_eq!(base_risk(Some(0.2), 0.75), 0.8);
        assert_eq!(base_risk(Some(1.5), 0.75), 0.0);
        assert_eq!(base_risk(Some(-0.5), 0.75), 1.0);
        assert_eq!(base_risk(Some(f64::NAN), 0.75), 0.75);
    }

    #[test]
    fn test_sample_boost() {
        // log10(2) term for a single observation
        assert!((sample_boost(1) - (0.45 + 2f64.log10() * 0.32)).abs() < 1e-12);
        // log10(10) = 1
        assert!((sample_boost(9) - 0.77).abs() < 1e-12);
        assert_eq!(sample_boost(0), sample_boost(1));
        assert_eq!(sample_boost(u32::MAX), BOOST_CEILING);
    }

    #[test]
    fn test_unknown_score_intensity() {
        let expected = 0.75 * sample_boost(1) * 2.0;
        assert!((intensity(None, 1) - expected).abs() < 1e-12);
        // The boost is log10(samples + 1), so one observation already lifts it
        // above 0.45: the result is ~0.8195, not 0.75 * 0.45 * 2.0 = 0.675
        assert!((intensity(None, 1) - 0.675).abs() > 0.1);
        assert!((intensity(None, 1) - 0.8195).abs() < 1e-4);
        // Unknown is not zero-risk
        assert!(intensity(None, 1) > intensity(Some(1.0), 1));
    }

    #[test]
    fn test_perfectly_safe_hits_floor() {
        assert_eq!(intensity(Some(1.0), 1), 0.01);
        assert_eq!(intensity(Some(1.0), 1000), 0.01);
    }

    #[test]
    fn test_inverted_bounds_do_not_panic() {
        let config = HeatConfig {
            min_intensity: 5.0,
            ..HeatConfig::default()
        };
        let sample = RawSample::new(13.0, 77.5).with_score(0.5);
        assert_eq!(point_intensity(&sample, &config), 4.0);
        assert_eq!(crate::build_heat_entries(&[sample], &config).len(), 1);
    }

    #[test]
    fn test_clamp_ceiling() {
        let mut config = HeatConfig::default();
        config.visual_amplifier = 100.0;
        let sample = RawSample::new(0.0, 0.0).with_score(0.0).with_samples(50);
        assert_eq!(point_intensity(&sample, &config), 4.0);
    }

    #[test]
    fn test_invalid_coordinates_rejected() {
        let config = HeatConfig::default();
        let samples = vec![
            RawSample::new(f64::NAN, 12.9),
            RawSample::new(13.0, 77.5).with_score(0.3),
            RawSample::new(13.0, f64::NEG_INFINITY),
        ];
        let entries = score_samples(&samples, &config);
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].lat, 13.0);
    }

    proptest! {
        #[test]
        fn prop_intensity_within_bounds(
            score in proptest::option::of(-10.0f64..10.0),
            samples in any::<u32>(),
        ) {
            let i = intensity(score, samples);
            prop_assert!(i.is_finite());
            prop_assert!((0.01..=4.0).contains(&i));
        }

        #[test]
        fn prop_intensity_non_increasing_in_score(a in 0.0f64..=1.0, b in 0.0f64..=1.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(intensity(Some(hi), 1) <= intensity(Some(lo), 1));
        }

        #[test]
        fn prop_boost_monotonic(a in 0u32..100_000, b in 0u32..100_000) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(sample_boost(lo) <= sample_boost(hi));
            prop_assert!(sample_boost(hi) <= BOOST_CEILING);
        }
    }
}
