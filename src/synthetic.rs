//! Seeded synthetic safety-audit data.
//!
//! Produces gaussian hotspot clusters (each with its own score, sample-count
//! and confidence profile and band) over a field of scattered, mostly safe
//! background points. Output is deterministic for a given seed, which makes
//! it suitable for demos, benchmarks and pipeline tests.

use std::f64::consts::PI;

use serde_json::{json, Value};

use crate::{Band, Bounds, RawSample};

/// Positional spread of a cluster in degrees.
const CLUSTER_SPREAD_DEG: f64 = 0.0022;

/// One hotspot cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterSpec {
    pub center: (f64, f64),
    pub count: usize,
    pub score_mean: f64,
    pub score_sigma: f64,
    pub samples_mean: f64,
    pub confidence_mean: f64,
    pub band: Band,
}

/// A generated audit: the sample plus the band it was reported in.
#[derive(Debug, Clone, PartialEq)]
pub struct SyntheticAudit {
    pub sample: RawSample,
    pub band: Band,
}

/// A reproducible audit dataset.
#[derive(Debug, Clone)]
pub struct SyntheticScenario {
    pub seed: u64,
    pub clusters: Vec<ClusterSpec>,
    /// Number of scattered background points
    pub background_count: usize,
    /// Area the background points are drawn from
    pub background_bounds: Bounds,
}

impl Default for SyntheticScenario {
    /// Five hotspots along a north-south corridor with 40 background points.
    fn default() -> Self {
        let cluster = |center, count, score_mean, score_sigma, samples_mean, confidence_mean, band| {
            ClusterSpec {
                center,
                count,
                score_mean,
                score_sigma,
                samples_mean,
                confidence_mean,
                band,
            }
        };
        Self {
            seed: 12345,
            clusters: vec![
                cluster((13.052, 77.592), 40, 0.08, 0.03, 6.0, 0.12, Band::Midnight),
                cluster((13.008, 77.585), 30, 0.18, 0.05, 8.0, 0.18, Band::Night),
                cluster((12.995, 77.594), 35, 0.32, 0.06, 5.0, 0.25, Band::Evening),
                cluster((13.070, 77.590), 45, 0.78, 0.07, 10.0, 0.8, Band::Morning),
                cluster((13.030, 77.587), 50, 0.48, 0.18, 4.0, 0.4, Band::Afternoon),
            ],
            background_count: 40,
            background_bounds: Bounds::new(77.582, 12.985, 77.600, 13.095),
        }
    }
}

impl SyntheticScenario {
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Total number of audits [`generate`](Self::generate) will return.
    pub fn len(&self) -> usize {
        self.clusters.iter().map(|c| c.count).sum::<usize>() + self.background_count
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Generate clustered audits followed by background audits.
    pub fn generate(&self) -> Vec<SyntheticAudit> {
        let mut rng = fastrand::Rng::with_seed(self.seed);
        let mut audits = Vec::with_capacity(self.len());

        for c in &self.clusters {
            for _ in 0..c.count {
                let lat = round_to(gauss(&mut rng, c.center.0, CLUSTER_SPREAD_DEG), 6);
                let lng = round_to(gauss(&mut rng, c.center.1, CLUSTER_SPREAD_DEG), 6);
                let score = gauss(&mut rng, c.score_mean, c.score_sigma).clamp(0.0, 1.0);
                let samples_sigma = (c.samples_mean * 0.4).max(1.0);
                let samples = (gauss(&mut rng, c.samples_mean, samples_sigma).abs() as u32).max(1);
                let confidence = gauss(&mut rng, c.confidence_mean, 0.07).clamp(0.01, 1.0);

                audits.push(SyntheticAudit {
                    sample: RawSample::new(lat, lng)
                        .with_score(round_to(score, 4))
                        .with_samples(samples)
                        .with_confidence(round_to(confidence, 3)),
                    band: c.band,
                });
            }
        }

        let b = self.background_bounds;
        let daytime = [Band::Morning, Band::Afternoon, Band::Evening];
        for _ in 0..self.background_count {
            let lat = round_to(uniform(&mut rng, b.south, b.north), 6);
            let lng = round_to(uniform(&mut rng, b.west, b.east), 6);
            let score = round_to(uniform(&mut rng, 0.6, 0.95), 3);
            let samples = rng.u32(1..=6);
            let confidence = round_to(uniform(&mut rng, 0.5, 0.95), 3);

            audits.push(SyntheticAudit {
                sample: RawSample::new(lat, lng)
                    .with_score(score)
                    .with_samples(samples)
                    .with_confidence(confidence),
                band: daytime[rng.usize(..daytime.len())],
            });
        }

        audits
    }

    /// Generated audits as wire records, the way a point source serves them.
    pub fn to_wire_records(&self) -> Vec<Value> {
        self.generate()
            .into_iter()
            .map(|a| {
                json!({
                    "lat": a.sample.lat,
                    "lng": a.sample.lng,
                    "score": a.sample.score,
                    "samples": a.sample.samples,
                    "confidence": a.sample.confidence,
                    "band": a.band,
                })
            })
            .collect()
    }
}

/// Box-Muller normal draw.
fn gauss(rng: &mut fastrand::Rng, mean: f64, sigma: f64) -> f64 {
    let u1 = rng.f64().max(f64::MIN_POSITIVE);
    let u2 = rng.f64();
    mean + sigma * (-2.0 * u1.ln()).sqrt() * (2.0 * PI * u2).cos()
}

fn uniform(rng: &mut fastrand::Rng, lo: f64, hi: f64) -> f64 {
    lo + (hi - lo) * rng.f64()
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
