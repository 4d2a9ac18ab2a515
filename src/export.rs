//! CSV export and point-set summary.
//!
//! Export format: header `lat,lng,score,samples,confidence`, one row per
//! sample in source order, missing values as empty fields.

use serde::{Deserialize, Serialize};

use crate::{OptionExt, RawSample, Result};

pub const CSV_HEADER: &str = "lat,lng,score,samples,confidence";

/// Render samples as CSV text.
///
/// # Example
/// ```
/// use safeheat::{to_csv, RawSample};
/// let csv = to_csv(&[RawSample::new(13.05, 77.59).with_samples(4)]);
/// assert_eq!(csv, "lat,lng,score,samples,confidence\n13.05,77.59,,4,\n");
/// ```
pub fn to_csv(samples: &[RawSample]) -> String {
    let mut out = String::with_capacity(CSV_HEADER.len() + 1 + samples.len() * 40);
    out.push_str(CSV_HEADER);
    out.push('\n');

    for s in samples {
        out.push_str(&format!(
            "{},{},{},{},{}\n",
            s.lat,
            s.lng,
            opt_field(s.score),
            opt_field(s.samples),
            opt_field(s.confidence),
        ));
    }
    out
}

fn opt_field<T: ToString>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

/// Parse CSV produced by [`to_csv`].
///
/// The header row is required. Blank lines are skipped.
pub fn parse_csv(text: &str) -> Result<Vec<RawSample>> {
    let mut lines = text.lines().enumerate();

    let (_, header) = lines.next().ok_or_csv(1, "missing header")?;
    if header.trim() != CSV_HEADER {
        return Err(crate::HeatError::Csv {
            line: 1,
            message: format!("unexpected header '{}'", header.trim()),
        });
    }

    let mut samples = Vec::new();
    for (idx, line) in lines {
        let line_no = idx + 1;
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }

        let fields: Vec<&str> = line.split(',').collect();
        if fields.len() != 5 {
            return Err(crate::HeatError::Csv {
                line: line_no,
                message: format!("expected 5 fields, found {}", fields.len()),
            });
        }

        let lat = parse_coord(fields[0], line_no, "lat")?;
        let lng = parse_coord(fields[1], line_no, "lng")?;

        samples.push(RawSample {
            lat,
            lng,
            score: parse_field(fields[2], line_no, "score")?,
            samples: parse_field(fields[3], line_no, "samples")?,
            confidence: parse_field(fields[4], line_no, "confidence")?,
        });
    }
    Ok(samples)
}

/// Required coordinate; `NaN` and infinities are rejected.
fn parse_coord(raw: &str, line: usize, name: &str) -> Result<f64> {
    let value = parse_field::<f64>(raw, line, name)?
        .ok_or_csv(line, &format!("missing {}", name))?;
    if !value.is_finite() {
        return Err(crate::HeatError::Csv {
            line,
            message: format!("{} '{}' is not finite", name, raw.trim()),
        });
    }
    Ok(value)
}

fn parse_field<T: std::str::FromStr>(raw: &str, line: usize, name: &str) -> Result<Option<T>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Ok(None);
    }
    raw.parse::<T>()
        .map(Some)
        .map_err(|_| crate::HeatError::Csv {
            line,
            message: format!("invalid {} '{}'", name, raw),
        })
}

/// Headline numbers for the current point set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PointSetSummary {
    pub total: usize,
    pub scored: usize,
    pub unscored: usize,
    /// Σ observation counts (each sample counts at least once)
    pub total_samples: u64,
    /// Mean over scored samples only
    pub mean_score: Option<f64>,
    /// Scored sample with the lowest safety score
    pub riskiest: Option<RawSample>,
}

impl PointSetSummary {
    pub fn from_samples(samples: &[RawSample]) -> Self {
        let mut summary = Self {
            total: samples.len(),
            ..Self::default()
        };

        let mut score_sum = 0.0;
        for s in samples {
            summary.total_samples += s.effective_samples() as u64;
            let Some(score) = s.score else {
                summary.unscored += 1;
                continue;
            };
            summary.scored += 1;
            score_sum += score;

            let riskier = summary
                .riskiest
                .as_ref()
                .and_then(|r| r.score)
                .map_or(true, |current| score < current);
            if riskier {
                summary.riskiest = Some(s.clone());
            }
        }

        if summary.scored > 0 {
            summary.mean_score = Some(score_sum / summary.scored as f64);
        }
        summary
    }
}
