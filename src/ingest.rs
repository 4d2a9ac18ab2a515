//! Wire normalization at the fetch boundary.
//!
//! Point sources return JSON in one of three envelopes: a bare array, an
//! object with a `points` array, or an object with a `data` array. Records
//! use several alias spellings per field. Both are resolved here, once, so
//! everything downstream works on canonical [`RawSample`]s.
//!
//! A record without usable coordinates is dropped silently; it never fails
//! the batch. An unrecognized envelope fails the whole fetch.

use log::debug;
use serde_json::{Map, Value};

use crate::{HeatError, RawSample, Result};

const LAT_KEYS: &[&str] = &["lat", "latitude", "lat_deg"];
const LNG_KEYS: &[&str] = &["lng", "longitude", "lon", "lng_deg"];
const SCORE_KEYS: &[&str] = &["score"];
const SAMPLES_KEYS: &[&str] = &["samples", "count"];
const CONFIDENCE_KEYS: &[&str] = &["confidence", "confidence_numeric"];

/// The validated shape of a fetch response.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseEnvelope {
    /// `[ {...}, ... ]`
    Bare(Vec<Value>),
    /// `{ "points": [ ... ] }`
    Points(Vec<Value>),
    /// `{ "data": [ ... ] }`
    Data(Vec<Value>),
}

impl ResponseEnvelope {
    /// Classify a response body, rejecting anything else.
    pub fn from_value(body: Value) -> Result<Self> {
        match body {
            Value::Array(items) => Ok(Self::Bare(items)),
            Value::Object(mut map) => {
                if let Some(points) = take_non_null(&mut map, "points") {
                    return match points {
                        Value::Array(items) => Ok(Self::Points(items)),
                        other => Err(unrecognized(format!(
                            "`points` is {}, expected an array",
                            kind(&other)
                        ))),
                    };
                }
                if let Some(data) = take_non_null(&mut map, "data") {
                    return match data {
                        Value::Array(items) => Ok(Self::Data(items)),
                        other => Err(unrecognized(format!(
                            "`data` is {}, expected an array",
                            kind(&other)
                        ))),
                    };
                }
                Err(unrecognized("object has neither `points` nor `data`"))
            }
            other => Err(unrecognized(format!(
                "top-level {}, expected an array or object",
                kind(&other)
            ))),
        }
    }

    pub fn into_records(self) -> Vec<Value> {
        match self {
            Self::Bare(items) | Self::Points(items) | Self::Data(items) => items,
        }
    }
}

/// Counts from one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub accepted: usize,
    pub dropped: usize,
}

/// Parse a response body into canonical samples.
pub fn parse_response(body: Value) -> Result<Vec<RawSample>> {
    parse_response_with_report(body).map(|(samples, _)| samples)
}

/// Parse a response body, also reporting how many records were dropped.
pub fn parse_response_with_report(body: Value) -> Result<(Vec<RawSample>, IngestReport)> {
    let records = ResponseEnvelope::from_value(body)?.into_records();
    let total = records.len();
    let samples: Vec<RawSample> = records.iter().filter_map(normalize_record).collect();

    let report = IngestReport {
        accepted: samples.len(),
        dropped: total - samples.len(),
    };
    if report.dropped > 0 {
        debug!(
            "[ingest] Dropped {} of {} records without usable coordinates",
            report.dropped, total
        );
    }
    Ok((samples, report))
}

/// Resolve aliases and coerce one wire record.
///
/// Returns `None` when the record is not an object or lacks finite
/// coordinates. Optional fields that are absent, null or non-numeric become
/// `None`; sample counts below one become one.
///
/// # Example
/// ```
/// use safeheat::normalize_record;
/// use serde_json::json;
///
/// let s = normalize_record(&json!({"latitude": 13.05, "lon": "77.59", "count": 0})).unwrap();
/// assert_eq!((s.lat, s.lng, s.samples), (13.05, 77.59, Some(1)));
///
/// assert!(normalize_record(&json!({"lat": "x", "lng": 12.9})).is_none());
/// ```
pub fn normalize_record(record: &Value) -> Option<RawSample> {
    let obj = record.as_object()?;

    let lat = first_present(obj, LAT_KEYS).and_then(as_finite)?;
    let lng = first_present(obj, LNG_KEYS).and_then(as_finite)?;

    let score = first_present(obj, SCORE_KEYS).and_then(as_finite);
    let samples = first_present(obj, SAMPLES_KEYS)
        .and_then(as_finite)
        .map(|n| n.floor().clamp(1.0, u32::MAX as f64) as u32);
    let confidence = first_present(obj, CONFIDENCE_KEYS).and_then(as_finite);

    Some(RawSample {
        lat,
        lng,
        score,
        samples,
        confidence,
    })
}

/// First alias whose value is present and not null.
fn first_present<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|k| obj.get(*k))
        .find(|v| !v.is_null())
}

/// Numbers and numeric strings, finite only.
fn as_finite(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    n.is_finite().then_some(n)
}

fn take_non_null(map: &mut Map<String, Value>, key: &str) -> Option<Value> {
    match map.remove(key) {
        Some(Value::Null) | None => None,
        other => other,
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

fn unrecognized(message: impl Into<String>) -> HeatError {
    HeatError::UnrecognizedResponse {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_envelopes() {
        let rec = json!({"lat": 13.0, "lng": 77.5});
        assert_eq!(parse_response(json!([rec.clone()])).unwrap().len(), 1);
        assert_eq!(parse_response(json!({"points": [rec.clone()]})).unwrap().len(), 1);
        assert_eq!(parse_response(json!({"data": [rec.clone(), rec]})).unwrap().len(), 2);
        assert!(parse_response(json!([])).unwrap().is_empty());
    }

    #[test]
    fn test_points_preferred_over_data() {
        let env = ResponseEnvelope::from_value(json!({
            "points": [{"lat": 1.0, "lng": 2.0}],
            "data": []
        }))
        .unwrap();
        assert!(matches!(env, ResponseEnvelope::Points(ref v) if v.len() == 1));

        let env = ResponseEnvelope::from_value(json!({"points": null, "data": []})).unwrap();
        assert!(matches!(env, ResponseEnvelope::Data(_)));
    }

    #[test]
    fn test_unrecognized_shapes_rejected() {
        for body in [
            json!({"rows": []}),
            json!({"points": {"lat": 1}}),
            json!({"data": "nope"}),
            json!("points"),
            json!(42),
            Value::Null,
        ] {
            let err = parse_response(body).unwrap_err();
            assert!(matches!(err, HeatError::UnrecognizedResponse { .. }));
            assert!(err.is_fetch_failure());
        }
    }

    #[test]
    fn test_aliases() {
        let s = normalize_record(&json!({
            "lat_deg": 13.1,
            "lng_deg": 77.6,
            "score": 0.4,
            "count": 5,
            "confidence_numeric": 0.9
        }))
        .unwrap();
        assert_eq!(s.lat, 13.1);
        assert_eq!(s.lng, 77.6);
        assert_eq!(s.score, Some(0.4));
        assert_eq!(s.samples, Some(5));
        assert_eq!(s.confidence, Some(0.9));

        let s = normalize_record(&json!({"latitude": 1.0, "longitude": 2.0})).unwrap();
        assert_eq!((s.lat, s.lng), (1.0, 2.0));
        assert_eq!(s.score, None);
        assert_eq!(s.samples, None);
        assert_eq!(s.confidence, None);
    }

    #[test]
    fn test_primary_key_wins() {
        let s = normalize_record(&json!({"lat": 1.0, "latitude": 9.0, "lng": 2.0})).unwrap();
        assert_eq!(s.lat, 1.0);
        // Null primary falls through to the alias
        let s = normalize_record(&json!({"lat": null, "latitude": 9.0, "lon": 2.0})).unwrap();
        assert_eq!(s.lat, 9.0);
    }

    #[test]
    fn test_malformed_records_dropped() {
        let body = json!([
            {"lat": "x", "lng": 12.9},
            {"lng": 12.9},
            {"lat": true, "lng": 12.9},
            [13.0, 77.5],
            "13.0,77.5",
            {"lat": 13.0, "lng": 77.5, "score": 0.2}
        ]);
        let (samples, report) = parse_response_with_report(body).unwrap();
        assert_eq!(samples.len(), 1);
        assert_eq!(report, IngestReport { accepted: 1, dropped: 5 });
        assert_eq!(samples[0].score, Some(0.2));
    }

    #[test]
    fn test_sample_count_coercion() {
        let count = |v: Value| {
            normalize_record(&json!({"lat": 0.0, "lng": 0.0, "samples": v}))
                .unwrap()
                .samples
        };
        assert_eq!(count(json!(0)), Some(1));
        assert_eq!(count(json!(-4)), Some(1));
        assert_eq!(count(json!(3)), Some(3));
        assert_eq!(count(json!(3.9)), Some(3));
        assert_eq!(count(json!("12")), Some(12));
        assert_eq!(count(json!("many")), None);
        assert_eq!(count(Value::Null), None);
    }

    #[test]
    fn test_non_numeric_optionals_are_absent() {
        let s = normalize_record(&json!({
            "lat": 0.0,
            "lng": 0.0,
            "score": "unknown",
            "confidence": {"level": "high"}
        }))
        .unwrap();
        assert_eq!(s.score, None);
        assert_eq!(s.confidence, None);
    }
}
