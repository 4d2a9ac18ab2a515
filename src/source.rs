//! Fetch contract between the refresh scheduler and a point source.

use std::fmt;
use std::str::FromStr;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Bounds, HeatError, Result};

/// Time-of-day context the server uses to select eligible samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    #[default]
    Day,
    Night,
    Morning,
    Afternoon,
    Evening,
    Midnight,
}

impl Band {
    pub const ALL: [Band; 6] = [
        Band::Day,
        Band::Night,
        Band::Morning,
        Band::Afternoon,
        Band::Evening,
        Band::Midnight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Day => "day",
            Band::Night => "night",
            Band::Morning => "morning",
            Band::Afternoon => "afternoon",
            Band::Evening => "evening",
            Band::Midnight => "midnight",
        }
    }
}

impl fmt::Display for Band {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Band {
    type Err = HeatError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.trim();
        Band::ALL
            .into_iter()
            .find(|b| b.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| HeatError::config(format!("unknown band '{}'", s)))
    }
}

/// Parameters of one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FetchRequest {
    pub band: Band,
    /// Minimum observation count per returned point, at least 1
    pub min_samples: u32,
    pub bbox: Bounds,
}

impl FetchRequest {
    pub fn new(band: Band, min_samples: u32, bbox: Bounds) -> Self {
        Self {
            band,
            min_samples: min_samples.max(1),
            bbox,
        }
    }

    /// Query parameters in wire form.
    pub fn query_pairs(&self) -> [(&'static str, String); 3] {
        [
            ("band", self.band.as_str().to_string()),
            ("min_samples", self.min_samples.to_string()),
            ("bbox", self.bbox.to_bbox_string()),
        ]
    }
}

/// Anything that can answer a [`FetchRequest`] with a JSON body.
///
/// The body is validated and normalized by [`crate::ingest`]; sources only
/// move bytes. Failures should be reported as [`HeatError::FetchFailure`].
pub trait PointSource: Send + Sync + 'static {
    fn fetch(&self, request: &FetchRequest) -> BoxFuture<'_, Result<Value>>;
}

impl<S: PointSource + ?Sized> PointSource for std::sync::Arc<S> {
    fn fetch(&self, request: &FetchRequest) -> BoxFuture<'_, Result<Value>> {
        (**self).fetch(request)
    }
}
