//! Unified error handling for the safeheat library.
//!
//! Only cycle-scoped failures live here. A malformed sample is filtered, not
//! reported, and a renderer without a heat layer takes the marker fallback.

use thiserror::Error;

/// Unified error type for safeheat operations.
#[derive(Debug, Error)]
pub enum HeatError {
    /// Network failure or non-success response from the point source
    #[error("Fetch failed{}: {message}", status_suffix(.status_code))]
    FetchFailure {
        message: String,
        status_code: Option<u16>,
    },
    /// Response body was not an array, `{points}` or `{data}`
    #[error("Unrecognized response shape: {message}")]
    UnrecognizedResponse { message: String },
    /// Bbox string was not four finite comma-separated floats
    #[error("Invalid bbox: {message}")]
    InvalidBbox { message: String },
    /// Configuration error
    #[error("Configuration error: {message}")]
    ConfigError { message: String },
    /// CSV import error
    #[error("CSV line {line}: {message}")]
    Csv { line: usize, message: String },
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

fn status_suffix(status_code: &Option<u16>) -> String {
    match status_code {
        Some(code) => format!(" (HTTP {})", code),
        None => String::new(),
    }
}

impl HeatError {
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::FetchFailure {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::ConfigError {
            message: message.into(),
        }
    }

    /// True for failures that abort a single refresh cycle.
    ///
    /// These leave the previous point set and render untouched.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            HeatError::FetchFailure { .. } | HeatError::UnrecognizedResponse { .. }
        )
    }
}

/// Result type alias for safeheat operations.
pub type Result<T> = std::result::Result<T, HeatError>;

/// Extension trait for converting Option to HeatError.
pub trait OptionExt<T> {
    /// Convert Option to Result with a CSV error at the given line.
    fn ok_or_csv(self, line: usize, message: &str) -> Result<T>;
}

impl<T> OptionExt<T> for Option<T> {
    fn ok_or_csv(self, line: usize, message: &str) -> Result<T> {
        self.ok_or_else(|| HeatError::Csv {
            line,
            message: message.to_string(),
        })
    }
}
