//! Inputs for one listing search.

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

use crate::ConfigError;

pub const DEFAULT_PARTY_SIZE: u32 = 2;
pub const DEFAULT_RESULTS_WANTED: usize = 20;

/// One search request: what to look for and how many results to keep.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Explicit search page URL. Takes precedence over the other fields
    /// when building the initial request.
    pub start_url: Option<String>,
    /// Location or free-text search term.
    pub location: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub party_size: u32,
    pub results_wanted: usize,
}

impl Default for SearchQuery {
    fn default() -> Self {
        Self {
            start_url: None,
            location: None,
            date: None,
            time: None,
            party_size: DEFAULT_PARTY_SIZE,
            results_wanted: DEFAULT_RESULTS_WANTED,
        }
    }
}

impl SearchQuery {
    /// Build a query from raw CLI-style strings.
    ///
    /// `date` must be `YYYY-MM-DD` and `time` `HH:MM`. `results_wanted` is
    /// clamped to at least 1.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Validation`] when the date or time cannot be
    /// parsed, or a time is given without a date.
    pub fn from_parts(
        start_url: Option<String>,
        location: Option<String>,
        date: Option<&str>,
        time: Option<&str>,
        party_size: Option<u32>,
        results_wanted: Option<usize>,
    ) -> Result<Self, ConfigError> {
        let date = date
            .map(|raw| {
                NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| {
                    ConfigError::Validation(format!("invalid date \"{raw}\": {e}"))
                })
            })
            .transpose()?;
        let time = time
            .map(|raw| {
                NaiveTime::parse_from_str(raw.trim(), "%H:%M").map_err(|e| {
                    ConfigError::Validation(format!("invalid time \"{raw}\": {e}"))
                })
            })
            .transpose()?;
        if time.is_some() && date.is_none() {
            return Err(ConfigError::Validation(
                "a time was given without a date".to_string(),
            ));
        }

        Ok(Self {
            start_url: start_url.filter(|s| !s.trim().is_empty()),
            location: location.filter(|s| !s.trim().is_empty()),
            date,
            time,
            party_size: party_size.filter(|n| *n > 0).unwrap_or(DEFAULT_PARTY_SIZE),
            results_wanted: results_wanted.unwrap_or(DEFAULT_RESULTS_WANTED).max(1),
        })
    }

    /// The `dateTime` search parameter: `YYYY-MM-DDTHH:MM:00`, with the time
    /// defaulting to 19:00 when only a date was given.
    #[must_use]
    pub fn date_time_param(&self) -> Option<String> {
        let date = self.date?;
        let time = self
            .time
            .or_else(|| NaiveTime::from_hms_opt(19, 0, 0))
            .unwrap_or_default();
        Some(format!(
            "{}T{}:00",
            date.format("%Y-%m-%d"),
            time.format("%H:%M")
        ))
    }
}
