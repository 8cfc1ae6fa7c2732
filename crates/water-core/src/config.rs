//! Run configuration.

use std::fs;
use std::ops::RangeInclusive;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::mask::MonthRange;

/// Highest year whose exclusive end (`year + 1`-01-01) is still a valid date
/// for every downstream consumer.
pub const MAX_YEAR: i32 = 9998;
pub const MIN_YEAR: i32 = 1;

/// Thresholds and year range shared by every year of a run.
///
/// Defaults reproduce a municipal analysis: 2002 through 2011,
/// seasonal water between 1 and 4 months, sampled every 300 m.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RunConfig {
    pub start_year: i32,
    /// Inclusive.
    pub end_year: i32,
    pub min_months: u8,
    pub max_months: u8,
    /// Ground sampling distance in metres.
    pub scale: f64,
    /// Also write `water_norm_<year>`, the count relative to region area.
    pub normalize: bool,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            start_year: 2002,
            end_year: 2011,
            min_months: 1,
            max_months: 4,
            scale: 300.0,
            normalize: false,
        }
    }
}

impl RunConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for year in [self.start_year, self.end_year] {
            if !(MIN_YEAR..=MAX_YEAR).contains(&year) {
                return Err(ConfigError::YearOutOfRange(year));
            }
        }
        if self.start_year > self.end_year {
            return Err(ConfigError::InvertedYearRange { start: self.start_year, end: self.end_year });
        }
        for (name, value) in [("min_months", self.min_months), ("max_months", self.max_months)] {
            if value > 12 {
                return Err(ConfigError::MonthBoundOutOfRange { name, value });
            }
        }
        if self.min_months > self.max_months {
            return Err(ConfigError::InvertedMonthRange { min: self.min_months, max: self.max_months });
        }
        if !self.scale.is_finite() || self.scale <= 0.0 {
            return Err(ConfigError::InvalidScale(self.scale));
        }
        Ok(())
    }

    pub fn years(&self) -> RangeInclusive<i32> {
        self.start_year..=self.end_year
    }

    pub fn month_range(&self) -> MonthRange {
        MonthRange::new(self.min_months, self.max_months)
    }
}
