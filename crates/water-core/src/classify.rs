//! Monthly reclassification into a binary water indicator.
//!
//! Monthly water history codes: `0` no observation, `1` observed and not
//! water, `2` water. Only `2` maps to 1; every other value, including no
//! observation and unknown codes, maps to 0.

use chrono::NaiveDate;

use crate::raster::Raster;

/// No observation for this pixel in this month.
pub const CODE_NO_DATA: u8 = 0;
/// Observed, not water.
pub const CODE_NOT_WATER: u8 = 1;
/// Observed, water.
pub const CODE_WATER: u8 = 2;

/// Per-pixel 0/1 water indicator for one month.
pub type BinaryWaterRaster = Raster<u8>;

/// One month of raw classification codes.
#[derive(Debug, Clone)]
pub struct MonthlyRaster {
    /// First day of the month this raster covers.
    pub month: NaiveDate,
    pub codes: Raster<u8>,
}

impl MonthlyRaster {
    pub fn new(month: NaiveDate, codes: Raster<u8>) -> Self {
        Self { month, codes }
    }
}

/// Remap a single classification code.
#[inline]
pub fn classify_code(code: u8) -> u8 {
    match code {
        CODE_NOT_WATER => 0,
        CODE_WATER => 1,
        _ => 0,
    }
}

/// Reclassify a whole month.
pub fn classify_month(monthly: &MonthlyRaster) -> BinaryWaterRaster {
    monthly.codes.map(classify_code)
}
