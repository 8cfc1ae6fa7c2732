//! Seasonal water mask: pixels whose yearly water-month count falls inside an
//! inclusive range.

use serde::{Deserialize, Serialize};

use crate::counting::YearlyCount;
use crate::raster::Raster;

pub type SeasonalMask = Raster<bool>;

/// Inclusive range of water months. `min > max` is allowed here and matches
/// nothing; configuration validation rejects it before a run starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthRange {
    pub min: u8,
    pub max: u8,
}

impl MonthRange {
    pub fn new(min: u8, max: u8) -> Self {
        Self { min, max }
    }

    #[inline]
    pub fn contains(&self, count: u8) -> bool {
        self.min <= count && count <= self.max
    }
}

pub fn build_seasonal_mask(count: &YearlyCount, range: MonthRange) -> SeasonalMask {
    count.map(move |c| range.contains(c))
}
