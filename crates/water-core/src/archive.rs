//! Monthly classification rasters, queried by date range.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};

use crate::classify::MonthlyRaster;
use crate::error::{PipelineError, Result, SourceError};
use crate::raster::{GridSpec, Raster};

/// A time-indexed collection of monthly classification rasters.
///
/// Implementations return only the months they actually hold; a missing
/// month is simply absent from the result.
pub trait MonthlySource {
    /// Grid shared by every raster in the source.
    fn grid(&self) -> GridSpec;

    /// Rasters whose month falls in `[start, end)`, in ascending month order.
    fn months_between(&self, start: NaiveDate, end: NaiveDate) -> std::result::Result<Vec<MonthlyRaster>, SourceError>;
}

/// First day of `year`-`month`.
pub fn month_start(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)
}

/// Rasters held in memory, keyed by month.
#[derive(Debug, Clone)]
pub struct InMemoryArchive {
    grid: GridSpec,
    months: BTreeMap<NaiveDate, Raster<u8>>,
}

impl InMemoryArchive {
    pub fn new(grid: GridSpec) -> Self {
        Self { grid, months: BTreeMap::new() }
    }

    /// Add (or replace) the raster for one month. The raster must sit on the
    /// archive's grid. Any day within the month is accepted.
    pub fn insert(&mut self, month: NaiveDate, codes: Raster<u8>) -> Result<()> {
        if codes.grid != self.grid {
            return Err(PipelineError::GridMismatch { expected: self.grid, found: codes.grid });
        }
        let key = month.with_day(1).unwrap_or(month);
        self.months.insert(key, codes);
        Ok(())
    }
}

impl MonthlySource for InMemoryArchive {
    fn grid(&self) -> GridSpec {
        self.grid
    }

    fn months_between(&self, start: NaiveDate, end: NaiveDate) -> std::result::Result<Vec<MonthlyRaster>, SourceError> {
        if end <= start {
            return Ok(Vec::new());
        }
        Ok(self
            .months
            .range(start..end)
            .map(|(&month, codes)| MonthlyRaster::new(month, codes.clone()))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(2, 1, 0.0, 2.0, 0.0, 1.0)
    }

    fn archive_for(year: i32, months: impl IntoIterator<Item = u32>) -> InMemoryArchive {
        let mut a = InMemoryArchive::new(grid());
        for m in months {
            a.insert(month_start(year, m).unwrap(), Raster::filled(grid(), m as u8)).unwrap();
        }
        a
    }

    #[test]
    fn range_is_half_open() {
        let mut a = archive_for(2002, 1..=12);
        a.insert(month_start(2003, 1).unwrap(), Raster::filled(grid(), 0)).unwrap();
        let got = a
            .months_between(month_start(2002, 1).unwrap(), month_start(2003, 1).unwrap())
            .unwrap();
        assert_eq!(got.len(), 12);
        assert_eq!(got[0].month, month_start(2002, 1).unwrap());
        assert_eq!(got[11].month, month_start(2002, 12).unwrap());
    }

    #[test]
    fn missing_months_are_absent_not_errors() {
        let a = archive_for(2005, [1, 2, 3, 4, 5, 8, 9, 10, 11, 12]);
        let got = a
            .months_between(month_start(2005, 1).unwrap(), month_start(2006, 1).unwrap())
            .unwrap();
        assert_eq!(got.len(), 10);
        assert!(got.windows(2).all(|w| w[0].month < w[1].month));
    }

    #[test]
    fn insert_normalises_to_first_of_month() {
        let mut a = InMemoryArchive::new(grid());
        a.insert(NaiveDate::from_ymd_opt(2004, 6, 17).unwrap(), Raster::filled(grid(), 2)).unwrap();
        let got = a
            .months_between(month_start(2004, 6).unwrap(), month_start(2004, 7).unwrap())
            .unwrap();
        assert_eq!(got[0].month, month_start(2004, 6).unwrap());
    }

    #[test]
    fn insert_rejects_foreign_grid() {
        let mut a = InMemoryArchive::new(grid());
        let other = GridSpec::new(3, 1, 0.0, 3.0, 0.0, 1.0);
        assert!(a.insert(month_start(2004, 1).unwrap(), Raster::filled(other, 1)).is_err());
        let got = a
            .months_between(month_start(2004, 1).unwrap(), month_start(2005, 1).unwrap())
            .unwrap();
        assert!(got.is_empty());
    }
}
