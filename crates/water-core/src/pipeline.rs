//! Driver loop: runs every yearly stage in order and threads the region table
//! from one year to the next.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, info_span, warn};

use crate::archive::{month_start, MonthlySource};
use crate::classify::{classify_month, BinaryWaterRaster};
use crate::config::RunConfig;
use crate::counting::count_water_months;
use crate::error::{ConfigError, PipelineError, Result};
use crate::mask::build_seasonal_mask;
use crate::table::{accumulate_year, normalize_year, RegionTable};
use crate::zonal::zonal_sum;

/// Diagnostics for one processed year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct YearReport {
    pub year: i32,
    pub months_present: usize,
    /// Mask pixels set anywhere on the grid.
    pub seasonal_pixels: u64,
    /// Sum of `water_<year>` over all regions.
    pub region_total: u64,
    pub regions_with_water: usize,
}

/// Output of a complete run, ready for export.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub table: RegionTable,
    pub years: Vec<YearReport>,
}

/// `[year-01-01, (year+1)-01-01)`.
pub fn year_bounds(year: i32) -> Result<(NaiveDate, NaiveDate)> {
    let start = month_start(year, 1).ok_or(ConfigError::YearOutOfRange(year))?;
    let end = month_start(year + 1, 1).ok_or(ConfigError::YearOutOfRange(year))?;
    Ok((start, end))
}

pub struct SeasonalWaterPipeline {
    config: RunConfig,
}

impl SeasonalWaterPipeline {
    /// Validates `config` up front; nothing is computed for a rejected run.
    pub fn new(config: RunConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Process every configured year in ascending order.
    ///
    /// The first failure aborts the run. The table is moved through the
    /// years, so a failed run never hands back a partially filled table.
    pub fn run<S>(&self, mut table: RegionTable, source: &S) -> Result<RunOutput>
    where
        S: MonthlySource + ?Sized,
    {
        info!(
            regions = table.len(),
            start = self.config.start_year,
            end = self.config.end_year,
            min_months = self.config.min_months,
            max_months = self.config.max_months,
            scale = self.config.scale,
            normalize = self.config.normalize,
            "starting seasonal water run"
        );

        let mut years = Vec::new();
        for year in self.config.years() {
            let (next, report) = self.process_year(year, table, source)?;
            table = next;
            years.push(report);
        }
        Ok(RunOutput { table, years })
    }

    /// Run one year: classify → count → mask → zonal sum → accumulate.
    pub fn process_year<S>(&self, year: i32, table: RegionTable, source: &S) -> Result<(RegionTable, YearReport)>
    where
        S: MonthlySource + ?Sized,
    {
        let span = info_span!("year", year);
        let _enter = span.enter();

        let (start, end) = year_bounds(year)?;
        let monthly = source
            .months_between(start, end)
            .map_err(|source| PipelineError::Source { year, source })?;
        let months_present = monthly.len();
        if months_present < 12 {
            warn!(months_present, "year has missing monthly rasters; absent months count as dry");
        }

        // ── 1. Monthly classification ───────────────────────────────────────
        let binary: Vec<BinaryWaterRaster> = monthly.iter().map(classify_month).collect();
        drop(monthly);

        // ── 2. Water-month count ────────────────────────────────────────────
        let count = count_water_months(&source.grid(), &binary)?;
        drop(binary);

        // ── 3. Seasonal mask ────────────────────────────────────────────────
        let mask = build_seasonal_mask(&count, self.config.month_range());
        let seasonal_pixels = mask.data.iter().filter(|&&m| m).count() as u64;
        debug!(seasonal_pixels, "seasonal mask built");

        // ── 4. Zonal aggregation ────────────────────────────────────────────
        let sums = zonal_sum(&mask, &table, self.config.scale);

        // ── 5. Accumulation ─────────────────────────────────────────────────
        let mut table = accumulate_year(table, year, &sums)?;
        if self.config.normalize {
            table = normalize_year(table, year, self.config.scale);
        }

        let report = YearReport {
            year,
            months_present,
            seasonal_pixels,
            region_total: sums.iter().map(|s| s.value).sum(),
            regions_with_water: sums.iter().filter(|s| s.value > 0).count(),
        };
        info!(
            months_present,
            seasonal_pixels,
            region_total = report.region_total,
            regions_with_water = report.regions_with_water,
            "year accumulated"
        );
        Ok((table, report))
    }
}
