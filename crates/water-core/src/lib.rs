//! Seasonal surface water per administrative region.
//!
//! Monthly water classification rasters are reduced, year by year, to a
//! per-region count of sampled pixels that were wet for a configured number
//! of months, and written onto a GeoJSON region table as `water_<year>`.

pub mod archive;
pub mod classify;
pub mod config;
pub mod counting;
pub mod error;
pub mod geometry;
pub mod mask;
pub mod pipeline;
pub mod raster;
pub mod table;
pub mod zonal;

pub use archive::{InMemoryArchive, MonthlySource};
pub use classify::{classify_code, classify_month, BinaryWaterRaster, MonthlyRaster};
pub use config::RunConfig;
pub use counting::{count_water_months, YearlyCount};
pub use error::{ConfigError, PipelineError, SourceError};
pub use mask::{build_seasonal_mask, MonthRange, SeasonalMask};
pub use pipeline::{RunOutput, SeasonalWaterPipeline, YearReport};
pub use raster::{GridSpec, Raster};
pub use table::{accumulate_year, normalize_year, Region, RegionId, RegionTable};
pub use zonal::{zonal_sum, ZonalSum};
