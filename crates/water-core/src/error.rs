//! Error taxonomy for the seasonal-water pipeline.
//!
//! Data gaps (missing months) and regions that miss every sampled pixel are
//! not errors and never reach this type.

use thiserror::Error;

use crate::raster::GridSpec;

/// Rejected run configuration. Raised before any raster is touched.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("start_year {start} is after end_year {end}")]
    InvertedYearRange { start: i32, end: i32 },

    #[error("year {0} is outside the supported range 1..=9998")]
    YearOutOfRange(i32),

    #[error("{name} = {value} is outside 0..=12")]
    MonthBoundOutOfRange { name: &'static str, value: u8 },

    #[error("min_months {min} is greater than max_months {max}")]
    InvertedMonthRange { min: u8, max: u8 },

    #[error("scale must be a finite positive distance in metres, got {0}")]
    InvalidScale(f64),

    #[error("cannot parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("cannot read configuration file: {0}")]
    Io(#[from] std::io::Error),
}

/// Boxed failure from a monthly raster source (disk, network, decoder).
pub type SourceError = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("raster grid mismatch: expected {expected}, found {found}")]
    GridMismatch { expected: GridSpec, found: GridSpec },

    #[error("monthly raster source failed for {year}: {source}")]
    Source {
        year: i32,
        #[source]
        source: SourceError,
    },

    #[error("zonal results do not line up with the region table: {0}")]
    ResultMismatch(String),

    #[error("region {region}: {reason}")]
    InvalidGeometry { region: String, reason: String },

    #[error("duplicate region id {0:?}")]
    DuplicateRegionId(String),

    #[error("invalid GeoJSON: {0}")]
    GeoJson(#[from] geojson::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = PipelineError> = std::result::Result<T, E>;
