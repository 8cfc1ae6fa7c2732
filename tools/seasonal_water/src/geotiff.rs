//! Directory of monthly classification GeoTIFFs as a `MonthlySource`.
//!
//! One single-band u8 GeoTIFF per month; the file stem must end in
//! `YYYY_MM` or `YYYY-MM` (e.g. `monthly_history_2002_03.tif`).
//! Georeferencing comes from the ModelPixelScale and ModelTiepoint tags;
//! the GeoKeyDirectory must declare a geographic (lon/lat) model.
//! TIFF rows run north→south and are flipped to the grid's south→north order.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{bail, ensure, Context, Result};
use chrono::NaiveDate;
use rayon::prelude::*;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::tags::Tag;
use tracing::{debug, warn};
use water_core::{GridSpec, MonthlyRaster, MonthlySource, Raster, SourceError};

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GT_MODEL_TYPE_KEY: u16 = 1024;
const MODEL_TYPE_GEOGRAPHIC: u16 = 2;

/// Parse the trailing `YYYY_MM` / `YYYY-MM` of a file stem.
///
///   "monthly_history_2002_03" → 2002-03-01
///   "2010-12"                 → 2010-12-01
///   "jrc_2002_13"             → None (month out of range)
pub fn parse_month_stem(stem: &str) -> Option<NaiveDate> {
    let b = stem.as_bytes();
    if b.len() < 7 {
        return None;
    }
    let tail = &b[b.len() - 7..];
    let digits = |s: &[u8]| -> Option<u32> {
        s.iter().try_fold(0u32, |acc, &c| c.is_ascii_digit().then(|| acc * 10 + u32::from(c - b'0')))
    };
    let year = digits(&tail[..4])?;
    if tail[4] != b'_' && tail[4] != b'-' {
        return None;
    }
    let month = digits(&tail[5..])?;
    // "x12002_03" must not read as year 2002.
    if b.len() > 7 && b[b.len() - 8].is_ascii_digit() {
        return None;
    }
    NaiveDate::from_ymd_opt(year as i32, month, 1)
}

/// Grid from GeoTIFF tags for a `width`×`height` image.
///
/// `scale` = [sx, sy, sz]; `tiepoint` = [i, j, k, x, y, z], mapping raster
/// point (i, j) to model point (x, y).
pub fn grid_from_tags(width: usize, height: usize, scale: &[f64], tiepoint: &[f64]) -> Result<GridSpec> {
    ensure!(scale.len() >= 2, "ModelPixelScale has {} values, need at least 2", scale.len());
    ensure!(tiepoint.len() >= 6, "ModelTiepoint has {} values, need at least 6", tiepoint.len());
    let (sx, sy) = (scale[0], scale[1]);
    ensure!(sx > 0.0 && sy > 0.0, "non-positive pixel scale ({sx}, {sy})");
    let (i, j, x, y) = (tiepoint[0], tiepoint[1], tiepoint[3], tiepoint[4]);
    let min_lon = x - i * sx;
    let max_lat = y + j * sy;
    Ok(GridSpec::new(
        width,
        height,
        min_lon,
        min_lon + width as f64 * sx,
        max_lat - height as f64 * sy,
        max_lat,
    ))
}

/// GTModelTypeGeoKey from a GeoKeyDirectory: a 4-value header ending in the
/// key count, then one `(id, location, count, value)` entry per key.
pub fn model_type(keys: &[u16]) -> Option<u16> {
    let count = usize::from(*keys.get(3)?);
    keys.get(4..)?
        .chunks_exact(4)
        .take(count)
        .find(|e| e[0] == GT_MODEL_TYPE_KEY && e[1] == 0)
        .map(|e| e[3])
}

/// Projected rasters would have metres read as degrees.
pub fn ensure_geographic(keys: &[u16]) -> Result<()> {
    match model_type(keys) {
        Some(MODEL_TYPE_GEOGRAPHIC) => Ok(()),
        Some(other) => bail!("model type {other} is not geographic (2); reproject to lon/lat first"),
        None => bail!("GeoKeyDirectory has no GTModelTypeGeoKey"),
    }
}

fn open_decoder(path: &Path) -> Result<Decoder<BufReader<File>>> {
    let file = File::open(path).with_context(|| format!("Cannot open {}", path.display()))?;
    Decoder::new(BufReader::new(file)).with_context(|| format!("Not a valid TIFF: {}", path.display()))
}

fn read_grid(decoder: &mut Decoder<BufReader<File>>, path: &Path) -> Result<GridSpec> {
    let (w, h) = decoder.dimensions().with_context(|| format!("No dimensions: {}", path.display()))?;
    let keys = decoder
        .get_tag_u16_vec(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY))
        .with_context(|| format!("Missing GeoKeyDirectory tag: {}", path.display()))?;
    ensure_geographic(&keys).with_context(|| format!("Unsupported georeferencing: {}", path.display()))?;
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .with_context(|| format!("Missing ModelPixelScale tag: {}", path.display()))?;
    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
        .with_context(|| format!("Missing ModelTiepoint tag: {}", path.display()))?;
    grid_from_tags(w as usize, h as usize, &scale, &tiepoint)
        .with_context(|| format!("Bad georeferencing: {}", path.display()))
}

/// Reverse row order of a row-major buffer (TIFF N→S → grid S→N).
pub fn flip_rows<T: Copy>(data: &[T], width: usize) -> Vec<T> {
    if width == 0 {
        return Vec::new();
    }
    data.chunks_exact(width).rev().flatten().copied().collect()
}

/// Decode one monthly raster.
pub fn read_monthly(path: &Path) -> Result<Raster<u8>> {
    let mut decoder = open_decoder(path)?;
    let grid = read_grid(&mut decoder, path)?;
    let data = match decoder.read_image().with_context(|| format!("Read failed: {}", path.display()))? {
        DecodingResult::U8(v) => v,
        _ => bail!("Unexpected pixel type (expected U8) in {}", path.display()),
    };
    ensure!(
        data.len() == grid.len(),
        "{} has {} samples for a {}x{} grid (multi-band rasters are not supported)",
        path.display(),
        data.len(),
        grid.width,
        grid.height
    );
    let flipped = flip_rows(&data, grid.width);
    Raster::from_vec(grid, flipped).context("raster size mismatch after row flip")
}

pub struct GeoTiffArchive {
    grid: GridSpec,
    files: BTreeMap<NaiveDate, PathBuf>,
}

impl GeoTiffArchive {
    /// Index every monthly GeoTIFF in `dir`. The grid is read from the
    /// earliest month's header; pixel data is decoded lazily per query.
    pub fn open(dir: &Path) -> Result<Self> {
        let mut files = BTreeMap::new();
        for entry in fs::read_dir(dir).with_context(|| format!("Cannot read {}", dir.display()))? {
            let path = entry?.path();
            let is_tiff = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("tif") || e.eq_ignore_ascii_case("tiff"));
            if !is_tiff {
                continue;
            }
            let Some(month) = path.file_stem().and_then(|s| s.to_str()).and_then(parse_month_stem) else {
                warn!(file = %path.display(), "skipping TIFF without a YYYY_MM suffix");
                continue;
            };
            if let Some(previous) = files.insert(month, path.clone()) {
                bail!(
                    "Two rasters for {}: {} and {}",
                    month.format("%Y-%m"),
                    previous.display(),
                    path.display()
                );
            }
        }

        let Some(first) = files.values().next() else {
            bail!("No monthly GeoTIFFs found in {}", dir.display());
        };
        let mut decoder = open_decoder(first)?;
        let grid = read_grid(&mut decoder, first)?;
        debug!(months = files.len(), %grid, "indexed monthly rasters");
        Ok(Self { grid, files })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }
}

impl MonthlySource for GeoTiffArchive {
    fn grid(&self) -> GridSpec {
        self.grid
    }

    fn months_between(&self, start: NaiveDate, end: NaiveDate) -> std::result::Result<Vec<MonthlyRaster>, SourceError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let wanted: Vec<(NaiveDate, &PathBuf)> = self.files.range(start..end).map(|(&m, p)| (m, p)).collect();
        let months: Result<Vec<MonthlyRaster>> = wanted
            .par_iter()
            .map(|&(month, path)| read_monthly(path).map(|codes| MonthlyRaster::new(month, codes)))
            .collect();
        months.map_err(Into::into)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_month_stem_underscore() {
        assert_eq!(parse_month_stem("monthly_history_2002_03"), NaiveDate::from_ymd_opt(2002, 3, 1));
    }

    #[test]
    fn parse_month_stem_dash() {
        assert_eq!(parse_month_stem("2010-12"), NaiveDate::from_ymd_opt(2010, 12, 1));
    }

    #[test]
    fn parse_month_stem_invalid() {
        assert_eq!(parse_month_stem("jrc_2002_13"), None);
        assert_eq!(parse_month_stem("jrc_2002_00"), None);
        assert_eq!(parse_month_stem("x12002_03"), None);
        assert_eq!(parse_month_stem("2002.03"), None);
        assert_eq!(parse_month_stem("03"), None);
        assert_eq!(parse_month_stem("brasil_ø2002_03"), NaiveDate::from_ymd_opt(2002, 3, 1));
    }

    #[test]
    fn grid_from_tags_upper_left_tiepoint() {
        // 0.0025° pixels, upper-left corner at (-74.0, 5.5).
        let g = grid_from_tags(400, 200, &[0.0025, 0.0025, 0.0], &[0.0, 0.0, 0.0, -74.0, 5.5, 0.0]).unwrap();
        assert_eq!(g.width, 400);
        assert!((g.min_lon - -74.0).abs() < 1e-12);
        assert!((g.max_lon - -73.0).abs() < 1e-9);
        assert!((g.max_lat - 5.5).abs() < 1e-12);
        assert!((g.min_lat - 5.0).abs() < 1e-9);
    }

    #[test]
    fn grid_from_tags_rejects_short_tags() {
        assert!(grid_from_tags(1, 1, &[1.0], &[0.0; 6]).is_err());
        assert!(grid_from_tags(1, 1, &[1.0, 1.0], &[0.0; 3]).is_err());
        assert!(grid_from_tags(1, 1, &[0.0, 1.0], &[0.0; 6]).is_err());
    }

    #[test]
    fn geographic_model_is_accepted() {
        // Version header, 2 keys: GTModelType = 2, GTRasterType = 1.
        let keys = [1, 1, 0, 2, 1024, 0, 1, 2, 1025, 0, 1, 1];
        assert_eq!(model_type(&keys), Some(2));
        assert!(ensure_geographic(&keys).is_ok());
    }

    #[test]
    fn projected_or_undeclared_model_is_rejected() {
        // UTM-style projected model.
        let projected = [1, 1, 0, 2, 1024, 0, 1, 1, 3072, 0, 1, 32723];
        let err = ensure_geographic(&projected).unwrap_err();
        assert!(err.to_string().contains("not geographic"), "{err}");

        let no_model = [1, 1, 0, 1, 1025, 0, 1, 1];
        assert!(ensure_geographic(&no_model).is_err());
        assert!(ensure_geographic(&[1, 1]).is_err());
    }

    #[test]
    fn flip_rows_puts_south_first() {
        // TIFF rows: north = [1, 2], south = [3, 4].
        assert_eq!(flip_rows(&[1, 2, 3, 4], 2), vec![3, 4, 1, 2]);
    }
}
