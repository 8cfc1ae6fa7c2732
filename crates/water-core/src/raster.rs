use std::fmt;

use serde::{Deserialize, Serialize};

#[cfg(feature = "threading")]
use rayon::prelude::*;

/// Nominal metres per degree at the equator (WGS84 semi-major axis).
/// Ground distances on geographic grids are converted with this one factor
/// on both axes.
pub const METRES_PER_DEGREE: f64 = 111_319.490_793_273_57;

/// Shape and geographic extent of a raster grid.
///
/// Pixel `(row, col)` covers `[min_lon + col·dx, min_lon + (col+1)·dx)` by
/// `[min_lat + row·dy, min_lat + (row+1)·dy)`; row 0 is the southernmost row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub width: usize,
    pub height: usize,
    pub min_lon: f64,
    pub max_lon: f64,
    pub min_lat: f64,
    pub max_lat: f64,
}

impl GridSpec {
    pub fn new(width: usize, height: usize, min_lon: f64, max_lon: f64, min_lat: f64, max_lat: f64) -> Self {
        Self { width, height, min_lon, max_lon, min_lat, max_lat }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.width * self.height
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Pixel width in degrees of longitude.
    pub fn pixel_lon(&self) -> f64 {
        (self.max_lon - self.min_lon) / self.width as f64
    }

    /// Pixel height in degrees of latitude.
    pub fn pixel_lat(&self) -> f64 {
        (self.max_lat - self.min_lat) / self.height as f64
    }

    /// The `(row, col)` of the pixel containing `(lon, lat)`, or `None` if the
    /// point lies outside the grid. The north and east edges belong to the
    /// last row/column.
    pub fn pixel_at(&self, lon: f64, lat: f64) -> Option<(usize, usize)> {
        if self.is_empty()
            || lon < self.min_lon
            || lon > self.max_lon
            || lat < self.min_lat
            || lat > self.max_lat
        {
            return None;
        }
        let col = (((lon - self.min_lon) / self.pixel_lon()).floor() as usize).min(self.width - 1);
        let row = (((lat - self.min_lat) / self.pixel_lat()).floor() as usize).min(self.height - 1);
        Some((row, col))
    }
}

impl fmt::Display for GridSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}x{} [{}, {}]x[{}, {}]",
            self.width, self.height, self.min_lon, self.max_lon, self.min_lat, self.max_lat
        )
    }
}

/// A georeferenced single-band grid, row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster<T> {
    pub data: Vec<T>,
    pub grid: GridSpec,
}

impl<T: Copy> Raster<T> {
    /// Create a raster on `grid` filled with `fill`.
    pub fn filled(grid: GridSpec, fill: T) -> Self {
        Self { data: vec![fill; grid.len()], grid }
    }

    /// Wrap existing row-major data. Returns `None` if the length does not
    /// match the grid.
    pub fn from_vec(grid: GridSpec, data: Vec<T>) -> Option<Self> {
        (data.len() == grid.len()).then_some(Self { data, grid })
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.grid.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.grid.height
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> T {
        self.data[row * self.grid.width + col]
    }

    #[inline]
    pub fn set(&mut self, row: usize, col: usize, val: T) {
        self.data[row * self.grid.width + col] = val;
    }

    /// Nearest-neighbour sample at `(lon, lat)`; `None` outside the grid.
    pub fn sample(&self, lon: f64, lat: f64) -> Option<T> {
        self.grid.pixel_at(lon, lat).map(|(r, c)| self.get(r, c))
    }
}

impl<T: Copy + Send + Sync> Raster<T> {
    /// Apply `f` to every pixel, producing a raster on the same grid.
    pub fn map<U, F>(&self, f: F) -> Raster<U>
    where
        U: Copy + Send,
        F: Fn(T) -> U + Sync + Send,
    {
        #[cfg(feature = "threading")]
        let data: Vec<U> = self.data.par_iter().map(|&v| f(v)).collect();
        #[cfg(not(feature = "threading"))]
        let data: Vec<U> = self.data.iter().map(|&v| f(v)).collect();

        Raster { data, grid: self.grid }
    }
}
