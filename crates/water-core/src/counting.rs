//! Per-pixel water-month count over one calendar year.

#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::classify::BinaryWaterRaster;
use crate::error::{PipelineError, Result};
use crate::raster::{GridSpec, Raster};

/// Number of months classified as water, per pixel.
pub type YearlyCount = Raster<u8>;

/// Sum the binary water rasters of one year.
///
/// Months absent from `months` contribute nothing; an empty slice yields an
/// all-zero count on `grid`. Every raster must sit on `grid`.
pub fn count_water_months(grid: &GridSpec, months: &[BinaryWaterRaster]) -> Result<YearlyCount> {
    if let Some(bad) = months.iter().find(|m| m.grid != *grid) {
        return Err(PipelineError::GridMismatch { expected: *grid, found: bad.grid });
    }

    let mut count = Raster::filled(*grid, 0u8);

    #[cfg(feature = "threading")]
    count.data.par_iter_mut().enumerate().for_each(|(i, c)| {
        *c = months.iter().fold(0u8, |acc, m| acc.saturating_add(m.data[i]));
    });
    #[cfg(not(feature = "threading"))]
    for m in months {
        for (c, &v) in count.data.iter_mut().zip(&m.data) {
            *c = c.saturating_add(v);
        }
    }

    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(2, 2, 0.0, 2.0, 0.0, 2.0)
    }

    fn binary(values: [u8; 4]) -> BinaryWaterRaster {
        Raster::from_vec(grid(), values.to_vec()).unwrap()
    }

    #[test]
    fn counts_water_months_per_pixel() {
        let months = vec![
            binary([1, 0, 1, 0]),
            binary([1, 0, 0, 0]),
            binary([1, 1, 0, 0]),
        ];
        let count = count_water_months(&grid(), &months).unwrap();
        assert_eq!(count.data, vec![3, 1, 1, 0]);
        assert!(count.data.iter().all(|&c| usize::from(c) <= months.len()));
    }

    #[test]
    fn no_months_yields_zero_count() {
        let count = count_water_months(&grid(), &[]).unwrap();
        assert_eq!(count.grid, grid());
        assert!(count.data.iter().all(|&c| c == 0));
    }

    #[test]
    fn summation_order_is_irrelevant() {
        let a = binary([1, 0, 1, 1]);
        let b = binary([0, 1, 1, 0]);
        let c = binary([1, 1, 0, 0]);
        let forward = count_water_months(&grid(), &[a.clone(), b.clone(), c.clone()]).unwrap();
        let backward = count_water_months(&grid(), &[c, b, a]).unwrap();
        assert_eq!(forward, backward);
    }

    #[test]
    fn mismatched_grid_is_rejected() {
        let other = GridSpec::new(2, 2, 10.0, 12.0, 0.0, 2.0);
        let months = vec![binary([1, 1, 1, 1]), Raster::filled(other, 1u8)];
        let err = count_water_months(&grid(), &months).unwrap_err();
        assert!(matches!(err, PipelineError::GridMismatch { .. }));
    }
}
