//! Zonal aggregation: per-region sum of a seasonal mask sampled at a fixed
//! ground resolution.
//!
//! Sample points form one lattice per grid, anchored at the grid's south-west
//! corner. `scale` is nominal metres at the equator: both axes step by
//! `scale / METRES_PER_DEGREE` degrees whatever the latitude, so at native
//! scale every pixel of a geographic grid is read once. Every region reads
//! the same lattice, so a region split into disjoint parts sums to the same
//! value as the whole. Each point inside a region reads the mask pixel under
//! it and counts 1 when set.

use geo::BoundingRect;
#[cfg(feature = "threading")]
use rayon::prelude::*;

use crate::geometry::contains;
use crate::mask::SeasonalMask;
use crate::raster::{GridSpec, METRES_PER_DEGREE};
use crate::table::{Region, RegionId, RegionTable};

/// One region's result for one year. Iteration-local: it is handed straight
/// to the accumulator and never stored on the table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZonalSum {
    pub region_id: RegionId,
    pub value: u64,
}

/// Sample lattice spacing in degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Lattice {
    pub origin_lon: f64,
    pub origin_lat: f64,
    pub step_lon: f64,
    pub step_lat: f64,
}

impl Lattice {
    pub fn for_grid(grid: &GridSpec, scale_m: f64) -> Self {
        let step = scale_m / METRES_PER_DEGREE;
        Self {
            origin_lon: grid.min_lon,
            origin_lat: grid.min_lat,
            step_lon: step,
            step_lat: step,
        }
    }

    /// Index range `[first, last)` of lattice points whose coordinate lies in
    /// `[lo, hi]` along one axis, clipped to `[0, limit)`.
    fn span(origin: f64, step: f64, lo: f64, hi: f64, limit: usize) -> (usize, usize) {
        let first = ((lo - origin) / step - 0.5).ceil().max(0.0) as usize;
        let last = (((hi - origin) / step - 0.5).floor() + 1.0).max(0.0) as usize;
        (first.min(limit), last.min(limit))
    }

    #[inline]
    fn lon(&self, i: usize) -> f64 {
        self.origin_lon + (i as f64 + 0.5) * self.step_lon
    }

    #[inline]
    fn lat(&self, j: usize) -> f64 {
        self.origin_lat + (j as f64 + 0.5) * self.step_lat
    }
}

/// Sum of mask values over one region.
pub fn region_sum(mask: &SeasonalMask, lattice: &Lattice, region: &Region) -> u64 {
    let Some(b) = region.geometry.bounding_rect() else {
        return 0;
    };
    let grid = &mask.grid;
    let cols = ((grid.max_lon - lattice.origin_lon) / lattice.step_lon).ceil().max(0.0) as usize;
    let rows = ((grid.max_lat - lattice.origin_lat) / lattice.step_lat).ceil().max(0.0) as usize;
    let (i0, i1) = Lattice::span(lattice.origin_lon, lattice.step_lon, b.min().x, b.max().x, cols);
    let (j0, j1) = Lattice::span(lattice.origin_lat, lattice.step_lat, b.min().y, b.max().y, rows);

    let mut sum = 0u64;
    for j in j0..j1 {
        let lat = lattice.lat(j);
        for i in i0..i1 {
            let lon = lattice.lon(i);
            if mask.sample(lon, lat) == Some(true) && contains(&region.geometry, lon, lat) {
                sum += 1;
            }
        }
    }
    sum
}

/// One result per region, in table order.
pub fn zonal_sum(mask: &SeasonalMask, table: &RegionTable, scale_m: f64) -> Vec<ZonalSum> {
    let lattice = Lattice::for_grid(&mask.grid, scale_m);
    let one = |r: &Region| ZonalSum {
        region_id: r.id.clone(),
        value: region_sum(mask, &lattice, r),
    };

    #[cfg(feature = "threading")]
    let sums = table.regions().par_iter().map(one).collect();
    #[cfg(not(feature = "threading"))]
    let sums = table.regions().iter().map(one).collect();

    sums
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::rectangle;
    use crate::raster::Raster;
    use geo_types::{LineString, MultiPolygon, Polygon};

    /// 20×20 grid of 300 m pixels at the equator.
    fn grid() -> GridSpec {
        let deg = 300.0 / METRES_PER_DEGREE;
        GridSpec::new(20, 20, 0.0, 20.0 * deg, 0.0, 20.0 * deg)
    }

    fn deg(px: f64) -> f64 {
        px * 300.0 / METRES_PER_DEGREE
    }

    fn table(regions: Vec<Region>) -> RegionTable {
        RegionTable::new(regions).unwrap()
    }

    #[test]
    fn native_scale_counts_one_sample_per_pixel() {
        let mask = Raster::filled(grid(), true);
        let t = table(vec![Region::new("all", rectangle(0.0, 0.0, deg(20.0), deg(20.0)))]);
        let sums = zonal_sum(&mask, &t, 300.0);
        assert_eq!(sums, vec![ZonalSum { region_id: "all".into(), value: 400 }]);
    }

    #[test]
    fn native_scale_away_from_equator_reads_every_pixel() {
        // Square-degree pixels at 45°N: the lattice must not stretch in
        // longitude, or a full grid would read only cos(45°) of its columns.
        let d = deg(1.0);
        let g = GridSpec::new(20, 20, 10.0, 10.0 + 20.0 * d, 45.0, 45.0 + 20.0 * d);
        let mask = Raster::filled(g, true);
        let t = table(vec![Region::new("north", rectangle(g.min_lon, g.min_lat, g.max_lon, g.max_lat))]);
        assert_eq!(zonal_sum(&mask, &t, 300.0)[0].value, 400);

        let lattice = Lattice::for_grid(&g, 300.0);
        assert_eq!(lattice.step_lon, lattice.step_lat);
    }

    #[test]
    fn coarser_scale_samples_fewer_points() {
        let mask = Raster::filled(grid(), true);
        let t = table(vec![Region::new("all", rectangle(0.0, 0.0, deg(20.0), deg(20.0)))]);
        let sums = zonal_sum(&mask, &t, 600.0);
        assert_eq!(sums[0].value, 100);
    }

    #[test]
    fn only_set_pixels_count() {
        let mut mask = Raster::filled(grid(), false);
        for c in 0..5 {
            mask.set(2, c, true);
        }
        let t = table(vec![Region::new("r", rectangle(0.0, 0.0, deg(10.0), deg(10.0)))]);
        assert_eq!(zonal_sum(&mask, &t, 300.0)[0].value, 5);
    }

    #[test]
    fn one_result_per_region_in_order() {
        let mask = Raster::filled(grid(), true);
        let t = table(vec![
            Region::new("z", rectangle(0.0, 0.0, deg(2.0), deg(2.0))),
            Region::new("a", rectangle(deg(5.0), deg(5.0), deg(6.0), deg(6.0))),
            Region::new("outside", rectangle(10.0, 10.0, 11.0, 11.0)),
            Region::new("empty", MultiPolygon::new(vec![])),
        ]);
        let sums = zonal_sum(&mask, &t, 300.0);
        let ids: Vec<_> = sums.iter().map(|s| s.region_id.0.as_str()).collect();
        assert_eq!(ids, vec!["z", "a", "outside", "empty"]);
        assert_eq!(sums[0].value, 4);
        assert_eq!(sums[1].value, 1);
        assert_eq!(sums[2].value, 0);
        assert_eq!(sums[3].value, 0);
    }

    #[test]
    fn region_smaller_than_sample_spacing_yields_zero() {
        let mask = Raster::filled(grid(), true);
        // Sits between lattice points at 600 m spacing.
        let t = table(vec![Region::new("tiny", rectangle(deg(0.1), deg(0.1), deg(0.4), deg(0.4)))]);
        assert_eq!(zonal_sum(&mask, &t, 600.0)[0].value, 0);
    }

    #[test]
    fn split_region_sums_to_whole() {
        let mut mask = Raster::filled(grid(), false);
        for r in 0..20 {
            for c in 0..20 {
                mask.set(r, c, (r * 7 + c * 3) % 5 < 2);
            }
        }
        // Triangle-split of a square along its diagonal.
        let (x0, y0, x1, y1) = (deg(1.3), deg(2.1), deg(17.6), deg(18.2));
        let whole = rectangle(x0, y0, x1, y1);
        let lower = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y0), (x1, y1), (x0, y0)]),
            vec![],
        )]);
        let upper = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(x0, y0), (x1, y1), (x0, y1), (x0, y0)]),
            vec![],
        )]);
        let t = table(vec![
            Region::new("whole", whole),
            Region::new("lower", lower),
            Region::new("upper", upper),
        ]);
        for scale in [300.0, 450.0, 900.0] {
            let sums = zonal_sum(&mask, &t, scale);
            assert_eq!(
                sums[0].value,
                sums[1].value + sums[2].value,
                "additivity at scale {scale}"
            );
        }
    }

    #[test]
    fn lattice_span_clips_to_limit() {
        assert_eq!(Lattice::span(0.0, 1.0, 0.0, 3.0, 10), (0, 3));
        assert_eq!(Lattice::span(0.0, 1.0, 2.6, 2.9, 10), (3, 3));
        assert_eq!(Lattice::span(0.0, 1.0, -5.0, 50.0, 10), (0, 10));
    }
}
