//! Region geometry helpers: point containment, area and conversion from
//! GeoJSON geometry values to `geo_types` polygons.
//!
//! Coordinates are (lon, lat) degrees, `x = lon`, `y = lat`.

use geo::GeodesicArea;
use geo_types::{LineString, MultiPolygon, Polygon};
use geojson::Value;

/// Even-odd crossing test against one ring.
///
/// Half-open in `y` and in `x`, so a point on an edge shared by two adjacent
/// polygons is assigned to exactly one of them. `geo::Contains` excludes the
/// boundary on both sides and would drop such points from either part.
fn ring_contains(ring: &LineString<f64>, lon: f64, lat: f64) -> bool {
    let pts = &ring.0;
    if pts.len() < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = pts.len() - 1;
    for i in 0..pts.len() {
        let (xi, yi) = (pts[i].x, pts[i].y);
        let (xj, yj) = (pts[j].x, pts[j].y);
        if (yi > lat) != (yj > lat) && lon < (xj - xi) * (lat - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

pub fn polygon_contains(poly: &Polygon<f64>, lon: f64, lat: f64) -> bool {
    ring_contains(poly.exterior(), lon, lat)
        && !poly.interiors().iter().any(|hole| ring_contains(hole, lon, lat))
}

pub fn contains(shape: &MultiPolygon<f64>, lon: f64, lat: f64) -> bool {
    shape.0.iter().any(|p| polygon_contains(p, lon, lat))
}

/// Area on the WGS84 ellipsoid in square metres.
pub fn area_m2(shape: &MultiPolygon<f64>) -> f64 {
    shape.geodesic_area_unsigned()
}

// ── GeoJSON conversion ────────────────────────────────────────────────────────

/// Positions with fewer than two coordinates cannot become `geo_types`
/// coordinates.
fn check_positions(value: &Value) -> Result<(), String> {
    let rings: Vec<&Vec<Vec<f64>>> = match value {
        Value::Polygon(rings) => rings.iter().collect(),
        Value::MultiPolygon(polys) => polys.iter().flatten().collect(),
        _ => return Ok(()),
    };
    match rings.iter().flat_map(|r| r.iter()).find(|p| p.len() < 2) {
        Some(p) => Err(format!("position has {} coordinate(s), need at least 2", p.len())),
        None => Ok(()),
    }
}

/// Convert a GeoJSON Polygon or MultiPolygon into a `MultiPolygon`.
pub fn multipolygon_from_geojson(value: &Value) -> Result<MultiPolygon<f64>, String> {
    check_positions(value)?;
    match value {
        Value::Polygon(_) => Polygon::<f64>::try_from(value).map(|p| MultiPolygon::new(vec![p])),
        _ => MultiPolygon::<f64>::try_from(value),
    }
    .map_err(|e| e.to_string())
}

/// Axis-aligned rectangle, used by tests and synthetic inputs.
pub fn rectangle(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> MultiPolygon<f64> {
    let ring = LineString::from(vec![
        (min_lon, min_lat),
        (max_lon, min_lat),
        (max_lon, max_lat),
        (min_lon, max_lat),
        (min_lon, min_lat),
    ]);
    MultiPolygon::new(vec![Polygon::new(ring, vec![])])
}
