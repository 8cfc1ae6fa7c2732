//! Region table: the polygon features that gain one `water_<year>` attribute
//! per processed year, plus GeoJSON load/export.

use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::Path;

use geo_types::MultiPolygon;
use geojson::{feature::Id, Bbox, Feature, FeatureCollection, GeoJson, Geometry, JsonObject, Value};
use serde_json::Value as JsonValue;
use tracing::{debug, warn};

use crate::error::{PipelineError, Result};
use crate::geometry::{area_m2, multipolygon_from_geojson};
use crate::zonal::ZonalSum;

/// Prefix of the per-year attribute names.
pub const ATTRIBUTE_PREFIX: &str = "water_";

/// Prefix of the optional area-normalised per-year attributes.
pub const NORMALIZED_PREFIX: &str = "water_norm_";

/// Name of the attribute holding `year`'s result.
pub fn year_attribute(year: i32) -> String {
    format!("{ATTRIBUTE_PREFIX}{year}")
}

pub fn normalized_attribute(year: i32) -> String {
    format!("{NORMALIZED_PREFIX}{year}")
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegionId(pub String);

impl fmt::Display for RegionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RegionId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// One polygon feature.
///
/// Sampling uses `geometry`; export writes the feature back from the members
/// it was read with, so coordinates, `bbox` and foreign members survive.
#[derive(Debug, Clone)]
pub struct Region {
    pub id: RegionId,
    pub geometry: MultiPolygon<f64>,
    /// Pass-through attributes; only `water_*` keys are ever written.
    pub properties: JsonObject,
    pub source_geometry: Geometry,
    pub feature_id: Option<Id>,
    pub bbox: Option<Bbox>,
    pub foreign_members: Option<JsonObject>,
}

impl Region {
    pub fn new(id: impl Into<String>, geometry: MultiPolygon<f64>) -> Self {
        let source_geometry = Geometry::new(Value::from(&geometry));
        Self {
            id: RegionId(id.into()),
            geometry,
            properties: JsonObject::new(),
            source_geometry,
            feature_id: None,
            bbox: None,
            foreign_members: None,
        }
    }

    pub fn with_property(mut self, key: &str, value: impl Into<JsonValue>) -> Self {
        self.properties.insert(key.to_string(), value.into());
        self
    }

    /// The year's water count, if it has been accumulated.
    pub fn water(&self, year: i32) -> Option<u64> {
        self.properties.get(&year_attribute(year)).and_then(JsonValue::as_u64)
    }

    fn to_feature(&self) -> Feature {
        Feature {
            bbox: self.bbox.clone(),
            geometry: Some(self.source_geometry.clone()),
            id: self.feature_id.clone(),
            properties: Some(self.properties.clone()),
            foreign_members: self.foreign_members.clone(),
        }
    }
}

/// Ordered collection of regions with unique identifiers.
#[derive(Debug, Clone, Default)]
pub struct RegionTable {
    regions: Vec<Region>,
    /// Collection-level `bbox` and foreign members (e.g. `crs`) from the input.
    bbox: Option<Bbox>,
    foreign_members: Option<JsonObject>,
}

impl RegionTable {
    pub fn new(regions: Vec<Region>) -> Result<Self> {
        let mut seen = HashSet::with_capacity(regions.len());
        for r in &regions {
            if !seen.insert(&r.id) {
                return Err(PipelineError::DuplicateRegionId(r.id.0.clone()));
            }
        }
        Ok(Self { regions, bbox: None, foreign_members: None })
    }

    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    // ── GeoJSON ───────────────────────────────────────────────────────────────

    /// Build a table from a FeatureCollection.
    ///
    /// The region id is taken from `id_property` when given, else from the
    /// feature `id`, else from the feature's position in the collection as
    /// `#<index>`.
    pub fn from_feature_collection(fc: FeatureCollection, id_property: Option<&str>) -> Result<Self> {
        let regions = fc
            .features
            .into_iter()
            .enumerate()
            .map(|(index, feature)| region_from_feature(index, feature, id_property))
            .collect::<Result<Vec<_>>>()?;
        debug!(regions = regions.len(), "loaded region table");
        let mut table = Self::new(regions)?;
        table.bbox = fc.bbox;
        table.foreign_members = fc.foreign_members;
        Ok(table)
    }

    pub fn from_geojson_str(text: &str, id_property: Option<&str>) -> Result<Self> {
        match text.parse::<GeoJson>()? {
            GeoJson::FeatureCollection(fc) => Self::from_feature_collection(fc, id_property),
            GeoJson::Feature(f) => Self::from_feature_collection(
                FeatureCollection { bbox: None, features: vec![f], foreign_members: None },
                id_property,
            ),
            GeoJson::Geometry(_) => Err(PipelineError::InvalidGeometry {
                region: "<document>".to_string(),
                reason: "expected a FeatureCollection, found a bare geometry".to_string(),
            }),
        }
    }

    pub fn from_geojson_file(path: &Path, id_property: Option<&str>) -> Result<Self> {
        let text = fs::read_to_string(path)?;
        Self::from_geojson_str(&text, id_property)
    }

    pub fn to_feature_collection(&self) -> FeatureCollection {
        FeatureCollection {
            bbox: self.bbox.clone(),
            features: self.regions.iter().map(Region::to_feature).collect(),
            foreign_members: self.foreign_members.clone(),
        }
    }

    pub fn write_geojson(&self, path: &Path) -> Result<()> {
        let fc = self.to_feature_collection();
        fs::write(path, GeoJson::FeatureCollection(fc).to_string())?;
        Ok(())
    }
}

fn id_to_string(id: &Id) -> String {
    match id {
        Id::String(s) => s.clone(),
        Id::Number(n) => n.to_string(),
    }
}

fn region_from_feature(index: usize, feature: Feature, id_property: Option<&str>) -> Result<Region> {
    let properties = feature.properties.unwrap_or_default();

    let id = match id_property {
        Some(key) => match properties.get(key) {
            Some(JsonValue::String(s)) => s.clone(),
            Some(JsonValue::Null) | None => {
                return Err(PipelineError::InvalidGeometry {
                    region: format!("#{index}"),
                    reason: format!("missing id property {key:?}"),
                })
            }
            Some(other) => other.to_string(),
        },
        None => feature.id.as_ref().map(id_to_string).unwrap_or_else(|| format!("#{index}")),
    };

    let Some(source_geometry) = feature.geometry else {
        return Err(PipelineError::InvalidGeometry {
            region: id,
            reason: "feature has no geometry".to_string(),
        });
    };
    let geometry = multipolygon_from_geojson(&source_geometry.value)
        .map_err(|reason| PipelineError::InvalidGeometry { region: id.clone(), reason })?;

    Ok(Region {
        id: RegionId(id),
        geometry,
        properties,
        source_geometry,
        feature_id: feature.id,
        bbox: feature.bbox,
        foreign_members: feature.foreign_members,
    })
}

// ── Accumulation ──────────────────────────────────────────────────────────────

/// Write one year's zonal results into the table as `water_<year>`.
///
/// `sums` must line up with the table one-to-one, in order and by id. Every
/// other attribute is left as it was; running twice for the same year only
/// replaces that year's column.
pub fn accumulate_year(mut table: RegionTable, year: i32, sums: &[ZonalSum]) -> Result<RegionTable> {
    if sums.len() != table.regions.len() {
        return Err(PipelineError::ResultMismatch(format!(
            "{} results for {} regions in {year}",
            sums.len(),
            table.regions.len()
        )));
    }
    if let Some((r, s)) = table.regions.iter().zip(sums).find(|(r, s)| r.id != s.region_id) {
        return Err(PipelineError::ResultMismatch(format!(
            "result for {} arrived in the slot of {} in {year}",
            s.region_id, r.id
        )));
    }

    let key = year_attribute(year);
    for (region, sum) in table.regions.iter_mut().zip(sums) {
        let previous = region.properties.insert(key.clone(), JsonValue::from(sum.value));
        if let Some(old) = previous {
            if old.as_u64() != Some(sum.value) {
                warn!(region = %region.id, attribute = %key, %old, new = sum.value, "replacing existing attribute");
            }
        }
    }
    Ok(table)
}

/// Write `water_norm_<year>`: the year's count divided by the number of
/// `scale_m`-sized cells that fit in the region's ellipsoidal area, i.e. the
/// share of the region that was seasonally wet. Regions with no area, or no
/// count for the year, get `null`.
pub fn normalize_year(mut table: RegionTable, year: i32, scale_m: f64) -> RegionTable {
    let key = normalized_attribute(year);
    let cell_m2 = scale_m * scale_m;
    for region in &mut table.regions {
        let cells = area_m2(&region.geometry) / cell_m2;
        let value = match region.water(year) {
            Some(count) if cells > 0.0 => JsonValue::from(count as f64 / cells),
            _ => JsonValue::Null,
        };
        region.properties.insert(key.clone(), value);
    }
    table
}
