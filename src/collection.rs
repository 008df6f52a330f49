//! Polygon collections: one election year's areal units in one CRS, with attributes.

use std::{fmt, path::Path};

use anyhow::{Context, Result, bail, ensure};
use geo::MultiPolygon;
use serde_json::{Map, Value, json};
use tracing::{info, warn};

use crate::{
    common::{format_numeric_id, normalize_id, require_file_exists},
    error::HarmonizeError,
    geom::{Crs, Geometries},
    io::{self, RawLayer, SourceCrs},
};

/// A single attribute value of a polygon.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    Text(String),
    Number(f64),
    Null,
}

impl AttrValue {
    /// Numeric value, parsing text if needed.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::Number(n) => Some(*n),
            AttrValue::Text(s) => s.trim().parse().ok(),
            AttrValue::Null => None,
        }
    }

    fn to_json(&self) -> Value {
        match self {
            AttrValue::Text(s) => json!(s),
            AttrValue::Number(n) => json!(n),
            AttrValue::Null => Value::Null,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AttrValue::Text(s) => f.write_str(s),
            AttrValue::Number(n) => f.write_str(&format_numeric_id(*n)),
            AttrValue::Null => Ok(()),
        }
    }
}

/// A set of areal units sharing one CRS, with an attribute table aligned to the shapes by index.
#[derive(Debug, Clone)]
pub struct PolygonCollection {
    crs: Crs,
    geoms: Geometries,
    fields: Vec<String>,
    records: Vec<Vec<AttrValue>>,
}

impl PolygonCollection {
    /// Build a collection from shapes and attribute rows (one row per shape, one value per field).
    pub fn new(crs: Crs, shapes: Vec<MultiPolygon<f64>>, fields: Vec<String>, records: Vec<Vec<AttrValue>>) -> Result<Self> {
        ensure!(shapes.len() == records.len(),
            "[PolygonCollection::new] {} shapes but {} attribute rows", shapes.len(), records.len());
        ensure!(records.iter().all(|row| row.len() == fields.len()),
            "[PolygonCollection::new] every attribute row must have {} values", fields.len());

        Ok(Self { crs, geoms: Geometries::new(shapes), fields, records })
    }

    #[inline] pub fn crs(&self) -> &Crs { &self.crs }
    #[inline] pub fn geoms(&self) -> &Geometries { &self.geoms }
    #[inline] pub fn fields(&self) -> &[String] { &self.fields }
    #[inline] pub fn records(&self) -> &[Vec<AttrValue>] { &self.records }
    #[inline] pub fn len(&self) -> usize { self.geoms.len() }
    #[inline] pub fn is_empty(&self) -> bool { self.geoms.is_empty() }

    /// Position of an attribute field, or `HarmonizeError::MissingField`.
    pub fn field_index(&self, field: &str) -> Result<usize> {
        self.fields.iter()
            .position(|name| name == field)
            .ok_or_else(|| HarmonizeError::MissingField(field.to_string()).into())
    }

    /// Values of an attribute field.
    pub fn values(&self, field: &str) -> Result<impl Iterator<Item = &AttrValue>> {
        let i = self.field_index(field)?;
        Ok(self.records.iter().map(move |row| &row[i]))
    }

    /// Normalized identifiers from `field`, one per polygon.
    pub fn ids(&self, field: &str) -> Result<Vec<String>> {
        let ids = self.values(field)?
            .map(|value| normalize_id(&value.to_string()))
            .collect::<Vec<_>>();

        let blank = ids.iter().filter(|id| id.is_empty()).count();
        if blank > 0 {
            warn!("{blank} of {} polygons have an empty {field:?} identifier", ids.len());
        }
        Ok(ids)
    }

    /// Numeric values from `field`; missing or non-numeric values count as zero.
    pub fn numeric(&self, field: &str) -> Result<Vec<f64>> {
        let values = self.values(field)?
            .map(AttrValue::as_f64)
            .collect::<Vec<_>>();

        let missing = values.iter().filter(|value| value.is_none()).count();
        if missing > 0 {
            warn!("{missing} of {} values in field {field:?} are missing or non-numeric; treating as 0", values.len());
        }
        Ok(values.into_iter().map(|value| value.unwrap_or(0.0)).collect())
    }

    /// Attribute row of a polygon as GeoJSON properties.
    pub(crate) fn properties(&self, idx: usize) -> Map<String, Value> {
        self.fields.iter().cloned()
            .zip(self.records[idx].iter().map(AttrValue::to_json))
            .collect()
    }

    /// Write the collection as a GeoJSON FeatureCollection.
    pub fn write_geojson(&self, path: &Path) -> Result<()> {
        io::geojson::write_geojson(path, &self.crs,
            self.geoms.shapes().iter().enumerate().map(|(i, shape)| (shape, self.properties(i))))
    }

    /// Write the collection as a shapefile with a `.prj`.
    pub fn write_shapefile(&self, path: &Path) -> Result<()> {
        io::shp::write_shapefile(path, self.geoms.shapes(), &self.fields, &self.records, &self.crs)
    }
}

/// Load a polygon dataset, bring it into `target_crs`, and repair invalid geometries.
///
/// Shapefiles (`.shp`, with `.dbf` and optional `.prj`) and GeoJSON (`.geojson`, `.json`)
/// are supported. A missing or unrecognized source CRS is assumed to be `target_crs`.
pub fn normalize(path: &Path, target_crs: &Crs) -> Result<PolygonCollection> {
    require_file_exists(path)?;

    let extension = path.extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    let RawLayer { shapes, fields, records, crs } = match extension.as_deref() {
        Some("shp") => io::shp::read_shapefile(path)?,
        Some("geojson" | "json") => io::geojson::read_geojson(path)?,
        _ => bail!("[normalize] Unsupported polygon format: {}", path.display()),
    };

    if shapes.is_empty() {
        return Err(HarmonizeError::EmptyDataset(path.to_path_buf()).into());
    }

    let source_crs = match crs {
        SourceCrs::Declared(crs) => crs,
        SourceCrs::Undefined => {
            warn!("{} has no CRS defined; assuming {target_crs}", path.display());
            target_crs.clone()
        }
        SourceCrs::Unrecognized(raw) => {
            warn!("{} declares an unrecognized CRS ({}); assuming {target_crs}",
                path.display(), raw.chars().take(80).collect::<String>());
            target_crs.clone()
        }
    };

    let mut geoms = Geometries::new(shapes);
    if &source_crs != target_crs {
        info!("Reprojecting {} from {source_crs} to {target_crs}", path.display());
        geoms = geoms.reproject(&source_crs, target_crs)
            .with_context(|| format!("[normalize] Failed to reproject {}", path.display()))?;
    }

    let (geoms, report) = geoms.repair();
    if report.invalid > 0 {
        info!("Repaired {} invalid geometries in {}", report.invalid, path.display());
    }
    if report.unresolved > 0 {
        warn!("{} geometries in {} remain invalid after repair", report.unresolved, path.display());
    }

    if target_crs.is_geographic() {
        warn!("Target CRS {target_crs} is geographic; areas in degrees distort overlap weights");
    }

    info!(path = %path.display(), features = geoms.len(), crs = %target_crs, "Loaded polygons");

    Ok(PolygonCollection { crs: target_crs.clone(), geoms, fields, records })
}
