//! Shapefile reading and writing (`.shp` + `.dbf` + `.prj`).

use std::{fs, path::Path};

use anyhow::{Context, Result, anyhow};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use shapefile::{self as shp, PolygonRing, Shape, dbase::{FieldName, FieldValue, Record, TableWriterBuilder}};

use crate::{collection::AttrValue, common::ensure_parent_exists, error::HarmonizeError, geom::Crs};

use super::{RawLayer, SourceCrs};

/// Convert a ring list (outer rings each followed by their holes) to a MultiPolygon.
fn rings_to_geo<P>(rings: &[PolygonRing<P>], xy: impl Fn(&P) -> (f64, f64)) -> MultiPolygon<f64> {
    /// Ensure first and last are the same for geo::LineString coords
    fn ensure_closed(coords: &mut Vec<Coord<f64>>) {
        if let (Some(first), Some(last)) = (coords.first().copied(), coords.last().copied()) {
            if first != last { coords.push(first) }
        }
    }

    let mut polys = Vec::new();
    let mut current_exterior: Option<LineString<f64>> = None;
    let mut current_holes = Vec::new();

    for ring in rings {
        let mut coords = ring.points().iter()
            .map(|pt| { let (x, y) = xy(pt); Coord { x, y } })
            .collect::<Vec<_>>();
        ensure_closed(&mut coords);

        match ring {
            PolygonRing::Outer(_) => {
                if let Some(exterior) = current_exterior.replace(LineString(coords)) {
                    polys.push(Polygon::new(exterior, std::mem::take(&mut current_holes)));
                }
            }
            PolygonRing::Inner(_) => current_holes.push(LineString(coords)),
        }
    }
    if let Some(exterior) = current_exterior {
        polys.push(Polygon::new(exterior, current_holes));
    }

    MultiPolygon(polys)
}

/// Convert a shape to a MultiPolygon; null shapes become empty, non-areal shapes are rejected.
fn shape_to_geo(shape: Shape, path: &Path) -> Result<MultiPolygon<f64>> {
    match shape {
        Shape::Polygon(p) => Ok(rings_to_geo(p.rings(), |pt| (pt.x, pt.y))),
        Shape::PolygonM(p) => Ok(rings_to_geo(p.rings(), |pt| (pt.x, pt.y))),
        Shape::PolygonZ(p) => Ok(rings_to_geo(p.rings(), |pt| (pt.x, pt.y))),
        Shape::NullShape => Ok(MultiPolygon::new(vec![])),
        other => Err(HarmonizeError::UnsupportedShape {
            path: path.to_path_buf(),
            shape: format!("{:?}", other.shapetype()),
        }.into()),
    }
}

/// Convert a MultiPolygon to a shapefile polygon: exteriors clockwise, holes counter-clockwise.
fn geo_to_shp(mp: &MultiPolygon<f64>) -> shp::Polygon {
    /// Get the signed area of a closed point list (negative when clockwise)
    fn signed_area(pts: &[shp::Point]) -> f64 {
        pts.windows(2).map(|w| w[0].x * w[1].y - w[1].x * w[0].y).sum::<f64>() / 2.0
    }

    fn ring_points(ring: &LineString<f64>) -> Vec<shp::Point> {
        ring.coords().map(|c| shp::Point { x: c.x, y: c.y }).collect()
    }

    let mut rings = Vec::new();
    for poly in &mp.0 {
        let mut exterior = ring_points(poly.exterior());
        if signed_area(&exterior) > 0.0 { exterior.reverse() }
        rings.push(PolygonRing::Outer(exterior));

        for hole in poly.interiors() {
            let mut hole = ring_points(hole);
            if signed_area(&hole) < 0.0 { hole.reverse() }
            rings.push(PolygonRing::Inner(hole));
        }
    }

    shp::Polygon::with_rings(rings)
}

fn field_value_to_attr(value: FieldValue) -> AttrValue {
    match value {
        FieldValue::Character(Some(s)) | FieldValue::Memo(s) => AttrValue::Text(s.trim().to_string()),
        FieldValue::Numeric(Some(n)) => AttrValue::Number(n),
        FieldValue::Float(Some(f)) => AttrValue::Number(f as f64),
        FieldValue::Integer(i) => AttrValue::Number(i as f64),
        FieldValue::Double(d) | FieldValue::Currency(d) => AttrValue::Number(d),
        FieldValue::Logical(Some(b)) => AttrValue::Text(b.to_string()),
        _ => AttrValue::Null,
    }
}

/// Read the `.prj` beside a shapefile, if any.
fn read_prj(path: &Path) -> Result<SourceCrs> {
    let prj = path.with_extension("prj");
    if !prj.exists() { return Ok(SourceCrs::Undefined) }

    let wkt = fs::read_to_string(&prj)
        .with_context(|| format!("[io::shp::read] Failed to read projection file: {}", prj.display()))?;
    Ok(match Crs::from_prj_wkt(&wkt) {
        Some(crs) => SourceCrs::Declared(crs),
        None => SourceCrs::Unrecognized(wkt.trim().to_string()),
    })
}

/// Reads all shapes, attribute records and the declared CRS of a `.shp` file.
pub(crate) fn read_shapefile(path: &Path) -> Result<RawLayer> {
    let mut reader = shp::Reader::from_path(path)
        .with_context(|| format!("[io::shp::read] Failed to open shapefile: {}", path.display()))?;

    let mut shapes = Vec::new();
    let mut raw_records = Vec::new();
    for result in reader.iter_shapes_and_records() {
        let (shape, record) = result
            .with_context(|| format!("[io::shp::read] Error reading shape+record from {}", path.display()))?;
        shapes.push(shape_to_geo(shape, path)?);
        raw_records.push(record);
    }

    // dBase records are unordered maps; give the attribute table a stable column order.
    let mut fields = raw_records.iter()
        .flat_map(|record: &Record| record.clone().into_iter().map(|(name, _)| name))
        .collect::<Vec<_>>();
    fields.sort();
    fields.dedup();

    let records = raw_records.into_iter()
        .map(|record| {
            let mut values = vec![AttrValue::Null; fields.len()];
            for (name, value) in record {
                if let Ok(i) = fields.binary_search(&name) {
                    values[i] = field_value_to_attr(value);
                }
            }
            values
        })
        .collect();

    Ok(RawLayer { shapes, fields, records, crs: read_prj(path)? })
}

/// Minimal WKT carrying an EPSG authority, enough for `Crs::from_prj_wkt` and most GIS tools.
fn prj_wkt(crs: &Crs) -> Option<String> {
    let code = crs.epsg()?;
    let kind = if crs.is_geographic() { "GEOGCS" } else { "PROJCS" };
    Some(format!(r#"{kind}["EPSG:{code}",AUTHORITY["EPSG","{code}"]]"#))
}

/// Write polygons with attribute columns to a shapefile, plus a `.prj` when the CRS has an EPSG code.
/// Columns holding only numbers (or nulls) become numeric fields, anything else character fields.
pub(crate) fn write_shapefile(
    path: &Path,
    shapes: &[MultiPolygon<f64>],
    fields: &[String],
    records: &[Vec<AttrValue>],
    crs: &Crs,
) -> Result<()> {
    ensure_parent_exists(path)?;

    let numeric = (0..fields.len())
        .map(|i| records.iter().all(|row| !matches!(row[i], AttrValue::Text(_))))
        .collect::<Vec<_>>();

    let mut builder = TableWriterBuilder::new();
    for (field, &is_numeric) in fields.iter().zip(&numeric) {
        let name = FieldName::try_from(field.as_str())
            .map_err(|e| anyhow!("[io::shp::write] Invalid dBase field name {field:?}: {e:?}"))?;
        builder = if is_numeric { builder.add_numeric_field(name, 18, 6) }
        else { builder.add_character_field(name, 254) };
    }

    let mut writer = shp::Writer::from_path(path, builder)
        .with_context(|| format!("[io::shp::write] Failed to create shapefile: {}", path.display()))?;

    for (shape, row) in shapes.iter().zip(records) {
        let mut record = Record::default();
        for ((field, value), &is_numeric) in fields.iter().zip(row).zip(&numeric) {
            let value = match (value, is_numeric) {
                (AttrValue::Number(n), true) => FieldValue::Numeric(Some(*n)),
                (_, true) => FieldValue::Numeric(None),
                (AttrValue::Null, false) => FieldValue::Character(None),
                (value, false) => FieldValue::Character(Some(value.to_string())),
            };
            record.insert(field.clone(), value);
        }
        writer.write_shape_and_record(&geo_to_shp(shape), &record)
            .with_context(|| format!("[io::shp::write] Failed to write record to {}", path.display()))?;
    }

    if let Some(wkt) = prj_wkt(crs) {
        fs::write(path.with_extension("prj"), wkt)
            .with_context(|| format!("[io::shp::write] Failed to write projection for {}", path.display()))?;
    }

    Ok(())
}
