//! GeoJSON FeatureCollection reading and writing, honouring the legacy `crs` member.

use std::{collections::BTreeSet, fs::{self, File}, io::BufWriter, path::Path};

use anyhow::{Context, Result, anyhow, bail};
use geo::{Coord, LineString, MultiPolygon, Polygon};
use serde_json::{Map, Value, json};

use crate::{collection::AttrValue, common::ensure_parent_exists, error::HarmonizeError, geom::Crs};

use super::{RawLayer, SourceCrs};

fn parse_ring(value: &Value) -> Result<LineString<f64>> {
    let points = value.as_array().ok_or_else(|| anyhow!("ring is not an array"))?;
    points.iter()
        .map(|point| match point.as_array().map(Vec::as_slice) {
            Some([x, y, ..]) => Ok(Coord {
                x: x.as_f64().ok_or_else(|| anyhow!("non-numeric x coordinate"))?,
                y: y.as_f64().ok_or_else(|| anyhow!("non-numeric y coordinate"))?,
            }),
            _ => bail!("position must have at least two numbers"),
        })
        .collect::<Result<Vec<_>>>()
        .map(LineString)
}

fn parse_polygon(value: &Value) -> Result<Polygon<f64>> {
    let rings = value.as_array().ok_or_else(|| anyhow!("polygon is not an array of rings"))?;
    let (exterior, interiors) = rings.split_first().ok_or_else(|| anyhow!("polygon has no rings"))?;
    Ok(Polygon::new(
        parse_ring(exterior)?,
        interiors.iter().map(parse_ring).collect::<Result<_>>()?,
    ))
}

/// Parse a GeoJSON geometry object; `null` becomes an empty MultiPolygon.
fn parse_geometry(geometry: &Value, path: &Path) -> Result<MultiPolygon<f64>> {
    if geometry.is_null() { return Ok(MultiPolygon::new(vec![])) }

    let coordinates = &geometry["coordinates"];
    match geometry["type"].as_str() {
        Some("Polygon") => Ok(MultiPolygon::new(vec![parse_polygon(coordinates)?])),
        Some("MultiPolygon") => coordinates.as_array()
            .ok_or_else(|| anyhow!("MultiPolygon coordinates are not an array"))?
            .iter()
            .map(parse_polygon)
            .collect::<Result<Vec<_>>>()
            .map(MultiPolygon::new),
        other => Err(HarmonizeError::UnsupportedShape {
            path: path.to_path_buf(),
            shape: other.unwrap_or("unknown").to_string(),
        }.into()),
    }
}

fn json_to_attr(value: &Value) -> AttrValue {
    match value {
        Value::Null => AttrValue::Null,
        Value::String(s) => AttrValue::Text(s.clone()),
        Value::Number(n) => n.as_f64().map_or(AttrValue::Null, AttrValue::Number),
        other => AttrValue::Text(other.to_string()),
    }
}

fn source_crs(collection: &Value) -> SourceCrs {
    match collection["crs"]["properties"]["name"].as_str() {
        Some(name) => match name.parse() {
            Ok(crs) => SourceCrs::Declared(crs),
            Err(_) => SourceCrs::Unrecognized(name.to_string()),
        },
        None if collection.get("crs").is_some_and(|crs| !crs.is_null()) => {
            SourceCrs::Unrecognized(collection["crs"].to_string())
        }
        None => SourceCrs::Undefined,
    }
}

/// Reads polygon features, their properties and the declared CRS from a GeoJSON FeatureCollection.
pub(crate) fn read_geojson(path: &Path) -> Result<RawLayer> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("[io::geojson::read] Failed to read {}", path.display()))?;
    let collection: Value = serde_json::from_str(&text)
        .with_context(|| format!("[io::geojson::read] Invalid JSON in {}", path.display()))?;

    let features = collection["features"].as_array()
        .ok_or_else(|| anyhow!("[io::geojson::read] {} is not a FeatureCollection", path.display()))?;

    // Union of property names, sorted like shapefile fields.
    let fields = features.iter()
        .filter_map(|feature| feature["properties"].as_object())
        .flat_map(|properties| properties.keys().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect::<Vec<_>>();

    let mut shapes = Vec::with_capacity(features.len());
    let mut records = Vec::with_capacity(features.len());
    for (i, feature) in features.iter().enumerate() {
        shapes.push(parse_geometry(&feature["geometry"], path)
            .with_context(|| format!("[io::geojson::read] Bad geometry in feature {i} of {}", path.display()))?);
        records.push(fields.iter()
            .map(|field| json_to_attr(&feature["properties"][field.as_str()]))
            .collect());
    }

    Ok(RawLayer { shapes, fields, records, crs: source_crs(&collection) })
}

/// Convert a MultiPolygon to a GeoJSON geometry object.
pub(crate) fn multipolygon_to_geojson(mp: &MultiPolygon<f64>) -> Value {
    fn ring(ls: &LineString<f64>) -> Vec<[f64; 2]> {
        ls.coords().map(|c| [c.x, c.y]).collect()
    }

    let polygons = mp.0.iter()
        .map(|polygon| std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .map(ring)
            .collect::<Vec<_>>())
        .collect::<Vec<_>>();

    json!({ "type": "MultiPolygon", "coordinates": polygons })
}

fn crs_member(crs: &Crs) -> Value {
    let name = match crs.epsg() {
        Some(code) => format!("urn:ogc:def:crs:EPSG::{code}"),
        None => crs.to_string(),
    };
    json!({ "type": "name", "properties": { "name": name } })
}

/// Write a FeatureCollection of MultiPolygons with per-feature properties, tagged with `crs`.
pub(crate) fn write_geojson<'a>(
    path: &Path,
    crs: &Crs,
    features: impl IntoIterator<Item = (&'a MultiPolygon<f64>, Map<String, Value>)>,
) -> Result<()> {
    let features = features.into_iter()
        .map(|(shape, properties)| json!({
            "type": "Feature",
            "geometry": multipolygon_to_geojson(shape),
            "properties": properties,
        }))
        .collect::<Vec<_>>();

    let collection = json!({
        "type": "FeatureCollection",
        "crs": crs_member(crs),
        "features": features,
    });

    ensure_parent_exists(path)?;
    let file = File::create(path)
        .with_context(|| format!("[io::geojson::write] Failed to create {}", path.display()))?;
    serde_json::to_writer(BufWriter::new(file), &collection)
        .with_context(|| format!("[io::geojson::write] Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use geo::{Area, polygon};

    use super::*;

    #[test]
    fn reads_polygons_properties_and_crs() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("precincts.geojson");
        fs::write(&path, r#"{
            "type": "FeatureCollection",
            "crs": {"type": "name", "properties": {"name": "urn:ogc:def:crs:EPSG::3735"}},
            "features": [
                {"type": "Feature", "properties": {"PREC_ID": "a", "POP": 10},
                 "geometry": {"type": "Polygon", "coordinates": [[[0,0],[2,0],[2,2],[0,2],[0,0]]]}},
                {"type": "Feature", "properties": {"PREC_ID": "b", "NOTE": null},
                 "geometry": {"type": "MultiPolygon", "coordinates": [[[[2,0],[3,0],[3,1],[2,0]]]]}}
            ]
        }"#).unwrap();

        let layer = read_geojson(&path).unwrap();
        assert_eq!(layer.crs, SourceCrs::Declared(Crs::Epsg(3735)));
        assert_eq!(layer.fields, vec!["NOTE", "POP", "PREC_ID"]);
        assert_eq!(layer.records[0], vec![AttrValue::Null, AttrValue::Number(10.0), AttrValue::Text("a".into())]);
        assert_eq!(layer.records[1][1], AttrValue::Null);
        assert!((layer.shapes[0].unsigned_area() - 4.0).abs() < 1e-12);
        assert!((layer.shapes[1].unsigned_area() - 0.5).abs() < 1e-12);
    }

    #[test]
    fn points_are_rejected() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("points.geojson");
        fs::write(&path, r#"{"type": "FeatureCollection", "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [0, 0]}}
        ]}"#).unwrap();

        let err = read_geojson(&path).unwrap_err();
        assert!(matches!(err.downcast_ref::<HarmonizeError>(), Some(HarmonizeError::UnsupportedShape { .. })));
    }

    #[test]
    fn written_layers_read_back() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("out/layer.geojson");
        let shape = MultiPolygon::new(vec![polygon![
            (x: 0.0, y: 0.0), (x: 1.0, y: 0.0), (x: 1.0, y: 1.0), (x: 0.0, y: 0.0),
        ]]);
        let mut properties = Map::new();
        properties.insert("PREC_ID".into(), json!("A"));

        write_geojson(&path, &Crs::Epsg(3734), [(&shape, properties)]).unwrap();
        let layer = read_geojson(&path).unwrap();
        assert_eq!(layer.crs, SourceCrs::Declared(Crs::Epsg(3734)));
        assert_eq!(layer.shapes, vec![shape]);
        assert_eq!(layer.records, vec![vec![AttrValue::Text("A".into())]]);
    }
}
