//! IO module for format-specific reading and writing operations.
//!
//! Each format module handles reading and writing for a specific file format:
//!
//! - `csv` - CSV (and optionally Parquet) for results, crosswalks and metrics tables
//! - `shp` - Shapefile format for precinct and block polygons
//! - `geojson` - GeoJSON format for polygon input and harmonized layers

pub(crate) mod csv;
pub(crate) mod geojson;
pub(crate) mod shp;

use geo::MultiPolygon;

use crate::{collection::AttrValue, geom::Crs};

/// CRS declaration found in a polygon source file.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum SourceCrs {
    /// A CRS that was recognized.
    Declared(Crs),
    /// A CRS was declared but could not be identified; holds the raw declaration.
    Unrecognized(String),
    /// No CRS was declared at all.
    Undefined,
}

/// Polygons and attribute rows as read from disk, before normalization.
#[derive(Debug, Clone)]
pub(crate) struct RawLayer {
    pub(crate) shapes: Vec<MultiPolygon<f64>>,
    pub(crate) fields: Vec<String>,
    pub(crate) records: Vec<Vec<AttrValue>>,
    pub(crate) crs: SourceCrs,
}
