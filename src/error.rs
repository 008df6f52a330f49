//! Domain errors for the harmonization pipeline.
//!
//! Public operations return `anyhow::Result`; these variants are raised through it so that
//! callers (e.g. the multi-year driver or the CLI) can `downcast_ref::<HarmonizeError>()`
//! to tell fatal input problems apart.

use std::path::PathBuf;

use thiserror::Error;

use crate::geom::Crs;

#[derive(Debug, Error)]
pub enum HarmonizeError {
    /// An input dataset does not exist on disk.
    #[error("input file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    /// Two collections that must be overlaid are in different coordinate systems.
    #[error("CRS mismatch: {left} vs {right}; reproject both collections before overlay")]
    CrsMismatch { left: Crs, right: Crs },

    /// A year was asked to be harmonized onto its own geography.
    #[error("cannot harmonize base year {0} onto itself")]
    BaseYearSelfHarmonize(String),

    /// Population weighting was requested without blocks or a population field.
    #[error("population weighting requires a blocks collection and a population field")]
    MissingWeightInputs,

    /// A tabular input lacks required columns.
    #[error("missing required columns {missing:?} in {}; available: {available:?}", path.display())]
    MissingColumns { path: PathBuf, missing: Vec<String>, available: Vec<String> },

    /// A polygon collection lacks the attribute field used as identifier or weight.
    #[error("field {0:?} not found in polygon collection")]
    MissingField(String),

    /// No PROJ.4 definition is known for a CRS that needs reprojection.
    #[error("unsupported CRS for reprojection: {0}")]
    UnsupportedCrs(String),

    /// A polygon dataset has no features.
    #[error("polygon dataset is empty: {}", .0.display())]
    EmptyDataset(PathBuf),

    /// A polygon dataset contains a non-areal shape.
    #[error("unsupported shape type {shape} in {}", path.display())]
    UnsupportedShape { path: PathBuf, shape: String },

    /// The project configuration is inconsistent.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}
