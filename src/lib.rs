#![doc = "Precinct-shifts public API: harmonize precinct election results onto a base geography"]
mod collection;
mod common;
mod config;
mod crosswalk;
mod demo;
mod error;
mod geom;
mod harmonize;
mod io;
mod metrics;
mod results;

#[doc(inline)]
pub use collection::{AttrValue, PolygonCollection, normalize};

#[doc(inline)]
pub use common::normalize_id;

#[doc(inline)]
pub use config::{OptionsConfig, OutputConfig, PathsConfig, ProjectConfig, ResultsColumns, WeightsConfig};

#[doc(inline)]
pub use crosswalk::{
    Crosswalk, CrosswalkEntry, CrosswalkOptions, CrosswalkStats, PopulationWeights, WeightMethod,
    build_crosswalk, validate_crosswalk,
};

#[doc(inline)]
pub use demo::generate_synthetic_example;

#[doc(inline)]
pub use error::HarmonizeError;

#[doc(inline)]
pub use geom::{Crs, Geometries};

#[doc(inline)]
pub use harmonize::{
    HarmonizeSummary, HarmonizedRecord, HarmonizedTable, VoteSums,
    base_year_table, crosswalk_year, harmonize_all, reallocate, reallocate_votes_to_base,
};

#[doc(inline)]
pub use metrics::{
    CountyAggregate, MetricsRecord, MetricsTable,
    build_timeseries_table, compute_and_save_metrics, compute_two_party_metrics,
    county_aggregates, county_dataframe, log_summary, pivot_to_wide,
};

#[doc(inline)]
pub use results::{ResultsRecord, ResultsTable, load_results_csv};
