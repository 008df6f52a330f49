use std::path::PathBuf;

use precinct_shifts::WeightMethod;

/// Harmonize precinct election results onto a common base geography
#[derive(clap::Parser, Debug)]
#[command(name = "shifts", version, about, propagate_version = true)]
pub struct Cli {
    /// Increase output verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Project configuration file
    #[arg(short, long, global = true, default_value = "project.json", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(clap::Subcommand, Debug)]
pub enum Commands {
    /// Validate the configuration and create output directories
    Init,

    /// Build the crosswalk from one year to the base year
    Crosswalk(YearArgs),

    /// Harmonize one year's results onto the base geography
    Harmonize(YearArgs),

    /// Harmonize every configured year onto the base geography
    HarmonizeAll(WeightArgs),

    /// Compute swing and turnout metrics over the harmonized years
    Metrics,

    /// Print county-wide results per year
    Summary,

    /// Generate synthetic data and run the full pipeline on it
    Demo(DemoArgs),
}

#[derive(clap::Args, Debug)]
pub struct WeightArgs {
    /// Weighting method, defaults to the configured `default_weight_method`
    #[arg(short, long)]
    pub weight: Option<WeightMethod>,
}

#[derive(clap::Args, Debug)]
pub struct YearArgs {
    /// Election year, e.g. 2020
    pub year: String,

    #[command(flatten)]
    pub weight: WeightArgs,
}

#[derive(clap::Args, Debug)]
pub struct DemoArgs {
    /// Output directory, defaults to "./demo"
    #[arg(short, long, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,
}
