pub mod demo;
pub mod harmonize;
pub mod metrics;
pub mod project;

use anyhow::{Context, Result};
use precinct_shifts::{ProjectConfig, WeightMethod};

use crate::cli::{Cli, WeightArgs};

/// Load the project configuration named on the command line.
pub fn load_config(cli: &Cli) -> Result<ProjectConfig> {
    ProjectConfig::load(&cli.config)
        .with_context(|| format!("[cli] Could not load project configuration {}", cli.config.display()))
}

/// Weighting method from `--weight`, falling back to the configured default.
pub fn weight_method(config: &ProjectConfig, args: &WeightArgs) -> WeightMethod {
    args.weight.unwrap_or(config.options.default_weight_method)
}
