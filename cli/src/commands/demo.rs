use anyhow::Result;
use tracing::info;

use precinct_shifts::{compute_and_save_metrics, generate_synthetic_example, harmonize_all};

use crate::cli::DemoArgs;

pub fn run(args: &DemoArgs) -> Result<()> {
    let out_dir = args.output.clone().unwrap_or("demo".into());

    info!("[demo] Step 1: generating synthetic data");
    let config = generate_synthetic_example(&out_dir)?;

    info!("[demo] Step 2: harmonizing {} onto {}", config.non_base_years().join(", "), config.base_year);
    harmonize_all(&config, config.options.default_weight_method)?;

    info!("[demo] Step 3: computing metrics");
    compute_and_save_metrics(&config)?;

    info!("[demo] Outputs written to {}", out_dir.display());
    Ok(())
}
