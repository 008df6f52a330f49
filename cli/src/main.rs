mod cli;
mod commands;

use clap::Parser;
use tracing::Level;
use tracing_subscriber::{EnvFilter, fmt};

use cli::{Cli, Commands};
use commands::{demo, harmonize, metrics, project};

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match &cli.command {
        Commands::Init => project::init(&cli),
        Commands::Crosswalk(args) => harmonize::crosswalk(&cli, args),
        Commands::Harmonize(args) => harmonize::harmonize(&cli, args),
        Commands::HarmonizeAll(args) => harmonize::harmonize_all(&cli, args),
        Commands::Metrics => metrics::metrics(&cli),
        Commands::Summary => metrics::summary(&cli),
        Commands::Demo(args) => demo::run(args),
    }
}

fn main() -> anyhow::Result<()> { run() }
