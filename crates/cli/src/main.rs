//! basket-returns CLI
//!
//! Builds order-level return-prediction datasets from a cleaned line-item CSV.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use returns_core::Config;
use returns_dataset::{export_dataset, load_dataset};
use returns_ingestion::{log_schema, LineItemTable};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "basket-returns")]
#[command(about = "Order-level features and chronological splits for return prediction")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the pipeline and export X/y matrices plus the basket table
    Build {
        /// Path to the cleaned line-item CSV
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Split cutoff; orders at or after it go to the test set
        #[arg(long)]
        cutoff: Option<String>,

        /// Output directory for the exported CSV files
        #[arg(short, long)]
        output_dir: Option<PathBuf>,

        /// JSON configuration file (flags override its values)
        #[arg(short, long)]
        config: Option<PathBuf>,
    },

    /// Load the input and report schema and data quality
    Profile {
        /// Path to the cleaned line-item CSV
        #[arg(short, long)]
        input: PathBuf,

        /// Field delimiter
        #[arg(long, default_value = ",")]
        delimiter: char,
    },
}

fn main() -> Result<()> {
    init_tracing()?;

    let args = Args::parse();
    match args.command {
        Command::Build {
            input,
            cutoff,
            output_dir,
            config,
        } => {
            let mut config = match config {
                Some(path) => Config::from_json_file(&path)
                    .with_context(|| format!("Failed to load config {}", path.display()))?,
                None => Config::default(),
            };
            if let Some(input) = input {
                config.input.path = input;
            }
            if let Some(cutoff) = cutoff {
                config.split.cutoff = cutoff;
            }
            if let Some(dir) = output_dir {
                config.output.dir = dir;
            }
            run_build(&config)
        }
        Command::Profile { input, delimiter } => run_profile(&input, delimiter),
    }
}

fn run_build(config: &Config) -> Result<()> {
    config.validate().context("Invalid configuration")?;
    info!(
        input = %config.input.path.display(),
        cutoff = %config.split.cutoff,
        "Building dataset"
    );

    let dataset = load_dataset(config)
        .with_context(|| format!("Failed to build dataset from {}", config.input.path.display()))?;

    let train = dataset.train();
    let test = dataset.test();
    info!(
        train_rows = train.len(),
        test_rows = test.len(),
        train_return_rate = format!("{:.4}", train.positive_rate()),
        test_return_rate = format!("{:.4}", test.positive_rate()),
        "Split summary"
    );
    if !dataset.split.unusable.is_empty() {
        warn!(
            orders = dataset.split.unusable.len(),
            "Orders without a date or label left out of X/y"
        );
    }
    if train.is_empty() || test.is_empty() {
        warn!("One side of the split is empty; check the cutoff against the data range");
    }

    let paths = export_dataset(&config.output.dir, &dataset)
        .with_context(|| format!("Failed to export to {}", config.output.dir.display()))?;
    info!(
        x_train = %paths.x_train.display(),
        x_test = %paths.x_test.display(),
        basket = %paths.basket.display(),
        "Export complete"
    );
    Ok(())
}

fn run_profile(input: &Path, delimiter: char) -> Result<()> {
    anyhow::ensure!(
        delimiter.is_ascii(),
        "delimiter must be a single ASCII character, got {delimiter:?}"
    );
    let items = LineItemTable::from_csv_path(input, delimiter as u8)
        .with_context(|| format!("Failed to load {}", input.display()))?;

    log_schema(&items.schema);
    items.profile.log();
    info!(
        line_items = items.len(),
        available_features = items.schema.available_features().len(),
        "Profile complete"
    );
    Ok(())
}

/// Initialize tracing subscriber
fn init_tracing() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "basket_returns=info,returns_ingestion=info,returns_features=info,returns_dataset=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {}", e))?;

    Ok(())
}
