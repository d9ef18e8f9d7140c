//! tsforecast CLI for dataset management, training, and inference.

mod config;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tsf::{write_errors_csv, TimeSeries, SERIES_FILE};
use tsf_data::monarch::BASE_URL;
use tsf_data::{cache_dir, list_forecasting_datasets, Monarch};

use crate::config::RunConfig;

#[derive(Parser)]
#[command(name = "tsf")]
#[command(author, version)]
#[command(about = "Time series forecasting CLI - train and evaluate forecasters from a TOML configuration")]
#[command(long_about = "tsf: multi-step time series forecasting with linear, recurrent and attention models.

EXAMPLES:
  # List the Monash forecasting datasets
  tsf datasets list

  # Download one of them by Zenodo id
  tsf datasets fetch 4656222 --path data

  # Train the model described in a configuration
  tsf train -c config/weather.toml

  # Compute per-lag errors on the test set
  tsf infer -c config/weather.toml

Configuration values may reference environment variables as ${VAR}.")]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage datasets (list, download)
    Datasets {
        #[command(subcommand)]
        command: DatasetCommands,
    },
    /// Train the configured model
    Train {
        /// Configuration file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
    /// Evaluate a trained model on the configured set
    Infer {
        /// Configuration file
        #[arg(short, long, value_name = "FILE")]
        config: PathBuf,
    },
}

#[derive(Subcommand)]
enum DatasetCommands {
    /// List the Monash forecasting datasets
    List {
        /// Cached copy of the dataset table
        #[arg(long, value_name = "FILE")]
        table: Option<PathBuf>,

        /// Download the table again
        #[arg(long, default_value = "false")]
        rebuild: bool,
    },
    /// Download a dataset by Zenodo id
    Fetch {
        /// Zenodo record id (e.g., 4656222)
        id: String,

        /// Destination directory
        #[arg(long, value_name = "DIR")]
        path: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v
    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(filter)
        .init();

    match cli.command {
        Commands::Datasets { command } => handle_datasets(command),
        Commands::Train { config } => handle_train(config),
        Commands::Infer { config } => handle_infer(config),
    }
}

fn handle_datasets(command: DatasetCommands) -> Result<()> {
    match command {
        DatasetCommands::List { table, rebuild } => {
            let table = table.unwrap_or_else(|| cache_dir().join("monarch.json"));
            match Monarch::new(&table, BASE_URL, rebuild) {
                Ok(monarch) => {
                    println!("Monash forecasting repository ({} datasets):", monarch.table().len());
                    println!("─────────────────────────────────────────");
                    for entry in monarch.table() {
                        let series = entry.n_series.map_or_else(|| "-".to_string(), |n| n.to_string());
                        println!(
                            "  {:<10} {:<40} {:<12} {:>8}  {}",
                            entry.zenodo_id, entry.name, entry.frequency, series, entry.variant
                        );
                    }
                }
                Err(e) => {
                    tracing::warn!("cannot load the dataset table ({e}), showing the built-in list");
                    println!("Monash forecasting repository (offline list):");
                    println!("─────────────────────────────────────────");
                    for (name, id) in list_forecasting_datasets() {
                        println!("  {id:<10} {name}");
                    }
                }
            }
            println!("\nUsage:");
            println!("  tsf datasets fetch ZENODO_ID");
            Ok(())
        }
        DatasetCommands::Fetch { id, path } => {
            let path = path.unwrap_or_else(cache_dir);
            println!("Fetching dataset {id} into {}", path.display());
            let monarch = Monarch::from_table(path.join("monarch.json"), Vec::new());
            let data = monarch
                .generate_dataset(&path, &id)
                .with_context(|| format!("Failed to fetch dataset '{id}'"))?;

            println!("Successfully downloaded '{id}'");
            println!("  Series:    {}", data.series.len());
            println!("  Frequency: {}", data.frequency.as_deref().unwrap_or("-"));
            if let Ok(horizon) = data.horizon() {
                println!("  Horizon:   {horizon}");
            }
            println!("  Missing:   {}", data.contain_missing_values);
            Ok(())
        }
    }
}

fn handle_train(config_path: PathBuf) -> Result<()> {
    let config = RunConfig::from_file(&config_path)?;
    let mut ts = config.load_series()?;
    let dirpath = config.train_config.dirpath.clone();

    println!("Training {} on {}", config.model.name(), ts.name());
    println!("Model and weights will be placed in {}", dirpath.display());

    let losses = ts
        .train_model(&dirpath, config.split_params.clone(), config.train_options())
        .context("Training failed")?;

    println!("\nEpoch  Train loss  Valid loss");
    for (epoch, (train, valid)) in losses.train.iter().zip(&losses.validation).enumerate() {
        println!("{epoch:>5}  {train:>10.4}  {valid:>10.4}");
    }
    Ok(())
}

fn handle_infer(config_path: PathBuf) -> Result<()> {
    let config = RunConfig::from_file(&config_path)?;
    let series_path = config.train_config.dirpath.join(SERIES_FILE);
    let ts = TimeSeries::load(&series_path, config.inference.load_last)
        .with_context(|| format!("cannot load the trained series from {}", series_path.display()))?;

    let inference = &config.inference;
    let table = ts.inference_on_set(inference.batch_size, inference.set, inference.rescaling)?;
    let errors = table.errors_by_lag();

    println!("{:>5}  {:<16} {:>12} {:>10}", "lag", "variable", "MSE", "MAPE");
    for e in &errors {
        println!("{:>5}  {:<16} {:>12.4} {:>10.2}", e.lag, e.variable, e.mse, e.mape);
    }

    let filename = config.errors_file();
    if let Some(parent) = filename.parent() {
        std::fs::create_dir_all(parent)?;
    }
    write_errors_csv(&errors, &filename)?;
    println!("\nErrors written to {}", filename.display());
    Ok(())
}
