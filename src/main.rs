//! `skycast` command line
//!
//! Usage:
//!   skycast train --data history.csv
//!   skycast forecast --city Kolkata --horizon 7
//!   skycast summary

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use skycast::dataset::DatasetSummary;
use skycast::ensemble::TrainingReport;
use skycast::forecast_service::summarize_csv;
use skycast::{Forecast, ForecastService, ModelStore, OpenWeatherClient, SkycastConfig, SkycastError, TrainingService};
use tracing::error;

#[derive(Parser, Debug)]
#[command(author, version, about = "Next-day and multi-day weather forecasts from daily history")]
struct Cli {
    /// Configuration file (defaults to the user config directory)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Train the three models from a historical CSV file
    Train {
        /// Historical CSV file
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
    /// Forecast the coming days from live conditions
    Forecast {
        /// City to forecast
        #[arg(long)]
        city: Option<String>,

        /// Days to project
        #[arg(long, value_parser = clap::value_parser!(u16).range(1..=30))]
        horizon: Option<u16>,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },
    /// Describe a historical CSV file
    Summary {
        /// Historical CSV file
        #[arg(short, long)]
        data: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            match err.downcast_ref::<SkycastError>() {
                Some(skycast_err) => eprintln!("Error: {}", skycast_err.user_message()),
                None => eprintln!("Error: {err:#}"),
            }
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = SkycastConfig::load_from_path(cli.config)?;
    skycast::logging::init(&config.logging, cli.verbose)?;

    let store = ModelStore::new(&config.models.directory);

    match cli.command {
        Command::Train { data } => {
            let path = data.unwrap_or_else(|| config.data.history_path.clone());
            let report = TrainingService::new(store, config.models.forest_config())
                .train_from_csv(&path)
                .with_context(|| format!("Training from {} failed", path.display()))?;
            print_training_report(&report, &config.models.directory);
        }
        Command::Forecast { city, horizon, json } => {
            let city = city.unwrap_or_else(|| config.weather.city.clone());
            let horizon = horizon.map_or(config.forecast.horizon_days, usize::from);

            let client = OpenWeatherClient::new(&config.weather)?;
            let forecast = ForecastService::new(store, horizon).run(&client, &city).await?;

            if json {
                println!("{}", serde_json::to_string_pretty(&forecast)?);
            } else {
                print_forecast(&forecast);
            }
        }
        Command::Summary { data } => {
            let path = data.unwrap_or_else(|| config.data.history_path.clone());
            print_summary(&summarize_csv(&path)?);
        }
    }
    Ok(())
}

fn print_training_report(report: &TrainingReport, directory: &std::path::Path) {
    println!("Trained on {} day pairs (schema v{})", report.samples, report.schema_version);
    for target in &report.targets {
        println!("  {:<9} R² {:>7.4}   MSE {:>8.4}", target.target.to_string(), target.r2, target.mse);
    }
    println!("Models saved to {}", directory.display());
}

fn print_forecast(forecast: &Forecast) {
    let seed = &forecast.seed;
    println!(
        "Live data for {} on {}: High={:.2}°C, Low={:.2}°C, Humidity={:.0}%",
        forecast.city, seed.date, seed.features.max_temp, seed.features.min_temp, seed.features.humidity
    );
    println!();
    println!("{:<12} {:>8} {:>8} {:>9}", "Date", "High", "Low", "Humidity");
    for step in &forecast.steps {
        let marker = if step.is_consistent() { "" } else { "  *" };
        println!(
            "{:<12} {:>6.1}°C {:>6.1}°C {:>8.0}%{marker}",
            step.date.format("%a %Y-%m-%d").to_string(),
            step.max_temp,
            step.min_temp,
            step.humidity
        );
    }
    if !forecast.inconsistent_days().is_empty() {
        println!();
        println!("* models disagree: high below low or humidity outside 0-100%");
    }
}

fn print_summary(summary: &DatasetSummary) {
    println!("Records from {} to {}", summary.first_date, summary.last_date);
    println!();
    println!("{:<10} {:>6} {:>8} {:>8} {:>8} {:>8}", "Column", "Count", "Min", "Max", "Mean", "Std");
    for column in &summary.columns {
        println!(
            "{:<10} {:>6} {:>8.2} {:>8.2} {:>8.2} {:>8.2}",
            column.name, column.count, column.min, column.max, column.mean, column.std_dev
        );
    }
    println!();
    println!("Correlation");
    print!("{:<10}", "");
    for column in &summary.columns {
        print!(" {:>9}", column.name);
    }
    println!();
    for (column, row) in summary.columns.iter().zip(&summary.correlation) {
        print!("{:<10}", column.name);
        for value in row {
            print!(" {value:>9.3}");
        }
        println!();
    }
}
