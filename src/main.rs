mod calendar;
mod cli;
mod config;
mod download;
mod error;
mod extract;
mod parquet;
mod reading;
mod table;
#[cfg(test)]
mod testing;
mod variable;
mod writers;

use std::process::ExitCode;

use anyhow::{Error, Result};
use clap::Parser;
use cli::{command, Cli, Commands};
use tracing_subscriber::EnvFilter;

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<ExitCode, Error> {
    let cli = Cli::parse();
    init_tracing(&cli.log_level);

    let succeeded = match &cli.command {
        Commands::Cmip(args) => match command::cmip(args).await {
            Ok(summary) => {
                print!("{}", summary);
                summary.is_complete()
            }
            Err(e) => {
                eprintln!("Error: {:#}", e);
                false
            }
        },
        Commands::GridmetDaycent {
            start_year,
            end_year,
            latitude,
            longitude,
            dir,
            location,
        } => {
            let location = command::Location {
                name: location.clone(),
                lat: *latitude,
                lon: *longitude,
            };
            report(command::gridmet_daycent(*start_year, *end_year, &location, dir).await)
        }
        Commands::GridmetDaycentBatch {
            locations,
            start_year,
            end_year,
            dir,
        } => report(command::gridmet_daycent_batch(locations, *start_year, *end_year, dir).await),
        Commands::GridmetAgroibis {
            start_year,
            end_year,
            north,
            south,
            west,
            east,
            dir,
        } => {
            let bounds = reading::BoundingBox {
                north: *north,
                south: *south,
                west: *west,
                east: *east,
            };
            report(command::gridmet_agroibis(*start_year, *end_year, bounds, dir).await)
        }
    };

    Ok(if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn report(result: Result<Vec<std::path::PathBuf>>) -> bool {
    match result {
        Ok(files) => {
            for file in files {
                println!("File saved to `{}`", file.display());
            }
            true
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            false
        }
    }
}
