//! Command line interface.

pub mod command;

use std::{path::PathBuf, time::Duration};

use clap::{command, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use command::CmipArgs;

#[derive(Parser)]
#[command(version, about, long_about = None)]
/// Contains the commands
pub struct Cli {
    /// Log filter, e.g. `info` or `cmip2model=debug`; `RUST_LOG` wins when set
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Convert CMIP daily projections into AgroIBIS, DayCent and Ecosys inputs
    Cmip(CmipArgs),
    /// Download GridMet data for one location and write DayCent weather files
    #[command(allow_negative_numbers = true)]
    GridmetDaycent {
        start_year: i32,
        end_year: i32,
        latitude: f64,
        longitude: f64,
        /// Directory for downloads and the `Output` tree
        dir: PathBuf,
        location: String,
    },
    /// Run the GridMet DayCent pipeline for every location in a CSV file
    GridmetDaycentBatch {
        /// CSV with `LocationName,Latitude,Longitude` columns
        #[arg(long)]
        locations: PathBuf,
        #[arg(long)]
        start_year: i32,
        #[arg(long)]
        end_year: i32,
        #[arg(long)]
        dir: PathBuf,
    },
    /// Download GridMet data and write AgroIBIS grids cropped to a bounding box
    #[command(allow_negative_numbers = true)]
    GridmetAgroibis {
        #[arg(long)]
        start_year: i32,
        #[arg(long)]
        end_year: i32,
        /// Northern edge; GridMet ends at 49.4
        #[arg(long, default_value_t = 49.4)]
        north: f64,
        /// Southern edge; GridMet starts at 25.06
        #[arg(long, default_value_t = 25.06)]
        south: f64,
        /// Western edge; GridMet starts at -124.77
        #[arg(long, default_value_t = -124.77)]
        west: f64,
        /// Eastern edge; GridMet ends at -67.06
        #[arg(long, default_value_t = -67.06)]
        east: f64,
        /// Directory for downloads and the `Output` tree
        #[arg(long)]
        dir: PathBuf,
    },
}

/// Creates a spinner.
pub fn create_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner().with_message(message);
    bar.enable_steady_tick(Duration::from_millis(100));

    bar
}

/// Creates a progress bar.
pub fn create_progress_bar(size: u64, message: String) -> ProgressBar {
    ProgressBar::new(size).with_message(message).with_style(
        ProgressStyle::with_template("[{eta_precise}] {bar:40.cyan/blue} {msg}")
            .unwrap()
            .progress_chars("##-"),
    )
}

// -- Tests -------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn should_have_valid_command_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn should_parse_negative_longitude() {
        let cli = Cli::try_parse_from([
            "cmip2model",
            "gridmet-daycent",
            "2001",
            "2002",
            "40.07",
            "-88.21",
            "/tmp/gridmet",
            "Urbana",
        ])
        .unwrap();

        match cli.command {
            Commands::GridmetDaycent {
                longitude,
                location,
                ..
            } => {
                assert_eq!(longitude, -88.21);
                assert_eq!(location, "Urbana");
            }
            _ => panic!("expected gridmet-daycent"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn should_parse_bounding_box_with_defaults() {
        let cli = Cli::try_parse_from([
            "cmip2model",
            "gridmet-agroibis",
            "--start-year",
            "2001",
            "--end-year",
            "2002",
            "--west",
            "-90.5",
            "--east",
            "-87",
            "--dir",
            "/tmp/gridmet",
        ])
        .unwrap();

        let Commands::GridmetAgroibis {
            north,
            south,
            west,
            east,
            ..
        } = cli.command
        else {
            panic!("expected gridmet-agroibis");
        };
        assert_eq!((north, south), (49.4, 25.06));
        assert_eq!((west, east), (-90.5, -87.0));
    }

    #[test]
    fn should_parse_model_list() {
        let cli = Cli::try_parse_from([
            "cmip2model",
            "--log-level",
            "debug",
            "cmip",
            "--models",
            "agroibis,ecosys",
            "--workers",
            "3",
        ])
        .unwrap();

        let Commands::Cmip(args) = cli.command else {
            panic!("expected cmip");
        };
        assert_eq!(
            args.models,
            [crate::writers::Model::AgroIbis, crate::writers::Model::Ecosys]
        );
        assert_eq!(args.workers, Some(3));
        assert_eq!(cli.log_level, "debug");
    }
}
