//! GridMet to DayCent for single locations.
//!
//! Unlike the CMIP pipeline this runs straight through: any download, read
//! or write error stops the run.

use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use anyhow::{anyhow, Context, Result};
use csv::ReaderBuilder;
use tokio::task;
use tracing::info;

use crate::{
    download::download_if_absent,
    error::PipelineResult,
    reading::{read_site_series, site},
    table::{DailyValue, GridCell},
    variable::GridmetVariable,
    writers::{daycent::FILE_PREFIX, ensure_dir, write_daycent_file, DaycentDay, Precision},
};

/// Header value marking the optional first row of a locations file.
const LOCATION_HEADER: &str = "LocationName";

#[derive(Debug, Clone, PartialEq)]
pub struct Location {
    pub name: String,
    pub lat: f64,
    pub lon: f64,
}

impl Location {
    fn target(&self) -> GridCell {
        GridCell {
            lat: self.lat,
            lon: self.lon,
        }
    }
}

/// Where a GridMet variable's yearly file is kept under `dir`.
pub fn source_path(dir: &Path, variable: GridmetVariable, year: i32) -> PathBuf {
    dir.join(variable.code())
        .join(format!("{}_{year}.nc", variable.code()))
}

pub fn output_path(dir: &Path, location: &str, year: i32) -> PathBuf {
    dir.join("Output")
        .join(location)
        .join(format!("{FILE_PREFIX}{location}_{year}.txt"))
}

/// Downloads whatever is missing, then writes one DayCent weather file per
/// year for `location`.
pub async fn gridmet_daycent(
    start_year: i32,
    end_year: i32,
    location: &Location,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    if start_year > end_year {
        return Err(anyhow!(
            "start year {start_year} is after end year {end_year}"
        ));
    }
    info!(location = %location.name, lat = location.lat, lon = location.lon, "starting GridMet pipeline");

    let mut written = Vec::new();
    for year in start_year..=end_year {
        let mut columns: HashMap<GridmetVariable, Vec<DailyValue>> = HashMap::new();

        for variable in GridmetVariable::ALL {
            let path = source_path(dir, variable, year);
            download_if_absent(&variable.url(year), &path).await?;

            let target = location.target();
            let days = task::spawn_blocking(move || read_year(&path, variable, year, target))
                .await??;
            columns.insert(variable, days);
            println!("Finished: {year} {}", variable.label());
        }

        let days = daycent_days(&columns)?;
        let path = output_path(dir, &location.name, year);
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        write_daycent_file(&path, &days, Precision::Fine)
            .with_context(|| format!("Failed to write {:?}", path))?;
        println!("Finished: {year} Writing Output File");
        info!(path = %path.display(), "wrote DayCent weather file");

        written.push(path);
    }

    Ok(written)
}

/// Reads one year of a GridMet variable at the cell nearest `target`.
fn read_year(
    path: &Path,
    variable: GridmetVariable,
    year: i32,
    target: GridCell,
) -> PipelineResult<Vec<DailyValue>> {
    let series = read_site_series(path, variable.netcdf_name(), target)?;
    let days = site::convert(&series, variable.conversion())?;

    Ok(site::split_years(days, year..=year, path)?
        .remove(&year)
        .unwrap_or_default())
}

/// Zips the per-variable columns into DayCent days; relative humidity is the
/// mean of the daily maximum and minimum.
fn daycent_days(columns: &HashMap<GridmetVariable, Vec<DailyValue>>) -> Result<Vec<DaycentDay>> {
    let column = |variable: GridmetVariable| {
        columns
            .get(&variable)
            .ok_or_else(|| anyhow!("no {} data", variable.label()))
    };
    let tmmx = column(GridmetVariable::Tmmx)?;
    let tmmn = column(GridmetVariable::Tmmn)?;
    let pr = column(GridmetVariable::Pr)?;
    let srad = column(GridmetVariable::Srad)?;
    let vs = column(GridmetVariable::Vs)?;
    let rmax = column(GridmetVariable::Rmax)?;
    let rmin = column(GridmetVariable::Rmin)?;

    (0..tmmx.len())
        .map(|i| {
            let value = |days: &[DailyValue]| {
                days.get(i)
                    .map(|d| d.value)
                    .ok_or_else(|| anyhow!("GridMet columns differ in length"))
            };
            Ok(DaycentDay {
                date: tmmx[i].date,
                tmax: tmmx[i].value,
                tmin: value(tmmn)?,
                precip_mm: value(pr)?,
                srad_wm2: value(srad)?,
                rh_percent: (value(rmax)? + value(rmin)?) / 2.0,
                wind_ms: value(vs)?,
            })
        })
        .collect()
}

/// Reads a `LocationName,Latitude,Longitude` file. The header row is optional.
pub fn read_locations(path: &Path) -> Result<Vec<Location>> {
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .trim(csv::Trim::All)
        .from_path(path)
        .with_context(|| format!("Failed to open locations file {:?}", path))?;

    let mut locations = Vec::new();
    for (line, record) in reader.records().enumerate() {
        let record = record?;
        if record.get(0) == Some(LOCATION_HEADER) {
            continue;
        }
        let (name, lat, lon): (String, f64, f64) = record
            .deserialize(None)
            .with_context(|| format!("Invalid location on line {}", line + 1))?;
        locations.push(Location { name, lat, lon });
    }

    Ok(locations)
}

pub async fn gridmet_daycent_batch(
    locations_file: &Path,
    start_year: i32,
    end_year: i32,
    dir: &Path,
) -> Result<Vec<PathBuf>> {
    let locations = read_locations(locations_file)?;
    info!(count = locations.len(), "read locations");

    let mut written = Vec::new();
    for location in &locations {
        written.extend(gridmet_daycent(start_year, end_year, location, dir).await?);
        println!("Finished: {}", location.name);
    }

    Ok(written)
}

// -- Tests -------------------------------------------------------------------
